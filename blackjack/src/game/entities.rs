use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::GameError;

/// Card rank. Suits are purely cosmetic in blackjack and are left to
/// the rendering layer, so a card is its rank and nothing more.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Self; 13] = [
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Ten,
        Self::Jack,
        Self::Queen,
        Self::King,
        Self::Ace,
    ];

    /// Wire token shared with other room clients (`"2".."10"`, `"J"`,
    /// `"Q"`, `"K"`, `"A"`).
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
        }
    }

    /// Parse a wire token. Unrecognized tokens are an error; callers
    /// must not fall back to a default card.
    pub fn from_token(s: &str) -> Result<Self, GameError> {
        Self::ALL
            .into_iter()
            .find(|rank| rank.token() == s)
            .ok_or_else(|| GameError::InvalidCard(s.to_string()))
    }

    /// Blackjack value of a single card. Aces always count 11 here;
    /// softness is a hand-level adjustment, not a card-level one.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten | Self::Jack | Self::Queen | Self::King => 10,
            Self::Ace => 11,
        }
    }
}

/// A dealt card.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Card(pub Rank);

impl Card {
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0.value()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>2}", self.0.token())
    }
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.token())
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Rank::from_token(&s)
            .map(Card)
            .map_err(serde::de::Error::custom)
    }
}

/// Source of cards for the turn engine. The production source is
/// [`Shoe`]; tests substitute a scripted sequence.
pub trait DrawCards {
    fn draw(&mut self) -> Card;
}

/// Infinite shoe: every draw samples a uniformly random rank with
/// replacement. Shoe depletion is not modeled.
#[derive(Debug, Default)]
pub struct Shoe;

impl DrawCards for Shoe {
    fn draw(&mut self) -> Card {
        let mut rng = rand::rng();
        Card(Rank::ALL[rng.random_range(0..Rank::ALL.len())])
    }
}

/// An ordered hand of cards. Insertion order is draw order, which only
/// matters for display.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Hand(Vec<Card>);

impl Hand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, card: Card) {
        self.0.push(card);
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hand total with the single-adjustment soft-ace rule: sum all
    /// card values and, if the sum exceeds 21 and the hand holds at
    /// least one ace, subtract 10 exactly once. A second ace is never
    /// re-softened; that matches the room contract other clients
    /// score against.
    #[must_use]
    pub fn total(&self) -> u8 {
        let sum: u16 = self.0.iter().map(|card| u16::from(card.value())).sum();
        let sum = if sum > 21 && self.0.iter().any(|card| card.0 == Rank::Ace) {
            sum - 10
        } else {
            sum
        };
        // Totals past u8::MAX saturate; round validation keeps real
        // hands far below that.
        u8::try_from(sum).unwrap_or(u8::MAX)
    }

    #[must_use]
    pub fn is_busted(&self) -> bool {
        self.total() > 21
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{repr}")
    }
}

impl FromIterator<Card> for Hand {
    fn from_iter<T: IntoIterator<Item = Card>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(tokens: &[&str]) -> Hand {
        tokens
            .iter()
            .map(|t| Card(Rank::from_token(t).unwrap()))
            .collect()
    }

    #[test]
    fn token_roundtrip() {
        for rank in Rank::ALL {
            assert_eq!(Rank::from_token(rank.token()).unwrap(), rank);
        }
    }

    #[test]
    fn unknown_token_is_an_error() {
        assert_eq!(
            Rank::from_token("joker"),
            Err(GameError::InvalidCard("joker".to_string()))
        );
        assert!(Rank::from_token("").is_err());
        assert!(Rank::from_token("1").is_err());
    }

    #[test]
    fn face_cards_are_ten() {
        assert_eq!(Rank::Jack.value(), 10);
        assert_eq!(Rank::Queen.value(), 10);
        assert_eq!(Rank::King.value(), 10);
        assert_eq!(Rank::Ace.value(), 11);
    }

    #[test]
    fn hard_hand_totals() {
        assert_eq!(hand(&["2", "3"]).total(), 5);
        assert_eq!(hand(&["10", "6"]).total(), 16);
        assert_eq!(hand(&["10", "6", "5"]).total(), 21);
        assert_eq!(hand(&["K", "Q", "J"]).total(), 30);
    }

    #[test]
    fn one_ace_softens_over_21() {
        assert_eq!(hand(&["A", "K"]).total(), 21);
        assert_eq!(hand(&["A", "K", "5"]).total(), 16);
        assert_eq!(hand(&["A", "9", "5"]).total(), 15);
    }

    #[test]
    fn second_ace_is_not_resoftened() {
        // 11 + 11 + 9 = 31, minus 10 once = 21.
        assert_eq!(hand(&["A", "A", "9"]).total(), 21);
        // 11 + 11 + 10 = 32, minus 10 once = 22: still a bust.
        assert_eq!(hand(&["A", "A", "10"]).total(), 22);
        assert!(hand(&["A", "A", "10"]).is_busted());
    }

    #[test]
    fn absurdly_long_hands_saturate_instead_of_overflowing() {
        let long: Hand = vec![Card(Rank::Ace); 26].into_iter().collect();
        assert_eq!(long.total(), u8::MAX);
        assert!(long.is_busted());
    }

    #[test]
    fn card_serde_uses_wire_tokens() {
        let card = Card(Rank::Ten);
        assert_eq!(serde_json::to_string(&card).unwrap(), "\"10\"");
        let back: Card = serde_json::from_str("\"A\"").unwrap();
        assert_eq!(back, Card(Rank::Ace));
        assert!(serde_json::from_str::<Card>("\"X\"").is_err());
    }

    #[test]
    fn shoe_draws_known_ranks() {
        let mut shoe = Shoe;
        for _ in 0..100 {
            let card = shoe.draw();
            assert!(Rank::ALL.contains(&card.0));
        }
    }
}
