//! Round state: seated players, hands, phase, and outcomes.
//!
//! `Round` has no turn logic of its own; it owns the data and rejects
//! mutations that would break round invariants. The [`TurnEngine`]
//! drives all transitions.
//!
//! [`TurnEngine`]: super::engine::TurnEngine

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use super::{
    GameError,
    entities::{Card, Hand},
};

/// Opaque player identity supplied by the session layer.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    #[must_use]
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Phase of a round. Transitions only move forward; a new round means
/// a new room.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RoundPhase {
    Waiting,
    InProgress,
    DealerTurn,
    Finished,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::InProgress => "in progress",
            Self::DealerTurn => "dealer turn",
            Self::Finished => "finished",
        };
        write!(f, "{repr}")
    }
}

/// Final result for one player against the dealer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Outcome {
    Win,
    Lose,
    Push,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Win => "win",
            Self::Lose => "lose",
            Self::Push => "push",
        };
        write!(f, "{repr}")
    }
}

/// A seated player. `stood` is monotonic within a round; bust is
/// derived from the hand and never stored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Player {
    id: PlayerId,
    hand: Hand,
    stood: bool,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            hand: Hand::new(),
            stood: false,
        }
    }

    pub(crate) fn from_parts(id: PlayerId, hand: Hand, stood: bool) -> Self {
        Self { id, hand, stood }
    }

    #[must_use]
    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    #[must_use]
    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    #[must_use]
    pub fn stood(&self) -> bool {
        self.stood
    }

    #[must_use]
    pub fn busted(&self) -> bool {
        self.hand.is_busted()
    }

    /// A player with nothing left to do this round.
    #[must_use]
    pub fn done(&self) -> bool {
        self.stood || self.busted()
    }
}

/// Longest hand a round can legitimately produce. Eleven twos reach
/// 21 and end the turn; the dealer's forced draws stop within the
/// same bound.
pub(crate) const MAX_HAND_CARDS: usize = 12;

/// One blackjack round. The remote room document is the authoritative
/// shared copy; this value is the local cache the gateway reconciles.
#[derive(Clone, Debug)]
pub struct Round {
    room_id: String,
    players: Vec<Player>,
    dealer_hand: Hand,
    active_player_index: usize,
    phase: RoundPhase,
    outcomes: BTreeMap<PlayerId, Outcome>,
}

impl Round {
    /// Seat the given players in order and open the round in
    /// `Waiting`. No cards are dealt yet.
    pub fn new(room_id: String, seated: &[PlayerId]) -> Result<Self, GameError> {
        if seated.is_empty() {
            return Err(GameError::NoPlayers);
        }
        let mut players: Vec<Player> = Vec::with_capacity(seated.len());
        for id in seated {
            if players.iter().any(|p| p.id() == id) {
                return Err(GameError::DuplicatePlayer(id.clone()));
            }
            players.push(Player::new(id.clone()));
        }
        Ok(Self {
            room_id,
            players,
            dealer_hand: Hand::new(),
            active_player_index: 0,
            phase: RoundPhase::Waiting,
            outcomes: BTreeMap::new(),
        })
    }

    /// Rebuild a round from reconciled remote state, enforcing the
    /// same invariants `Round` guarantees for locally driven rounds.
    pub(crate) fn from_parts(
        room_id: String,
        players: Vec<Player>,
        dealer_hand: Hand,
        active_player_index: usize,
        phase: RoundPhase,
        outcomes: BTreeMap<PlayerId, Outcome>,
    ) -> Result<Self, GameError> {
        if players.is_empty() {
            return Err(GameError::NoPlayers);
        }
        for (i, player) in players.iter().enumerate() {
            if players[..i].iter().any(|p| p.id() == player.id()) {
                return Err(GameError::DuplicatePlayer(player.id().clone()));
            }
            if player.hand().len() > MAX_HAND_CARDS {
                return Err(GameError::InvalidState(format!(
                    "hand of {} cards for player {}",
                    player.hand().len(),
                    player.id()
                )));
            }
        }
        if dealer_hand.len() > MAX_HAND_CARDS {
            return Err(GameError::InvalidState(format!(
                "dealer hand of {} cards",
                dealer_hand.len()
            )));
        }
        if phase != RoundPhase::Finished && active_player_index >= players.len() {
            return Err(GameError::InvalidState(format!(
                "active player index {active_player_index} out of bounds for {} seats",
                players.len()
            )));
        }
        match phase {
            RoundPhase::Waiting => {
                if !dealer_hand.is_empty() {
                    return Err(GameError::InvalidState(
                        "dealer holds cards before the deal".to_string(),
                    ));
                }
            }
            _ => {
                if dealer_hand.len() < 2 {
                    return Err(GameError::InvalidState(
                        "dealer hand is short of two cards".to_string(),
                    ));
                }
            }
        }
        if phase == RoundPhase::Finished {
            if outcomes.len() != players.len()
                || !players.iter().all(|p| outcomes.contains_key(p.id()))
            {
                return Err(GameError::InvalidState(
                    "finished round is missing outcomes".to_string(),
                ));
            }
        } else if !outcomes.is_empty() {
            return Err(GameError::InvalidState(
                "outcomes recorded before the round finished".to_string(),
            ));
        }
        Ok(Self {
            room_id,
            players,
            dealer_hand,
            active_player_index,
            phase,
            outcomes,
        })
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[must_use]
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == id)
    }

    #[must_use]
    pub fn dealer_hand(&self) -> &Hand {
        &self.dealer_hand
    }

    #[must_use]
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Index of the player whose turn it is. Undefined once the round
    /// has finished.
    #[must_use]
    pub fn active_player_index(&self) -> Option<usize> {
        (self.phase != RoundPhase::Finished).then_some(self.active_player_index)
    }

    #[must_use]
    pub fn outcomes(&self) -> &BTreeMap<PlayerId, Outcome> {
        &self.outcomes
    }

    /// Seat an additional player. Only legal before the deal.
    pub fn seat_player(&mut self, id: PlayerId) -> Result<(), GameError> {
        if self.phase != RoundPhase::Waiting {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.players.iter().any(|p| *p.id() == id) {
            return Err(GameError::DuplicatePlayer(id));
        }
        self.players.push(Player::new(id));
        Ok(())
    }

    pub(crate) fn set_phase(&mut self, phase: RoundPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_active_player_index(&mut self, index: usize) {
        debug_assert!(index < self.players.len());
        self.active_player_index = index;
    }

    pub(crate) fn deal_to_player(&mut self, index: usize, card: Card) {
        self.players[index].hand.push(card);
    }

    pub(crate) fn deal_to_dealer(&mut self, card: Card) {
        self.dealer_hand.push(card);
    }

    /// Mark a player as stood. Standing twice is rejected so `stood`
    /// stays monotonic.
    pub(crate) fn mark_stood(&mut self, index: usize) -> Result<(), GameError> {
        let player = &mut self.players[index];
        if player.stood {
            return Err(GameError::AlreadyStood(player.id.clone()));
        }
        player.stood = true;
        Ok(())
    }

    /// Record final outcomes and close the round. Requires exactly one
    /// outcome per seated player.
    pub(crate) fn finish(&mut self, outcomes: BTreeMap<PlayerId, Outcome>) -> Result<(), GameError> {
        if outcomes.len() != self.players.len()
            || !self.players.iter().all(|p| outcomes.contains_key(p.id()))
        {
            return Err(GameError::InvalidState(
                "outcomes do not cover every seated player".to_string(),
            ));
        }
        self.outcomes = outcomes;
        self.phase = RoundPhase::Finished;
        Ok(())
    }

    /// Snapshot for the rendering layer. The dealer's hole card stays
    /// concealed until dealer play begins; that concealment lives here
    /// and not in the data model.
    #[must_use]
    pub fn view(&self) -> RoundView {
        let hole_hidden = matches!(self.phase, RoundPhase::Waiting | RoundPhase::InProgress);
        let dealer = if hole_hidden {
            DealerView {
                cards: self.dealer_hand.cards().iter().take(1).copied().collect(),
                hole_hidden: self.dealer_hand.len() > 1,
                total: None,
            }
        } else {
            DealerView {
                cards: self.dealer_hand.cards().to_vec(),
                hole_hidden: false,
                total: Some(self.dealer_hand.total()),
            }
        };
        let active = self.active_player_index();
        RoundView {
            room_id: self.room_id.clone(),
            phase: self.phase,
            players: self
                .players
                .iter()
                .enumerate()
                .map(|(i, p)| PlayerView {
                    id: p.id.clone(),
                    cards: p.hand.cards().to_vec(),
                    total: p.hand.total(),
                    stood: p.stood,
                    busted: p.busted(),
                    active: active == Some(i) && self.phase == RoundPhase::InProgress,
                    outcome: self.outcomes.get(&p.id).copied(),
                })
                .collect(),
            dealer,
        }
    }
}

/// Display-ready snapshot of a round.
#[derive(Clone, Debug, Serialize)]
pub struct RoundView {
    pub room_id: String,
    pub phase: RoundPhase,
    pub players: Vec<PlayerView>,
    pub dealer: DealerView,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub cards: Vec<Card>,
    pub total: u8,
    pub stood: bool,
    pub busted: bool,
    pub active: bool,
    pub outcome: Option<Outcome>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DealerView {
    /// Cards safe to show right now.
    pub cards: Vec<Card>,
    pub hole_hidden: bool,
    /// Revealed only once the dealer plays.
    pub total: Option<u8>,
}
