//! Turn engine: the state machine driving a round from deal to
//! resolution.
//!
//! The engine runs synchronously on the caller's thread; every
//! transition happens inside a single method call. Dealer play is
//! automatic: once the last player is done, the same call that ended
//! their turn draws the dealer out and resolves the round.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{
    GameError,
    entities::{DrawCards, Shoe},
    round::{Outcome, PlayerId, Round, RoundPhase},
};

/// Dealer must draw to 17 and stand on 17.
const DEALER_STAND_TOTAL: u8 = 17;

/// Drives rounds against a card source. The default source is the
/// infinite [`Shoe`]; tests inject scripted draws.
#[derive(Debug)]
pub struct TurnEngine<D = Shoe> {
    shoe: D,
}

impl TurnEngine<Shoe> {
    #[must_use]
    pub fn new() -> Self {
        Self { shoe: Shoe }
    }
}

impl Default for TurnEngine<Shoe> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DrawCards> TurnEngine<D> {
    pub fn with_source(shoe: D) -> Self {
        Self { shoe }
    }

    /// Open a fresh round in `Waiting` with a never-reused room id.
    pub fn start_round(&mut self, seated: &[PlayerId]) -> Result<Round, GameError> {
        Round::new(Uuid::new_v4().to_string(), seated)
    }

    /// Deal two cards to every seat and two to the dealer, then hand
    /// the turn to seat 0. `Waiting -> InProgress`.
    pub fn deal(&mut self, round: &mut Round) -> Result<(), GameError> {
        if round.phase() != RoundPhase::Waiting {
            return Err(GameError::WrongPhase(round.phase()));
        }
        for _ in 0..2 {
            for index in 0..round.players().len() {
                let card = self.shoe.draw();
                round.deal_to_player(index, card);
            }
            let card = self.shoe.draw();
            round.deal_to_dealer(card);
        }
        round.set_active_player_index(0);
        round.set_phase(RoundPhase::InProgress);
        Ok(())
    }

    /// Draw one card for the active player. Busting, or landing
    /// exactly on 21, ends the player's turn as an implicit stand.
    pub fn hit(&mut self, round: &mut Round, player_id: &PlayerId) -> Result<(), GameError> {
        let index = require_active(round, player_id)?;
        let card = self.shoe.draw();
        round.deal_to_player(index, card);
        let total = round.players()[index].hand().total();
        if total > 21 {
            self.advance_turn(round, index)?;
        } else if total == 21 {
            round.mark_stood(index)?;
            self.advance_turn(round, index)?;
        }
        Ok(())
    }

    /// End the active player's turn voluntarily.
    pub fn stand(&mut self, round: &mut Round, player_id: &PlayerId) -> Result<(), GameError> {
        let index = require_active(round, player_id)?;
        round.mark_stood(index)?;
        self.advance_turn(round, index)
    }

    /// Hand the turn to the next seat still in play, or move into
    /// dealer play when nobody is left.
    fn advance_turn(&mut self, round: &mut Round, after: usize) -> Result<(), GameError> {
        let next = round
            .players()
            .iter()
            .enumerate()
            .skip(after + 1)
            .find(|(_, player)| !player.done())
            .map(|(index, _)| index);
        match next {
            Some(index) => {
                round.set_active_player_index(index);
                Ok(())
            }
            None => {
                round.set_phase(RoundPhase::DealerTurn);
                self.play_dealer(round)
            }
        }
    }

    /// Dealer draws to 17, then the round resolves.
    /// `DealerTurn -> Finished` with no external trigger.
    fn play_dealer(&mut self, round: &mut Round) -> Result<(), GameError> {
        while round.dealer_hand().total() < DEALER_STAND_TOTAL {
            let card = self.shoe.draw();
            round.deal_to_dealer(card);
        }
        let outcomes = resolve_outcomes(round);
        round.finish(outcomes)
    }
}

fn require_active(round: &Round, player_id: &PlayerId) -> Result<usize, GameError> {
    if round.phase() != RoundPhase::InProgress {
        return Err(GameError::WrongPhase(round.phase()));
    }
    let index = round
        .players()
        .iter()
        .position(|p| p.id() == player_id)
        .ok_or_else(|| GameError::UnknownPlayer(player_id.clone()))?;
    let player = &round.players()[index];
    if player.stood() {
        return Err(GameError::AlreadyStood(player_id.clone()));
    }
    if player.busted() {
        return Err(GameError::AlreadyBusted(player_id.clone()));
    }
    if round.active_player_index() != Some(index) {
        return Err(GameError::OutOfTurn);
    }
    Ok(index)
}

/// Compare every player against the dealer. Pure over the final
/// hands: a busted player loses even when the dealer busts too.
#[must_use]
pub fn resolve_outcomes(round: &Round) -> BTreeMap<PlayerId, Outcome> {
    let dealer_total = round.dealer_hand().total();
    let dealer_busted = dealer_total > 21;
    round
        .players()
        .iter()
        .map(|player| {
            let outcome = if player.busted() {
                Outcome::Lose
            } else if dealer_busted {
                Outcome::Win
            } else {
                match player.hand().total().cmp(&dealer_total) {
                    Ordering::Greater => Outcome::Win,
                    Ordering::Less => Outcome::Lose,
                    Ordering::Equal => Outcome::Push,
                }
            };
            (player.id().clone(), outcome)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Card, Rank};
    use std::collections::VecDeque;

    /// Deterministic card source for scripted scenarios.
    struct Scripted(VecDeque<Card>);

    impl Scripted {
        fn new(tokens: &[&str]) -> Self {
            Self(
                tokens
                    .iter()
                    .map(|t| Card(Rank::from_token(t).unwrap()))
                    .collect(),
            )
        }
    }

    impl DrawCards for Scripted {
        fn draw(&mut self) -> Card {
            self.0.pop_front().expect("script ran out of cards")
        }
    }

    fn ids(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| PlayerId::new(n)).collect()
    }

    #[test]
    fn deal_gives_everyone_two_cards() {
        // Deal order: one card per seat, dealer, then again.
        let mut engine =
            TurnEngine::with_source(Scripted::new(&["2", "3", "4", "5", "6", "7"]));
        let mut round = engine.start_round(&ids(&["ana", "ben"])).unwrap();
        engine.deal(&mut round).unwrap();

        assert_eq!(round.phase(), RoundPhase::InProgress);
        assert_eq!(round.active_player_index(), Some(0));
        assert_eq!(round.players()[0].hand().len(), 2);
        assert_eq!(round.players()[1].hand().len(), 2);
        assert_eq!(round.dealer_hand().len(), 2);
    }

    #[test]
    fn deal_twice_is_rejected() {
        let mut engine = TurnEngine::with_source(Scripted::new(&["2", "3", "4", "5", "6", "7"]));
        let mut round = engine.start_round(&ids(&["ana"])).unwrap();
        engine.deal(&mut round).unwrap();
        assert_eq!(
            engine.deal(&mut round),
            Err(GameError::WrongPhase(RoundPhase::InProgress))
        );
    }

    #[test]
    fn actions_before_the_deal_are_rejected() {
        let mut engine = TurnEngine::with_source(Scripted::new(&[]));
        let mut round = engine.start_round(&ids(&["ana"])).unwrap();
        let ana = PlayerId::new("ana");
        assert_eq!(
            engine.hit(&mut round, &ana),
            Err(GameError::WrongPhase(RoundPhase::Waiting))
        );
        assert_eq!(
            engine.stand(&mut round, &ana),
            Err(GameError::WrongPhase(RoundPhase::Waiting))
        );
    }

    #[test]
    fn out_of_turn_hit_leaves_round_untouched() {
        let mut engine =
            TurnEngine::with_source(Scripted::new(&["2", "3", "4", "5", "10", "7"]));
        let mut round = engine.start_round(&ids(&["ana", "ben"])).unwrap();
        engine.deal(&mut round).unwrap();

        let ben = PlayerId::new("ben");
        assert_eq!(engine.hit(&mut round, &ben), Err(GameError::OutOfTurn));
        assert_eq!(round.players()[1].hand().len(), 2);
        assert_eq!(round.active_player_index(), Some(0));
    }

    #[test]
    fn unknown_player_is_rejected() {
        let mut engine = TurnEngine::with_source(Scripted::new(&["2", "3", "4", "5", "6", "7"]));
        let mut round = engine.start_round(&ids(&["ana"])).unwrap();
        engine.deal(&mut round).unwrap();
        let ghost = PlayerId::new("ghost");
        assert_eq!(
            engine.hit(&mut round, &ghost),
            Err(GameError::UnknownPlayer(ghost.clone()))
        );
    }

    #[test]
    fn hitting_to_exactly_21_is_an_implicit_stand() {
        // ana: 10 + 6, ben: 2 + 2, dealer: 9 + 9; ana draws 5 -> 21.
        let mut engine = TurnEngine::with_source(Scripted::new(&[
            "10", "2", "9", "6", "2", "9", // the deal
            "5", // ana's hit
        ]));
        let mut round = engine.start_round(&ids(&["ana", "ben"])).unwrap();
        engine.deal(&mut round).unwrap();

        engine.hit(&mut round, &PlayerId::new("ana")).unwrap();
        let ana = &round.players()[0];
        assert_eq!(ana.hand().total(), 21);
        assert!(!ana.busted());
        assert!(ana.stood());
        assert_eq!(round.active_player_index(), Some(1));
    }

    #[test]
    fn busting_advances_the_turn() {
        // ana: 10 + 9, ben: 2 + 2, dealer: 9 + 9; ana draws K -> 29.
        let mut engine = TurnEngine::with_source(Scripted::new(&[
            "10", "2", "9", "9", "2", "9", // the deal
            "K", // ana busts
        ]));
        let mut round = engine.start_round(&ids(&["ana", "ben"])).unwrap();
        engine.deal(&mut round).unwrap();

        engine.hit(&mut round, &PlayerId::new("ana")).unwrap();
        assert!(round.players()[0].busted());
        assert!(!round.players()[0].stood());
        assert_eq!(round.active_player_index(), Some(1));

        // A busted player may not act again.
        assert_eq!(
            engine.hit(&mut round, &PlayerId::new("ana")),
            Err(GameError::AlreadyBusted(PlayerId::new("ana")))
        );
    }

    #[test]
    fn all_stands_run_the_dealer_to_completion() {
        // ana: 10 + 8, ben: 9 + 9, dealer: 10 + 6 -> must draw the K
        // and bust at 26.
        let mut engine = TurnEngine::with_source(Scripted::new(&[
            "10", "9", "10", "8", "9", "6", // the deal
            "K", // dealer's forced draw
        ]));
        let mut round = engine.start_round(&ids(&["ana", "ben"])).unwrap();
        engine.deal(&mut round).unwrap();

        engine.stand(&mut round, &PlayerId::new("ana")).unwrap();
        assert_eq!(round.phase(), RoundPhase::InProgress);
        engine.stand(&mut round, &PlayerId::new("ben")).unwrap();

        // No further input: dealer played and the round resolved.
        assert_eq!(round.phase(), RoundPhase::Finished);
        assert_eq!(round.dealer_hand().total(), 26);
        assert_eq!(
            round.outcomes().get(&PlayerId::new("ana")),
            Some(&Outcome::Win)
        );
        assert_eq!(
            round.outcomes().get(&PlayerId::new("ben")),
            Some(&Outcome::Win)
        );
    }

    #[test]
    fn dealer_stands_on_seventeen() {
        // ana stands on 19; dealer: 10 + 7 = 17, no draw.
        let mut engine = TurnEngine::with_source(Scripted::new(&[
            "10", "10", "9", "7", // the deal
        ]));
        let mut round = engine.start_round(&ids(&["ana"])).unwrap();
        engine.deal(&mut round).unwrap();
        engine.stand(&mut round, &PlayerId::new("ana")).unwrap();

        assert_eq!(round.phase(), RoundPhase::Finished);
        assert_eq!(round.dealer_hand().len(), 2);
        assert_eq!(round.dealer_hand().total(), 17);
        assert_eq!(
            round.outcomes().get(&PlayerId::new("ana")),
            Some(&Outcome::Win)
        );
    }

    #[test]
    fn busted_player_loses_even_when_dealer_busts() {
        // ana: 10 + 9 + K busts; dealer: 10 + 6 + K busts too.
        let mut engine = TurnEngine::with_source(Scripted::new(&[
            "10", "10", "9", "6", // the deal
            "K", // ana busts; dealer then draws K and busts
            "K",
        ]));
        let mut round = engine.start_round(&ids(&["ana"])).unwrap();
        engine.deal(&mut round).unwrap();
        engine.hit(&mut round, &PlayerId::new("ana")).unwrap();

        assert_eq!(round.phase(), RoundPhase::Finished);
        assert!(round.dealer_hand().total() > 21);
        assert_eq!(
            round.outcomes().get(&PlayerId::new("ana")),
            Some(&Outcome::Lose)
        );
    }

    #[test]
    fn push_on_equal_totals() {
        // ana: 10 + 9 stands; dealer: 10 + 9.
        let mut engine = TurnEngine::with_source(Scripted::new(&["10", "10", "9", "9"]));
        let mut round = engine.start_round(&ids(&["ana"])).unwrap();
        engine.deal(&mut round).unwrap();
        engine.stand(&mut round, &PlayerId::new("ana")).unwrap();

        assert_eq!(
            round.outcomes().get(&PlayerId::new("ana")),
            Some(&Outcome::Push)
        );
    }

    #[test]
    fn room_ids_are_never_reused() {
        let mut engine = TurnEngine::new();
        let seats = ids(&["ana"]);
        let a = engine.start_round(&seats).unwrap();
        let b = engine.start_round(&seats).unwrap();
        assert_ne!(a.room_id(), b.room_id());
    }
}
