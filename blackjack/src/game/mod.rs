//! Blackjack round engine - entities, round state, and turn logic.
//!
//! This module provides the in-memory side of a game room:
//! - Cards, hands, and soft-ace scoring
//! - The [`Round`] state and its invariants
//! - The [`TurnEngine`] driving deal/hit/stand and dealer auto-play

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod engine;
pub mod entities;
pub mod round;

pub use engine::TurnEngine;
pub use entities::{Card, DrawCards, Hand, Rank, Shoe};
pub use round::{DealerView, Outcome, Player, PlayerId, PlayerView, Round, RoundPhase, RoundView};

/// Errors produced by scoring and turn-engine operations. All of these
/// are synchronous and recoverable: the round is left untouched and
/// the caller re-prompts.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("unrecognized card rank `{0}`")]
    InvalidCard(String),
    #[error("player {0} is not seated in this round")]
    UnknownPlayer(PlayerId),
    #[error("not your turn")]
    OutOfTurn,
    #[error("player {0} already stood")]
    AlreadyStood(PlayerId),
    #[error("player {0} already busted")]
    AlreadyBusted(PlayerId),
    #[error("action not allowed while the round is {0}")]
    WrongPhase(RoundPhase),
    #[error("a round needs at least one seated player")]
    NoPlayers,
    #[error("player {0} is already seated")]
    DuplicatePlayer(PlayerId),
    #[error("inconsistent round state: {0}")]
    InvalidState(String),
}
