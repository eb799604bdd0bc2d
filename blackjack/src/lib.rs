//! # Blackjack
//!
//! A blackjack round engine with shared room synchronization.
//!
//! A round lives in two places: the in-memory [`Round`] this client
//! mutates through the [`TurnEngine`], and a remote room document that
//! other clients of the same room observe. The [`RoomGateway`] mirrors
//! every engine transition into the document and reconciles remote
//! reads back into a `Round`.
//!
//! ## Architecture
//!
//! A round moves through four phases:
//!
//! - **Waiting**: seats filled, no cards dealt
//! - **InProgress**: players act in seat order (hit/stand)
//! - **DealerTurn**: dealer draws to 17 automatically
//! - **Finished**: outcomes recorded, one per player
//!
//! ## Core Modules
//!
//! - [`game`]: cards, scoring, round state, and the turn engine
//! - [`room`]: document-store transport and the synchronization gateway
//!
//! ## Example
//!
//! ```
//! use blackjack::{PlayerId, TurnEngine};
//!
//! let mut engine = TurnEngine::new();
//! let mut round = engine.start_round(&[PlayerId::new("ana")]).unwrap();
//! engine.deal(&mut round).unwrap();
//! ```

/// Core game logic: entities, round state, and the turn engine.
pub mod game;
pub use game::{
    Card, DrawCards, GameError, Hand, Outcome, Player, PlayerId, PlayerView, Rank, Round,
    RoundPhase, RoundView, Shoe, TurnEngine, engine::resolve_outcomes,
};

/// Room synchronization: document store seam and gateway.
pub mod room;
pub use room::{
    DocumentStore, MemoryStore, RoomGateway, RoomSummary, RoomWatch, SyncError, SyncResult,
};
