//! Room synchronization - the shared side of a round.
//!
//! This module makes the turn engine's local state visible to other
//! clients through a remote document store:
//! - [`store`]: the transport seam and in-process implementation
//! - [`document`]: the wire shape shared with other room clients
//! - [`gateway`]: create/push/pull/join/finalize/watch operations

pub mod document;
pub mod gateway;
pub mod store;

pub use document::{ACTIVE_ROOMS, DEFAULT_CAPACITY, GAME_TYPE_BLACKJACK, ROOM_HISTORY, RoomDocument};
pub use gateway::{RoomGateway, RoomSummary, RoomWatch, SyncError, SyncResult};
pub use store::{DocumentChange, DocumentStore, MemoryStore, StoreError, StoreResult};
