//! Room synchronization gateway.
//!
//! Mirrors the local [`Round`] into the shared room document after
//! every turn-engine transition and reconciles remote reads back into
//! local state. The remote document is the authoritative shared copy;
//! writes are last-write-wins with no concurrency token, so two
//! clients mutating the same room can overwrite each other. That
//! limitation is part of the contract, not something this layer hides.

use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::{
    document::{ACTIVE_ROOMS, DEFAULT_CAPACITY, GAME_TYPE_BLACKJACK, ROOM_HISTORY},
    document::{ArchiveRecord, RoomDocument, phase_from_estado},
    store::{DocumentChange, DocumentStore, StoreError},
};
use crate::game::{GameError, PlayerId, Round, RoundPhase};

/// Failures of the synchronization layer. `RoomCreation` blocks the
/// game from starting; `Push` is non-fatal and the local round stays
/// authoritative for this client until a later push reconciles.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to create room: {0}")]
    RoomCreation(#[source] StoreError),
    #[error("room {0} already exists")]
    RoomExists(String),
    #[error("failed to push state for room {room_id}: {source}")]
    Push {
        room_id: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to read room {room_id}: {source}")]
    Pull {
        room_id: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to list rooms: {0}")]
    List(#[source] StoreError),
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("room {room_id} is full ({capacidad} seats)")]
    RoomFull { room_id: String, capacidad: usize },
    #[error("room {0} already started")]
    AlreadyStarted(String),
    #[error("player {0} is already seated in that room")]
    AlreadySeated(PlayerId),
    #[error("malformed document for room {room_id}: {reason}")]
    Malformed { room_id: String, reason: String },
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Lobby listing entry for one live room.
#[derive(Clone, Debug)]
pub struct RoomSummary {
    pub room_id: String,
    pub seated: usize,
    pub capacidad: usize,
    pub phase: RoundPhase,
}

/// One client's window onto a shared room.
///
/// All calls for the same room are issued sequentially by the owning
/// client; pushes leave this client in the same order as the engine
/// transitions that produced them.
pub struct RoomGateway<S> {
    store: Arc<S>,
    capacidad: usize,
}

impl<S: DocumentStore> RoomGateway<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(store: Arc<S>, capacidad: usize) -> Self {
        Self { store, capacidad }
    }

    /// Persist a brand-new room for the given round and return its id.
    /// Failure here means the round must not proceed as if shared.
    pub async fn create_room(&self, round: &Round) -> SyncResult<String> {
        let room_id = round.room_id().to_string();
        let existing = self
            .store
            .get(ACTIVE_ROOMS, &room_id)
            .await
            .map_err(SyncError::RoomCreation)?;
        if existing.is_some() {
            return Err(SyncError::RoomExists(room_id));
        }
        let value = encode(&room_id, &RoomDocument::from_round(round, self.capacidad))?;
        self.store
            .set(ACTIVE_ROOMS, &room_id, value)
            .await
            .map_err(SyncError::RoomCreation)?;
        info!("created room {room_id} with {} seats", self.capacidad);
        Ok(room_id)
    }

    /// Overwrite the remote document with the round's current state.
    /// At most one write per call; a failure is logged and returned,
    /// and the local round remains usable.
    pub async fn push_state(&self, round: &Round) -> SyncResult<()> {
        let room_id = round.room_id();
        let capacidad = self.remote_capacity(room_id).await;
        let value = encode(room_id, &RoomDocument::from_round(round, capacidad))?;
        self.store
            .set(ACTIVE_ROOMS, room_id, value)
            .await
            .map_err(|source| {
                warn!("push for room {room_id} failed: {source}");
                SyncError::Push {
                    room_id: room_id.to_string(),
                    source,
                }
            })
    }

    /// Read the remote document and reconstruct the round. Used by
    /// observer clients and on reconnect.
    pub async fn pull_state(&self, room_id: &str) -> SyncResult<Round> {
        let doc = self.read_document(room_id).await?;
        decode_round(room_id, &doc)
    }

    /// Seat another player in a waiting room, respecting the room's
    /// advertised capacity.
    pub async fn join_room(&self, room_id: &str, player: &PlayerId) -> SyncResult<Round> {
        let doc = self.read_document(room_id).await?;
        if phase_from_estado(&doc.estado).map_err(|e| malformed(room_id, &e))?
            != RoundPhase::Waiting
        {
            return Err(SyncError::AlreadyStarted(room_id.to_string()));
        }
        if doc.jugadores.iter().any(|id| id == player.as_str()) {
            return Err(SyncError::AlreadySeated(player.clone()));
        }
        if doc.jugadores.len() >= doc.capacidad {
            return Err(SyncError::RoomFull {
                room_id: room_id.to_string(),
                capacidad: doc.capacidad,
            });
        }
        let mut round = decode_round(room_id, &doc)?;
        round
            .seat_player(player.clone())
            .map_err(|e| malformed(room_id, &e))?;
        let value = encode(room_id, &RoomDocument::from_round(&round, doc.capacidad))?;
        self.store
            .set(ACTIVE_ROOMS, room_id, value)
            .await
            .map_err(|source| SyncError::Push {
                room_id: room_id.to_string(),
                source,
            })?;
        info!("player {player} joined room {room_id}");
        Ok(round)
    }

    /// Lobby listing of live blackjack rooms. Documents of other game
    /// types, or ones this client cannot parse, are skipped.
    pub async fn list_rooms(&self) -> SyncResult<Vec<RoomSummary>> {
        let entries = self
            .store
            .list(ACTIVE_ROOMS)
            .await
            .map_err(SyncError::List)?;
        let mut rooms = Vec::with_capacity(entries.len());
        for (room_id, value) in entries {
            let doc: RoomDocument = match serde_json::from_value(value) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("skipping unreadable room {room_id}: {e}");
                    continue;
                }
            };
            if doc.tipo_juego != GAME_TYPE_BLACKJACK {
                continue;
            }
            let Ok(phase) = phase_from_estado(&doc.estado) else {
                warn!("skipping room {room_id} with unknown state `{}`", doc.estado);
                continue;
            };
            rooms.push(RoomSummary {
                room_id,
                seated: doc.jugadores.len(),
                capacidad: doc.capacidad,
                phase,
            });
        }
        Ok(rooms)
    }

    /// Archive the final round and delete the live document.
    /// Idempotent: once the live document is gone, further calls are
    /// no-ops.
    pub async fn finalize_room(&self, round: &Round) -> SyncResult<()> {
        let room_id = round.room_id();
        let live = self
            .store
            .get(ACTIVE_ROOMS, room_id)
            .await
            .map_err(|source| SyncError::Pull {
                room_id: room_id.to_string(),
                source,
            })?;
        let Some(live) = live else {
            info!("room {room_id} already finalized");
            return Ok(());
        };
        let capacidad = serde_json::from_value::<RoomDocument>(live)
            .map(|doc| doc.capacidad)
            .unwrap_or(self.capacidad);
        let archive = ArchiveRecord {
            sala: RoomDocument::from_round(round, capacidad),
            archivada_en: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&archive).map_err(|e| SyncError::Malformed {
            room_id: room_id.to_string(),
            reason: e.to_string(),
        })?;
        self.store
            .set(ROOM_HISTORY, room_id, value)
            .await
            .map_err(|source| SyncError::Push {
                room_id: room_id.to_string(),
                source,
            })?;
        self.store
            .delete(ACTIVE_ROOMS, room_id)
            .await
            .map_err(|source| SyncError::Push {
                room_id: room_id.to_string(),
                source,
            })?;
        info!("room {room_id} archived and closed");
        Ok(())
    }

    /// Subscribe to a room's live document. The stream yields a
    /// reconstructed round per remote write and ends when the room is
    /// deleted.
    pub async fn watch_room(&self, room_id: &str) -> SyncResult<RoomWatch> {
        let rx = self
            .store
            .listen(ACTIVE_ROOMS, room_id)
            .await
            .map_err(|source| SyncError::Pull {
                room_id: room_id.to_string(),
                source,
            })?;
        Ok(RoomWatch {
            room_id: room_id.to_string(),
            rx,
        })
    }

    async fn read_document(&self, room_id: &str) -> SyncResult<RoomDocument> {
        let value = self
            .store
            .get(ACTIVE_ROOMS, room_id)
            .await
            .map_err(|source| SyncError::Pull {
                room_id: room_id.to_string(),
                source,
            })?
            .ok_or_else(|| SyncError::RoomNotFound(room_id.to_string()))?;
        serde_json::from_value(value).map_err(|e| SyncError::Malformed {
            room_id: room_id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Capacity advertised by the live document, falling back to this
    /// gateway's default when the room has not been created yet.
    async fn remote_capacity(&self, room_id: &str) -> usize {
        match self.store.get(ACTIVE_ROOMS, room_id).await {
            Ok(Some(value)) => serde_json::from_value::<RoomDocument>(value)
                .map(|doc| doc.capacidad)
                .unwrap_or(self.capacidad),
            _ => self.capacidad,
        }
    }
}

fn encode(room_id: &str, doc: &RoomDocument) -> SyncResult<Value> {
    serde_json::to_value(doc).map_err(|e| SyncError::Malformed {
        room_id: room_id.to_string(),
        reason: e.to_string(),
    })
}

fn decode_round(room_id: &str, doc: &RoomDocument) -> SyncResult<Round> {
    doc.to_round(room_id).map_err(|e| malformed(room_id, &e))
}

fn malformed(room_id: &str, source: &GameError) -> SyncError {
    SyncError::Malformed {
        room_id: room_id.to_string(),
        reason: source.to_string(),
    }
}

/// Realtime subscription to one room.
pub struct RoomWatch {
    room_id: String,
    rx: mpsc::Receiver<DocumentChange>,
}

impl RoomWatch {
    /// Next remote snapshot, or `None` once the room is deleted (or
    /// the store dropped the subscription).
    pub async fn next_round(&mut self) -> Option<SyncResult<Round>> {
        match self.rx.recv().await {
            None | Some(DocumentChange::Deleted) => None,
            Some(DocumentChange::Updated(value)) => {
                let parsed = serde_json::from_value::<RoomDocument>(value)
                    .map_err(|e| SyncError::Malformed {
                        room_id: self.room_id.clone(),
                        reason: e.to_string(),
                    })
                    .and_then(|doc| decode_round(&self.room_id, &doc));
                Some(parsed)
            }
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }
}
