//! Document-store transport seam.
//!
//! The gateway talks to the remote room backend exclusively through
//! [`DocumentStore`]. Production deployments plug in the external
//! document-store client; [`MemoryStore`] is the in-process
//! implementation used for local play and the test suite.

use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffered changes per listener before a slow listener is dropped.
const LISTENER_BUFFER: usize = 32;

/// Transport-level failure. The gateway decides whether it is fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Change delivered to realtime listeners of a single document.
#[derive(Clone, Debug)]
pub enum DocumentChange {
    Updated(Value),
    Deleted,
}

/// Schemaless document store keyed by collection and document id.
///
/// Semantics mirror the remote backend the rooms live in: `set`
/// overwrites unconditionally, `delete` of a missing document is a
/// no-op, and `listen` delivers every subsequent write or delete of
/// one document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    async fn set(&self, collection: &str, id: &str, value: Value) -> StoreResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>>;

    async fn listen(&self, collection: &str, id: &str)
    -> StoreResult<mpsc::Receiver<DocumentChange>>;
}

/// In-process [`DocumentStore`] with realtime listeners.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    collections: HashMap<String, BTreeMap<String, Value>>,
    listeners: HashMap<(String, String), Vec<mpsc::Sender<DocumentChange>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(inner: &mut MemoryInner, collection: &str, id: &str, change: &DocumentChange) {
        if let Some(senders) = inner
            .listeners
            .get_mut(&(collection.to_string(), id.to_string()))
        {
            // Listeners that stopped draining their channel are dropped.
            senders.retain(|tx| tx.try_send(change.clone()).is_ok());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, value: Value) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value.clone());
        Self::notify(&mut inner, collection, id, &DocumentChange::Updated(value));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            Self::notify(&mut inner, collection, id, &DocumentChange::Deleted);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, value)| (id.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn listen(
        &self,
        collection: &str,
        id: &str,
    ) -> StoreResult<mpsc::Receiver<DocumentChange>> {
        let (tx, rx) = mpsc::channel(LISTENER_BUFFER);
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner
            .listeners
            .entry((collection.to_string(), id.to_string()))
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
