//! Observable state store shared by the playback engines.
//!
//! The store maps entity IDs to playback state snapshots. The whole mapping
//! lives in a `tokio::sync::watch` channel behind an `Arc`, so:
//! - every update is one read-modify-write under the channel lock
//! - writes are copy-on-write (`Arc::make_mut`), readers holding an older
//!   snapshot keep seeing it in full
//! - new subscribers immediately see the latest mapping

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

use super::error::EngineError;
use crate::types::EntityId;

/// Immutable snapshot of every entry in a store.
pub type StateMap<S> = Arc<HashMap<EntityId, S>>;

/// What an update closure wants done with the entry it inspected.
#[derive(Debug)]
pub(crate) enum Write<S> {
    /// Leave the entry as it is
    Keep,
    /// Insert or replace the entry
    Put(S),
    /// Remove the entry
    Remove,
}

// ============================================================================
// StateStore
// ============================================================================

/// Concurrency-safe mapping from entity ID to its current playback state.
pub struct StateStore<S> {
    tx: watch::Sender<StateMap<S>>,
}

impl<S: Clone + PartialEq> StateStore<S> {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(HashMap::new()));
        Self { tx }
    }

    /// Returns the current state for `id`.
    pub fn get(&self, id: EntityId) -> Option<S> {
        self.tx.borrow().get(&id).cloned()
    }

    /// Returns the whole current mapping.
    pub fn snapshot(&self) -> StateMap<S> {
        Arc::clone(&self.tx.borrow())
    }

    /// Subscribes to the whole mapping.
    pub fn subscribe(&self) -> watch::Receiver<StateMap<S>> {
        self.tx.subscribe()
    }

    /// Subscribes to a single entry.
    pub fn watch(&self, id: EntityId) -> EntityWatch<S> {
        let rx = self.tx.subscribe();
        let last = rx.borrow().get(&id).cloned();
        EntityWatch { id, rx, last }
    }

    /// Applies `f` to the entry for `id` as one atomic step.
    ///
    /// `f` sees the latest value and runs under the store lock, so it must not
    /// call back into the store. Subscribers are woken only if the mapping
    /// actually changed.
    pub(crate) fn update<R, F>(&self, id: EntityId, f: F) -> R
    where
        R: Default,
        F: FnOnce(Option<&S>) -> (Write<S>, R),
    {
        let mut outcome = R::default();
        self.tx.send_if_modified(|map| {
            let (write, result) = f(map.get(&id));
            outcome = result;
            match write {
                Write::Keep => false,
                Write::Put(next) => {
                    if map.get(&id) == Some(&next) {
                        return false;
                    }
                    Arc::make_mut(map).insert(id, next);
                    true
                }
                Write::Remove => {
                    if !map.contains_key(&id) {
                        return false;
                    }
                    Arc::make_mut(map).remove(&id);
                    true
                }
            }
        });
        outcome
    }
}

impl<S: Clone + PartialEq> Default for StateStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// EntityWatch
// ============================================================================

/// Projection of a store onto one entity ID.
///
/// Yields only when that entry appears, changes, or disappears.
pub struct EntityWatch<S> {
    id: EntityId,
    rx: watch::Receiver<StateMap<S>>,
    last: Option<S>,
}

impl<S: Clone + PartialEq> EntityWatch<S> {
    /// The watched entity.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The latest state, or `None` if the entity has no entry.
    pub fn current(&self) -> Option<S> {
        self.rx.borrow().get(&self.id).cloned()
    }

    /// Waits for the entry to change and returns its new value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Closed`] once the owning engine is dropped.
    pub async fn changed(&mut self) -> Result<Option<S>, EngineError> {
        loop {
            self.rx.changed().await.map_err(|_| EngineError::Closed)?;
            let next = self.rx.borrow_and_update().get(&self.id).cloned();
            if next != self.last {
                self.last = next.clone();
                return Ok(next);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
