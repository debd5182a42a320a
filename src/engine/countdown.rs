//! Per-entity countdown loops.
//!
//! Each running timer or sequence owns exactly one tokio task that wakes once
//! per tick interval and hands control to an engine-specific tick function.
//! The [`LoopRegistry`] guarantees at most one live loop per entity ID.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::types::EntityId;

// ============================================================================
// RunId
// ============================================================================

/// Identifies one run of an entity, from `start` until it ends or restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Mints a fresh run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// CancelFlag / Tick
// ============================================================================

/// Cooperative cancellation flag shared between a loop and its handle.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a loop does after a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Tick {
    /// Keep waiting for the next tick
    #[default]
    Continue,
    /// Terminate the loop
    Finish,
}

// ============================================================================
// LoopHandle
// ============================================================================

/// Handle to one running countdown task.
#[derive(Debug)]
pub(crate) struct LoopHandle {
    run_id: RunId,
    cancel: CancelFlag,
    task: JoinHandle<()>,
}

impl LoopHandle {
    pub(crate) fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Stops the loop. A tick already applied to the store stays applied.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
        self.task.abort();
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

/// Spawns a countdown loop on `runtime`.
///
/// The first tick fires one `period` after launch. `tick` runs once per
/// period until it returns [`Tick::Finish`] or the loop is cancelled; it is
/// given the loop's cancel flag so it can re-check it inside store updates.
pub(crate) fn spawn_countdown<F>(
    runtime: &Handle,
    period: Duration,
    run_id: RunId,
    mut tick: F,
) -> LoopHandle
where
    F: FnMut(&CancelFlag) -> Tick + Send + 'static,
{
    let cancel = CancelFlag::default();
    let flag = cancel.clone();

    let task = runtime.spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if flag.is_cancelled() {
                break;
            }
            ticker.tick().await;
            if flag.is_cancelled() {
                break;
            }
            if tick(&flag) == Tick::Finish {
                break;
            }
        }

        tracing::debug!(%run_id, "countdown loop finished");
    });

    LoopHandle {
        run_id,
        cancel,
        task,
    }
}

// ============================================================================
// LoopRegistry
// ============================================================================

/// Map from entity ID to its countdown loop.
#[derive(Debug, Default)]
pub(crate) struct LoopRegistry {
    loops: Mutex<HashMap<EntityId, LoopHandle>>,
}

impl LoopRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<EntityId, LoopHandle>> {
        // A panic while holding the guard cannot leave the map half-written.
        self.loops
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancels the loop for `id`, then launches its replacement while still
    /// holding the registry so concurrent restarts cannot interleave.
    pub(crate) fn restart<F>(&self, id: EntityId, launch: F)
    where
        F: FnOnce() -> LoopHandle,
    {
        let mut loops = self.lock();
        if let Some(old) = loops.remove(&id) {
            old.cancel();
        }
        loops.retain(|_, handle| handle.is_active());
        loops.insert(id, launch());
    }

    /// Cancels the loop for `id`, then runs `then` while still holding the
    /// registry.
    pub(crate) fn cancel_then<R, F>(&self, id: EntityId, then: F) -> R
    where
        F: FnOnce() -> R,
    {
        let mut loops = self.lock();
        if let Some(old) = loops.remove(&id) {
            old.cancel();
        }
        then()
    }

    /// Run ID of the live loop for `id`.
    pub(crate) fn run_id(&self, id: EntityId) -> Option<RunId> {
        self.lock()
            .get(&id)
            .filter(|handle| handle.is_active())
            .map(LoopHandle::run_id)
    }

    /// Number of loops still running. Finished loops are dropped from the map.
    pub(crate) fn active_count(&self) -> usize {
        let mut loops = self.lock();
        loops.retain(|_, handle| handle.is_active());
        loops.len()
    }
}

impl Drop for LoopRegistry {
    fn drop(&mut self) {
        let loops = self
            .loops
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for handle in loops.values() {
            handle.cancel();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_loop(limit: u32) -> (LoopHandle, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        let handle = spawn_countdown(
            &Handle::current(),
            Duration::from_secs(1),
            RunId::new(),
            move |_| {
                let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= limit {
                    Tick::Finish
                } else {
                    Tick::Continue
                }
            },
        );
        (handle, count)
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_immediate_tick() {
        let (handle, count) = counting_loop(100);

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_stops_loop() {
        let (handle, count) = counting_loop(3);

        tokio::time::sleep(Duration::from_millis(10_500)).await;

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!handle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticking() {
        let (handle, count) = counting_loop(100);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(5_000)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!handle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_restart_replaces_loop() {
        let registry = LoopRegistry::default();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&first);
        registry.restart(1, || {
            spawn_countdown(&Handle::current(), Duration::from_secs(1), RunId::new(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Tick::Continue
            })
        });
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let counter = Arc::clone(&second);
        registry.restart(1, || {
            spawn_countdown(&Handle::current(), Duration::from_secs(1), RunId::new(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Tick::Continue
            })
        });
        tokio::time::sleep(Duration::from_millis(3_200)).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 3);
        assert_eq!(registry.active_count(), 1);

        registry.cancel_then(1, || ());
        assert_eq!(registry.active_count(), 0);
        assert!(registry.run_id(1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_loops_are_pruned() {
        let registry = LoopRegistry::default();
        for id in 1..=5 {
            registry.restart(id, || {
                spawn_countdown(&Handle::current(), Duration::from_secs(1), RunId::new(), |_| {
                    Tick::Finish
                })
            });
        }
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        registry.restart(6, || {
            spawn_countdown(&Handle::current(), Duration::from_secs(1), RunId::new(), |_| {
                Tick::Continue
            })
        });

        assert_eq!(registry.lock().len(), 1);
        assert_eq!(registry.active_count(), 1);
        assert!(registry.run_id(6).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_registry_cancels_loops() {
        let registry = LoopRegistry::default();
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        registry.restart(1, || {
            spawn_countdown(&Handle::current(), Duration::from_secs(1), RunId::new(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Tick::Continue
            })
        });
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        drop(registry);
        tokio::time::sleep(Duration::from_millis(3_000)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
