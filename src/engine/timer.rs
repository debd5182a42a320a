//! Timer playback engine.
//!
//! This module provides the controller for standalone countdown timers:
//! - State transitions (Idle → Running ⇄ Paused → Complete)
//! - One countdown loop per running timer
//! - Event publishing for notifications and external integrations

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};

use super::countdown::{spawn_countdown, CancelFlag, LoopRegistry, RunId, Tick};
use super::error::EngineError;
use super::store::{EntityWatch, StateMap, StateStore, Write};
use super::{prepare, publish};
use crate::types::{EngineConfig, EntityId, TimerDefinition, TimerPlaybackState};

// ============================================================================
// TimerEvent
// ============================================================================

/// Timer events for notifications and external integrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A run started or resumed from a stop
    Started {
        /// Timer ID
        timer_id: EntityId,
        /// The new run
        run_id: RunId,
        /// Seconds left when the run started
        remaining_seconds: u64,
    },
    /// Ticking suspended
    Paused {
        /// Timer ID
        timer_id: EntityId,
    },
    /// Ticking resumed
    Resumed {
        /// Timer ID
        timer_id: EntityId,
    },
    /// Run ended early; remaining time kept
    Stopped {
        /// Timer ID
        timer_id: EntityId,
        /// Seconds left when stopped
        remaining_seconds: u64,
    },
    /// Back to full duration, not running
    Reset {
        /// Timer ID
        timer_id: EntityId,
    },
    /// State removed
    Cleared {
        /// Timer ID
        timer_id: EntityId,
    },
    /// Countdown reached zero (published once per run)
    Completed {
        /// Timer ID
        timer_id: EntityId,
        /// The run that completed
        run_id: RunId,
    },
}

impl TimerEvent {
    /// The timer this event is about.
    pub fn timer_id(&self) -> EntityId {
        match self {
            TimerEvent::Started { timer_id, .. }
            | TimerEvent::Paused { timer_id }
            | TimerEvent::Resumed { timer_id }
            | TimerEvent::Stopped { timer_id, .. }
            | TimerEvent::Reset { timer_id }
            | TimerEvent::Cleared { timer_id }
            | TimerEvent::Completed { timer_id, .. } => *timer_id,
        }
    }
}

/// Result of one countdown tick.
#[derive(Debug, Default, PartialEq, Eq)]
enum TimerTick {
    /// State was removed
    #[default]
    Vanished,
    /// Loop was cancelled before it could write
    Cancelled,
    /// Paused; nothing to do this tick
    Waiting,
    /// Not running or already complete
    Ended,
    /// Decremented, time still left
    Ticked(u64),
    /// Decremented to zero
    Completed,
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Owns the playback state of every timer and runs their countdowns.
pub struct TimerEngine {
    /// Playback state per timer
    store: Arc<StateStore<TimerPlaybackState>>,
    /// Countdown loop per running timer
    loops: LoopRegistry,
    /// Event sender channel
    events: broadcast::Sender<TimerEvent>,
    /// Runtime the countdown loops run on
    runtime: Handle,
    config: EngineConfig,
}

impl TimerEngine {
    /// Creates a timer engine that spawns countdowns on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or there is no
    /// current tokio runtime.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::build(config, None)
    }

    /// Creates a timer engine that spawns countdowns on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_runtime(config: EngineConfig, runtime: Handle) -> Result<Self, EngineError> {
        Self::build(config, Some(runtime))
    }

    fn build(config: EngineConfig, runtime: Option<Handle>) -> Result<Self, EngineError> {
        let runtime = prepare(&config, runtime)?;
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            store: Arc::new(StateStore::new()),
            loops: LoopRegistry::default(),
            events,
            runtime,
            config,
        })
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Subscribes to timer events.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    /// Returns the current state of a timer.
    pub fn state(&self, timer_id: EntityId) -> Option<TimerPlaybackState> {
        self.store.get(timer_id)
    }

    /// Watches a single timer's state.
    pub fn watch(&self, timer_id: EntityId) -> EntityWatch<TimerPlaybackState> {
        self.store.watch(timer_id)
    }

    /// Subscribes to the state of every timer.
    pub fn subscribe_all(&self) -> watch::Receiver<StateMap<TimerPlaybackState>> {
        self.store.subscribe()
    }

    /// Returns the state of every timer.
    pub fn snapshot(&self) -> StateMap<TimerPlaybackState> {
        self.store.snapshot()
    }

    /// Returns true if any timer is counting down.
    pub fn has_running(&self) -> bool {
        self.store
            .snapshot()
            .values()
            .any(|state| state.is_running && !state.is_paused)
    }

    /// IDs of every timer with an active session, paused or not.
    pub fn running_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .store
            .snapshot()
            .values()
            .filter(|state| state.is_running)
            .map(|state| state.timer_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Run ID of the timer's live countdown.
    pub fn run_id(&self, timer_id: EntityId) -> Option<RunId> {
        self.loops.run_id(timer_id)
    }

    /// Number of countdown loops currently alive.
    pub fn active_loops(&self) -> usize {
        self.loops.active_count()
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Creates an idle state at full duration unless the timer already has one.
    pub fn initialize(&self, timer: &TimerDefinition) {
        if timer.duration_seconds == 0 {
            tracing::warn!(timer_id = timer.id, "refusing to initialize a zero-length timer");
            return;
        }

        let created: bool = self.store.update(timer.id, |current| match current {
            Some(_) => (Write::Keep, false),
            None => (
                Write::Put(TimerPlaybackState::idle(timer.id, timer.duration_seconds)),
                true,
            ),
        });
        if created {
            tracing::debug!(timer_id = timer.id, "timer initialized");
        }
    }

    /// Starts or restarts the countdown.
    ///
    /// Any existing loop for the timer is cancelled first. A timer with time
    /// left resumes from it; a new or completed timer starts from full
    /// duration.
    pub fn start(&self, timer: &TimerDefinition) {
        if timer.duration_seconds == 0 {
            tracing::warn!(timer_id = timer.id, "refusing to start a zero-length timer");
            return;
        }

        let timer_id = timer.id;
        let total = timer.duration_seconds;
        let run_id = RunId::new();
        let mut remaining = total;

        self.loops.restart(timer_id, || {
            remaining = self.store.update(timer_id, |current| {
                let remaining = match current {
                    Some(state) if !state.is_complete() => state.remaining_seconds.min(total),
                    _ => total,
                };
                let next = TimerPlaybackState {
                    timer_id,
                    total_seconds: total,
                    remaining_seconds: remaining,
                    is_running: true,
                    is_paused: false,
                };
                (Write::Put(next), remaining)
            });

            let store = Arc::clone(&self.store);
            let events = self.events.clone();
            spawn_countdown(&self.runtime, self.config.tick_interval(), run_id, move |cancel| {
                tick(&store, &events, timer_id, run_id, cancel)
            })
        });

        tracing::info!(timer_id, %run_id, remaining, "timer started");
        publish(
            &self.events,
            TimerEvent::Started {
                timer_id,
                run_id,
                remaining_seconds: remaining,
            },
        );
    }

    /// Suspends ticking. The loop keeps running but stops decrementing.
    pub fn pause(&self, timer_id: EntityId) {
        let changed = self.set_paused(timer_id, true);
        if changed {
            tracing::debug!(timer_id, "timer paused");
            publish(&self.events, TimerEvent::Paused { timer_id });
        }
    }

    /// Resumes ticking after [`TimerEngine::pause`].
    pub fn resume(&self, timer_id: EntityId) {
        let changed = self.set_paused(timer_id, false);
        if changed {
            tracing::debug!(timer_id, "timer resumed");
            publish(&self.events, TimerEvent::Resumed { timer_id });
        }
    }

    fn set_paused(&self, timer_id: EntityId, paused: bool) -> bool {
        self.store.update(timer_id, |current| match current {
            Some(state) if state.is_paused != paused => (
                Write::Put(TimerPlaybackState {
                    is_paused: paused,
                    ..state.clone()
                }),
                true,
            ),
            _ => (Write::Keep, false),
        })
    }

    /// Cancels the countdown and returns the timer to full duration, idle.
    pub fn reset(&self, timer: &TimerDefinition) {
        if timer.duration_seconds == 0 {
            tracing::warn!(timer_id = timer.id, "refusing to reset to a zero-length timer");
            return;
        }

        let timer_id = timer.id;
        let changed: bool = self.loops.cancel_then(timer_id, || {
            let idle = TimerPlaybackState::idle(timer_id, timer.duration_seconds);
            self.store.update(timer_id, |current| match current {
                Some(state) if *state == idle => (Write::Keep, false),
                _ => (Write::Put(idle), true),
            })
        });

        if changed {
            tracing::debug!(timer_id, "timer reset");
            publish(&self.events, TimerEvent::Reset { timer_id });
        }
    }

    /// Cancels the countdown, keeping the remaining time for a later `start`.
    pub fn stop(&self, timer_id: EntityId) {
        let stopped: Option<u64> = self.loops.cancel_then(timer_id, || {
            self.store.update(timer_id, |current| match current {
                Some(state) => (
                    Write::Put(TimerPlaybackState {
                        is_running: false,
                        is_paused: false,
                        ..state.clone()
                    }),
                    Some(state.remaining_seconds),
                ),
                None => (Write::Keep, None),
            })
        });

        if let Some(remaining_seconds) = stopped {
            tracing::debug!(timer_id, remaining_seconds, "timer stopped");
            publish(
                &self.events,
                TimerEvent::Stopped {
                    timer_id,
                    remaining_seconds,
                },
            );
        }
    }

    /// Cancels the countdown and forgets the timer's state.
    pub fn clear(&self, timer_id: EntityId) {
        let removed: bool = self.loops.cancel_then(timer_id, || {
            self.store.update(timer_id, |current| match current {
                Some(_) => (Write::Remove, true),
                None => (Write::Keep, false),
            })
        });

        if removed {
            tracing::debug!(timer_id, "timer cleared");
            publish(&self.events, TimerEvent::Cleared { timer_id });
        }
    }
}

/// One countdown step for `timer_id`.
fn tick(
    store: &StateStore<TimerPlaybackState>,
    events: &broadcast::Sender<TimerEvent>,
    timer_id: EntityId,
    run_id: RunId,
    cancel: &CancelFlag,
) -> Tick {
    let outcome = store.update(timer_id, |current| {
        if cancel.is_cancelled() {
            return (Write::Keep, TimerTick::Cancelled);
        }
        let Some(state) = current else {
            return (Write::Keep, TimerTick::Vanished);
        };
        if state.is_ticking() {
            let remaining = state.remaining_seconds.saturating_sub(1);
            let next = TimerPlaybackState {
                remaining_seconds: remaining,
                is_running: remaining > 0,
                is_paused: false,
                ..state.clone()
            };
            let outcome = if remaining == 0 {
                TimerTick::Completed
            } else {
                TimerTick::Ticked(remaining)
            };
            (Write::Put(next), outcome)
        } else if !state.is_running || state.is_complete() {
            (Write::Keep, TimerTick::Ended)
        } else {
            (Write::Keep, TimerTick::Waiting)
        }
    });

    match outcome {
        TimerTick::Ticked(remaining) => {
            tracing::trace!(timer_id, remaining, "tick");
            Tick::Continue
        }
        TimerTick::Waiting => Tick::Continue,
        TimerTick::Completed => {
            tracing::info!(timer_id, %run_id, "timer completed");
            publish(events, TimerEvent::Completed { timer_id, run_id });
            Tick::Finish
        }
        TimerTick::Vanished | TimerTick::Cancelled | TimerTick::Ended => Tick::Finish,
    }
}

// ============================================================================
// Tests
// ============================================================================
