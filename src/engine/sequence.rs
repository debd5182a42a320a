//! Sequence playback engine.
//!
//! Sequences run their steps back to back on a single countdown loop. The
//! engine keeps a snapshot of each sequence's sorted step list from the last
//! `initialize`/`start`/`reset`, so skips and the loop agree on what "next"
//! means for the whole run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};

use super::countdown::{spawn_countdown, CancelFlag, LoopRegistry, RunId, Tick};
use super::error::EngineError;
use super::store::{EntityWatch, StateMap, StateStore, Write};
use super::{prepare, publish};
use crate::types::{
    EngineConfig, EntityId, SequenceDefinition, SequencePlaybackState, StepDefinition,
};

/// Sorted steps shared by the engine and a running loop.
pub type StepList = Arc<[StepDefinition]>;

// ============================================================================
// SequenceEvent
// ============================================================================

/// Sequence events for notifications and external integrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEvent {
    /// A run started or resumed from a stop
    Started {
        /// Sequence ID
        sequence_id: EntityId,
        /// The new run
        run_id: RunId,
        /// Step the run starts on
        step_index: usize,
    },
    /// Ticking suspended
    Paused {
        /// Sequence ID
        sequence_id: EntityId,
    },
    /// Ticking resumed
    Resumed {
        /// Sequence ID
        sequence_id: EntityId,
    },
    /// Run ended early; position kept
    Stopped {
        /// Sequence ID
        sequence_id: EntityId,
    },
    /// Back to the first step, not running
    Reset {
        /// Sequence ID
        sequence_id: EntityId,
    },
    /// State removed
    Cleared {
        /// Sequence ID
        sequence_id: EntityId,
    },
    /// User jumped to another step
    StepSkipped {
        /// Sequence ID
        sequence_id: EntityId,
        /// Index before the skip
        from: usize,
        /// Index after the skip
        to: usize,
    },
    /// A step ran out (published once per step per run)
    StepCompleted {
        /// Sequence ID
        sequence_id: EntityId,
        /// The run the step belongs to
        run_id: RunId,
        /// Index of the finished step
        step_index: usize,
        /// The finished step
        step: StepDefinition,
    },
    /// The last step ran out (published once per run)
    Completed {
        /// Sequence ID
        sequence_id: EntityId,
        /// The run that completed
        run_id: RunId,
    },
}

impl SequenceEvent {
    /// The sequence this event is about.
    pub fn sequence_id(&self) -> EntityId {
        match self {
            SequenceEvent::Started { sequence_id, .. }
            | SequenceEvent::Paused { sequence_id }
            | SequenceEvent::Resumed { sequence_id }
            | SequenceEvent::Stopped { sequence_id }
            | SequenceEvent::Reset { sequence_id }
            | SequenceEvent::Cleared { sequence_id }
            | SequenceEvent::StepSkipped { sequence_id, .. }
            | SequenceEvent::StepCompleted { sequence_id, .. }
            | SequenceEvent::Completed { sequence_id, .. } => *sequence_id,
        }
    }
}

/// Result of one countdown tick.
#[derive(Debug, Default)]
enum SequenceTick {
    /// State was removed
    #[default]
    Vanished,
    /// Loop was cancelled before it could write
    Cancelled,
    /// Paused; nothing to do this tick
    Waiting,
    /// Not running or already complete
    Ended,
    /// Decremented within the current step
    Ticked,
    /// Current step finished and the next one began
    Advanced {
        finished: Option<(usize, StepDefinition)>,
    },
    /// Last step finished
    Completed {
        finished: Option<(usize, StepDefinition)>,
    },
}

// ============================================================================
// SequenceEngine
// ============================================================================

/// Owns the playback state of every sequence and runs their countdowns.
pub struct SequenceEngine {
    /// Playback state per sequence
    store: Arc<StateStore<SequencePlaybackState>>,
    /// Sorted steps per sequence, replaced wholesale
    steps: Mutex<HashMap<EntityId, StepList>>,
    /// Countdown loop per running sequence
    loops: LoopRegistry,
    /// Event sender channel
    events: broadcast::Sender<SequenceEvent>,
    /// Runtime the countdown loops run on
    runtime: Handle,
    config: EngineConfig,
}

impl SequenceEngine {
    /// Creates a sequence engine that spawns countdowns on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or there is no
    /// current tokio runtime.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::build(config, None)
    }

    /// Creates a sequence engine that spawns countdowns on `runtime`.
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
            steps: Mutex::new(HashMap::new()),
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

    fn step_cache(&self) -> MutexGuard<'_, HashMap<EntityId, StepList>> {
        self.steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Subscribes to sequence events.
    pub fn subscribe(&self) -> broadcast::Receiver<SequenceEvent> {
        self.events.subscribe()
    }

    /// Returns the current state of a sequence.
    pub fn state(&self, sequence_id: EntityId) -> Option<SequencePlaybackState> {
        self.store.get(sequence_id)
    }

    /// Watches a single sequence's state.
    pub fn watch(&self, sequence_id: EntityId) -> EntityWatch<SequencePlaybackState> {
        self.store.watch(sequence_id)
    }

    /// Subscribes to the state of every sequence.
    pub fn subscribe_all(&self) -> watch::Receiver<StateMap<SequencePlaybackState>> {
        self.store.subscribe()
    }

    /// Returns the state of every sequence.
    pub fn snapshot(&self) -> StateMap<SequencePlaybackState> {
        self.store.snapshot()
    }

    /// The sorted steps the sequence is currently playing.
    pub fn steps(&self, sequence_id: EntityId) -> Option<StepList> {
        self.step_cache().get(&sequence_id).cloned()
    }

    /// Returns true if any sequence is counting down.
    pub fn has_running(&self) -> bool {
        self.store
            .snapshot()
            .values()
            .any(|state| state.is_running && !state.is_paused)
    }

    /// IDs of every sequence with an active session, paused or not.
    pub fn running_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .store
            .snapshot()
            .values()
            .filter(|state| state.is_running)
            .map(|state| state.sequence_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Run ID of the sequence's live countdown.
    pub fn run_id(&self, sequence_id: EntityId) -> Option<RunId> {
        self.loops.run_id(sequence_id)
    }

    /// Number of countdown loops currently alive.
    pub fn active_loops(&self) -> usize {
        self.loops.active_count()
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Creates an idle state at the first step unless the sequence already has one.
    pub fn initialize(&self, sequence: &SequenceDefinition) {
        let steps: StepList = sequence.sorted_steps().into();
        let Some(first) = steps.first() else {
            tracing::debug!(sequence_id = sequence.id, "not initializing a sequence without steps");
            return;
        };

        let sequence_id = sequence.id;
        let mut cache = self.step_cache();
        let created: bool = self.store.update(sequence_id, |current| match current {
            Some(_) => (Write::Keep, false),
            None => (
                Write::Put(SequencePlaybackState::idle(sequence_id, first.duration_seconds)),
                true,
            ),
        });
        if created {
            cache.insert(sequence_id, Arc::clone(&steps));
            tracing::debug!(sequence_id, steps = steps.len(), "sequence initialized");
        }
    }

    /// Starts or restarts playback.
    ///
    /// Any existing loop for the sequence is cancelled first. A sequence that
    /// is part-way through resumes at its current step and remaining time; a
    /// new or completed sequence starts at the first step. Sequences without
    /// steps are not started.
    pub fn start(&self, sequence: &SequenceDefinition) {
        let steps: StepList = sequence.sorted_steps().into();
        if steps.is_empty() {
            tracing::warn!(sequence_id = sequence.id, "refusing to start a sequence without steps");
            return;
        }

        let sequence_id = sequence.id;
        let run_id = RunId::new();
        let mut step_index = 0;

        self.loops.restart(sequence_id, || {
            let mut cache = self.step_cache();
            cache.insert(sequence_id, Arc::clone(&steps));

            step_index = self.store.update(sequence_id, |current| {
                let (index, remaining) = match current {
                    Some(state)
                        if !state.is_complete
                            && state.current_step_index < steps.len()
                            && state.current_step_remaining_seconds > 0 =>
                    {
                        let step_seconds = steps[state.current_step_index].duration_seconds;
                        (
                            state.current_step_index,
                            state.current_step_remaining_seconds.min(step_seconds),
                        )
                    }
                    _ => (0, steps[0].duration_seconds),
                };
                let next = SequencePlaybackState {
                    sequence_id,
                    current_step_index: index,
                    current_step_remaining_seconds: remaining,
                    is_running: true,
                    is_paused: false,
                    is_complete: false,
                };
                (Write::Put(next), index)
            });
            drop(cache);

            let store = Arc::clone(&self.store);
            let events = self.events.clone();
            let steps = Arc::clone(&steps);
            spawn_countdown(&self.runtime, self.config.tick_interval(), run_id, move |cancel| {
                tick(&store, &events, &steps, sequence_id, run_id, cancel)
            })
        });

        tracing::info!(sequence_id, %run_id, step_index, "sequence started");
        publish(
            &self.events,
            SequenceEvent::Started {
                sequence_id,
                run_id,
                step_index,
            },
        );
    }

    /// Suspends ticking. The loop keeps running but stops decrementing.
    pub fn pause(&self, sequence_id: EntityId) {
        if self.set_paused(sequence_id, true) {
            tracing::debug!(sequence_id, "sequence paused");
            publish(&self.events, SequenceEvent::Paused { sequence_id });
        }
    }

    /// Resumes ticking after [`SequenceEngine::pause`].
    pub fn resume(&self, sequence_id: EntityId) {
        if self.set_paused(sequence_id, false) {
            tracing::debug!(sequence_id, "sequence resumed");
            publish(&self.events, SequenceEvent::Resumed { sequence_id });
        }
    }

    fn set_paused(&self, sequence_id: EntityId, paused: bool) -> bool {
        self.store.update(sequence_id, |current| match current {
            Some(state) if state.is_paused != paused => (
                Write::Put(SequencePlaybackState {
                    is_paused: paused,
                    ..state.clone()
                }),
                true,
            ),
            _ => (Write::Keep, false),
        })
    }

    /// Jumps to the following step with its full duration.
    ///
    /// No-op at the last step or once the sequence is complete.
    pub fn skip_next(&self, sequence_id: EntityId) {
        self.skip(sequence_id, |index, len| (index + 1 < len).then_some(index + 1));
    }

    /// Jumps back to the preceding step with its full duration.
    ///
    /// No-op at the first step or once the sequence is complete.
    pub fn skip_previous(&self, sequence_id: EntityId) {
        self.skip(sequence_id, |index, _| index.checked_sub(1));
    }

    fn skip<F>(&self, sequence_id: EntityId, target: F)
    where
        F: FnOnce(usize, usize) -> Option<usize>,
    {
        // The cache stays locked so a concurrent start or reset cannot swap
        // the step list between reading it and writing the new index.
        let cache = self.step_cache();
        let Some(steps) = cache.get(&sequence_id) else {
            return;
        };

        let skipped: Option<(usize, usize)> = self.store.update(sequence_id, |current| {
            let Some(state) = current.filter(|state| !state.is_complete) else {
                return (Write::Keep, None);
            };
            let from = state.current_step_index;
            let Some((to, step)) = target(from, steps.len())
                .and_then(|to| steps.get(to).map(|step| (to, step)))
            else {
                return (Write::Keep, None);
            };
            let next = SequencePlaybackState {
                current_step_index: to,
                current_step_remaining_seconds: step.duration_seconds,
                ..state.clone()
            };
            (Write::Put(next), Some((from, to)))
        });
        drop(cache);

        if let Some((from, to)) = skipped {
            tracing::debug!(sequence_id, from, to, "step skipped");
            publish(
                &self.events,
                SequenceEvent::StepSkipped {
                    sequence_id,
                    from,
                    to,
                },
            );
        }
    }

    /// Cancels the countdown and returns to the first step, idle.
    ///
    /// The cached step list is refreshed from `sequence`. Sequences without
    /// steps are left untouched.
    pub fn reset(&self, sequence: &SequenceDefinition) {
        let steps: StepList = sequence.sorted_steps().into();
        let Some(first_seconds) = steps.first().map(|step| step.duration_seconds) else {
            tracing::warn!(sequence_id = sequence.id, "refusing to reset a sequence without steps");
            return;
        };

        let sequence_id = sequence.id;
        let changed: bool = self.loops.cancel_then(sequence_id, || {
            let mut cache = self.step_cache();
            cache.insert(sequence_id, Arc::clone(&steps));
            let idle = SequencePlaybackState::idle(sequence_id, first_seconds);
            self.store.update(sequence_id, |current| match current {
                Some(state) if *state == idle => (Write::Keep, false),
                _ => (Write::Put(idle), true),
            })
        });

        if changed {
            tracing::debug!(sequence_id, "sequence reset");
            publish(&self.events, SequenceEvent::Reset { sequence_id });
        }
    }

    /// Cancels the countdown, keeping the current step and remaining time.
    pub fn stop(&self, sequence_id: EntityId) {
        let stopped: bool = self.loops.cancel_then(sequence_id, || {
            self.store.update(sequence_id, |current| match current {
                Some(state) => (
                    Write::Put(SequencePlaybackState {
                        is_running: false,
                        is_paused: false,
                        ..state.clone()
                    }),
                    true,
                ),
                None => (Write::Keep, false),
            })
        });

        if stopped {
            tracing::debug!(sequence_id, "sequence stopped");
            publish(&self.events, SequenceEvent::Stopped { sequence_id });
        }
    }

    /// Cancels the countdown and forgets the sequence's state and steps.
    pub fn clear(&self, sequence_id: EntityId) {
        let removed: bool = self.loops.cancel_then(sequence_id, || {
            let mut cache = self.step_cache();
            cache.remove(&sequence_id);
            self.store.update(sequence_id, |current| match current {
                Some(_) => (Write::Remove, true),
                None => (Write::Keep, false),
            })
        });

        if removed {
            tracing::debug!(sequence_id, "sequence cleared");
            publish(&self.events, SequenceEvent::Cleared { sequence_id });
        }
    }
}

/// One countdown step for `sequence_id`.
fn tick(
    store: &StateStore<SequencePlaybackState>,
    events: &broadcast::Sender<SequenceEvent>,
    steps: &[StepDefinition],
    sequence_id: EntityId,
    run_id: RunId,
    cancel: &CancelFlag,
) -> Tick {
    let outcome = store.update(sequence_id, |current| {
        if cancel.is_cancelled() {
            return (Write::Keep, SequenceTick::Cancelled);
        }
        let Some(state) = current else {
            return (Write::Keep, SequenceTick::Vanished);
        };
        if !state.is_ticking() {
            let outcome = if !state.is_running || state.is_complete {
                SequenceTick::Ended
            } else {
                SequenceTick::Waiting
            };
            return (Write::Keep, outcome);
        }

        if state.current_step_remaining_seconds > 1 {
            let next = SequencePlaybackState {
                current_step_remaining_seconds: state.current_step_remaining_seconds - 1,
                ..state.clone()
            };
            return (Write::Put(next), SequenceTick::Ticked);
        }

        let index = state.current_step_index;
        let finished = steps.get(index).map(|step| (index, step.clone()));
        match steps.get(index + 1) {
            Some(next_step) => {
                let next = SequencePlaybackState {
                    current_step_index: index + 1,
                    current_step_remaining_seconds: next_step.duration_seconds,
                    ..state.clone()
                };
                (Write::Put(next), SequenceTick::Advanced { finished })
            }
            None => {
                let next = SequencePlaybackState {
                    current_step_remaining_seconds: 0,
                    is_running: false,
                    is_paused: false,
                    is_complete: true,
                    ..state.clone()
                };
                (Write::Put(next), SequenceTick::Completed { finished })
            }
        }
    });

    let step_completed = |finished: Option<(usize, StepDefinition)>| {
        if let Some((step_index, step)) = finished {
            tracing::info!(sequence_id, step_index, label = %step.label, "step completed");
            publish(
                events,
                SequenceEvent::StepCompleted {
                    sequence_id,
                    run_id,
                    step_index,
                    step,
                },
            );
        }
    };

    match outcome {
        SequenceTick::Ticked => {
            tracing::trace!(sequence_id, "tick");
            Tick::Continue
        }
        SequenceTick::Waiting => Tick::Continue,
        SequenceTick::Advanced { finished } => {
            step_completed(finished);
            Tick::Continue
        }
        SequenceTick::Completed { finished } => {
            step_completed(finished);
            tracing::info!(sequence_id, %run_id, "sequence completed");
            publish(events, SequenceEvent::Completed { sequence_id, run_id });
            Tick::Finish
        }
        SequenceTick::Vanished | SequenceTick::Cancelled | SequenceTick::Ended => Tick::Finish,
    }
}

// ============================================================================
// Tests
// ============================================================================
