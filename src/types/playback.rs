//! Playback state snapshots.
//!
//! These are plain values: the engines replace them wholesale on every
//! transition, and observers only ever see complete snapshots.

use serde::{Deserialize, Serialize};

use super::{EntityId, StepDefinition};

// ============================================================================
// TimerPlaybackState
// ============================================================================

/// Progress of one timer run.
///
/// A paused timer keeps `is_running = true`: the session is active, only
/// ticking is suspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerPlaybackState {
    /// Timer this state belongs to
    pub timer_id: EntityId,
    /// Full duration of the run
    pub total_seconds: u64,
    /// Seconds left; never exceeds `total_seconds`
    pub remaining_seconds: u64,
    /// Session is active
    pub is_running: bool,
    /// Ticking is suspended
    pub is_paused: bool,
}

impl TimerPlaybackState {
    /// Creates a non-running state at full duration.
    pub fn idle(timer_id: EntityId, total_seconds: u64) -> Self {
        Self {
            timer_id,
            total_seconds,
            remaining_seconds: total_seconds,
            is_running: false,
            is_paused: false,
        }
    }

    /// Returns true once the countdown has reached zero.
    pub fn is_complete(&self) -> bool {
        self.remaining_seconds == 0
    }

    /// Returns true if the countdown is currently decrementing.
    pub fn is_ticking(&self) -> bool {
        self.is_running && !self.is_paused && !self.is_complete()
    }

    /// Fraction of the run still remaining, from 1.0 down to 0.0.
    pub fn progress(&self) -> f32 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        self.remaining_seconds as f32 / self.total_seconds as f32
    }
}

// ============================================================================
// SequencePlaybackState
// ============================================================================

/// Progress of one sequence run.
///
/// Step helpers take the step list sorted by order, as returned by
/// `SequenceEngine::steps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePlaybackState {
    /// Sequence this state belongs to
    pub sequence_id: EntityId,
    /// Index into the sorted step list
    pub current_step_index: usize,
    /// Seconds left in the current step
    pub current_step_remaining_seconds: u64,
    /// Session is active
    pub is_running: bool,
    /// Ticking is suspended
    pub is_paused: bool,
    /// Last step has finished
    pub is_complete: bool,
}

impl SequencePlaybackState {
    /// Creates a non-running state positioned at the first step.
    pub fn idle(sequence_id: EntityId, first_step_seconds: u64) -> Self {
        Self {
            sequence_id,
            current_step_index: 0,
            current_step_remaining_seconds: first_step_seconds,
            is_running: false,
            is_paused: false,
            is_complete: false,
        }
    }

    /// Returns true if the countdown is currently decrementing.
    pub fn is_ticking(&self) -> bool {
        self.is_running && !self.is_paused && !self.is_complete
    }

    /// The step being played.
    pub fn current_step<'a>(&self, steps: &'a [StepDefinition]) -> Option<&'a StepDefinition> {
        steps.get(self.current_step_index)
    }

    /// The step that plays after the current one.
    pub fn next_step<'a>(&self, steps: &'a [StepDefinition]) -> Option<&'a StepDefinition> {
        steps.get(self.current_step_index + 1)
    }

    /// Fraction of the current step still remaining.
    pub fn step_progress(&self, steps: &[StepDefinition]) -> f32 {
        match self.current_step(steps) {
            Some(step) if step.duration_seconds > 0 => {
                self.current_step_remaining_seconds as f32 / step.duration_seconds as f32
            }
            _ => 1.0,
        }
    }

    /// Fraction of the whole sequence already played.
    pub fn overall_progress(&self, steps: &[StepDefinition]) -> f32 {
        let total: u128 = steps.iter().map(|step| u128::from(step.duration_seconds)).sum();
        if total == 0 {
            return 0.0;
        }
        if self.is_complete {
            return 1.0;
        }

        let finished: u128 = steps
            .iter()
            .take(self.current_step_index)
            .map(|step| u128::from(step.duration_seconds))
            .sum();
        let current_elapsed = self
            .current_step(steps)
            .map(|step| {
                step.duration_seconds
                    .saturating_sub(self.current_step_remaining_seconds)
            })
            .map_or(0, u128::from);

        ((finished + current_elapsed) as f64 / total as f64) as f32
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod timer_state_tests {
        use super::*;

        #[test]
        fn test_idle_is_full_duration() {
            let state = TimerPlaybackState::idle(3, 90);
            assert_eq!(state.remaining_seconds, 90);
            assert!(!state.is_running);
            assert!(!state.is_paused);
            assert!(!state.is_complete());
            assert_eq!(state.progress(), 1.0);
        }

        #[test]
        fn test_complete_at_zero() {
            let state = TimerPlaybackState {
                remaining_seconds: 0,
                ..TimerPlaybackState::idle(3, 90)
            };
            assert!(state.is_complete());
            assert!(!state.is_ticking());
            assert_eq!(state.progress(), 0.0);
        }

        #[test]
        fn test_is_ticking() {
            let mut state = TimerPlaybackState::idle(3, 90);
            assert!(!state.is_ticking());
            state.is_running = true;
            assert!(state.is_ticking());
            state.is_paused = true;
            assert!(!state.is_ticking());
        }

        #[test]
        fn test_progress_zero_total() {
            let state = TimerPlaybackState::idle(3, 0);
            assert_eq!(state.progress(), 0.0);
        }
    }

    mod sequence_state_tests {
        use super::*;

        fn steps() -> Vec<StepDefinition> {
            vec![
                StepDefinition::new(1, "Warm up", 10, 0),
                StepDefinition::new(2, "Work", 30, 1),
                StepDefinition::new(3, "Rest", 20, 2),
            ]
        }

        #[test]
        fn test_current_and_next_step() {
            let steps = steps();
            let mut state = SequencePlaybackState::idle(1, 10);
            assert_eq!(state.current_step(&steps).unwrap().label, "Warm up");
            assert_eq!(state.next_step(&steps).unwrap().label, "Work");

            state.current_step_index = 2;
            assert_eq!(state.current_step(&steps).unwrap().label, "Rest");
            assert!(state.next_step(&steps).is_none());
        }

        #[test]
        fn test_step_progress() {
            let steps = steps();
            let state = SequencePlaybackState {
                current_step_index: 1,
                current_step_remaining_seconds: 15,
                ..SequencePlaybackState::idle(1, 10)
            };
            assert_eq!(state.step_progress(&steps), 0.5);
            assert_eq!(state.step_progress(&[]), 1.0);
        }

        #[test]
        fn test_overall_progress() {
            let steps = steps();
            let start = SequencePlaybackState::idle(1, 10);
            assert_eq!(start.overall_progress(&steps), 0.0);

            let middle = SequencePlaybackState {
                current_step_index: 1,
                current_step_remaining_seconds: 15,
                ..start.clone()
            };
            // 10 finished + 15 elapsed out of 60
            assert!((middle.overall_progress(&steps) - 25.0 / 60.0).abs() < f32::EPSILON);

            let done = SequencePlaybackState {
                current_step_index: 2,
                current_step_remaining_seconds: 0,
                is_complete: true,
                ..start
            };
            assert_eq!(done.overall_progress(&steps), 1.0);
        }

        #[test]
        fn test_overall_progress_with_huge_steps() {
            let steps = vec![
                StepDefinition::new(1, "Long", u64::MAX, 0),
                StepDefinition::new(2, "Also long", u64::MAX, 1),
            ];
            let state = SequencePlaybackState {
                current_step_index: 1,
                current_step_remaining_seconds: u64::MAX,
                ..SequencePlaybackState::idle(1, u64::MAX)
            };

            let progress = state.overall_progress(&steps);
            assert!((progress - 0.5).abs() < f32::EPSILON);
        }
    }
}
