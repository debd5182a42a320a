//! Display utilities for the Sequence Timer CLI.
//!
//! This module provides formatted output for:
//! - Progress lines while a timer or sequence runs
//! - Start, stop and completion messages
//! - The definitions listing
//! - Error messages

use crate::notification::{format_clock, ongoing_text};
use crate::types::{
    SequenceDefinition, SequencePlaybackState, StepDefinition, TimerDefinition,
    TimerPlaybackState,
};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows that a timer started.
    pub fn show_timer_started(timer: &TimerDefinition) {
        println!("> Started {} ({})", timer.label, format_clock(timer.duration_seconds));
    }

    /// Shows that a sequence started.
    pub fn show_sequence_started(sequence: &SequenceDefinition) {
        println!(
            "> Started {} ({} steps, {})",
            sequence.name,
            sequence.step_count(),
            format_clock(sequence.total_duration_seconds())
        );
    }

    /// Shows one progress line for a running timer.
    pub fn show_timer_progress(timer: &TimerDefinition, state: &TimerPlaybackState) {
        println!("{}", Self::timer_line(timer, state));
    }

    /// Shows one progress line for a running sequence.
    pub fn show_sequence_progress(
        sequence: &SequenceDefinition,
        steps: &[StepDefinition],
        state: &SequencePlaybackState,
    ) {
        println!("{}", Self::sequence_line(sequence, steps, state));
    }

    /// Shows that a run finished.
    pub fn show_complete(label: &str) {
        println!("* {} complete", label);
    }

    /// Shows that a run was stopped before finishing.
    pub fn show_stopped(label: &str) {
        println!("[] {} stopped", label);
    }

    /// Shows every saved timer and sequence.
    pub fn show_list(timers: &[TimerDefinition], sequences: &[SequenceDefinition]) {
        for line in Self::list_lines(timers, sequences) {
            println!("{}", line);
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Progress line for a timer, e.g. `Tea - 2:05 remaining`.
    pub fn timer_line(timer: &TimerDefinition, state: &TimerPlaybackState) -> String {
        let line = ongoing_text(&timer.label, state.remaining_seconds);
        if state.is_paused {
            format!("{line} (paused)")
        } else {
            line
        }
    }

    /// Progress line for a sequence, e.g. `Workout [2/3] Rest - 0:10 remaining`.
    pub fn sequence_line(
        sequence: &SequenceDefinition,
        steps: &[StepDefinition],
        state: &SequencePlaybackState,
    ) -> String {
        let step_label = state
            .current_step(steps)
            .map_or("Step", |step| step.label.as_str());
        let line = format!(
            "{} [{}/{}] {}",
            sequence.name,
            (state.current_step_index + 1).min(steps.len()),
            steps.len(),
            ongoing_text(step_label, state.current_step_remaining_seconds)
        );
        if state.is_paused {
            format!("{line} (paused)")
        } else {
            line
        }
    }

    /// Lines of the definitions listing.
    pub fn list_lines(timers: &[TimerDefinition], sequences: &[SequenceDefinition]) -> Vec<String> {
        if timers.is_empty() && sequences.is_empty() {
            return vec!["No timers or sequences defined".to_string()];
        }

        let mut lines = Vec::new();
        if !timers.is_empty() {
            lines.push("Timers".to_string());
            lines.push("─────────────────────────────".to_string());
            for timer in timers {
                lines.push(format!(
                    "{:>4}  {:<24} {:>6}  {}",
                    timer.id,
                    timer.label,
                    format_clock(timer.duration_seconds),
                    timer.notification_kind.as_str()
                ));
            }
        }
        if !sequences.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push("Sequences".to_string());
            lines.push("─────────────────────────────".to_string());
            for sequence in sequences {
                lines.push(format!(
                    "{:>4}  {:<24} {:>6}  {} steps",
                    sequence.id,
                    sequence.name,
                    format_clock(sequence.total_duration_seconds()),
                    sequence.step_count()
                ));
            }
        }
        lines
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn workout() -> SequenceDefinition {
        SequenceDefinition::new(
            2,
            "Workout",
            vec![
                StepDefinition::new(1, "Work", 30, 0),
                StepDefinition::new(2, "Rest", 10, 1),
            ],
        )
    }

    // ------------------------------------------------------------------------
    // Progress Line Tests
    // ------------------------------------------------------------------------

    mod progress_tests {
        use super::*;

        #[test]
        fn test_timer_line() {
            let timer = TimerDefinition::new(1, "Tea", 180);
            let mut state = TimerPlaybackState::idle(1, 180);
            state.remaining_seconds = 125;

            assert_eq!(Display::timer_line(&timer, &state), "Tea - 2:05 remaining");

            state.is_paused = true;
            assert_eq!(Display::timer_line(&timer, &state), "Tea - 2:05 remaining (paused)");
        }

        #[test]
        fn test_sequence_line() {
            let sequence = workout();
            let steps = sequence.sorted_steps();
            let mut state = SequencePlaybackState::idle(2, 30);
            state.current_step_index = 1;
            state.current_step_remaining_seconds = 10;

            assert_eq!(
                Display::sequence_line(&sequence, &steps, &state),
                "Workout [2/2] Rest - 0:10 remaining"
            );
        }

        #[test]
        fn test_sequence_line_complete() {
            let sequence = workout();
            let steps = sequence.sorted_steps();
            let state = SequencePlaybackState {
                sequence_id: 2,
                current_step_index: 1,
                current_step_remaining_seconds: 0,
                is_running: false,
                is_paused: false,
                is_complete: true,
            };

            assert_eq!(
                Display::sequence_line(&sequence, &steps, &state),
                "Workout [2/2] Rest - 0:00 remaining"
            );
        }
    }

    // ------------------------------------------------------------------------
    // Listing Tests
    // ------------------------------------------------------------------------

    mod list_tests {
        use super::*;

        #[test]
        fn test_empty_listing() {
            assert_eq!(
                Display::list_lines(&[], &[]),
                vec!["No timers or sequences defined".to_string()]
            );
        }

        #[test]
        fn test_listing_contains_entries() {
            let timers = vec![TimerDefinition::new(1, "Tea", 180)];
            let lines = Display::list_lines(&timers, &[workout()]);

            assert_eq!(lines[0], "Timers");
            assert!(lines.iter().any(|l| l.contains("Tea") && l.contains("3:00") && l.contains("sound")));
            assert!(lines.contains(&"Sequences".to_string()));
            assert!(lines.iter().any(|l| l.contains("Workout") && l.contains("2 steps")));
        }

        #[test]
        fn test_listing_sequences_only() {
            let lines = Display::list_lines(&[], &[workout()]);
            assert_eq!(lines[0], "Sequences");
        }

        #[test]
        fn test_listing_huge_sequence() {
            let sequence = SequenceDefinition::new(
                3,
                "Marathon",
                vec![
                    StepDefinition::new(1, "Run", u64::MAX, 0),
                    StepDefinition::new(2, "Walk", 10, 1),
                ],
            );
            let lines = Display::list_lines(&[], &[sequence]);

            let expected = format_clock(u64::MAX);
            assert!(lines.iter().any(|l| l.contains("Marathon") && l.contains(&expected)));
        }
    }
}
