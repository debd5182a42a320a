//! Command definitions for the Sequence Timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::{EntityId, NotificationKind};

// ============================================================================
// CLI Structure
// ============================================================================

/// Sequence Timer CLI - countdown timers and multi-step sequences
#[derive(Parser, Debug)]
#[command(
    name = "sequence-timer",
    version,
    about = "Countdown timers and multi-step sequences in the terminal",
    long_about = "Runs countdown timers and multi-step sequences (intervals, workouts, \
                  brewing recipes) defined in a JSON file, with a notification when \
                  each step and the whole run finishes.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Definitions file (default: ~/.sequence-timer/definitions.json)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub definitions: Option<PathBuf>,

    /// Length of one countdown tick in milliseconds
    #[arg(
        long,
        global = true,
        hide = true,
        default_value = "1000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub tick_millis: u64,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a saved timer until it finishes
    Timer {
        /// Timer ID (see `list`)
        id: EntityId,
    },

    /// Run a saved sequence until its last step finishes
    Sequence {
        /// Sequence ID (see `list`)
        id: EntityId,
    },

    /// Run a one-off timer without saving it
    Quick(QuickArgs),

    /// List saved timers and sequences
    List,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Quick Command Arguments
// ============================================================================

/// Arguments for the quick command
#[derive(Args, Debug, Clone)]
pub struct QuickArgs {
    /// Duration in seconds (1-86400)
    #[arg(value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub seconds: u64,

    /// Label shown while running and in the notification
    #[arg(short, long, default_value = "Quick timer", value_parser = validate_label)]
    pub label: String,

    /// Notification kind: silent, sound or alarm
    #[arg(short, long, default_value = "sound", value_parser = parse_notification_kind)]
    pub kind: NotificationKind,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates a label.
///
/// - Must not be empty
/// - Must not exceed 100 characters
fn validate_label(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Err("label cannot be empty".to_string());
    }
    if s.chars().count() > 100 {
        return Err("label must be at most 100 characters".to_string());
    }
    Ok(s.to_string())
}

fn parse_notification_kind(s: &str) -> Result<NotificationKind, String> {
    s.parse()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Cli Tests
    // ------------------------------------------------------------------------

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_no_args() {
            let cli = Cli::parse_from(["sequence-timer"]);
            assert!(cli.command.is_none());
            assert!(!cli.verbose);
            assert!(cli.definitions.is_none());
            assert_eq!(cli.tick_millis, 1000);
        }

        #[test]
        fn test_parse_short_verbose_flag() {
            let cli = Cli::parse_from(["sequence-timer", "-v"]);
            assert!(cli.verbose);
        }

        #[test]
        fn test_parse_global_options_after_subcommand() {
            let cli = Cli::parse_from([
                "sequence-timer",
                "list",
                "--definitions",
                "/tmp/defs.json",
                "--tick-millis",
                "10",
            ]);
            assert!(matches!(cli.command, Some(Commands::List)));
            assert_eq!(cli.definitions, Some(PathBuf::from("/tmp/defs.json")));
            assert_eq!(cli.tick_millis, 10);
        }

        #[test]
        fn test_zero_tick_rejected() {
            let result = Cli::try_parse_from(["sequence-timer", "--tick-millis", "0", "list"]);
            assert!(result.is_err());
        }
    }

    // ------------------------------------------------------------------------
    // Run Command Tests
    // ------------------------------------------------------------------------

    mod run_command_tests {
        use super::*;

        #[test]
        fn test_parse_timer() {
            let cli = Cli::parse_from(["sequence-timer", "timer", "3"]);
            assert!(matches!(cli.command, Some(Commands::Timer { id: 3 })));
        }

        #[test]
        fn test_parse_sequence() {
            let cli = Cli::parse_from(["sequence-timer", "sequence", "7"]);
            assert!(matches!(cli.command, Some(Commands::Sequence { id: 7 })));
        }

        #[test]
        fn test_timer_requires_numeric_id() {
            let result = Cli::try_parse_from(["sequence-timer", "timer", "tea"]);
            assert!(result.is_err());
        }
    }

    // ------------------------------------------------------------------------
    // Quick Command Tests
    // ------------------------------------------------------------------------

    mod quick_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let cli = Cli::parse_from(["sequence-timer", "quick", "90"]);
            match cli.command {
                Some(Commands::Quick(args)) => {
                    assert_eq!(args.seconds, 90);
                    assert_eq!(args.label, "Quick timer");
                    assert_eq!(args.kind, NotificationKind::Sound);
                }
                _ => panic!("Expected Quick command"),
            }
        }

        #[test]
        fn test_with_options() {
            let cli = Cli::parse_from([
                "sequence-timer",
                "quick",
                "5",
                "--label",
                "Tea",
                "--kind",
                "alarm",
            ]);
            match cli.command {
                Some(Commands::Quick(args)) => {
                    assert_eq!(args.label, "Tea");
                    assert_eq!(args.kind, NotificationKind::Alarm);
                }
                _ => panic!("Expected Quick command"),
            }
        }

        #[test]
        fn test_zero_seconds_rejected() {
            assert!(Cli::try_parse_from(["sequence-timer", "quick", "0"]).is_err());
        }

        #[test]
        fn test_invalid_kind_rejected() {
            assert!(Cli::try_parse_from(["sequence-timer", "quick", "5", "-k", "loud"]).is_err());
        }

        #[test]
        fn test_empty_label_rejected() {
            assert!(Cli::try_parse_from(["sequence-timer", "quick", "5", "-l", " "]).is_err());
        }
    }

    // ------------------------------------------------------------------------
    // Validation Tests
    // ------------------------------------------------------------------------

    mod validation_tests {
        use super::*;

        #[test]
        fn test_validate_label_max_length() {
            assert!(validate_label(&"a".repeat(100)).is_ok());
            assert!(validate_label(&"a".repeat(101)).is_err());
        }

        #[test]
        fn test_parse_notification_kind() {
            assert_eq!(parse_notification_kind("silent"), Ok(NotificationKind::Silent));
            assert!(parse_notification_kind("").is_err());
        }
    }
}
