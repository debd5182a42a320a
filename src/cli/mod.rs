//! CLI module for the Sequence Timer.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `display`: Output formatting and display logic
//! - `runner`: Foreground playback of one timer or sequence

pub mod commands;
pub mod display;
pub mod runner;

pub use commands::{Cli, Commands, QuickArgs};
pub use display::Display;
pub use runner::{ctrl_c, play_sequence, play_timer, RunOutcome};
