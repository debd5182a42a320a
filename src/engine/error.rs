//! Playback engine error types.
//!
//! Playback operations themselves never fail; these cover construction and
//! observation only.

use thiserror::Error;

/// Errors that can occur while building or observing an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was constructed outside a tokio runtime.
    #[error("no tokio runtime available to run countdowns")]
    NoRuntime,

    /// The configuration failed validation.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The engine owning a state stream was dropped.
    #[error("playback state stream closed")]
    Closed,
}

impl EngineError {
    /// Returns true if this error is caused by how the engine was set up.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Self::NoRuntime | Self::InvalidConfig(_))
    }
}
