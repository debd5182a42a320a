//! Definition source error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::EntityId;

/// Errors that can occur while looking up or loading definitions.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// No timer definition with this ID.
    #[error("timer {0} not found")]
    TimerNotFound(EntityId),

    /// No sequence definition with this ID.
    #[error("sequence {0} not found")]
    SequenceNotFound(EntityId),

    /// A definition failed validation.
    #[error("invalid definition: {0}")]
    Invalid(String),

    /// The definitions file could not be read or written.
    #[error("failed to access definitions file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The definitions file is not valid JSON.
    #[error("failed to parse definitions file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DefinitionError {
    /// Returns true if the requested ID does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TimerNotFound(_) | Self::SequenceNotFound(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::TimerNotFound(_) | Self::SequenceNotFound(_) => {
                "run `sequence-timer list` to see the available IDs"
            }
            Self::Invalid(_) => "check labels are non-empty and durations are positive",
            Self::Io { .. } => "check the path passed with --definitions",
            Self::Parse { .. } => "the file must hold {\"timers\": [...], \"sequences\": [...]}",
        }
    }
}
