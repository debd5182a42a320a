//! Playback engines for the Sequence Timer.
//!
//! This module contains the in-memory playback core:
//! - `store`: observable, copy-on-write state store
//! - `countdown`: one cancellable tokio task per running entity
//! - `timer`: controller for standalone timers
//! - `sequence`: controller for multi-step sequences
//!
//! Both engines are plain values: construct them once, share them by `Arc`
//! with the UI and notification layers, and they live as long as the last
//! reference.

mod countdown;
pub mod error;
pub mod sequence;
pub mod store;
pub mod timer;

use std::fmt::Debug;

use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::types::EngineConfig;

pub use countdown::RunId;
pub use error::EngineError;
pub use sequence::{SequenceEngine, SequenceEvent};
pub use store::{EntityWatch, StateMap, StateStore};
pub use timer::{TimerEngine, TimerEvent};

/// Validates `config` and resolves the runtime loops will be spawned on.
pub(crate) fn prepare(config: &EngineConfig, runtime: Option<Handle>) -> Result<Handle, EngineError> {
    config.validate().map_err(EngineError::InvalidConfig)?;
    match runtime {
        Some(handle) => Ok(handle),
        None => Handle::try_current().map_err(|_| EngineError::NoRuntime),
    }
}

/// Publishes `event` to every current subscriber.
///
/// Having no subscribers is normal (nobody is listening yet) and not an error.
pub(crate) fn publish<E: Debug>(events: &broadcast::Sender<E>, event: E) {
    if let Err(broadcast::error::SendError(event)) = events.send(event) {
        tracing::trace!(?event, "no event subscribers");
    }
}
