//! Sequence Timer Library
//!
//! This library provides the core functionality for the Sequence Timer.
//! It includes:
//! - Playback engines for standalone timers and multi-step sequences
//! - Definition sources (in memory and JSON file)
//! - A service wiring the engines to a definition source
//! - Completion notifications routed from engine events
//! - CLI command parsing, display and foreground playback
//! - Type definitions for definitions, playback state and configuration

pub mod cli;
pub mod definitions;
pub mod engine;
pub mod notification;
pub mod service;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    EngineConfig, EntityId, NotificationKind, SequenceDefinition, SequencePlaybackState,
    StepDefinition, TimerDefinition, TimerPlaybackState,
};

pub use engine::{
    EngineError, EntityWatch, RunId, SequenceEngine, SequenceEvent, TimerEngine, TimerEvent,
};

pub use definitions::{DefinitionError, DefinitionSource, DefinitionsFile, InMemoryDefinitions};

pub use notification::{
    ConsoleNotificationSender, MockNotificationSender, Notification, NotificationDispatcher,
    NotificationError, NotificationSender,
};

pub use service::PlaybackService;
