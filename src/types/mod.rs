//! Core data types for the Sequence Timer.
//!
//! This module defines the data structures used for:
//! - Timer and sequence definitions (what to run)
//! - Playback state snapshots (how far a run has progressed)
//! - Engine configuration with validation

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod playback;

pub use playback::{SequencePlaybackState, TimerPlaybackState};

/// Opaque numeric identifier of a timer, sequence, step or category.
pub type EntityId = u64;

/// Category every definition falls back to when none is given.
pub const GENERAL_CATEGORY_ID: EntityId = 1;

fn default_category_id() -> EntityId {
    GENERAL_CATEGORY_ID
}

// ============================================================================
// NotificationKind
// ============================================================================

/// How the user is alerted when a timer or step finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Silent notification only - no sound or vibration
    Silent,
    /// Notification with a short sound
    #[default]
    Sound,
    /// Full-screen alarm that must be dismissed
    Alarm,
}

impl NotificationKind {
    /// Returns the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Silent => "silent",
            NotificationKind::Sound => "sound",
            NotificationKind::Alarm => "alarm",
        }
    }

    /// Returns true if the notification should make noise.
    pub fn is_audible(&self) -> bool {
        !matches!(self, NotificationKind::Silent)
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(NotificationKind::Silent),
            "sound" => Ok(NotificationKind::Sound),
            "alarm" => Ok(NotificationKind::Alarm),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// A standalone countdown timer as stored by the data layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDefinition {
    /// Timer ID
    pub id: EntityId,
    /// Display label
    pub label: String,
    /// Countdown length in seconds (must be positive)
    pub duration_seconds: u64,
    /// Notification shown on completion
    #[serde(default)]
    pub notification_kind: NotificationKind,
    /// Owning category
    #[serde(default = "default_category_id")]
    pub category_id: EntityId,
}

impl TimerDefinition {
    /// Creates a timer definition in the general category with a sound notification.
    pub fn new(id: EntityId, label: impl Into<String>, duration_seconds: u64) -> Self {
        Self {
            id,
            label: label.into(),
            duration_seconds,
            notification_kind: NotificationKind::default(),
            category_id: GENERAL_CATEGORY_ID,
        }
    }

    /// Sets the notification kind.
    pub fn with_notification_kind(mut self, kind: NotificationKind) -> Self {
        self.notification_kind = kind;
        self
    }

    /// Sets the category.
    pub fn with_category(mut self, category_id: EntityId) -> Self {
        self.category_id = category_id;
        self
    }

    /// Validates the definition.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.label.trim().is_empty() {
            return Err(format!("timer {} has an empty label", self.id));
        }
        if self.duration_seconds == 0 {
            return Err(format!("timer {} must last at least one second", self.id));
        }
        Ok(())
    }
}

/// One timed segment of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step ID
    pub id: EntityId,
    /// Display label
    pub label: String,
    /// Step length in seconds (must be positive)
    pub duration_seconds: u64,
    /// Notification shown when the step finishes
    #[serde(default)]
    pub notification_kind: NotificationKind,
    /// Position within the sequence; need not be contiguous
    #[serde(default)]
    pub order: i32,
}

impl StepDefinition {
    /// Creates a step with a sound notification.
    pub fn new(id: EntityId, label: impl Into<String>, duration_seconds: u64, order: i32) -> Self {
        Self {
            id,
            label: label.into(),
            duration_seconds,
            notification_kind: NotificationKind::default(),
            order,
        }
    }

    /// Sets the notification kind.
    pub fn with_notification_kind(mut self, kind: NotificationKind) -> Self {
        self.notification_kind = kind;
        self
    }
}

/// An ordered list of timed steps run back to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    /// Sequence ID
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Owning category
    #[serde(default = "default_category_id")]
    pub category_id: EntityId,
    /// Steps in storage order; use [`SequenceDefinition::sorted_steps`] for playback
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl SequenceDefinition {
    /// Creates a sequence in the general category.
    pub fn new(id: EntityId, name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            id,
            name: name.into(),
            category_id: GENERAL_CATEGORY_ID,
            steps,
        }
    }

    /// Returns the steps sorted by `order` ascending.
    ///
    /// The sort is stable, so steps sharing an order keep their storage order.
    pub fn sorted_steps(&self) -> Vec<StepDefinition> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|step| step.order);
        steps
    }

    /// Number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Sum of all step durations, saturating at `u64::MAX`.
    pub fn total_duration_seconds(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| step.duration_seconds)
            .fold(0, u64::saturating_add)
    }

    /// Validates the definition.
    ///
    /// An empty step list is valid to store but cannot be started.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("sequence {} has an empty name", self.id));
        }
        for step in &self.steps {
            if step.label.trim().is_empty() {
                return Err(format!(
                    "step {} of sequence {} has an empty label",
                    step.id, self.id
                ));
            }
            if step.duration_seconds == 0 {
                return Err(format!(
                    "step {} of sequence {} must last at least one second",
                    step.id, self.id
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// EngineConfig
// ============================================================================

/// Configuration shared by the playback engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Countdown tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Buffered events per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            event_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with the specified tick interval.
    pub fn with_tick_interval_ms(mut self, millis: u64) -> Self {
        self.tick_interval_ms = millis;
        self
    }

    /// Creates a new configuration with the specified event buffer size.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Tick interval as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick interval must be at least 1 ms".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod notification_kind_tests {
        use super::*;

        #[test]
        fn test_default_is_sound() {
            assert_eq!(NotificationKind::default(), NotificationKind::Sound);
        }

        #[test]
        fn test_serialize_snake_case() {
            let json = serde_json::to_string(&NotificationKind::Alarm).unwrap();
            assert_eq!(json, "\"alarm\"");

            let kind: NotificationKind = serde_json::from_str("\"silent\"").unwrap();
            assert_eq!(kind, NotificationKind::Silent);
        }

        #[test]
        fn test_from_str() {
            assert_eq!("Alarm".parse::<NotificationKind>(), Ok(NotificationKind::Alarm));
            assert_eq!("sound".parse::<NotificationKind>(), Ok(NotificationKind::Sound));
            assert!("beep".parse::<NotificationKind>().is_err());
        }

        #[test]
        fn test_is_audible() {
            assert!(!NotificationKind::Silent.is_audible());
            assert!(NotificationKind::Sound.is_audible());
            assert!(NotificationKind::Alarm.is_audible());
        }
    }

    mod definition_tests {
        use super::*;

        #[test]
        fn test_timer_defaults_from_json() {
            let timer: TimerDefinition =
                serde_json::from_str(r#"{"id": 7, "label": "Tea", "duration_seconds": 180}"#)
                    .unwrap();
            assert_eq!(timer.notification_kind, NotificationKind::Sound);
            assert_eq!(timer.category_id, GENERAL_CATEGORY_ID);
        }

        #[test]
        fn test_timer_validate() {
            assert!(TimerDefinition::new(1, "Tea", 180).validate().is_ok());
            assert!(TimerDefinition::new(1, "Tea", 0).validate().is_err());
            assert!(TimerDefinition::new(1, "  ", 10).validate().is_err());
        }

        #[test]
        fn test_sorted_steps_uses_order_not_storage() {
            let sequence = SequenceDefinition::new(
                1,
                "Yoga",
                vec![
                    StepDefinition::new(10, "Cool down", 60, 30),
                    StepDefinition::new(11, "Warm up", 60, -5),
                    StepDefinition::new(12, "Flow", 120, 7),
                ],
            );
            let labels: Vec<_> = sequence
                .sorted_steps()
                .into_iter()
                .map(|step| step.label)
                .collect();
            assert_eq!(labels, ["Warm up", "Flow", "Cool down"]);
        }

        #[test]
        fn test_sorted_steps_is_stable_for_equal_orders() {
            let sequence = SequenceDefinition::new(
                1,
                "Ties",
                vec![
                    StepDefinition::new(1, "a", 1, 0),
                    StepDefinition::new(2, "b", 1, 0),
                ],
            );
            let ids: Vec<_> = sequence.sorted_steps().iter().map(|s| s.id).collect();
            assert_eq!(ids, [1, 2]);
        }

        #[test]
        fn test_totals() {
            let sequence = SequenceDefinition::new(
                1,
                "HIIT",
                vec![
                    StepDefinition::new(1, "Work", 40, 0),
                    StepDefinition::new(2, "Rest", 20, 1),
                ],
            );
            assert_eq!(sequence.step_count(), 2);
            assert_eq!(sequence.total_duration_seconds(), 60);
        }

        #[test]
        fn test_total_duration_saturates() {
            let sequence = SequenceDefinition::new(
                1,
                "Forever",
                vec![
                    StepDefinition::new(1, "Long", u64::MAX, 0),
                    StepDefinition::new(2, "Short", 10, 1),
                ],
            );
            assert!(sequence.validate().is_ok());
            assert_eq!(sequence.total_duration_seconds(), u64::MAX);
        }

        #[test]
        fn test_sequence_validate() {
            let ok = SequenceDefinition::new(1, "Empty", vec![]);
            assert!(ok.validate().is_ok());

            let zero = SequenceDefinition::new(1, "Bad", vec![StepDefinition::new(1, "x", 0, 0)]);
            let err = zero.validate().unwrap_err();
            assert!(err.contains("at least one second"));

            let unnamed = SequenceDefinition::new(1, "", vec![]);
            assert!(unnamed.validate().is_err());
        }
    }

    mod engine_config_tests {
        use super::*;

        #[test]
        fn test_default_values() {
            let config = EngineConfig::default();
            assert_eq!(config.tick_interval_ms, 1000);
            assert_eq!(config.event_capacity, 64);
            assert_eq!(config.tick_interval(), Duration::from_secs(1));
        }

        #[test]
        fn test_builder_pattern() {
            let config = EngineConfig::default()
                .with_tick_interval_ms(10)
                .with_event_capacity(4);
            assert_eq!(config.tick_interval(), Duration::from_millis(10));
            assert_eq!(config.event_capacity, 4);
        }

        #[test]
        fn test_validate() {
            assert!(EngineConfig::default().validate().is_ok());
            assert!(EngineConfig::default()
                .with_tick_interval_ms(0)
                .validate()
                .is_err());
            assert!(EngineConfig::default()
                .with_event_capacity(0)
                .validate()
                .is_err());
        }
    }
}
