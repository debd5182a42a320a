//! Notification content construction.
//!
//! Builds the title and body shown for each kind of completion, plus the
//! one-line progress text used while something is running.

use crate::types::{NotificationKind, SequenceDefinition, StepDefinition, TimerDefinition};

/// Maximum length for labels in notifications.
const MAX_LABEL_LENGTH: usize = 100;

/// Label used when a definition has no usable label.
const FALLBACK_LABEL: &str = "Timer";

/// A notification ready to hand to a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// How loudly to alert
    pub kind: NotificationKind,
    /// Title line
    pub title: String,
    /// Body text
    pub body: String,
}

/// Builder for constructing notifications.
#[derive(Debug, Clone, Default)]
pub struct NotificationBuilder {
    kind: NotificationKind,
    title: String,
    body: String,
}

impl NotificationBuilder {
    /// Creates a builder for a sound notification with no text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the notification kind.
    #[must_use]
    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Sets the body to "<label> has finished".
    #[must_use]
    pub fn finished(mut self, label: &str) -> Self {
        let label = sanitize_label(label).unwrap_or_else(|| FALLBACK_LABEL.to_string());
        self.body = format!("{label} has finished");
        self
    }

    /// Builds the notification.
    #[must_use]
    pub fn build(self) -> Notification {
        Notification {
            kind: self.kind,
            title: self.title,
            body: self.body,
        }
    }
}

/// Sanitizes a label for use in notifications.
///
/// Returns the truncated label without control characters, or None if
/// nothing printable is left.
pub fn sanitize_label(label: &str) -> Option<String> {
    let sanitized: String = label
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_LABEL_LENGTH)
        .collect();

    if sanitized.trim().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Notification for a finished timer. Alarm timers get a louder title.
#[must_use]
pub fn timer_complete(timer: &TimerDefinition) -> Notification {
    let title = match timer.notification_kind {
        NotificationKind::Alarm => "Timer Alarm!",
        NotificationKind::Silent | NotificationKind::Sound => "Timer Complete",
    };
    NotificationBuilder::new()
        .kind(timer.notification_kind)
        .title(title)
        .finished(&timer.label)
        .build()
}

/// Notification for a finished timer whose definition is no longer known.
#[must_use]
pub fn unknown_timer_complete() -> Notification {
    NotificationBuilder::new()
        .title("Timer Complete")
        .finished(FALLBACK_LABEL)
        .build()
}

/// Notification for one finished step of a sequence.
#[must_use]
pub fn step_complete(step: &StepDefinition) -> Notification {
    NotificationBuilder::new()
        .kind(step.notification_kind)
        .title("Step Complete")
        .finished(&step.label)
        .build()
}

/// Notification for a finished sequence.
#[must_use]
pub fn sequence_complete(sequence: Option<&SequenceDefinition>) -> Notification {
    let name = sequence.map_or("Sequence", |sequence| sequence.name.as_str());
    NotificationBuilder::new()
        .title("Sequence Complete")
        .finished(name)
        .build()
}

/// Formats seconds as `m:ss`.
#[must_use]
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Text of the ongoing progress line, e.g. `Tea - 2:05 remaining`.
#[must_use]
pub fn ongoing_text(label: &str, remaining_seconds: u64) -> String {
    let label = sanitize_label(label).unwrap_or_else(|| FALLBACK_LABEL.to_string());
    format!("{label} - {} remaining", format_clock(remaining_seconds))
}
