//! Notification delivery error types.

use thiserror::Error;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The sender accepted the notification but could not deliver it.
    #[error("failed to send notification: {0}")]
    SendFailed(String),

    /// The sender has no delivery channel at the moment.
    #[error("notification sender is not available")]
    NotAvailable,
}

impl NotificationError {
    /// Returns true if sending again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SendFailed(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SendFailed(_) => "check the notification sender's output",
            Self::NotAvailable => "notifications are disabled for this session",
        }
    }
}
