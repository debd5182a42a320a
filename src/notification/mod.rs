//! Completion notifications.
//!
//! This module turns engine completion events into user-facing
//! notifications. It includes:
//!
//! - [`Notification`] content and the text helpers that build it
//! - The [`NotificationSender`] seam, with a console implementation for the
//!   CLI and a mock for tests
//! - [`NotificationDispatcher`], which listens to both engines and delivers
//!   one notification per completion event with bounded retries
//!
//! # Example
//!
//! ```rust,ignore
//! use sequence_timer::notification::{ConsoleNotificationSender, NotificationDispatcher};
//!
//! let dispatcher = NotificationDispatcher::new(ConsoleNotificationSender::new(), &definitions);
//! dispatcher.run(timers.subscribe(), sequences.subscribe()).await;
//! ```

mod content;
mod dispatcher;
pub mod error;

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use tokio::time::Duration;

pub use self::content::{
    format_clock, ongoing_text, sanitize_label, sequence_complete, step_complete,
    timer_complete, unknown_timer_complete, Notification, NotificationBuilder,
};
pub use self::dispatcher::NotificationDispatcher;
pub use self::error::NotificationError;

/// Maximum retry attempts for sending notifications.
const MAX_RETRIES: u32 = 3;

/// Delay between retry attempts in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Delivers notifications to the user.
#[allow(async_fn_in_trait)]
pub trait NotificationSender {
    /// Delivers one notification.
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;

    /// Returns false when the sender cannot deliver anything right now.
    fn is_available(&self) -> bool;
}

/// Sends a notification, retrying retryable failures.
///
/// # Errors
///
/// Returns the last error once the retries are used up, or immediately for
/// errors that cannot be fixed by retrying.
pub async fn send_with_retry<S: NotificationSender>(
    sender: &S,
    notification: &Notification,
    retry_delay: Duration,
) -> Result<(), NotificationError> {
    if !sender.is_available() {
        return Err(NotificationError::NotAvailable);
    }

    let mut retries = 0;
    loop {
        match sender.send(notification).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && retries < MAX_RETRIES => {
                retries += 1;
                tracing::warn!(
                    "notification send failed (retry {}/{}): {}",
                    retries,
                    MAX_RETRIES,
                    e
                );
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Default delay between retries.
pub fn default_retry_delay() -> Duration {
    Duration::from_millis(RETRY_DELAY_MS)
}

// ============================================================================
// ConsoleNotificationSender
// ============================================================================

/// Prints notifications to standard output.
///
/// Audible kinds ring the terminal bell.
#[derive(Debug, Default)]
pub struct ConsoleNotificationSender;

impl ConsoleNotificationSender {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl NotificationSender for ConsoleNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let bell = if notification.kind.is_audible() { "\x07" } else { "" };
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{bell}🔔 {}: {}", notification.title, notification.body)
            .and_then(|()| stdout.flush())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))
    }

    fn is_available(&self) -> bool {
        true
    }
}

// ============================================================================
// MockNotificationSender
// ============================================================================

#[derive(Debug)]
pub struct MockNotificationSender {
    notifications: Mutex<Vec<Notification>>,
    available: AtomicBool,
    should_fail: AtomicBool,
    failures_left: AtomicU32,
    attempts: AtomicU32,
}

impl Default for MockNotificationSender {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNotificationSender {
    #[must_use]
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            should_fail: AtomicBool::new(false),
            failures_left: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every send fail.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Makes the next `count` sends fail.
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get_notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Number of send calls, including failed ones.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn clear_recorded(&self) {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl NotificationSender for MockNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::SendFailed("Mock failure".to_string()));
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotificationError::SendFailed("Mock failure".to_string()));
        }
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification.clone());
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

impl<T: NotificationSender + ?Sized> NotificationSender for &T {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        (**self).send(notification).await
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}
