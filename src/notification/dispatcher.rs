//! Routes engine completion events to a notification sender.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Duration;

use super::content::{sequence_complete, step_complete, timer_complete, unknown_timer_complete};
use super::{default_retry_delay, send_with_retry, Notification, NotificationSender};
use crate::definitions::DefinitionSource;
use crate::engine::{SequenceEvent, TimerEvent};
use crate::types::EntityId;

/// Delivers one notification per completion event.
///
/// Timer labels and sequence names are looked up in the definition source
/// when the event arrives; step completions carry their own step.
pub struct NotificationDispatcher<S, D> {
    sender: S,
    definitions: D,
    retry_delay: Duration,
}

impl<S: NotificationSender, D: DefinitionSource> NotificationDispatcher<S, D> {
    pub fn new(sender: S, definitions: D) -> Self {
        Self {
            sender,
            definitions,
            retry_delay: default_retry_delay(),
        }
    }

    /// Sets the delay between delivery retries.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Listens until both event channels close.
    ///
    /// Returns the number of notifications delivered. A receiver that falls
    /// behind skips the events it missed and keeps going.
    pub async fn run(
        &self,
        mut timers: broadcast::Receiver<TimerEvent>,
        mut sequences: broadcast::Receiver<SequenceEvent>,
    ) -> usize {
        let mut timers_open = true;
        let mut sequences_open = true;
        let mut delivered = 0;

        while timers_open || sequences_open {
            let notification = tokio::select! {
                result = timers.recv(), if timers_open => match result {
                    Ok(event) => self.timer_notification(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "timer events lagged");
                        None
                    }
                    Err(RecvError::Closed) => {
                        timers_open = false;
                        None
                    }
                },
                result = sequences.recv(), if sequences_open => match result {
                    Ok(event) => self.sequence_notification(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "sequence events lagged");
                        None
                    }
                    Err(RecvError::Closed) => {
                        sequences_open = false;
                        None
                    }
                },
            };

            if let Some(notification) = notification {
                if self.deliver(&notification).await {
                    delivered += 1;
                }
            }
        }

        tracing::debug!(delivered, "notification dispatcher stopped");
        delivered
    }

    /// Sends `notification`, logging instead of failing.
    pub async fn deliver(&self, notification: &Notification) -> bool {
        match send_with_retry(&self.sender, notification, self.retry_delay).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(title = %notification.title, "notification not delivered: {}", e);
                false
            }
        }
    }

    /// The notification for a timer event, if it warrants one.
    pub async fn timer_notification(&self, event: &TimerEvent) -> Option<Notification> {
        let TimerEvent::Completed { timer_id, .. } = event else {
            return None;
        };
        Some(match self.definitions.timer(*timer_id).await {
            Ok(Some(timer)) => timer_complete(&timer),
            Ok(None) => unknown_timer_complete(),
            Err(e) => {
                tracing::warn!(timer_id, "timer lookup failed: {}", e);
                unknown_timer_complete()
            }
        })
    }

    /// The notification for a sequence event, if it warrants one.
    pub async fn sequence_notification(&self, event: &SequenceEvent) -> Option<Notification> {
        match event {
            SequenceEvent::StepCompleted { step, .. } => Some(step_complete(step)),
            SequenceEvent::Completed { sequence_id, .. } => {
                Some(self.sequence_complete(*sequence_id).await)
            }
            _ => None,
        }
    }

    async fn sequence_complete(&self, sequence_id: EntityId) -> Notification {
        match self.definitions.sequence(sequence_id).await {
            Ok(sequence) => sequence_complete(sequence.as_ref()),
            Err(e) => {
                tracing::warn!(sequence_id, "sequence lookup failed: {}", e);
                sequence_complete(None)
            }
        }
    }
}
