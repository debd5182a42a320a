//! Engines, definitions and the notification dispatcher wired together.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};

use sequence_timer::definitions::InMemoryDefinitions;
use sequence_timer::engine::TimerEvent;
use sequence_timer::notification::{MockNotificationSender, NotificationDispatcher};
use sequence_timer::service::PlaybackService;
use sequence_timer::types::{EngineConfig, NotificationKind, TimerDefinition};

// ============================================================================
// Test Helpers
// ============================================================================

fn definitions() -> InMemoryDefinitions {
    let definitions = InMemoryDefinitions::new();
    definitions
        .insert_timer(TimerDefinition::new(1, "Tea", 3))
        .unwrap();
    definitions
        .insert_timer(
            TimerDefinition::new(2, "Oven", 2).with_notification_kind(NotificationKind::Alarm),
        )
        .unwrap();
    definitions
        .create_sequence_with_steps("Plank", 1, [("Hold", 2), ("Rest", 1)])
        .unwrap();
    definitions
}

fn titles(mock: &MockNotificationSender) -> Vec<String> {
    mock.get_notifications().into_iter().map(|n| n.title).collect()
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn sequence_run_notifies_each_step_and_the_end() {
    let definitions = definitions();
    let mock = MockNotificationSender::new();
    let service = PlaybackService::new(EngineConfig::default(), &definitions).unwrap();
    let dispatcher = NotificationDispatcher::new(&mock, &definitions);
    let timer_events = service.timers().subscribe();
    let sequence_events = service.sequences().subscribe();

    let playback = async move {
        service.start_sequence(1).await.unwrap();
        sleep(Duration::from_millis(3_500)).await;
        assert!(service.sequences().state(1).unwrap().is_complete);
        drop(service);
    };
    let ((), delivered) = tokio::join!(playback, dispatcher.run(timer_events, sequence_events));

    assert_eq!(delivered, 3);
    assert_eq!(
        titles(&mock),
        vec!["Step Complete", "Step Complete", "Sequence Complete"]
    );
    let bodies: Vec<_> = mock.get_notifications().into_iter().map(|n| n.body).collect();
    assert_eq!(
        bodies,
        vec!["Hold has finished", "Rest has finished", "Plank has finished"]
    );
}

#[tokio::test(start_paused = true)]
async fn timer_run_notifies_once_with_kind_title() {
    let definitions = definitions();
    let mock = MockNotificationSender::new();
    let service = PlaybackService::new(EngineConfig::default(), &definitions).unwrap();
    let dispatcher = NotificationDispatcher::new(&mock, &definitions);
    let timer_events = service.timers().subscribe();
    let sequence_events = service.sequences().subscribe();

    let playback = async move {
        service.start_timer(1).await.unwrap();
        service.start_timer(2).await.unwrap();
        sleep(Duration::from_millis(4_500)).await;
        drop(service);
    };
    let ((), delivered) = tokio::join!(playback, dispatcher.run(timer_events, sequence_events));

    assert_eq!(delivered, 2);
    assert_eq!(titles(&mock), vec!["Timer Alarm!", "Timer Complete"]);
    assert_eq!(mock.get_notifications()[0].kind, NotificationKind::Alarm);
}

#[tokio::test(start_paused = true)]
async fn stopped_timer_sends_nothing() {
    let definitions = definitions();
    let mock = MockNotificationSender::new();
    let service = PlaybackService::new(EngineConfig::default(), &definitions).unwrap();
    let dispatcher = NotificationDispatcher::new(&mock, &definitions);
    let timer_events = service.timers().subscribe();
    let sequence_events = service.sequences().subscribe();

    let playback = async move {
        service.start_timer(1).await.unwrap();
        sleep(Duration::from_millis(1_500)).await;
        service.timers().stop(1);
        sleep(Duration::from_secs(5)).await;
        drop(service);
    };
    let ((), delivered) = tokio::join!(playback, dispatcher.run(timer_events, sequence_events));

    assert_eq!(delivered, 0);
    assert_eq!(mock.notification_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_send_failures_are_retried() {
    let definitions = definitions();
    let mock = MockNotificationSender::new();
    mock.fail_next(2);
    let service = PlaybackService::new(EngineConfig::default(), &definitions).unwrap();
    let dispatcher = NotificationDispatcher::new(&mock, &definitions)
        .with_retry_delay(Duration::from_millis(100));
    let timer_events = service.timers().subscribe();
    let sequence_events = service.sequences().subscribe();

    let playback = async move {
        service.start_timer(1).await.unwrap();
        sleep(Duration::from_millis(3_500)).await;
        drop(service);
    };
    let ((), delivered) = tokio::join!(playback, dispatcher.run(timer_events, sequence_events));

    assert_eq!(delivered, 1);
    assert_eq!(mock.attempt_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn several_subscribers_see_the_same_completion() {
    let definitions = definitions();
    let service = PlaybackService::new(EngineConfig::default(), &definitions).unwrap();
    let timers = Arc::clone(service.timers());
    let mut first = timers.subscribe();
    let mut second = timers.subscribe();

    service.start_timer(2).await.unwrap();
    sleep(Duration::from_millis(2_500)).await;

    let completed = |rx: &mut broadcast::Receiver<TimerEvent>| {
        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, TimerEvent::Completed { timer_id: 2, .. }) {
                count += 1;
            }
        }
        count
    };
    assert_eq!(completed(&mut first), 1);
    assert_eq!(completed(&mut second), 1);
}
