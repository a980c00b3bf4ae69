use super::registry::SessionRegistry;
use super::test_mocks::{
    catalog, fast_settings, numbered_tracks, ChannelMock, Delivered, ProviderMock,
};
use super::types::{SessionState, Topic};
use crate::DestinationId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};

const FIRST: DestinationId = DestinationId(1);
const SECOND: DestinationId = DestinationId(2);

fn create_registry() -> (SessionRegistry, UnboundedReceiver<Delivered>) {
    let provider = ProviderMock::new()
        .with_tracks("lofi", numbered_tracks("lofi", 50))
        .with_tracks("jazz", numbered_tracks("jazz", 50));
    let (channel, deliveries) = ChannelMock::new();

    let registry = SessionRegistry::new(
        Arc::new(provider),
        Arc::new(channel),
        Arc::new(catalog(&["jazz"])),
        fast_settings(),
    );

    (registry, deliveries)
}

#[actix_rt::test]
async fn should_replace_running_session_on_restart() {
    let (registry, _deliveries) = create_registry();

    registry.start(FIRST, "lofi", Some("Lo-Fi")).await;
    let replaced = registry.session(FIRST).unwrap();

    let status = registry.start(FIRST, "jazz", None).await;

    assert_eq!(replaced.state(), SessionState::Stopped);
    assert_eq!(status.state, SessionState::Running);
    assert_eq!(status.topic, Topic::new("jazz", "jazz"));
    assert!(!Arc::ptr_eq(&replaced, &registry.session(FIRST).unwrap()));

    registry.stop_all().await;
}

#[actix_rt::test]
async fn should_keep_single_session_under_concurrent_starts() {
    let (registry, mut deliveries) = create_registry();

    let (lofi, jazz) = tokio::join!(
        registry.start(FIRST, "lofi", None),
        registry.start(FIRST, "jazz", None)
    );
    assert_eq!(lofi.state, SessionState::Running);
    assert_eq!(jazz.state, SessionState::Running);

    let current = registry.status(FIRST).unwrap();
    assert_eq!(current.state, SessionState::Running);

    // Whatever the replaced session delivered happened before its replacement started.
    while deliveries.try_recv().is_ok() {}

    for _ in 0..3 {
        let delivery = timeout(Duration::from_secs(2), deliveries.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(delivery
            .track_id
            .starts_with(&format!("{}-", current.topic.query)));
    }

    registry.stop_all().await;
}

#[actix_rt::test]
async fn should_resolve_random_topic_from_catalog() {
    let (registry, _deliveries) = create_registry();

    let status = registry.start(FIRST, "random", None).await;
    assert_eq!(status.topic, Topic::new("jazz", "JAZZ"));

    let status = registry.start(SECOND, "  ", Some("ignored")).await;
    assert_eq!(status.topic, Topic::new("jazz", "JAZZ"));

    registry.stop_all().await;
}

#[actix_rt::test]
async fn should_default_display_name_to_query() {
    let (registry, _deliveries) = create_registry();

    let status = registry.start(FIRST, " lofi ", None).await;
    assert_eq!(status.topic, Topic::new("lofi", "lofi"));

    let status = registry.start(FIRST, "lofi", Some("Lo-Fi Beats")).await;
    assert_eq!(status.topic, Topic::new("lofi", "Lo-Fi Beats"));

    let status = registry.start(FIRST, "lofi", Some("   ")).await;
    assert_eq!(status.topic, Topic::new("lofi", "lofi"));

    registry.stop_all().await;
}

#[actix_rt::test]
async fn should_ignore_unknown_destinations() {
    let (registry, _deliveries) = create_registry();

    assert!(!registry.stop(FIRST).await);
    assert!(!registry.skip(FIRST));
    assert!(registry.status(FIRST).is_none());
    assert!(registry.session(FIRST).is_none());
}

#[actix_rt::test]
async fn should_stop_and_forget_session() {
    let (registry, _deliveries) = create_registry();

    registry.start(FIRST, "lofi", None).await;
    let session = registry.session(FIRST).unwrap();
    assert!(registry.skip(FIRST));

    assert!(registry.stop(FIRST).await);

    assert_eq!(session.state(), SessionState::Stopped);
    assert!(registry.status(FIRST).is_none());
    assert!(!registry.stop(FIRST).await);
}

#[actix_rt::test]
async fn should_isolate_destinations() {
    let (registry, mut deliveries) = create_registry();

    registry.start(FIRST, "lofi", None).await;
    registry.start(SECOND, "jazz", None).await;

    registry.stop(FIRST).await;

    let second = registry.status(SECOND).unwrap();
    assert_eq!(second.state, SessionState::Running);
    assert_eq!(second.topic.query, "jazz");

    sleep(Duration::from_millis(20)).await;
    while deliveries.try_recv().is_ok() {}

    let delivery = timeout(Duration::from_secs(2), deliveries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.destination, SECOND);

    registry.stop_all().await;
}

#[actix_rt::test]
async fn should_stop_all_sessions() {
    let (registry, _deliveries) = create_registry();

    registry.start(FIRST, "lofi", None).await;
    registry.start(SECOND, "jazz", None).await;
    let sessions = [
        registry.session(FIRST).unwrap(),
        registry.session(SECOND).unwrap(),
    ];

    registry.stop_all().await;

    for session in sessions {
        assert_eq!(session.state(), SessionState::Stopped);
    }
    assert!(registry.status(FIRST).is_none());
    assert!(registry.status(SECOND).is_none());
}

#[actix_rt::test]
async fn should_forget_destination_lock_after_stop() {
    let (registry, _deliveries) = create_registry();

    registry.start(FIRST, "lofi", None).await;
    registry.start(SECOND, "jazz", None).await;
    assert_eq!(registry.destination_locks(), 2);

    assert!(registry.stop(FIRST).await);
    assert_eq!(registry.destination_locks(), 1);

    assert!(!registry.stop(FIRST).await);
    assert_eq!(registry.destination_locks(), 1);

    registry.stop_all().await;
    assert_eq!(registry.destination_locks(), 0);
}
