mod support;

use std::sync::Arc;
use std::time::Duration;

use lrconsole_core::{StatusPoller, StatusSnapshot, TransportError};
use support::{connected_status, gate, ScriptedTransport, Step};
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(5);
const FETCH_TIMEOUT: Duration = Duration::from_secs(2);

fn poller(transport: &Arc<ScriptedTransport>) -> StatusPoller {
    StatusPoller::new(transport.clone(), INTERVAL, FETCH_TIMEOUT)
}

#[tokio::test(start_paused = true)]
async fn test_first_fetch_is_not_deferred() {
    let transport = Arc::new(ScriptedTransport::with_status(connected_status()));
    let mut poller = poller(&transport);
    let mut feed = poller.subscribe();

    let started = Instant::now();
    poller.start();
    feed.changed().await.unwrap();

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(poller.latest().snapshot(), Some(&connected_status()));
    assert!(!poller.latest().is_disconnected());
}

#[tokio::test(start_paused = true)]
async fn test_fetches_follow_the_interval() {
    let transport = Arc::new(ScriptedTransport::with_status(connected_status()));
    let mut poller = poller(&transport);

    poller.start();
    tokio::time::sleep(Duration::from_secs(11)).await;

    let times = transport.status_times();
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], INTERVAL);
    assert_eq!(times[2] - times[1], INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_agent_yields_equal_snapshots() {
    let transport = Arc::new(ScriptedTransport::with_status(connected_status()));
    let mut poller = poller(&transport);
    let mut feed = poller.subscribe();

    poller.start();
    let mut seen: Vec<StatusSnapshot> = Vec::new();
    for _ in 0..3 {
        feed.changed().await.unwrap();
        seen.push(feed.borrow_and_update().snapshot().cloned().unwrap());
    }

    assert!(seen.iter().all(|snapshot| *snapshot == seen[0]));
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_keeps_last_good_snapshot() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_status(Step::Ready(Ok(connected_status())));
    transport.push_status(Step::Ready(Err(TransportError::NetworkUnavailable(
        "connection refused".to_string(),
    ))));
    let mut poller = poller(&transport);
    let mut feed = poller.subscribe();

    poller.start();
    feed.changed().await.unwrap();
    assert!(!feed.borrow_and_update().is_disconnected());

    feed.changed().await.unwrap();
    let latest = feed.borrow_and_update().clone();
    assert_eq!(latest.snapshot(), Some(&connected_status()));
    assert!(matches!(
        latest.last_error(),
        Some(TransportError::NetworkUnavailable(_))
    ));
    assert!(latest.is_disconnected());
    assert!(latest.is_stale());
}

#[tokio::test(start_paused = true)]
async fn test_recovery_clears_the_error() {
    let transport = Arc::new(ScriptedTransport::with_status(connected_status()));
    transport.push_status(Step::Ready(Err(TransportError::Timeout)));
    let mut poller = poller(&transport);
    let mut feed = poller.subscribe();

    poller.start();
    feed.changed().await.unwrap();
    assert!(feed.borrow_and_update().snapshot().is_none());
    assert!(feed.borrow().is_disconnected());

    feed.changed().await.unwrap();
    let latest = feed.borrow_and_update().clone();
    assert!(latest.last_error().is_none());
    assert!(!latest.is_disconnected());
}

#[tokio::test(start_paused = true)]
async fn test_hung_fetch_surfaces_as_timeout() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_status(Step::Hang);
    let mut poller = poller(&transport);
    let mut feed = poller.subscribe();

    poller.start();
    feed.changed().await.unwrap();

    assert_eq!(feed.borrow().last_error(), Some(&TransportError::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetches_never_overlap() {
    let transport = Arc::new(ScriptedTransport::with_status(connected_status()));
    transport.push_status(Step::Delayed(
        Duration::from_millis(1_900),
        Ok(connected_status()),
    ));
    let poller_transport = transport.clone();
    let mut poller = StatusPoller::new(poller_transport, Duration::from_secs(1), FETCH_TIMEOUT);

    poller.start();
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(transport.max_status_in_flight(), 1);
    assert!(transport.status_calls() >= 2);
    // Ticks that came due during the slow fetch were skipped, not replayed.
    assert!(transport.status_calls() <= 7);
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_in_flight_fetch() {
    let transport = Arc::new(ScriptedTransport::new());
    let (release, step) = gate();
    transport.push_status(step);
    let mut poller = poller(&transport);
    let mut feed = poller.subscribe();

    poller.start();
    transport.status_started.notified().await;

    poller.stop();
    assert!(!poller.is_running());
    // The fetch may already have been torn down, in which case nobody is listening.
    let _ = release.send(Ok(connected_status()));

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(INTERVAL * 3).await;

    let latest = feed.borrow_and_update().clone();
    assert!(latest.is_closed());
    assert!(latest.snapshot().is_none());
    assert!(latest.last_error().is_none());
    assert_eq!(transport.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_restartable() {
    let transport = Arc::new(ScriptedTransport::with_status(connected_status()));
    let mut poller = poller(&transport);
    let mut feed = poller.subscribe();

    poller.start();
    feed.changed().await.unwrap();
    poller.stop();
    poller.stop();
    assert!(poller.latest().is_closed());

    let calls = transport.status_calls();
    tokio::time::sleep(INTERVAL * 2).await;
    assert_eq!(transport.status_calls(), calls);

    poller.start();
    assert!(poller.is_running());
    assert!(!poller.latest().is_closed());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(transport.status_calls(), calls + 1);
}
