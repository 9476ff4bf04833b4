//! Agent health, polled independently of command dispatch.
//!
//! The poller fetches once on start and then on every interval tick. Only one
//! fetch is outstanding at a time: ticks that come due while a fetch is still
//! running are skipped, not queued. A failed fetch keeps the last good snapshot
//! and records the error beside it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::Transport;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The agent's own view of itself. May lag behind the local transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub last_command: Option<String>,
    pub last_command_time: Option<String>,
    pub processing_state: Option<String>,
    pub error_message: Option<String>,
}

/// What subscribers see: the last good snapshot plus the latest fetch error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusFeed {
    snapshot: Option<StatusSnapshot>,
    last_error: Option<TransportError>,
    refreshed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    closed: bool,
}

impl StatusFeed {
    pub fn snapshot(&self) -> Option<&StatusSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn failed_at(&self) -> Option<DateTime<Utc>> {
        self.failed_at
    }

    /// The snapshot on display predates the most recent fetch attempt.
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn is_disconnected(&self) -> bool {
        self.last_error.is_some() || !self.snapshot.as_ref().is_some_and(|s| s.connected)
    }

    /// The poller has been stopped and will publish nothing more.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn apply(&mut self, result: Result<StatusSnapshot, TransportError>) {
        match result {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.last_error = None;
                self.refreshed_at = Some(Utc::now());
            }
            Err(err) => {
                self.last_error = Some(err);
                self.failed_at = Some(Utc::now());
            }
        }
    }
}

pub struct StatusPoller {
    transport: Arc<dyn Transport>,
    interval: Duration,
    fetch_timeout: Duration,
    feed: Arc<watch::Sender<StatusFeed>>,
    task: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn new(transport: Arc<dyn Transport>, interval: Duration, fetch_timeout: Duration) -> Self {
        let (feed, _) = watch::channel(StatusFeed::default());
        Self {
            transport,
            interval: interval.max(MIN_POLL_INTERVAL),
            fetch_timeout,
            feed: Arc::new(feed),
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Begin polling. The first fetch happens immediately.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        self.feed.send_if_modified(|feed| std::mem::replace(&mut feed.closed, false));

        let transport = Arc::clone(&self.transport);
        let feed = Arc::clone(&self.feed);
        let interval = self.interval;
        let fetch_timeout = self.fetch_timeout;

        debug!(?interval, "status poller starting");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let result = match tokio::time::timeout(fetch_timeout, transport.fetch_status()).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout),
                };
                if let Err(err) = &result {
                    warn!(error = %err, "status fetch failed");
                }

                // The closed check and the publish happen under the same lock as stop().
                let published = feed.send_if_modified(|current| {
                    if current.closed {
                        return false;
                    }
                    current.apply(result);
                    true
                });
                if !published {
                    break;
                }
            }
        }));
    }

    /// Stop polling. A fetch already in flight is discarded.
    pub fn stop(&mut self) {
        self.feed.send_if_modified(|feed| !std::mem::replace(&mut feed.closed, true));
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("status poller stopped");
        }
    }

    pub fn latest(&self) -> StatusFeed {
        self.feed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusFeed> {
        self.feed.subscribe()
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
