//! In-memory agent used by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lrconsole_core::{
    CommandReply, CommandText, ProgressReporter, StatusSnapshot, Transport, TransportError,
    UploadFile, UploadReceipt,
};
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

/// How the scripted agent answers one call.
pub enum Step<T> {
    Ready(Result<T, TransportError>),
    /// Answer once the test sends through the paired sender.
    Gated(oneshot::Receiver<Result<T, TransportError>>),
    Delayed(Duration, Result<T, TransportError>),
    /// Never answer.
    Hang,
    Panic,
}

pub fn gate<T>() -> (oneshot::Sender<Result<T, TransportError>>, Step<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, Step::Gated(rx))
}

async fn play<T>(step: Step<T>) -> Result<T, TransportError> {
    match step {
        Step::Ready(result) => result,
        Step::Gated(rx) => rx
            .await
            .unwrap_or_else(|_| Err(TransportError::NetworkUnavailable("gate dropped".to_string()))),
        Step::Delayed(delay, result) => {
            tokio::time::sleep(delay).await;
            result
        }
        Step::Hang => std::future::pending().await,
        Step::Panic => panic!("scripted transport panic"),
    }
}

pub fn connected_status() -> StatusSnapshot {
    StatusSnapshot {
        connected: true,
        last_command: Some("adjust exposure to 1.5".to_string()),
        last_command_time: Some("2024-03-01T10:15:00".to_string()),
        processing_state: Some("idle".to_string()),
        error_message: None,
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Step<CommandReply>>>,
    statuses: Mutex<VecDeque<Step<StatusSnapshot>>>,
    fallback_status: Mutex<Option<StatusSnapshot>>,
    commands: Mutex<Vec<String>>,
    status_times: Mutex<Vec<Instant>>,
    status_in_flight: AtomicUsize,
    max_status_in_flight: AtomicUsize,
    pub status_started: Notify,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: StatusSnapshot) -> Self {
        let transport = Self::default();
        *transport.fallback_status.lock().unwrap() = Some(status);
        transport
    }

    pub fn push_reply(&self, step: Step<CommandReply>) {
        self.replies.lock().unwrap().push_back(step);
    }

    pub fn push_status(&self, step: Step<StatusSnapshot>) {
        self.statuses.lock().unwrap().push_back(step);
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_times.lock().unwrap().len()
    }

    pub fn status_times(&self) -> Vec<Instant> {
        self.status_times.lock().unwrap().clone()
    }

    pub fn max_status_in_flight(&self) -> usize {
        self.max_status_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_command(&self, command: &CommandText) -> Result<CommandReply, TransportError> {
        self.commands.lock().unwrap().push(command.as_str().to_string());
        let step = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Ready(Ok(CommandReply::succeeded("ok"))));
        play(step).await
    }

    async fn fetch_status(&self) -> Result<StatusSnapshot, TransportError> {
        self.status_times.lock().unwrap().push(Instant::now());
        let now = self.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_status_in_flight.fetch_max(now, Ordering::SeqCst);
        self.status_started.notify_one();

        let step = self.statuses.lock().unwrap().pop_front();
        let fallback = self.fallback_status.lock().unwrap().clone();
        let result = match step {
            Some(step) => play(step).await,
            None => fallback.ok_or_else(|| TransportError::NetworkUnavailable("no agent".to_string())),
        };

        self.status_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn upload_file(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
    ) -> Result<UploadReceipt, TransportError> {
        if file.is_empty() {
            return Err(TransportError::ServerRejected {
                code: 400,
                message: "No file selected".to_string(),
            });
        }
        progress.report(0.5);
        tokio::task::yield_now().await;
        progress.complete();
        Ok(UploadReceipt {
            file_name: file.file_name().to_string(),
            message: "File uploaded successfully".to_string(),
        })
    }
}
