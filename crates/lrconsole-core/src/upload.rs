//! File uploads with observable progress.
//!
//! Progress is a finite stream of fractions in `0.0..=1.0`. Fractions never go
//! backwards, stay below `1.0` while bytes are still moving, and end with a
//! single `1.0` once the agent has accepted the file. A failed upload simply
//! ends the stream early.

use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{CommandError, TransportError};
use crate::transport::Transport;

/// Highest fraction reported before the agent confirms the upload.
pub const MAX_IN_FLIGHT_FRACTION: f64 = 0.99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    file_name: String,
    bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Split the contents into owned chunks for a streaming request body.
    pub fn into_chunks(self, chunk_size: usize) -> Vec<Vec<u8>> {
        self.bytes
            .chunks(chunk_size.max(1))
            .map(<[u8]>::to_vec)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub file_name: String,
    pub message: String,
}

/// Producer side of an upload's progress stream.
///
/// Clones share the high-water mark, so a request body and the code awaiting
/// the response can both report without ever emitting a smaller fraction.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<f64>,
    last: Arc<AtomicU64>,
}

impl ProgressReporter {
    pub fn channel() -> (ProgressReporter, UploadProgress) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter {
            tx,
            last: Arc::new(AtomicU64::new((-1.0f64).to_bits())),
        };
        (reporter, UploadProgress { rx })
    }

    /// A reporter whose fractions go nowhere.
    pub fn detached() -> ProgressReporter {
        Self::channel().0
    }

    pub fn report(&self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        self.advance(fraction.clamp(0.0, MAX_IN_FLIGHT_FRACTION));
    }

    pub fn complete(&self) {
        self.advance(1.0);
    }

    pub fn last(&self) -> Option<f64> {
        let last = f64::from_bits(self.last.load(Ordering::SeqCst));
        (last >= 0.0).then_some(last)
    }

    fn advance(&self, fraction: f64) {
        let bits = fraction.to_bits();
        let raised = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                (fraction > f64::from_bits(prev)).then_some(bits)
            })
            .is_ok();
        if raised {
            // Nobody listening is fine.
            let _ = self.tx.send(fraction);
        }
    }
}

/// Consumer side of an upload's progress; ends when the upload does.
#[derive(Debug)]
pub struct UploadProgress {
    rx: mpsc::UnboundedReceiver<f64>,
}

impl UploadProgress {
    /// The next fraction if one is already queued. Never waits.
    pub fn try_next(&mut self) -> Option<f64> {
        self.rx.try_recv().ok()
    }
}

impl Stream for UploadProgress {
    type Item = f64;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<f64>> {
        self.rx.poll_recv(cx)
    }
}

/// A running upload.
pub struct Upload {
    file_name: String,
    progress: Option<UploadProgress>,
    task: JoinHandle<Result<UploadReceipt, TransportError>>,
}

impl Upload {
    pub fn start(transport: Arc<dyn Transport>, file: UploadFile) -> Self {
        let (reporter, progress) = ProgressReporter::channel();
        let file_name = file.file_name().to_string();
        let task = tokio::spawn(async move { transport.upload_file(file, reporter).await });
        Self {
            file_name,
            progress: Some(progress),
            task,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Take the progress stream. There is only one per upload.
    pub fn progress(&mut self) -> Option<UploadProgress> {
        self.progress.take()
    }

    pub async fn finish(self) -> Result<UploadReceipt, CommandError> {
        match self.task.await {
            Ok(result) => result.map_err(CommandError::from),
            Err(err) => {
                warn!(file = %self.file_name, error = %err, "upload task ended abnormally");
                Err(CommandError::Interrupted)
            }
        }
    }
}
