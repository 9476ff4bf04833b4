//! The seam between the console and whatever reaches the agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::status::StatusSnapshot;
use crate::upload::{ProgressReporter, UploadFile, UploadReceipt};

/// A command as it will be sent: trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CommandText(String);

impl CommandText {
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CommandText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Body of a `POST /api/command` answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandReply {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Calls the console makes against the agent.
///
/// Implementations perform exactly one attempt per call and never retry:
/// resending a half-applied edit could apply it twice.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_command(&self, command: &CommandText) -> Result<CommandReply, TransportError>;

    /// Read-only and idempotent.
    async fn fetch_status(&self) -> Result<StatusSnapshot, TransportError>;

    async fn upload_file(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
    ) -> Result<UploadReceipt, TransportError>;
}
