//! JSON bodies exchanged with the agent backend.

use serde::{Deserialize, Serialize};

use crate::status::StatusSnapshot;

#[derive(Serialize)]
pub(crate) struct CommandBody<'a> {
    pub command: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct StatusBody {
    is_connected: bool,
    #[serde(default)]
    last_command: Option<String>,
    #[serde(default)]
    last_command_time: Option<String>,
    #[serde(default)]
    processing_status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

impl From<StatusBody> for StatusSnapshot {
    fn from(body: StatusBody) -> Self {
        StatusSnapshot {
            connected: body.is_connected,
            last_command: body.last_command,
            last_command_time: body.last_command_time,
            processing_state: body.processing_status,
            error_message: body.error_message,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct UploadBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Shape of the backend's error responses (`{"error": "..."}`).
#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_text(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|text| !text.trim().is_empty())
    }
}
