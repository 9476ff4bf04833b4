use std::sync::Arc;

use async_trait::async_trait;
use lrconsole_core::{
    CommandReply, CommandText, Console, ConsoleConfig, ProgressReporter, StatusSnapshot,
    Transport, TransportError, UploadFile, UploadReceipt,
};

use crate::app::App;

/// An agent that answers at once. `hold` keeps commands in flight forever and
/// `offline` fails every status fetch.
#[derive(Default)]
pub struct StubTransport {
    hold: bool,
    offline: bool,
}

impl StubTransport {
    pub fn holding() -> Self {
        Self {
            hold: true,
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send_command(&self, command: &CommandText) -> Result<CommandReply, TransportError> {
        if self.hold {
            std::future::pending::<()>().await;
        }
        if command.as_str() == "fail" {
            return Ok(CommandReply::failed("Command failed"));
        }
        Ok(CommandReply::succeeded("Done"))
    }

    async fn fetch_status(&self) -> Result<StatusSnapshot, TransportError> {
        if self.offline {
            return Err(TransportError::NetworkUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(StatusSnapshot {
            connected: true,
            processing_state: Some("idle".to_string()),
            ..StatusSnapshot::default()
        })
    }

    async fn upload_file(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
    ) -> Result<UploadReceipt, TransportError> {
        progress.report(0.5);
        progress.complete();
        Ok(UploadReceipt {
            file_name: file.file_name().to_string(),
            message: "File uploaded successfully".to_string(),
        })
    }
}

pub fn app(transport: Arc<StubTransport>) -> App {
    App::new(Console::new(ConsoleConfig::default(), transport))
}
