use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::wire::{CommandBody, ErrorBody, StatusBody, UploadBody};
use crate::config::ConsoleConfig;
use crate::error::TransportError;
use crate::status::StatusSnapshot;
use crate::transport::{CommandReply, CommandText, Transport};
use crate::upload::{ProgressReporter, UploadFile, UploadReceipt};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// HTTP client for the agent backend.
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
    upload_timeout: Duration,
}

impl AgentClient {
    pub fn new(config: &ConsoleConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            upload_timeout: config.upload_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for AgentClient {
    async fn send_command(&self, command: &CommandText) -> Result<CommandReply, TransportError> {
        let url = self.url("/api/command");
        debug!(%url, "sending command");

        let response = self
            .client
            .post(&url)
            .json(&CommandBody {
                command: command.as_str(),
            })
            .send()
            .await?;

        decode(response).await
    }

    async fn fetch_status(&self) -> Result<StatusSnapshot, TransportError> {
        let url = self.url("/api/status");

        let response = self.client.get(&url).send().await?;

        let body: StatusBody = decode(response).await?;
        Ok(body.into())
    }

    async fn upload_file(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
    ) -> Result<UploadReceipt, TransportError> {
        let url = self.url("/api/training/upload");
        let file_name = file.file_name().to_string();
        let total = file.len() as u64;
        debug!(%url, file = %file_name, bytes = total, "uploading file");

        progress.report(0.0);
        let body_progress = progress.clone();
        let mut sent: u64 = 0;
        let chunks = stream::iter(file.into_chunks(UPLOAD_CHUNK_SIZE)).map(move |chunk| {
            sent += chunk.len() as u64;
            if total > 0 {
                body_progress.report(sent as f64 / total as f64);
            }
            Ok::<_, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(Body::wrap_stream(chunks), total)
            .file_name(file_name.clone());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await?;

        let code = response.status().as_u16();
        let reply: UploadBody = decode(response).await?;
        if !reply.success {
            return Err(TransportError::ServerRejected {
                code,
                message: reply
                    .error
                    .or(reply.message)
                    .unwrap_or_else(|| "Upload was not accepted".to_string()),
            });
        }

        progress.complete();
        Ok(UploadReceipt {
            file_name: reply.filename.unwrap_or(file_name),
            message: reply
                .message
                .unwrap_or_else(|| "File uploaded successfully".to_string()),
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(rejection(status, &text));
    }

    serde_json::from_str(&text).map_err(|err| TransportError::MalformedResponse(err.to_string()))
}

fn rejection(status: StatusCode, body: &str) -> TransportError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_text)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    TransportError::ServerRejected {
        code: status.as_u16(),
        message,
    }
}
