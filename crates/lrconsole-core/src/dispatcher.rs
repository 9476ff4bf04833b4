//! Single-flight command dispatch.
//!
//! The dispatcher is `Idle` or `Submitting`. A submission while `Submitting`
//! is dropped, never queued, so a user entry and its answer are always
//! adjacent in the transcript. The transport call runs on its own task; the
//! owner collects its result with [`Dispatcher::poll_completion`] (from a UI
//! tick) or [`Dispatcher::resolve`] (from async code).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::error::{CommandError, TransportError};
use crate::transcript::{MessageId, Outcome, Transcript};
use crate::transport::{CommandReply, CommandText, Transport};

const DEFAULT_SUCCESS_TEXT: &str = "Command processed successfully";
const DEFAULT_FAILURE_TEXT: &str = "Command failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    InFlight,
    Resolved,
    Failed,
}

/// The unit of dispatch. Lives only until its answer is in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    text: CommandText,
    submitted_at: DateTime<Utc>,
    state: RequestState,
}

impl CommandRequest {
    fn new(text: CommandText) -> Self {
        Self {
            text,
            submitted_at: Utc::now(),
            state: RequestState::Pending,
        }
    }

    pub fn text(&self) -> &CommandText {
        &self.text
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn state(&self) -> RequestState {
        self.state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Empty,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Carries the id of the user entry.
    Accepted(MessageId),
    Ignored(IgnoreReason),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted(_))
    }
}

/// A finished command, after its system entry has been recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub request: CommandRequest,
    pub message_id: MessageId,
    pub result: Result<String, CommandError>,
}

impl Resolution {
    pub fn outcome(&self) -> Outcome {
        if self.result.is_ok() {
            Outcome::Success
        } else {
            Outcome::Error
        }
    }
}

type CommandTask = JoinHandle<Result<CommandReply, TransportError>>;

struct ActiveCommand {
    request: CommandRequest,
    task: CommandTask,
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    transcript: Transcript,
    command_timeout: Duration,
    active: Option<ActiveCommand>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, command_timeout: Duration) -> Self {
        Self {
            transport,
            transcript: Transcript::new(),
            command_timeout,
            active: None,
        }
    }

    pub fn state(&self) -> DispatchState {
        if self.active.is_some() {
            DispatchState::Submitting
        } else {
            DispatchState::Idle
        }
    }

    pub fn active_request(&self) -> Option<&CommandRequest> {
        self.active.as_ref().map(|active| &active.request)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Submit the contents of `input`. The buffer is cleared only if the
    /// command was accepted. Must be called from within a Tokio runtime.
    pub fn submit(&mut self, input: &mut String) -> Submission {
        if self.active.is_some() {
            debug!("submission dropped, a command is already in flight");
            return Submission::Ignored(IgnoreReason::Busy);
        }
        let Some(text) = CommandText::parse(input) else {
            return Submission::Ignored(IgnoreReason::Empty);
        };

        let mut request = CommandRequest::new(text);
        let id = self.transcript.record_user(request.text.as_str());
        input.clear();

        request.state = RequestState::InFlight;
        debug!(%id, command = request.text.as_str(), "dispatching command");

        let transport = Arc::clone(&self.transport);
        let command = request.text.clone();
        let timeout = self.command_timeout;
        let task = tokio::spawn(async move {
            match tokio::time::timeout(timeout, transport.send_command(&command)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            }
        });

        self.active = Some(ActiveCommand { request, task });
        Submission::Accepted(id)
    }

    /// Convenience for programmatic drivers that have no input buffer.
    pub fn submit_text(&mut self, text: &str) -> Submission {
        let mut buffer = text.to_string();
        self.submit(&mut buffer)
    }

    /// Record the in-flight command's answer if it has arrived. Never blocks.
    pub fn poll_completion(&mut self) -> Option<Resolution> {
        let joined = {
            let active = self.active.as_mut()?;
            (&mut active.task).now_or_never()?
        };
        let active = self.active.take()?;
        Some(self.finish(active.request, joined))
    }

    /// Wait for the in-flight command and record its answer.
    ///
    /// Cancel safe: dropping this future leaves the command in flight.
    pub async fn resolve(&mut self) -> Option<Resolution> {
        let joined = {
            let active = self.active.as_mut()?;
            (&mut active.task).await
        };
        let active = self.active.take()?;
        Some(self.finish(active.request, joined))
    }

    fn finish(
        &mut self,
        mut request: CommandRequest,
        joined: Result<Result<CommandReply, TransportError>, JoinError>,
    ) -> Resolution {
        let result = match joined {
            Ok(Ok(reply)) => interpret_reply(reply),
            Ok(Err(err)) => Err(CommandError::Transport(err)),
            Err(err) => {
                warn!(error = %err, "command task ended abnormally");
                Err(CommandError::Interrupted)
            }
        };

        let message_id = match &result {
            Ok(text) => {
                request.state = RequestState::Resolved;
                self.transcript.record_system(Outcome::Success, text.as_str())
            }
            Err(err) => {
                request.state = RequestState::Failed;
                warn!(command = request.text.as_str(), error = %err, "command failed");
                self.transcript.record_system(Outcome::Error, err.to_string())
            }
        };
        debug!(id = %message_id, state = ?request.state, "command finished");

        Resolution {
            request,
            message_id,
            result,
        }
    }
}

fn interpret_reply(reply: CommandReply) -> Result<String, CommandError> {
    let text = reply.message.or(reply.error);
    if reply.success {
        Ok(text.unwrap_or_else(|| DEFAULT_SUCCESS_TEXT.to_string()))
    } else {
        Err(CommandError::ApplicationFailure(
            text.unwrap_or_else(|| DEFAULT_FAILURE_TEXT.to_string()),
        ))
    }
}
