//! One operator session: the transport, the status poller and the dispatcher
//! (with its transcript), owned together and handed to whichever front end
//! drives them.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use crate::api::AgentClient;
use crate::config::ConsoleConfig;
use crate::dispatcher::{CommandRequest, DispatchState, Dispatcher, Resolution, Submission};
use crate::status::{StatusFeed, StatusPoller};
use crate::transcript::TranscriptView;
use crate::transport::Transport;
use crate::upload::{Upload, UploadFile};

pub struct Console {
    config: ConsoleConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    poller: StatusPoller,
}

impl Console {
    pub fn new(config: ConsoleConfig, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&transport), config.request_timeout());
        let poller = StatusPoller::new(
            Arc::clone(&transport),
            config.status_interval(),
            config.request_timeout(),
        );

        Self {
            config,
            transport,
            dispatcher,
            poller,
        }
    }

    /// Build a console that talks HTTP to the configured agent.
    pub fn connect(config: ConsoleConfig) -> Result<Self> {
        let client = AgentClient::new(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Start status polling. Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        self.poller.start();
    }

    pub fn submit(&mut self, input: &mut String) -> Submission {
        self.dispatcher.submit(input)
    }

    pub fn poll(&mut self) -> Option<Resolution> {
        self.dispatcher.poll_completion()
    }

    pub async fn resolve(&mut self) -> Option<Resolution> {
        self.dispatcher.resolve().await
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    pub fn is_processing(&self) -> bool {
        self.dispatcher.state() == DispatchState::Submitting
    }

    pub fn active_request(&self) -> Option<&CommandRequest> {
        self.dispatcher.active_request()
    }

    pub fn transcript(&self) -> TranscriptView<'_> {
        self.dispatcher.transcript().snapshot()
    }

    pub fn status(&self) -> StatusFeed {
        self.poller.latest()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusFeed> {
        self.poller.subscribe()
    }

    pub fn upload(&self, file: UploadFile) -> Upload {
        Upload::start(Arc::clone(&self.transport), file)
    }

    /// Stop polling. An in-flight command is left to finish on its own.
    pub fn shutdown(&mut self) {
        self.poller.stop();
    }
}
