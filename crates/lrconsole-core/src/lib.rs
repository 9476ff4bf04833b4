pub mod api;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod status;
pub mod transcript;
pub mod transport;
pub mod upload;

// Re-export main types for convenience
pub use api::AgentClient;
pub use config::ConsoleConfig;
pub use console::Console;
pub use dispatcher::{
    CommandRequest, DispatchState, Dispatcher, IgnoreReason, RequestState, Resolution, Submission,
};
pub use error::{CommandError, TranscriptError, TransportError};
pub use status::{StatusFeed, StatusPoller, StatusSnapshot};
pub use transcript::{Message, MessageId, Origin, Outcome, Transcript, TranscriptView};
pub use transport::{CommandReply, CommandText, Transport};
pub use upload::{ProgressReporter, Upload, UploadFile, UploadProgress, UploadReceipt};
