use std::path::Path;

use lrconsole_core::{
    CommandError, Console, IgnoreReason, Origin, Submission, UploadFile, UploadProgress,
    UploadReceipt,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ui;

/// Typed at the prompt to send a file instead of a command.
pub const UPLOAD_PREFIX: &str = "/upload ";

/// A file transfer running beside the command stream.
pub struct UploadState {
    pub file_name: String,
    pub fraction: f64,
    progress: UploadProgress,
    task: JoinHandle<Result<UploadReceipt, CommandError>>,
}

pub struct App {
    pub should_quit: bool,
    pub console: Console,

    // Prompt
    pub input: String,
    pub cursor: usize, // in chars, not bytes

    // Transcript viewport
    pub scroll: u16,
    pub chat_height: u16, // inner size, updated on render
    pub chat_width: u16,

    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub upload: Option<UploadState>,
    pub notice: Option<String>,
}

impl App {
    pub fn new(console: Console) -> Self {
        Self {
            should_quit: false,
            console,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            upload: None,
            notice: None,
        }
    }

    /// Called on every tick: advance the animation, collect a finished command
    /// and pick up upload progress.
    pub async fn tick(&mut self) {
        if self.console.is_processing() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        if self.console.poll().is_some() {
            self.animation_frame = 0;
            self.scroll_to_bottom();
        }

        self.poll_upload().await;
    }

    /// Enter at the prompt.
    pub async fn submit_input(&mut self) {
        if self.input.trim() == UPLOAD_PREFIX.trim_end() {
            self.notice = Some(format!("usage: {}<path>", UPLOAD_PREFIX));
            return;
        }
        if let Some(path) = self.input.trim_start().strip_prefix(UPLOAD_PREFIX) {
            let path = path.trim().to_string();
            self.start_upload(Path::new(&path)).await;
            return;
        }

        match self.console.submit(&mut self.input) {
            Submission::Accepted(_) => {
                self.cursor = 0;
                self.notice = None;
                self.scroll_to_bottom();
            }
            Submission::Ignored(IgnoreReason::Busy) => {
                self.notice = Some("Still waiting for the previous command".to_string());
            }
            Submission::Ignored(IgnoreReason::Empty) => {}
        }
    }

    pub async fn start_upload(&mut self, path: &Path) {
        if self.upload.is_some() {
            self.notice = Some("An upload is already running".to_string());
            return;
        }

        let file = match UploadFile::read(path).await {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read upload");
                self.notice = Some(format!("Cannot read {}: {}", path.display(), err));
                return;
            }
        };

        info!(file = file.file_name(), bytes = file.len(), "starting upload");
        let mut upload = self.console.upload(file);
        let Some(progress) = upload.progress() else {
            return;
        };
        let file_name = upload.file_name().to_string();

        self.upload = Some(UploadState {
            file_name,
            fraction: 0.0,
            progress,
            task: tokio::spawn(upload.finish()),
        });
        self.input.clear();
        self.cursor = 0;
        self.notice = None;
    }

    async fn poll_upload(&mut self) {
        let Some(state) = self.upload.as_mut() else {
            return;
        };

        while let Some(fraction) = state.progress.try_next() {
            state.fraction = fraction;
        }
        if !state.task.is_finished() {
            return;
        }

        let Some(state) = self.upload.take() else {
            return;
        };
        let file_name = state.file_name;
        self.notice = Some(match state.task.await {
            Ok(Ok(receipt)) => format!("Uploaded {}: {}", receipt.file_name, receipt.message),
            Ok(Err(err)) => format!("Upload of {} failed: {}", file_name, err),
            Err(err) => format!("Upload of {} failed: {}", file_name, err),
        });
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
    }

    pub fn page(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Keep the newest entry (or the processing line) in view.
    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        self.transcript_lines().saturating_sub(self.page())
    }

    /// Rendered height of the transcript at the current width, wrapped the
    /// same way the transcript pane draws it.
    pub fn transcript_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width
        } else {
            50
        };

        let total = ui::transcript_paragraph(self).line_count(wrap_width);
        total.min(u16::MAX as usize) as u16
    }
}

pub fn speaker(origin: Origin) -> &'static str {
    match origin {
        Origin::User => "You",
        Origin::System => "Agent",
    }
}
