use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cvr_chat_core::{ChatClient, ChatError, Completion, PendingChat, RequestId, ResetError};

use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    RestartButton,
}

pub struct App {
    pub should_quit: bool,
    pub focus: Focus,
    pub backend_url: String,

    // Conversation
    pub client: ChatClient,
    pub chat_task: Option<(RequestId, JoinHandle<Result<String, ChatError>>)>,
    pub restart_task: Option<JoinHandle<Result<(), ResetError>>>,

    // Input field
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Transcript view
    pub scroll: u16,
    pub chat_height: u16, // Height of transcript area for scroll calculations
    pub chat_width: u16,  // Width of transcript area for wrap calculations
    followed_revision: Option<u64>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Restart button area for mouse hit-testing (updated during render)
    pub restart_area: Option<Rect>,
}

impl App {
    pub fn new(client: ChatClient, backend_url: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            focus: Focus::Input,
            backend_url: backend_url.into(),

            client,
            chat_task: None,
            restart_task: None,

            input: String::new(),
            cursor: 0,

            scroll: 0,
            chat_height: 0,
            chat_width: 0,
            followed_revision: None,

            animation_frame: 0,
            restart_area: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.client.is_busy()
    }

    /// Enter on the input field.
    pub fn send_message(&mut self) {
        // Sending is held back until a pending restart has settled.
        if self.restart_task.is_some() {
            return;
        }
        let Some(PendingChat { id, message }) = self.client.submit(&mut self.input) else {
            return;
        };
        self.cursor = 0;

        let backend = self.client.backend();
        let handle = tokio::spawn(async move { backend.chat(&message).await });
        self.chat_task = Some((id, handle));
    }

    /// Restart button, Ctrl+R, or a click on the button.
    pub fn restart_conversation(&mut self) {
        if self.restart_task.is_some() {
            return;
        }
        let backend = self.client.backend();
        self.restart_task = Some(tokio::spawn(async move { backend.reset().await }));
    }

    /// Feeds finished background requests back into the client.
    pub async fn poll_tasks(&mut self) {
        if self.chat_task.as_ref().is_some_and(|(_, h)| h.is_finished()) {
            if let Some((id, handle)) = self.chat_task.take() {
                let result = handle
                    .await
                    .unwrap_or_else(|e| Err(ChatError::Interrupted(e.to_string())));
                match self.client.complete(id, result) {
                    Completion::Replied => info!("reply received"),
                    Completion::Failed(kind) => info!(?kind, "reply failed"),
                    Completion::Stale => info!("dropped reply from before restart"),
                }
            }
        }

        if self.restart_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.restart_task.take() {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "reset task did not finish");
                        Ok(())
                    }
                };
                // The transcript is reset either way; a failed /reset is only logged.
                if let Err(e) = self.client.complete_restart(result) {
                    warn!(error = %e, "backend reset failed");
                }
                self.input_focus();
            }
        }
    }

    pub fn input_focus(&mut self) {
        self.focus = Focus::Input;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Input => Focus::RestartButton,
            Focus::RestartButton => Focus::Input,
        };
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max);
    }

    /// Snaps the view to the newest entry whenever the transcript changed.
    pub fn follow_transcript(&mut self) {
        let revision = self.client.transcript().revision();
        if self.followed_revision != Some(revision) {
            self.followed_revision = Some(revision);
            self.scroll = self.max_scroll();
        }
    }

    fn max_scroll(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width
        } else {
            50
        };
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        let total_lines = ui::transcript_line_count(self.client.transcript(), wrap_width);
        total_lines.saturating_sub(visible_height)
    }
}
