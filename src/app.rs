use crate::chatbot::{ChatSession, GREETING};
use crate::config::Config;
use crate::log_view::LogView;
use crate::status_indicator::StatusIndicator;
use crate::transcript::Transcript;

pub struct App {
    pub config: Config,
    pub transcript: Transcript,
    /// Provider-side conversation context. Created lazily on the first
    /// submission and reused for every later turn; never torn down.
    pub session: Option<ChatSession>,
    /// True while an assistant reply is streaming.
    pub responding: bool,
    pub status_indicator: StatusIndicator,
    pub logs: LogView,
    pub chat_input: String,
    pub chat_scroll: u16,
    pub logs_scroll: u16,
    /// While set, the messages pane stays pinned to the newest line. Cleared
    /// by manual scrolling, restored by any transcript mutation.
    pub stick_to_bottom: bool,
    pub command_history: Vec<String>,
    pub command_index: Option<usize>,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: Config) -> App {
        let mut transcript = Transcript::new();
        transcript.push_assistant(GREETING);

        App {
            config,
            transcript,
            session: None,
            responding: false,
            status_indicator: StatusIndicator::new(),
            logs: LogView::new(),
            chat_input: String::new(),
            chat_scroll: 0,
            logs_scroll: 0,
            stick_to_bottom: true,
            command_history: Vec::new(),
            command_index: None,
            should_quit: false,
        }
    }

    pub fn scroll_up(&mut self) {
        self.stick_to_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        // Clamped against the rendered height at draw time.
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.stick_to_bottom = true;
    }

    /// Walks one step back through previously submitted inputs.
    pub fn history_prev(&mut self) {
        if self.command_history.is_empty() {
            return;
        }
        let next = match self.command_index {
            None => self.command_history.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.command_index = Some(next);
        self.chat_input = self.command_history[next].clone();
    }

    /// Walks one step forward; falls off the end back to an empty input.
    pub fn history_next(&mut self) {
        match self.command_index {
            None => {}
            Some(i) if i + 1 < self.command_history.len() => {
                self.command_index = Some(i + 1);
                self.chat_input = self.command_history[i + 1].clone();
            }
            Some(_) => {
                self.command_index = None;
                self.chat_input.clear();
            }
        }
    }

    pub fn remember_command(&mut self, command: String) {
        if self.command_history.last() != Some(&command) {
            self.command_history.push(command);
        }
        self.command_index = None;
    }
}
