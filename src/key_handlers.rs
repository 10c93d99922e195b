use crate::app::App;
use crate::chatbot::{prepare_submission, respond};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Applies one key event to the chat screen. Submissions spawn a `respond`
/// task; everything else mutates the app in place.
pub async fn handle_chat_input(key: KeyEvent, app: &Arc<Mutex<App>>) {
    let mut guard = app.lock().await;

    match key.code {
        KeyCode::Enter => {
            // One turn at a time: ignore submissions while a reply streams.
            if guard.responding {
                return;
            }
            let Some(text) = prepare_submission(&guard.chat_input) else {
                return;
            };
            guard.chat_input.clear();
            guard.remember_command(text.clone());
            drop(guard);
            tokio::spawn(respond(app.clone(), text));
        }
        KeyCode::Esc => {
            guard.should_quit = true;
        }
        KeyCode::Backspace => {
            guard.chat_input.pop();
            guard.command_index = None;
        }
        KeyCode::PageUp => guard.scroll_up(),
        KeyCode::PageDown => guard.scroll_down(),
        KeyCode::Up if key.modifiers.contains(KeyModifiers::CONTROL) => guard.history_prev(),
        KeyCode::Down if key.modifiers.contains(KeyModifiers::CONTROL) => guard.history_next(),
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                match c {
                    'c' => guard.should_quit = true,
                    'u' => guard.scroll_up(),
                    'd' => guard.scroll_down(),
                    _ => {}
                }
            } else {
                guard.chat_input.push(c);
                guard.command_index = None;
            }
        }
        _ => {}
    }
}
