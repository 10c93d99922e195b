pub mod api;
pub mod app;
pub mod chat_message;
pub mod chat_view;
pub mod chatbot;
pub mod config;
pub mod errors;
pub mod key_handlers;
pub mod log_view;
pub mod markdown;
pub mod status_indicator;
pub mod transcript;
pub mod ui;

pub use app::App;
pub use errors::{BanterError, BanterResult};
