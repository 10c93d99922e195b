use crate::api::{FragmentStream, GeminiClient, GenerationConfig, Turn};
use crate::app::App;
use crate::errors::BanterResult;
use crate::transcript::MessageId;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const GREETING: &str = "Hello, how can I help you today?";
pub const ERROR_REPLY: &str = "Sorry, there was an error";

/// Validates raw input before any state changes. Whitespace-only
/// submissions are a silent no-op.
pub fn prepare_submission(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Provider-side conversational context: the client, the fixed generation
/// settings, and every completed turn so far. One session is shared across
/// all turns so the provider keeps prior context.
pub struct ChatSession {
    client: GeminiClient,
    generation: GenerationConfig,
    history: Vec<Turn>,
}

impl ChatSession {
    pub fn new(config: &crate::config::Config) -> Self {
        Self {
            client: GeminiClient::new(config),
            generation: GenerationConfig::from_config(config),
            history: Vec::new(),
        }
    }

    /// Opens one streamed exchange: the recorded history plus the new user
    /// text. History itself is only updated once the reply completes.
    pub async fn send_message_stream(&self, text: &str) -> BanterResult<FragmentStream> {
        let mut turns = self.history.clone();
        turns.push(Turn::user(text));
        self.client.stream_generate(&turns, &self.generation).await
    }

    /// Records a completed turn. Failed turns are never recorded, so an
    /// errored exchange does not pollute provider context.
    pub fn record_turn(&mut self, user_text: &str, reply: &str) {
        self.history.push(Turn::user(user_text));
        self.history.push(Turn::model(reply));
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Drives a single conversation turn: append the user message and a
/// generating placeholder, stream fragments into the placeholder in arrival
/// order, finalize on success, or append the fixed error bubble on failure.
///
/// Spawned as a task per submission; every transcript mutation goes through
/// the app lock, so the renderer never observes a torn update.
pub async fn respond(app: Arc<Mutex<App>>, user_input: String) {
    let placeholder = {
        let mut guard = app.lock().await;
        guard.transcript.push_user(user_input.clone());
        let id = guard.transcript.begin_assistant();
        guard.responding = true;
        guard.status_indicator.set_responding(true);
        guard.status_indicator.set_status("Thinking...");
        guard.logs.add("Sending message to Gemini".to_string());
        guard.scroll_to_bottom();
        id
    };

    match stream_reply(&app, placeholder, &user_input).await {
        Ok(reply) => {
            let mut guard = app.lock().await;
            guard.transcript.finalize(placeholder);
            if let Some(session) = guard.session.as_mut() {
                session.record_turn(&user_input, &reply);
            }
            guard.logs.add(format!("Reply complete ({} chars)", reply.len()));
            guard.scroll_to_bottom();
            log::info!("turn complete, {} chars", reply.len());
        }
        Err(e) => {
            // The placeholder is left as-is, partial text and all; only the
            // error bubble is appended. The next turn demotes the stale
            // placeholder.
            let mut guard = app.lock().await;
            guard.logs.add(format!("Error: {}", e));
            guard.transcript.push_assistant(ERROR_REPLY);
            guard.scroll_to_bottom();
            log::error!("turn failed: {}", e);
        }
    }

    let mut guard = app.lock().await;
    guard.responding = false;
    guard.status_indicator.set_responding(false);
    guard.status_indicator.clear_status();
}

/// Borrows the shared session out of the app for the duration of the
/// exchange so the lock is never held across an await point.
async fn stream_reply(
    app: &Arc<Mutex<App>>,
    placeholder: MessageId,
    user_input: &str,
) -> BanterResult<String> {
    let session = {
        let mut guard = app.lock().await;
        let config = guard.config.clone();
        guard
            .session
            .take()
            .unwrap_or_else(|| ChatSession::new(&config))
    };

    let result = drain_stream(app, placeholder, &session, user_input).await;

    app.lock().await.session = Some(session);
    result
}

async fn drain_stream(
    app: &Arc<Mutex<App>>,
    placeholder: MessageId,
    session: &ChatSession,
    user_input: &str,
) -> BanterResult<String> {
    let mut stream = session.send_message_stream(user_input).await?;
    let mut accumulated = String::new();

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        accumulated.push_str(&fragment);

        let mut guard = app.lock().await;
        guard.transcript.append_chunk(placeholder, &fragment);
        guard.scroll_to_bottom();
    }

    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::transcript::Sender;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_app(base_url: &str) -> Arc<Mutex<App>> {
        Arc::new(Mutex::new(App::new(Config {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            ..Config::default()
        })))
    }

    fn sse_event(text: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({
                "candidates": [{
                    "content": { "parts": [{ "text": text }], "role": "model" }
                }]
            })
        )
    }

    #[test]
    fn test_prepare_submission_rejects_whitespace() {
        assert!(prepare_submission("").is_none());
        assert!(prepare_submission("   \t ").is_none());
        assert_eq!(prepare_submission(" hi ").as_deref(), Some(" hi "));
    }

    #[tokio::test]
    async fn test_respond_streams_and_finalizes() {
        let server = MockServer::start().await;
        let body = format!("{}{}{}", sse_event("Hel"), sse_event("lo"), sse_event("!"));
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let app = test_app(&server.uri());
        respond(app.clone(), "Hi".to_string()).await;

        let guard = app.lock().await;
        let messages = guard.transcript.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].text, GREETING);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[1].text, "Hi");
        assert_eq!(messages[2].sender, Sender::Assistant);
        assert_eq!(messages[2].text, "Hello!");
        assert!(!messages[2].is_generating);
        assert!(!guard.responding);
        assert_eq!(guard.transcript.generating_count(), 0);
        assert_eq!(guard.session.as_ref().unwrap().history_len(), 2);
    }

    #[tokio::test]
    async fn test_respond_error_leaves_placeholder_and_appends_bubble() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let app = test_app(&server.uri());
        respond(app.clone(), "Hi".to_string()).await;

        let guard = app.lock().await;
        let messages = guard.transcript.messages();
        // greeting, user, abandoned placeholder, error bubble
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].text, "");
        assert!(messages[2].is_generating);
        assert_eq!(messages[3].text, ERROR_REPLY);
        assert!(!messages[3].is_generating);
        assert!(!guard.responding);
        // Failed turn is not recorded against the session.
        assert_eq!(guard.session.as_ref().unwrap().history_len(), 0);
    }

    #[tokio::test]
    async fn test_session_accumulates_history_across_turns() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_event("ok"), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let app = test_app(&server.uri());
        respond(app.clone(), "first".to_string()).await;
        respond(app.clone(), "second".to_string()).await;

        let guard = app.lock().await;
        assert_eq!(guard.session.as_ref().unwrap().history_len(), 4);
        assert_eq!(guard.transcript.len(), 5);
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_partial_text() {
        let server = MockServer::start().await;
        let body = format!(
            "{}data: {}\n\n",
            sse_event("partial answ"),
            json!({ "error": { "code": 500, "message": "backend hiccup" } })
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let app = test_app(&server.uri());
        respond(app.clone(), "Hi".to_string()).await;

        let guard = app.lock().await;
        let messages = guard.transcript.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].text, "partial answ");
        assert!(messages[2].is_generating);
        assert_eq!(messages[3].text, ERROR_REPLY);
    }
}
