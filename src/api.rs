use crate::config::Config;
use crate::errors::{BanterError, BanterResult};
use futures::Stream;
use serde_json::{json, Value};
use std::pin::Pin;
use std::task::{Context, Poll};

/// One prior conversation turn, as the Generative Language API expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Turn {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Fixed generation settings sent with every request. Effects are
/// provider-defined; these are simply forwarded.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "temperature": self.temperature,
            "topK": self.top_k,
            "topP": self.top_p,
            "maxOutputTokens": self.max_output_tokens,
        })
    }
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = BanterResult<String>> + Send>>;

/// Thin client for `models/{model}:streamGenerateContent?alt=sse`.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }

    /// Sends the conversation so far and returns a finite stream of text
    /// fragments. The stream is consumed exactly once and is not restartable;
    /// fragments must be applied in arrival order.
    pub async fn stream_generate(
        &self,
        turns: &[Turn],
        generation: &GenerationConfig,
    ) -> BanterResult<FragmentStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let payload = build_request(turns, generation);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("accept", "text/event-stream")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(BanterError::api_error(format!(
                "API returned error: {} - {}",
                status, error_body
            )));
        }

        Ok(Box::pin(SseTextStream::new(response.bytes_stream())))
    }
}

fn build_request(turns: &[Turn], generation: &GenerationConfig) -> Value {
    let contents: Vec<Value> = turns
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "parts": [{ "text": turn.text }],
            })
        })
        .collect();

    json!({
        "contents": contents,
        "generationConfig": generation.to_json(),
    })
}

/// Parses an SSE byte stream into the text fragments carried by each event.
///
/// Events are framed by blank lines; each frame's `data:` lines are joined
/// and parsed as JSON. Some deployments resend the full candidate text in
/// every event, so only the suffix beyond the previously seen text is
/// emitted.
struct SseTextStream<S> {
    inner: S,
    buffer: Vec<u8>,
    last_text: String,
    done: bool,
}

impl<S> SseTextStream<S> {
    fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            last_text: String::new(),
            done: false,
        }
    }

    fn next_fragment(&mut self) -> Option<BanterResult<String>> {
        loop {
            let (pos, delim_len) = find_event_boundary(&self.buffer)?;
            let frame: Vec<u8> = self.buffer.drain(..pos).collect();
            self.buffer.drain(..delim_len);

            let frame_text = String::from_utf8_lossy(&frame);
            match parse_sse_data(&frame_text) {
                Ok(Some(value)) => match self.extract_text(&value) {
                    Ok(Some(fragment)) => return Some(Ok(fragment)),
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                },
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn extract_text(&mut self, value: &Value) -> BanterResult<Option<String>> {
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown provider error");
            return Err(BanterError::stream_error(message.to_string()));
        }

        let mut combined = String::new();
        if let Some(parts) = value
            .get("candidates")
            .and_then(|v| v.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
        {
            for part in parts {
                if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                    combined.push_str(text);
                }
            }
        }

        if combined.is_empty() {
            return Ok(None);
        }

        let fragment = if combined.starts_with(&self.last_text) && !self.last_text.is_empty() {
            combined[self.last_text.len()..].to_string()
        } else {
            combined.clone()
        };
        self.last_text = combined;

        if fragment.is_empty() {
            Ok(None)
        } else {
            Ok(Some(fragment))
        }
    }
}

impl<S, E> Stream for SseTextStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = BanterResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            if let Some(fragment) = self.next_fragment() {
                if fragment.is_err() {
                    self.done = true;
                }
                return Poll::Ready(Some(fragment));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(BanterError::stream_error(e.to_string()))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    // Flush a final unterminated frame, if any.
                    if !self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
                        self.buffer.extend_from_slice(b"\n\n");
                        if let Some(fragment) = self.next_fragment() {
                            return Poll::Ready(Some(fragment));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Finds the end of the next SSE event: the first blank line, whether CRLF
/// or LF framed. Returns the frame length and the delimiter length.
fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    let lf = buffer.windows(2).position(|w| w == b"\n\n");

    match (crlf, lf) {
        (Some(c), Some(l)) if l <= c => Some((l, 2)),
        (Some(c), _) => Some((c, 4)),
        (None, Some(l)) => Some((l, 2)),
        (None, None) => None,
    }
}

/// Joins the `data:` lines of one SSE frame and parses them as JSON.
/// Keep-alives, comments and `[DONE]` markers yield `None`.
fn parse_sse_data(frame: &str) -> BanterResult<Option<Value>> {
    let mut data_lines = Vec::new();
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim());
        }
    }
    if data_lines.is_empty() {
        return Ok(None);
    }

    let data = data_lines.join("\n");
    let trimmed = data.trim();
    if trimmed.is_empty() || trimmed == "[DONE]" {
        return Ok(None);
    }

    serde_json::from_str::<Value>(trimmed)
        .map(Some)
        .map_err(|e| BanterError::stream_error(format!("malformed SSE JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> Config {
        Config {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            ..Config::default()
        }
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
    fn test_find_event_boundary() {
        assert_eq!(find_event_boundary(b"data: 1\n\ndata: 2"), Some((7, 2)));
        assert_eq!(find_event_boundary(b"data: 1\r\n\r\nrest"), Some((7, 4)));
        assert_eq!(find_event_boundary(b"data: partial"), None);
    }

    #[test]
    fn test_parse_sse_data_skips_noise() {
        assert!(parse_sse_data(": keep-alive").unwrap().is_none());
        assert!(parse_sse_data("data: [DONE]").unwrap().is_none());
        assert!(parse_sse_data("data:").unwrap().is_none());
        assert!(parse_sse_data("data: {notjson").is_err());

        let value = parse_sse_data("data: {\"a\": 1}").unwrap().unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_cumulative_text_emits_only_suffix() {
        let mut stream = SseTextStream::new(futures::stream::empty::<
            Result<bytes::Bytes, std::io::Error>,
        >());

        let first = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hel" }] } }]
        });
        let second = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello" }] } }]
        });

        assert_eq!(stream.extract_text(&first).unwrap().unwrap(), "Hel");
        assert_eq!(stream.extract_text(&second).unwrap().unwrap(), "lo");
    }

    #[test]
    fn test_embedded_error_object_fails_the_stream() {
        let mut stream = SseTextStream::new(futures::stream::empty::<
            Result<bytes::Bytes, std::io::Error>,
        >());
        let value = json!({ "error": { "code": 429, "message": "quota exceeded" } });
        let err = stream.extract_text(&value).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_build_request_shape() {
        let config = test_config("http://example");
        let turns = vec![Turn::user("Hi"), Turn::model("Hello!"), Turn::user("More")];
        let request = build_request(&turns, &GenerationConfig::from_config(&config));

        let contents = request["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "Hello!");
        assert_eq!(request["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(request["generationConfig"]["topK"], 1);
    }

    #[tokio::test]
    async fn test_stream_generate_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let body = format!("{}{}{}", sse_event("Hel"), sse_event("lo"), sse_event("!"));

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let client = GeminiClient::new(&config);
        let generation = GenerationConfig::from_config(&config);

        let mut stream = client
            .stream_generate(&[Turn::user("Hi")], &generation)
            .await
            .unwrap();

        let mut fragments = Vec::new();
        while let Some(fragment) = stream.next().await {
            fragments.push(fragment.unwrap());
        }
        assert_eq!(fragments, vec!["Hel", "lo", "!"]);
    }

    #[tokio::test]
    async fn test_stream_generate_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key invalid"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let client = GeminiClient::new(&config);
        let generation = GenerationConfig::from_config(&config);

        let err = match client.stream_generate(&[Turn::user("Hi")], &generation).await {
            Ok(_) => panic!("expected the 403 to fail the request"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("403"));
    }
}
