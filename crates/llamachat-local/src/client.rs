//! HTTP client for llama-server's OpenAI-compatible API.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use crate::error::LocalAIError;
use crate::sse::SseDecoder;
use crate::DEFAULT_PORT;

/// Client for communicating with llama-server.
pub struct LlamaCppClient {
    client: reqwest::Client,
    base_url: String,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message in OpenAI format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// OpenAI-compatible chat completion request.
///
/// `options` is flattened into the request body so any sampling parameter
/// llama-server understands (`top_p`, `repeat_penalty`, ...) can be passed.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// One `data:` chunk of a streamed completion.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// What a single SSE payload means for the token stream.
#[derive(Debug, PartialEq)]
enum Payload {
    Token(String),
    Skip,
    Done,
    Error(String),
}

fn parse_payload(data: &str) -> Payload {
    let data = data.trim();
    if data == "[DONE]" {
        return Payload::Done;
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!("Failed to parse stream chunk: {} - Data: {}", e, data);
            return Payload::Skip;
        }
    };

    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Payload::Error(message);
    }

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
    {
        Some(content) if !content.is_empty() => Payload::Token(content),
        _ => Payload::Skip,
    }
}

/// A streamed chat completion.
///
/// Dropping the stream closes the connection, which makes llama-server
/// stop generating.
pub struct CompletionStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

impl CompletionStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Next non-empty piece of generated text, or `None` once the server
    /// signals `[DONE]` or closes the body.
    pub async fn next_token(&mut self) -> Option<Result<String, LocalAIError>> {
        loop {
            while let Some(data) = self.pending.pop_front() {
                match parse_payload(&data) {
                    Payload::Token(token) => return Some(Ok(token)),
                    Payload::Skip => continue,
                    Payload::Done => {
                        self.done = true;
                        self.pending.clear();
                        return None;
                    }
                    Payload::Error(message) => {
                        self.done = true;
                        self.pending.clear();
                        return Some(Err(LocalAIError::Api(message)));
                    }
                }
            }

            if self.done {
                return None;
            }

            match self.response.chunk().await {
                Ok(Some(bytes)) => self.pending.extend(self.decoder.push(&bytes)),
                Ok(None) => {
                    self.done = true;
                    self.pending.extend(self.decoder.finish());
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(LocalAIError::Http(e)));
                }
            }
        }
    }
}

impl LlamaCppClient {
    /// Create a new client with default URL (localhost:11436).
    pub fn new() -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", DEFAULT_PORT))
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a new client with a custom port on localhost.
    pub fn with_port(port: u16) -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", port))
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the server is running and healthy.
    pub async fn check_health(&self) -> Result<(), LocalAIError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    LocalAIError::ServerNotRunning(self.base_url.clone())
                } else {
                    LocalAIError::Http(e)
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LocalAIError::ServerNotRunning(self.base_url.clone()))
        }
    }

    /// Start a streamed chat completion.
    ///
    /// Uses the OpenAI-compatible `/v1/chat/completions` endpoint with
    /// `stream` forced on.
    pub async fn chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<CompletionStream, LocalAIError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut request = request.clone();
        request.stream = true;

        debug!(
            "POST {} ({} messages, max_tokens={})",
            url,
            request.messages.len(),
            request.max_tokens
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LocalAIError::ServerNotRunning(self.base_url.clone())
                } else {
                    LocalAIError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LocalAIError::Api(format!("{}: {}", status, text)));
        }

        Ok(CompletionStream::new(response))
    }
}

impl Default for LlamaCppClient {
    fn default() -> Self {
        Self::new()
    }
}
