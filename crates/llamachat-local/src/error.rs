//! Error types for local AI operations.

use thiserror::Error;

/// Errors that can occur while talking to or managing llama-server.
#[derive(Debug, Error)]
pub enum LocalAIError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error: {0}")]
    Api(String),

    /// Server is not running or not reachable.
    #[error("Server not running at {0}")]
    ServerNotRunning(String),

    /// Server failed to start.
    #[error("Failed to start server: {0}")]
    ServerStartFailed(String),

    /// Another process already listens on the server port.
    #[error("Port {0} is already in use (is another llama-server still running?)")]
    PortInUse(u16),

    /// Server process died unexpectedly.
    #[error("Server process died: {0}")]
    ServerDied(String),

    /// Model not found locally.
    #[error("Model '{0}' not found. Install it with: llamachat model add <path>")]
    ModelNotFound(String),

    /// File given to `model add` is not a GGUF model.
    #[error("Expected a .gguf file, got: {0}")]
    NotAModel(String),

    /// llama-server binary not found.
    #[error("llama-server binary not found at {0} (and not on PATH)")]
    ServerBinaryNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for server to start.
    #[error("Timeout waiting for server to become ready")]
    ServerStartTimeout,
}
