//! llama.cpp backend for llamachat.
//!
//! Inference is never done in-process. This crate manages a `llama-server`
//! child process, the `.gguf` model files it loads, and a streaming client
//! for the server's OpenAI-compatible chat endpoint.

mod client;
mod error;
mod model;
pub mod paths;
mod server;
mod sse;

pub use client::{ChatMessage, ChatRequest, CompletionStream, LlamaCppClient, Role};
pub use error::LocalAIError;
pub use model::{display_name, ModelManager, FALLBACK_MODEL_NAME};
pub use server::LlamaCppServer;
pub use sse::SseDecoder;

/// Default port for the spawned llama-server instance.
pub const DEFAULT_PORT: u16 = 11436;

/// Default model filename looked up in the models directory.
pub const DEFAULT_MODEL_FILENAME: &str = "default.gguf";

/// Chat template passed to llama-server.
pub const DEFAULT_CHAT_TEMPLATE: &str = "chatml";
