//! # llamachat core
//!
//! Everything between the line editor and llama-server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ ChatSession │ --> │ generate_reply() │ --> │   terminal   │
//! │  (history)  │     │  consumer task   │     │ (WordWrapper)│
//! └─────────────┘     └──────────────────┘     └──────────────┘
//!                            ^  cancel
//!                     ┌──────┴───────┐
//!                     │ KeyListener  │  Ctrl+Q / Ctrl+Z / Ctrl+C / Esc
//!                     │   (thread)   │
//!                     └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use llamachat_core::{generate_reply, ChatConfig, ChatSession, TerminalKeys, WordWrapper};
//!
//! let config = ChatConfig::load(None)?;
//! let mut session = ChatSession::new(&config.system_message);
//! session.push_user("Why is the sky blue?");
//!
//! let request = session.request(config.temperature, config.max_tokens, &config.chat_options);
//! let keys = TerminalKeys::new()?;
//! let start = async { Ok(client.chat_stream(&request).await?) };
//! let reply = generate_reply(start, &mut stdout, WordWrapper::for_terminal(), keys).await?;
//! session.record_reply(reply.text);
//! ```

mod config;
mod error;
mod generate;
mod keys;
mod session;
mod wrap;

pub use config::{ChatConfig, ChatConfigBuilder};
pub use error::ChatError;
pub use generate::{generate_reply, stream_reply, Reply, TokenSource};
pub use keys::{is_stop_key, KeyListener, KeySource, NoKeys, TerminalKeys, POLL_INTERVAL};
pub use session::ChatSession;
pub use wrap::WordWrapper;

// Re-export backend types
pub use llamachat_local::{
    display_name, paths, ChatMessage, ChatRequest, CompletionStream, LlamaCppClient,
    LlamaCppServer, LocalAIError, ModelManager, Role, FALLBACK_MODEL_NAME,
};
