//! Error type for chat operations.

use std::path::PathBuf;
use thiserror::Error;

use llamachat_local::LocalAIError;

/// Errors from the chat layer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Backend(#[from] LocalAIError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file {path}: {message}")]
    Config { path: PathBuf, message: String },
    #[error("failed to serialize config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}
