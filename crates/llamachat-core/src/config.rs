//! Chat configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ChatError;
use llamachat_local::{DEFAULT_CHAT_TEMPLATE, DEFAULT_MODEL_FILENAME, DEFAULT_PORT};

const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful, uncensored and unbiased assistant.";

/// Configuration for a chat session and the llama-server behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model file: a path, or a name in the models directory.
    pub model: String,
    /// Display name; derived from the model file when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub system_message: String,
    pub temperature: f64,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
    /// Context window (n_ctx).
    pub ctx_size: u32,
    /// Prompt batch size (n_batch).
    pub batch_size: u32,
    /// Layers offloaded to the GPU (n_gpu_layers).
    pub gpu_layers: u32,
    pub chat_template: String,
    /// Use an already running server instead of spawning one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    /// Port for the spawned server.
    pub port: u16,
    pub startup_timeout_secs: u64,
    /// Extra arguments for the spawned server.
    pub server_args: Vec<String>,
    pub exit_entry: String,
    pub new_entry: String,
    pub word_wrap: bool,
    /// Extra sampling options sent with every request.
    pub chat_options: BTreeMap<String, serde_json::Value>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_FILENAME.to_string(),
            name: None,
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            temperature: 0.8,
            max_tokens: 2048,
            ctx_size: 4096,
            batch_size: 512,
            gpu_layers: 0,
            chat_template: DEFAULT_CHAT_TEMPLATE.to_string(),
            server_url: None,
            port: DEFAULT_PORT,
            startup_timeout_secs: 120,
            server_args: Vec::new(),
            exit_entry: ".exit".to_string(),
            new_entry: ".new".to_string(),
            word_wrap: true,
            chat_options: BTreeMap::new(),
        }
    }
}

impl ChatConfig {
    /// Defaults, then the config file, then environment variables.
    ///
    /// `path` falls back to `~/.llamachat/config.toml`.
    pub fn load(path: Option<&Path>) -> Result<Self, ChatError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// [`ChatConfig::load`] with environment variables read through `lookup`.
    pub fn load_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ChatError> {
        let default_path = llamachat_local::paths::config_file();
        let path = path.unwrap_or(&default_path);

        let mut config = Self::from_file(path)?;
        config.apply_env(lookup);
        Ok(config)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ChatError> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ChatError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `LLAMACHAT_*` overrides. Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("LLAMACHAT_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("LLAMACHAT_SERVER_URL") {
            self.server_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(message) = lookup("LLAMACHAT_SYSTEM_MESSAGE") {
            self.system_message = message;
        }
        parse_env(&lookup, "LLAMACHAT_TEMPERATURE", &mut self.temperature);
        parse_env(&lookup, "LLAMACHAT_MAX_TOKENS", &mut self.max_tokens);
        parse_env(&lookup, "LLAMACHAT_GPU_LAYERS", &mut self.gpu_layers);
        parse_env(&lookup, "LLAMACHAT_CTX_SIZE", &mut self.ctx_size);
    }

    /// Render as the TOML written by `llamachat init`.
    pub fn to_toml(&self) -> Result<String, ChatError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the config file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ChatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Create a builder for configuration.
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => warn!("Ignoring {}={:?}: not a valid value", key, raw),
        }
    }
}

/// Builder for chat configuration.
#[derive(Debug, Default)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn system_message(mut self, message: impl Into<String>) -> Self {
        self.config.system_message = message.into();
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = Some(url.into());
        self
    }

    pub fn gpu_layers(mut self, layers: u32) -> Self {
        self.config.gpu_layers = layers;
        self
    }

    pub fn word_wrap(mut self, wrap: bool) -> Self {
        self.config.word_wrap = wrap;
        self
    }

    pub fn chat_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.chat_options.insert(key.into(), value);
        self
    }

    pub fn build(self) -> ChatConfig {
        self.config
    }
}
