//! Connecting to llama-server and running one generation.

use llamachat_core::{
    display_name, generate_reply, ChatConfig, ChatError, ChatSession, LlamaCppClient,
    LlamaCppServer, ModelManager, NoKeys, Reply, TerminalKeys, WordWrapper, FALLBACK_MODEL_NAME,
};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, info};

/// A ready llama-server, owned or external.
pub(crate) struct Backend {
    pub(crate) name: String,
    client: LlamaCppClient,
    // Dropping the server stops the child process.
    _server: Option<LlamaCppServer>,
}

impl Backend {
    /// Attach to `server_url`, or start llama-server for the configured model.
    ///
    /// Ctrl+C while the model loads drops the half-started server, which
    /// stops the child before the error is returned.
    pub(crate) async fn connect(config: &ChatConfig) -> miette::Result<Self> {
        tokio::select! {
            backend = Self::start(config) => backend,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted while starting llama-server");
                Err(miette::miette!("Interrupted"))
            }
        }
    }

    async fn start(config: &ChatConfig) -> miette::Result<Self> {
        let models = ModelManager::new();

        if let Some(url) = &config.server_url {
            let client = LlamaCppClient::with_url(url.as_str());
            client
                .check_health()
                .await
                .map_err(|e| miette::miette!("{}", e))?;

            let name = config.name.clone().unwrap_or_else(|| {
                models
                    .resolve(&config.model)
                    .map(|path| display_name(&path))
                    .unwrap_or_else(|_| FALLBACK_MODEL_NAME.to_string())
            });
            info!("Using llama-server at {}", client.base_url());

            return Ok(Self {
                name,
                client,
                _server: None,
            });
        }

        let model = models
            .resolve(&config.model)
            .map_err(|e| miette::miette!("{}", e))?;
        let name = config.name.clone().unwrap_or_else(|| display_name(&model));

        let mut server = LlamaCppServer::new(&model)
            .with_port(config.port)
            .with_ctx_size(config.ctx_size)
            .with_batch_size(config.batch_size)
            .with_gpu_layers(config.gpu_layers)
            .with_chat_template(config.chat_template.as_str())
            .with_extra_args(config.server_args.clone());

        server.start().map_err(|e| miette::miette!("{}", e))?;

        println!("Loading {} ...", name);
        server
            .wait_ready(Duration::from_secs(config.startup_timeout_secs))
            .await
            .map_err(|e| miette::miette!("{}", e))?;

        Ok(Self {
            name,
            client: server.client(),
            _server: Some(server),
        })
    }

    /// Stream the model's answer to the current history onto stdout.
    ///
    /// Ctrl+Q, Ctrl+Z, Ctrl+C or Esc stops the reply when stdin is a terminal.
    pub(crate) async fn generate(
        &self,
        session: &ChatSession,
        config: &ChatConfig,
    ) -> Result<Reply, ChatError> {
        let request = session.request(config.temperature, config.max_tokens, &config.chat_options);
        let mut stdout = io::stdout();

        // Listen for stop keys before sending, so a slow prompt evaluation
        // can be interrupted too.
        let keys = TerminalKeys::new();
        let start = async { Ok::<_, ChatError>(self.client.chat_stream(&request).await?) };

        let reply = match keys {
            Ok(keys) => {
                let wrapper = if config.word_wrap {
                    WordWrapper::for_terminal()
                } else {
                    WordWrapper::new(0).with_line_ending("\r\n")
                };
                generate_reply(start, &mut stdout, wrapper, keys).await?
            }
            Err(e) => {
                debug!("Not a terminal ({}), replies cannot be interrupted", e);
                generate_reply(start, &mut stdout, WordWrapper::new(0), NoKeys).await?
            }
        };

        if reply.cancelled {
            print!("\n[stopped]");
        }
        println!();
        stdout.flush()?;

        Ok(reply)
    }
}
