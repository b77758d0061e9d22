//! Process manager for llama-server.

use std::ffi::OsString;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::LlamaCppClient;
use crate::error::LocalAIError;
use crate::paths::llama_server_path;
use crate::{DEFAULT_CHAT_TEMPLATE, DEFAULT_PORT};

/// Manager for the llama-server process.
pub struct LlamaCppServer {
    binary: PathBuf,
    model: PathBuf,
    port: u16,
    ctx_size: u32,
    batch_size: u32,
    gpu_layers: u32,
    chat_template: String,
    extra_args: Vec<String>,
    process: Option<Child>,
}

impl LlamaCppServer {
    /// Create a new server manager for a model file with default settings.
    pub fn new(model: impl Into<PathBuf>) -> Self {
        Self {
            binary: llama_server_path(),
            model: model.into(),
            port: DEFAULT_PORT,
            ctx_size: 4096,
            batch_size: 512,
            gpu_layers: 0,
            chat_template: DEFAULT_CHAT_TEMPLATE.to_string(),
            extra_args: Vec::new(),
            process: None,
        }
    }

    /// Use a specific llama-server binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set a custom port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Context window in tokens.
    pub fn with_ctx_size(mut self, ctx_size: u32) -> Self {
        self.ctx_size = ctx_size;
        self
    }

    /// Prompt-processing batch size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Number of layers to offload to the GPU.
    pub fn with_gpu_layers(mut self, gpu_layers: u32) -> Self {
        self.gpu_layers = gpu_layers;
        self
    }

    pub fn with_chat_template(mut self, template: impl Into<String>) -> Self {
        self.chat_template = template.into();
        self
    }

    /// Extra command-line arguments appended verbatim.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Get the port this server is configured to use.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check if the server binary exists.
    pub fn binary_exists(&self) -> bool {
        self.binary.is_file()
    }

    /// Check if the model file exists.
    pub fn model_exists(&self) -> bool {
        self.model.is_file()
    }

    /// Arguments passed to llama-server.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--model".into(),
            self.model.clone().into(),
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            self.port.to_string().into(),
            "--ctx-size".into(),
            self.ctx_size.to_string().into(),
            "--batch-size".into(),
            self.batch_size.to_string().into(),
            "--n-gpu-layers".into(),
            self.gpu_layers.to_string().into(),
        ];
        if !self.chat_template.is_empty() {
            args.push("--chat-template".into());
            args.push(self.chat_template.clone().into());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }

    /// Start the llama-server process.
    pub fn start(&mut self) -> Result<(), LocalAIError> {
        // Check prerequisites
        if !self.binary_exists() {
            return Err(LocalAIError::ServerBinaryNotFound(
                self.binary.display().to_string(),
            ));
        }

        if !self.model_exists() {
            return Err(LocalAIError::ModelNotFound(
                self.model.display().to_string(),
            ));
        }

        if port_in_use(self.port) {
            return Err(LocalAIError::PortInUse(self.port));
        }

        info!(
            "Starting llama-server on port {} with model {}",
            self.port,
            self.model.display()
        );

        let child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LocalAIError::ServerStartFailed(e.to_string()))?;

        debug!("llama-server process started with PID: {}", child.id());
        self.process = Some(child);

        Ok(())
    }

    /// Wait for the server to become ready.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), LocalAIError> {
        let client = self.client();
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(500);

        info!("Waiting for llama-server to become ready...");

        while start.elapsed() < timeout {
            // A healthy answer only counts while our own child is alive.
            self.check_alive()?;
            match client.check_health().await {
                Ok(()) => {
                    self.check_alive()?;
                    info!("llama-server is ready");
                    return Ok(());
                }
                Err(e) => {
                    debug!("Server not ready yet: {}", e);
                    sleep(check_interval).await;
                }
            }
        }

        Err(LocalAIError::ServerStartTimeout)
    }

    fn check_alive(&mut self) -> Result<(), LocalAIError> {
        if let Some(ref mut child) = self.process {
            if let Ok(Some(status)) = child.try_wait() {
                self.process = None;
                return Err(LocalAIError::ServerDied(status.to_string()));
            }
        }
        Ok(())
    }

    /// Stop the server process.
    pub fn stop(&mut self) -> Result<(), LocalAIError> {
        if let Some(mut child) = self.process.take() {
            info!("Stopping llama-server (PID: {})", child.id());

            // Try graceful shutdown first
            #[cfg(unix)]
            {
                unsafe {
                    libc::kill(child.id() as i32, libc::SIGTERM);
                }
                std::thread::sleep(Duration::from_millis(500));
            }

            // Force kill if still running
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Server exited with status: {:?}", status);
                }
                Ok(None) => {
                    warn!("Server didn't exit gracefully, killing...");
                    let _ = child.kill();
                    let _ = child.wait();
                }
                Err(e) => {
                    warn!("Error checking server status: {}", e);
                    let _ = child.kill();
                }
            }
        }
        Ok(())
    }

    /// Check if the server process is running.
    pub fn is_running(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            match child.try_wait() {
                Ok(Some(_)) => {
                    self.process = None;
                    false
                }
                Ok(None) => true,
                Err(_) => false,
            }
        } else {
            false
        }
    }

    /// Get a client connected to this server.
    pub fn client(&self) -> LlamaCppClient {
        LlamaCppClient::with_port(self.port)
    }
}

/// Whether something already accepts connections on the local port.
fn port_in_use(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok()
}

impl Drop for LlamaCppServer {
    fn drop(&mut self) {
        if self.process.is_some() {
            let _ = self.stop();
        }
    }
}
