//! llamachat CLI - chat with a local llama.cpp model in the terminal.

use clap::{Args, Parser, Subcommand};
use llamachat_core::ChatConfig;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

mod backend;
mod commands;

/// llamachat - stream replies from a local llama.cpp model
#[derive(Parser)]
#[command(name = "llamachat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.llamachat/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model file path or name in the models directory
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Use a running llama-server instead of starting one
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Maximum output tokens per reply
    #[arg(short = 'o', long = "outputtokens", global = true)]
    output_tokens: Option<String>,

    /// Sampling temperature
    #[arg(short, long, global = true)]
    temperature: Option<String>,

    #[command(flatten)]
    chat: ChatArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ChatArgs {
    /// Default entry, sent as the first message
    prompt: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and exit
    Ask {
        /// The message to send
        message: String,
    },

    /// Manage installed models
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Show paths, installed models and the effective configuration
    Info,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// List installed models
    List,
    /// Copy a .gguf file into the models directory
    Add {
        /// Path to the model file
        path: PathBuf,
    },
    /// Delete an installed model
    Remove {
        /// Model name (with or without .gguf)
        name: String,
    },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    match &cli.command {
        Some(Commands::Model { action }) => match action {
            ModelAction::List => commands::model::list(),
            ModelAction::Add { path } => commands::model::add(path),
            ModelAction::Remove { name } => commands::model::remove(name),
        },
        Some(Commands::Init { force }) => commands::init::run(cli.config.as_deref(), *force),
        Some(Commands::Info) => commands::info::run(&settings(&cli)?),
        Some(Commands::Ask { message }) => {
            let config = settings(&cli)?;
            runtime()?.block_on(commands::ask::run(&config, message))
        }
        None => {
            let config = settings(&cli)?;
            runtime()?.block_on(commands::chat::run(config, cli.chat.prompt.as_deref()))
        }
    }
}

fn runtime() -> miette::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| miette::miette!("Failed to start runtime: {}", e))
}

/// Config file and environment, then command-line flags.
fn settings(cli: &Cli) -> miette::Result<ChatConfig> {
    settings_with_env(cli, |key| std::env::var(key).ok())
}

fn settings_with_env(
    cli: &Cli,
    lookup: impl Fn(&str) -> Option<String>,
) -> miette::Result<ChatConfig> {
    let mut config = ChatConfig::load_with_env(cli.config.as_deref(), lookup)
        .map_err(|e| miette::miette!("Failed to load config: {}", e))?;

    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(url) = &cli.server_url {
        config.server_url = Some(url.clone());
    }
    config.max_tokens = parse_or(cli.output_tokens.as_deref(), config.max_tokens, "outputtokens");
    config.temperature = parse_or(cli.temperature.as_deref(), config.temperature, "temperature");

    Ok(config)
}

/// Parse a flag value, keeping `default` when it is blank or invalid.
fn parse_or<T: FromStr>(raw: Option<&str>, default: T, flag: &str) -> T {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return default,
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!("Invalid --{} value {:?}, using default", flag, raw);
            default
        }
    }
}
