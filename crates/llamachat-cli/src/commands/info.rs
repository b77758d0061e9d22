//! Info command - show paths, models and the effective configuration.

use llamachat_core::{paths, ChatConfig, ModelManager};

pub(crate) fn run(config: &ChatConfig) -> miette::Result<()> {
    println!("llamachat {}", env!("CARGO_PKG_VERSION"));
    println!("==============");
    println!();
    println!("Data directory:   {}", paths::data_dir().display());
    println!("Models directory: {}", paths::models_dir().display());
    println!("History file:     {}", paths::history_file().display());
    println!(
        "Config file:      {} (exists: {})",
        paths::config_file().display(),
        paths::config_file().exists()
    );
    println!();

    let server = paths::llama_server_path();
    println!("Server binary:    {}", server.display());
    println!("  Exists: {}", server.exists());
    println!();

    let manager = ModelManager::new();
    match manager.resolve(&config.model) {
        Ok(path) => println!("Model:            {}", path.display()),
        Err(_) => println!("Model:            {} (not installed)", config.model),
    }
    let installed = manager
        .list_installed()
        .map_err(|e| miette::miette!("Failed to list models: {}", e))?;
    println!("Installed models: {}", installed.len());
    println!();

    println!("Effective configuration:");
    let rendered = config
        .to_toml()
        .map_err(|e| miette::miette!("Failed to render config: {}", e))?;
    for line in rendered.lines() {
        println!("  {}", line);
    }

    Ok(())
}
