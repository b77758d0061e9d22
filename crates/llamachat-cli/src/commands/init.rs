//! Init command - write a default configuration file.

use llamachat_core::{paths, ChatConfig};
use std::path::Path;

pub(crate) fn run(path: Option<&Path>, force: bool) -> miette::Result<()> {
    let default_path = paths::config_file();
    let path = path.unwrap_or(&default_path);

    if path.exists() && !force {
        println!("Configuration file '{}' already exists.", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    ChatConfig::default()
        .save(path)
        .map_err(|e| miette::miette!("Failed to write config: {}", e))?;

    println!("Created configuration file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("1. Add a model:  llamachat model add <path/to/model.gguf>");
    println!("2. Set `model` in {} to its name", path.display());
    println!("3. Run: llamachat");

    Ok(())
}
