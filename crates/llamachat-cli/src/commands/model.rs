//! Model management commands.

use llamachat_core::{paths, ModelManager};
use std::path::Path;

/// List installed models.
pub(crate) fn list() -> miette::Result<()> {
    let manager = ModelManager::new();
    let models = manager
        .list_installed()
        .map_err(|e| miette::miette!("Failed to list models: {}", e))?;

    if models.is_empty() {
        println!("No models installed.");
        println!();
        println!("To install a model, run:");
        println!("  llamachat model add <path/to/model.gguf>");
        return Ok(());
    }

    println!("Installed models:");
    for model in models {
        println!("  - {}", model);
    }

    println!();
    println!("Models directory: {}", manager.dir().display());

    Ok(())
}

/// Copy a local .gguf file into the models directory.
pub(crate) fn add(source: &Path) -> miette::Result<()> {
    paths::ensure_dirs()
        .map_err(|e| miette::miette!("Failed to create data directories: {}", e))?;

    println!("Installing model from: {}", source.display());
    let dest = ModelManager::new()
        .install_from_path(source)
        .map_err(|e| miette::miette!("Failed to install model: {}", e))?;

    println!("Model installed to: {}", dest.display());
    Ok(())
}

/// Delete an installed model.
pub(crate) fn remove(name: &str) -> miette::Result<()> {
    let removed = ModelManager::new()
        .remove(name)
        .map_err(|e| miette::miette!("Failed to remove model: {}", e))?;

    if removed {
        println!("Removed model: {}", name);
    } else {
        println!("Model '{}' is not installed.", name);
    }
    Ok(())
}
