//! Local model file management.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::LocalAIError;
use crate::paths::models_dir;

/// Name shown for models whose path does not identify a GGUF file.
pub const FALLBACK_MODEL_NAME: &str = "Llama.cpp chatbot";

/// Derive a display name for a model path.
///
/// `.gguf` files (any case) are named after their file stem.
pub fn display_name(path: &Path) -> String {
    let is_gguf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gguf"))
        .unwrap_or(false);

    if is_gguf {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            return stem.to_string();
        }
    }
    FALLBACK_MODEL_NAME.to_string()
}

fn has_gguf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gguf"))
        .unwrap_or(false)
}

/// Manager for the `.gguf` files in the models directory.
pub struct ModelManager {
    dir: PathBuf,
}

impl ModelManager {
    /// Create a manager over the default models directory.
    pub fn new() -> Self {
        Self::with_dir(models_dir())
    }

    /// Create a manager over a custom directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this manager looks in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List all installed models by file stem, sorted.
    pub fn list_installed(&self) -> Result<Vec<String>, LocalAIError> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut models: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_gguf_extension(path))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .collect();

        models.sort();
        Ok(models)
    }

    /// Check if a model is installed.
    pub fn is_installed(&self, filename: &str) -> bool {
        self.dir.join(filename).is_file()
    }

    /// Get the path to an installed model.
    pub fn get_model_path(&self, filename: &str) -> Option<PathBuf> {
        let path = self.dir.join(filename);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    /// Resolve what the user typed into a model file.
    ///
    /// Tried in order: an existing file path, `<models>/<spec>`,
    /// `<models>/<spec>.gguf`.
    pub fn resolve(&self, spec: &str) -> Result<PathBuf, LocalAIError> {
        let direct = Path::new(spec);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        if let Some(path) = self.get_model_path(spec) {
            return Ok(path);
        }

        if let Some(path) = self.get_model_path(&format!("{}.gguf", spec)) {
            return Ok(path);
        }

        Err(LocalAIError::ModelNotFound(spec.to_string()))
    }

    /// Install a model from a local file path.
    pub fn install_from_path(&self, source: &Path) -> Result<PathBuf, LocalAIError> {
        if !source.is_file() {
            return Err(LocalAIError::ModelNotFound(source.display().to_string()));
        }
        if !has_gguf_extension(source) {
            return Err(LocalAIError::NotAModel(source.display().to_string()));
        }

        let filename = source
            .file_name()
            .ok_or_else(|| LocalAIError::ModelNotFound("Invalid path".to_string()))?;

        fs::create_dir_all(&self.dir)?;
        let dest_path = self.dir.join(filename);

        if source == dest_path {
            // Already in the right place
            return Ok(dest_path);
        }

        info!("Installing model from {:?} to {:?}", source, dest_path);
        fs::copy(source, &dest_path)?;

        Ok(dest_path)
    }

    /// Remove an installed model. The `.gguf` extension is optional.
    pub fn remove(&self, name: &str) -> Result<bool, LocalAIError> {
        let candidates = [name.to_string(), format!("{}.gguf", name)];
        for candidate in &candidates {
            let path = self.dir.join(candidate);
            if path.is_file() {
                fs::remove_file(&path)?;
                info!("Removed model: {}", candidate);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}
