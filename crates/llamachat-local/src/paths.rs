//! Path utilities for llamachat data directories.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory.
pub const HOME_ENV: &str = "LLAMACHAT_HOME";

/// Get the llamachat data directory ($LLAMACHAT_HOME or ~/.llamachat/).
pub fn data_dir() -> PathBuf {
    data_dir_from(std::env::var_os(HOME_ENV), dirs::home_dir())
}

fn data_dir_from(override_dir: Option<OsString>, home: Option<PathBuf>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => home.unwrap_or_else(|| PathBuf::from(".")).join(".llamachat"),
    }
}

/// Get the models directory (~/.llamachat/models/).
pub fn models_dir() -> PathBuf {
    data_dir().join("models")
}

/// Get the bin directory (~/.llamachat/bin/).
pub fn bin_dir() -> PathBuf {
    data_dir().join("bin")
}

/// Get the history directory (~/.llamachat/history/).
pub fn history_dir() -> PathBuf {
    data_dir().join("history")
}

/// Line-editor history file for the chat prompt.
pub fn history_file() -> PathBuf {
    history_dir().join("chat")
}

/// User configuration file.
pub fn config_file() -> PathBuf {
    data_dir().join("config.toml")
}

fn server_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "llama-server.exe"
    } else {
        "llama-server"
    }
}

/// Get the path to the llama-server binary.
///
/// A binary in the private bin directory wins over one found on `PATH`.
/// When neither exists the private path is returned so callers can report it.
pub fn llama_server_path() -> PathBuf {
    resolve_server_binary(&bin_dir(), std::env::var_os("PATH"))
}

fn resolve_server_binary(bin_dir: &Path, search_path: Option<OsString>) -> PathBuf {
    let private = bin_dir.join(server_binary_name());
    if private.is_file() {
        return private;
    }
    search_path
        .and_then(|path| find_on_path(&path, server_binary_name()))
        .unwrap_or(private)
}

fn find_on_path(path: &OsString, binary: &str) -> Option<PathBuf> {
    std::env::split_paths(path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Get the path to a model file.
pub fn model_path(filename: &str) -> PathBuf {
    models_dir().join(filename)
}

/// Ensure the llamachat data directories exist.
pub fn ensure_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(data_dir())?;
    std::fs::create_dir_all(models_dir())?;
    std::fs::create_dir_all(bin_dir())?;
    std::fs::create_dir_all(history_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_data_dir() {
        let root = data_dir();
        assert_eq!(models_dir(), root.join("models"));
        assert_eq!(history_file(), root.join("history").join("chat"));
        assert_eq!(config_file(), root.join("config.toml"));
        assert_eq!(model_path("a.gguf"), root.join("models").join("a.gguf"));
    }

    #[test]
    fn test_missing_binary_on_path() {
        let path = std::env::var_os("PATH").unwrap_or_default();
        assert!(find_on_path(&path, "llamachat-no-such-binary-xyz").is_none());
    }

    #[test]
    fn test_home_override() {
        assert_eq!(
            data_dir_from(Some("/srv/llamachat".into()), Some("/home/me".into())),
            PathBuf::from("/srv/llamachat")
        );
        assert_eq!(
            data_dir_from(None, Some("/home/me".into())),
            PathBuf::from("/home/me/.llamachat")
        );
        // An empty override is ignored.
        assert_eq!(
            data_dir_from(Some(OsString::new()), Some("/home/me".into())),
            PathBuf::from("/home/me/.llamachat")
        );
        assert_eq!(data_dir_from(None, None), PathBuf::from("./.llamachat"));
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    fn search_path(dirs: &[&Path]) -> Option<OsString> {
        Some(std::env::join_paths(dirs).unwrap())
    }

    #[test]
    fn test_private_binary_wins_over_path() {
        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        touch(&second.join(server_binary_name()));

        // Only the second PATH entry has it.
        assert_eq!(
            resolve_server_binary(&bin, search_path(&[&first, &second])),
            second.join(server_binary_name())
        );

        // PATH order is respected.
        touch(&first.join(server_binary_name()));
        assert_eq!(
            resolve_server_binary(&bin, search_path(&[&first, &second])),
            first.join(server_binary_name())
        );

        // The private copy beats both.
        touch(&bin.join(server_binary_name()));
        assert_eq!(
            resolve_server_binary(&bin, search_path(&[&first, &second])),
            bin.join(server_binary_name())
        );
    }

    #[test]
    fn test_missing_binary_reports_private_path() {
        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        assert_eq!(
            resolve_server_binary(&bin, search_path(&[temp.path()])),
            bin.join(server_binary_name())
        );
        assert_eq!(resolve_server_binary(&bin, None), bin.join(server_binary_name()));
    }
}
