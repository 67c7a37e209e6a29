//! Platform-aware path resolution for the batsd client.
//!
//! - Linux: `$XDG_CONFIG_HOME/batsd` or `~/.config/batsd`
//! - macOS: `$XDG_CONFIG_HOME/batsd` or `~/Library/Application Support/batsd`

use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "batsd";

/// Returns the configuration directory.
///
/// `$XDG_CONFIG_HOME` wins when set and non-empty, on any platform.
pub fn config_dir() -> PathBuf {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join(APP_NAME),
        _ => platform_config_dir().join(APP_NAME),
    }
}

fn platform_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::home_dir()
            .map(|home| home.join(".config"))
            .unwrap_or_else(|| PathBuf::from(".config"))
    }
}

/// Returns the path to the configuration file, `config_dir()/config.toml`.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a leading `~`, or when no home directory is known, are
/// returned as-is.
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = match dirs::home_dir() {
        Some(home) => home,
        None => return PathBuf::from(path),
    };
    if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else if path == "~" {
        home
    } else {
        PathBuf::from(path)
    }
}

/// Creates a directory and all parents with mode 0700.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
