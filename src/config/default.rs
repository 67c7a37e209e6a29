//! Default configuration template and file creation utilities.
//!
//! Provides a commented TOML template that matches `Config::default()`
//! and functions to write it to the XDG config path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::error::ConfigError;
use crate::config::xdg;

/// A commented TOML template with all default values.
///
/// Every value here must match `Config::default()` from `schema.rs`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# batsd client configuration
#
# All values shown below are the built-in defaults.
# Command-line flags override anything set here.
#
# Location: $XDG_CONFIG_HOME/batsd/config.toml

# ==============================================================================
# Server
# ==============================================================================

[server]

# Hostname or IP address of the batsd server.
host = "127.0.0.1"

# TCP port batsd listens on.
port = 8127

# Deadline in milliseconds for sending one command and reading its reply.
timeout_ms = 2000

# Retries after the first try. Applies to failed commands and to range
# queries whose reply lacks the requested metric. 0 disables retries.
max_attempts = 2

# ==============================================================================
# Logging
# ==============================================================================

[log]

# Verbosity of diagnostics written to stderr.
# Options: "error", "warn", "info", "debug", "trace"
# The BATSD_LOG environment variable takes precedence.
level = "warn"
"#;

/// Creates (or force-overwrites) the default config file at the XDG path.
///
/// See [`create_default_config_at`].
pub fn create_default_config(force: bool) -> Result<PathBuf, ConfigError> {
    let path = xdg::config_path();
    create_default_config_at(&path, force)?;
    Ok(path)
}

/// Creates (or force-overwrites) a default config file at `path`.
///
/// - If the file exists and `force` is `false`, returns `ConfigError::AlreadyExists`.
/// - If the file exists and `force` is `true`, backs it up to `.toml.backup` first.
pub fn create_default_config_at(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() {
        if !force {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        let backup_path = path.with_extension("toml.backup");
        fs::rename(path, &backup_path).map_err(|e| ConfigError::WriteError {
            path: backup_path.clone(),
            source: e,
        })?;
        tracing::info!("Backed up existing config to {}", backup_path.display());
    }

    write_default_config(path)?;
    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

/// Writes the template to `path`, creating parent dirs and setting 0600 permissions.
fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let write_error = |e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        xdg::ensure_dir(parent).map_err(write_error)?;
    }

    fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(write_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(write_error)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::ConfigLoader;
    use crate::config::schema::Config;

    #[test]
    fn template_parses_to_valid_config() {
        let result: Result<Config, _> = toml::from_str(DEFAULT_CONFIG_TEMPLATE);
        assert!(result.is_ok(), "template should parse: {:?}", result.err());
    }

    #[test]
    fn template_values_match_config_default() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).expect("should parse");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn template_contains_all_section_headers() {
        assert!(DEFAULT_CONFIG_TEMPLATE.contains("[server]"));
        assert!(DEFAULT_CONFIG_TEMPLATE.contains("[log]"));
    }

    #[test]
    fn create_writes_loadable_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("nested").join("config.toml");

        create_default_config_at(&path, false).expect("should create");

        let config = ConfigLoader::load_from_path(&path).expect("should load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn create_without_force_returns_already_exists() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "# mine\n").expect("write");

        let err = create_default_config_at(&path, false).expect_err("should refuse");
        assert!(matches!(err, ConfigError::AlreadyExists { .. }));
        assert_eq!(fs::read_to_string(&path).expect("read"), "# mine\n");
    }

    #[test]
    fn create_with_force_creates_backup() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "# mine\n").expect("write");

        create_default_config_at(&path, true).expect("should overwrite");

        let backup = tmp.path().join("config.toml.backup");
        assert_eq!(fs::read_to_string(backup).expect("backup"), "# mine\n");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            DEFAULT_CONFIG_TEMPLATE
        );
    }

    #[test]
    #[cfg(unix)]
    fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("config.toml");
        create_default_config_at(&path, false).expect("should create");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
