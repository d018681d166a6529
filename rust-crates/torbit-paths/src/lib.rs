//! Cross-platform path utilities for Torbit Chat.
//!
//! Resolves where the daemon keeps its configuration, logs and Unix sockets.
//! Resolution never fails: when the platform directory is unknown the current
//! directory is used. Creation is a separate, fallible step ([`ensure_dir`]).
//!
//! # Platform Behavior
//!
//! | Platform | Config | Logs | Socket |
//! |----------|--------|------|--------|
//! | Linux    | `~/.config/torbit` | `~/.local/share/torbit/logs` | `$XDG_RUNTIME_DIR` or data dir |
//! | macOS    | `~/Library/Application Support/torbit` | `~/Library/Logs/torbit` | data dir |
//! | Windows  | `%APPDATA%/torbit` | `%APPDATA%/torbit/logs` | data dir |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// Errors specific to path operations.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Application identifier used in path construction.
const APP_NAME: &str = "torbit";

const CONFIG_FILE_NAME: &str = "config.toml";

const LOG_FILE_NAME: &str = "chat.log";

const SOCKET_NAME: &str = "torbit-chat.sock";

fn base_or_current(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from("."))
}

/// Application data directory.
pub fn data_dir() -> PathBuf {
    base_or_current(dirs::data_dir()).join(APP_NAME)
}

/// Configuration directory.
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        base_or_current(dirs::config_dir()).join(APP_NAME)
    }

    #[cfg(not(target_os = "linux"))]
    {
        // macOS and Windows: config lives with data
        data_dir()
    }
}

/// Log directory.
pub fn logs_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        base_or_current(dirs::home_dir())
            .join("Library")
            .join("Logs")
            .join(APP_NAME)
    }

    #[cfg(not(target_os = "macos"))]
    {
        data_dir().join("logs")
    }
}

/// Directory for Unix domain sockets.
pub fn socket_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(runtime_dir) = dirs::runtime_dir() {
            if runtime_dir.exists() {
                return runtime_dir;
            }
        }
    }

    data_dir()
}

/// Default location of `config.toml`.
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Default location of the message audit log.
pub fn default_log_path() -> PathBuf {
    logs_dir().join(LOG_FILE_NAME)
}

/// Default Unix socket path when the daemon listens on `unix`.
pub fn default_socket_path() -> PathBuf {
    socket_dir().join(SOCKET_NAME)
}

/// Create `path` (and parents) if missing.
///
/// Newly created directories get owner-only permissions (0o700) on Unix.
///
/// # Errors
/// Fails if `path` exists but is not a directory, or cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()).into());
        }
        return Ok(());
    }

    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Set secure Unix socket permissions.
///
/// Sets the socket to mode 0o600 (owner read/write only).
#[cfg(unix)]
pub fn secure_socket_permissions(socket_path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if socket_path.exists() {
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(socket_path, perms).with_context(|| {
            format!(
                "Failed to set socket permissions: {}",
                socket_path.display()
            )
        })?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn secure_socket_permissions(_socket_path: &Path) -> Result<()> {
    Ok(())
}
