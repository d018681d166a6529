//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use torbit_broadcaster::{BridgeConfig, CoordinatorConfig, NamePolicy};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Host must not be empty for tcp")]
    EmptyHost,
}

/// Listening transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Unix,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    /// Telnet port by default
    pub port: u16,

    pub protocol: Protocol,

    /// Only used when `protocol = "unix"`
    pub socket_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 23,
            protocol: Protocol::Tcp,
            socket_path: torbit_paths::default_socket_path(),
        }
    }
}

/// Chat behaviour tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Per-participant mailbox size; overflow is dropped
    pub outbound_capacity: usize,

    /// Inbound queue size before submitting connections wait
    pub inbound_capacity: usize,

    /// Longest accepted input line in bytes
    pub max_line_length: usize,

    pub name_policy: NamePolicy,

    /// Send a participant's own lines back to them
    pub echo_to_sender: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 10,
            inbound_capacity: 64,
            max_line_length: 64 * 1024,
            name_policy: NamePolicy::LastWriterWins,
            echo_to_sender: true,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Display name used for join/leave announcements
    pub chat_bot: String,

    pub room_label: String,

    /// Prompt sent before the username is read
    pub greeting: String,

    /// Append-only JSON audit log of delivered messages
    pub log_file_location: PathBuf,

    pub server: ServerConfig,

    pub chat: ChatConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let bridge = BridgeConfig::default();
        let coordinator = CoordinatorConfig::default();

        Self {
            config_path: torbit_paths::default_config_path(),
            chat_bot: coordinator.bot_name,
            room_label: coordinator.room_label,
            greeting: bridge.greeting,
            log_file_location: torbit_paths::default_log_path(),
            server: ServerConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(&torbit_paths::default_config_path())
    }

    /// Load configuration from `path`; a missing file is created with defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            toml::from_str::<DaemonConfig>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            let mut config = Self::default();
            config.config_path = path.to_path_buf();
            config.save().context("Failed to save default config")?;
            config
        };

        config.config_path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                torbit_paths::ensure_dir(parent).context("Failed to create config directory")?;
            }
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject values the chat core cannot run with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.chat.outbound_capacity == 0 {
            return Err(ConfigError::ZeroValue("chat.outbound_capacity"));
        }
        if self.chat.inbound_capacity == 0 {
            return Err(ConfigError::ZeroValue("chat.inbound_capacity"));
        }
        if self.chat.max_line_length == 0 {
            return Err(ConfigError::ZeroValue("chat.max_line_length"));
        }
        if self.server.protocol == Protocol::Tcp && self.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        Ok(())
    }

    /// `host:port` for the tcp listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            bot_name: self.chat_bot.clone(),
            room_label: self.room_label.clone(),
            inbound_capacity: self.chat.inbound_capacity,
            name_policy: self.chat.name_policy,
            echo_to_sender: self.chat.echo_to_sender,
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            greeting: self.greeting.clone(),
            outbound_capacity: self.chat.outbound_capacity,
            max_line_length: self.chat.max_line_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let config = DaemonConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path, path);
        assert_eq!(config.server.port, 23);
        assert_eq!(config.chat_bot, "TorbitBot");

        // written defaults load back identically
        let reloaded = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.room_label, config.room_label);
        assert_eq!(reloaded.chat.outbound_capacity, 10);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_the_rest() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
chat_bot = "Herald"
room_label = "Lobby"

[server]
port = 2323

[chat]
name_policy = "reject"
echo_to_sender = false
"#,
        )
        .unwrap();

        let config = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.listen_address(), "0.0.0.0:2323");
        assert_eq!(config.server.protocol, Protocol::Tcp);

        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.bot_name, "Herald");
        assert_eq!(coordinator.room_label, "Lobby");
        assert_eq!(coordinator.name_policy, NamePolicy::Reject);
        assert!(!coordinator.echo_to_sender);

        let bridge = config.bridge_config();
        assert_eq!(bridge.outbound_capacity, 10);
    }

    #[test]
    fn test_unix_protocol_parses() {
        let config: DaemonConfig = toml::from_str(
            r#"
[server]
protocol = "unix"
socket_path = "/tmp/torbit-test.sock"
"#,
        )
        .unwrap();
        assert_eq!(config.server.protocol, Protocol::Unix);
        assert_eq!(config.server.socket_path, PathBuf::from("/tmp/torbit-test.sock"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = DaemonConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut config = DaemonConfig::default();
        config.chat.outbound_capacity = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroValue("chat.outbound_capacity"))
        );

        let mut config = DaemonConfig::default();
        config.server.host = " ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptyHost));
    }
}
