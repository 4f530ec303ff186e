//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder replaced by the channel name in the relay URL
pub const CHANNEL_PLACEHOLDER: &str = "{channel}";

/// Upstream relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// WebSocket URL of the live-event relay.
    /// `{channel}` is replaced with the requested channel name.
    pub relay_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            relay_url: format!("ws://127.0.0.1:8081/live/{}", CHANNEL_PLACEHOLDER),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Address the dashboard WebSocket gateway listens on
    pub bind_address: String,

    /// Messages queued per dashboard client before it is considered stalled
    pub client_queue_capacity: usize,

    /// Channel to connect to at startup (None = wait for a dashboard request)
    pub default_channel: Option<String>,

    /// Upstream relay configuration
    pub upstream: UpstreamConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            bind_address: "0.0.0.0:3000".to_string(),
            client_queue_capacity: livedash_broadcaster::client::DEFAULT_QUEUE_CAPACITY,
            default_channel: None,
            upstream: UpstreamConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config_path = path.as_ref().to_path_buf();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .context("Failed to parse config file")?;

            config.config_path = config_path;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save()
                .context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.client_queue_capacity == 0 {
            anyhow::bail!("client_queue_capacity must be at least 1");
        }
        if !self.upstream.relay_url.contains(CHANNEL_PLACEHOLDER) {
            anyhow::bail!(
                "upstream.relay_url must contain {} (got {})",
                CHANNEL_PLACEHOLDER,
                self.upstream.relay_url
            );
        }
        Ok(())
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("livedash")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = DaemonConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.config_path, path);

        let reloaded = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bind_address = \"127.0.0.1:4000\"\ndefault_channel = \"alice\"\n").unwrap();

        let config = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:4000");
        assert_eq!(config.default_channel.as_deref(), Some("alice"));
        assert_eq!(config.client_queue_capacity, 256);
        assert_eq!(config.upstream, UpstreamConfig::default());
    }

    #[test]
    fn test_relay_url_needs_placeholder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[upstream]\nrelay_url = \"ws://relay/fixed\"\n").unwrap();

        let err = DaemonConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("{channel}"));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let config = DaemonConfig {
            client_queue_capacity: 0,
            ..DaemonConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
