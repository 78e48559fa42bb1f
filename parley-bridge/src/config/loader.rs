//! Configuration loader

use std::path::Path;

use parley_utils::{config_file, ParleyError, Result};

use super::BridgeConfig;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<BridgeConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(BridgeConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<BridgeConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| ParleyError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<BridgeConfig> {
        toml::from_str(content).map_err(|e| ParleyError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &BridgeConfig) -> Result<()> {
        if config.server.request_timeout_ms == 0 {
            return Err(ParleyError::config("request_timeout_ms must be greater than 0"));
        }

        if config.reconnect.enabled && config.reconnect.max_attempts == 0 {
            return Err(ParleyError::config(
                "max_attempts must be at least 1 when reconnect is enabled",
            ));
        }

        if config.reconnect.base_delay_ms == 0 {
            return Err(ParleyError::config("base_delay_ms must be greater than 0"));
        }

        if config.rooms.window_capacity == 0 {
            return Err(ParleyError::config("window_capacity must be at least 1"));
        }

        if config.agent.context_messages > config.rooms.window_capacity {
            return Err(ParleyError::config(
                "context_messages cannot exceed window_capacity",
            ));
        }

        if config.agent.mention.trim().is_empty() || config.agent.command_prefix.trim().is_empty() {
            return Err(ParleyError::config("agent mention and command_prefix must not be empty"));
        }

        if config.agent.name == config.agent.system_sender {
            return Err(ParleyError::config("agent name and system_sender must differ"));
        }

        if let Some(auth) = &config.server.auth {
            if auth.username.trim().is_empty() {
                return Err(ParleyError::config("server.auth.username must not be empty"));
            }
        }

        Ok(())
    }

    /// Load and validate
    pub fn load_and_validate() -> Result<BridgeConfig> {
        let config = Self::load()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load and validate a specific file
    pub fn load_and_validate_path(path: &Path) -> Result<BridgeConfig> {
        let config = Self::load_from_path(path)?;
        Self::validate(&config)?;
        Ok(config)
    }
}
