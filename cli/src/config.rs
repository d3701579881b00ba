// Configuration management for the onionmesh CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/onionmesh/config.json
// - Linux: ~/.config/onionmesh/config.json
// - Windows: %APPDATA%\onionmesh\config.json

use anyhow::{Context, Result};
use onionmesh_core::{PortLayout, CIRCUIT_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host every service binds to and dials
    pub host: String,

    /// Port of the node registry
    pub registry_port: u16,

    /// Router `n` listens on `router_base_port + n`
    pub router_base_port: u16,

    /// User `n` listens on `user_base_port + n`
    pub user_base_port: u16,

    /// Relays per circuit
    pub circuit_length: usize,

    /// Default tracing filter, overridden by RUST_LOG
    pub log_filter: String,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let layout = PortLayout::default();
        Self {
            host: "127.0.0.1".to_string(),
            registry_port: layout.registry_port,
            router_base_port: layout.router_base_port,
            user_base_port: layout.user_base_port,
            circuit_length: CIRCUIT_LENGTH,
            log_filter: "info".to_string(),
            path: None,
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("onionmesh");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the platform location, or create default if not exists
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_file()?)
    }

    /// Load config from an explicit file, or create default if not exists
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            Config::default()
        };
        config.path = Some(path.to_path_buf());

        if !path.exists() {
            config.save()?;
        }
        Ok(config)
    }

    /// Where `save` writes
    pub fn path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Self::config_file(),
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let config_file = self.path()?;
        if let Some(parent) = config_file.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_file, contents).context("Failed to write config file")?;
        Ok(())
    }

    pub fn layout(&self) -> PortLayout {
        PortLayout {
            registry_port: self.registry_port,
            router_base_port: self.router_base_port,
            user_base_port: self.user_base_port,
        }
    }

    /// Set a config value
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "host" => {
                if value.is_empty() {
                    anyhow::bail!("Host cannot be empty");
                }
                self.host = value.to_string();
            }
            "registry_port" => {
                self.registry_port = value.parse().context("Invalid port number")?;
            }
            "router_base_port" => {
                self.router_base_port = value.parse().context("Invalid port number")?;
            }
            "user_base_port" => {
                self.user_base_port = value.parse().context("Invalid port number")?;
            }
            "circuit_length" => {
                let length: usize = value.parse().context("Invalid number")?;
                if length == 0 {
                    anyhow::bail!("Circuit length must be at least 1");
                }
                self.circuit_length = length;
            }
            "log_filter" => {
                self.log_filter = value.to_string();
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.save()?;
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "host" => Some(self.host.clone()),
            "registry_port" => Some(self.registry_port.to_string()),
            "router_base_port" => Some(self.router_base_port.to_string()),
            "user_base_port" => Some(self.user_base_port.to_string()),
            "circuit_length" => Some(self.circuit_length.to_string()),
            "log_filter" => Some(self.log_filter.clone()),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        [
            "host",
            "registry_port",
            "router_base_port",
            "user_base_port",
            "circuit_length",
            "log_filter",
        ]
        .into_iter()
        .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry_port, 8080);
        assert_eq!(config.router_base_port, 4000);
        assert_eq!(config.user_base_port, 5000);
        assert_eq!(config.circuit_length, 3);
        assert_eq!(config.layout(), PortLayout::default());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, Config::load_from(&path).unwrap());
    }

    #[test]
    fn test_set_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::load_from(&path).unwrap();
        config.set("router_base_port", "7000").unwrap();
        config.set("circuit_length", "4").unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.router_base_port, 7000);
        assert_eq!(reloaded.circuit_length, 4);
        assert_eq!(reloaded.layout().router(2).unwrap().value(), 7002);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from(dir.path().join("config.json")).unwrap();

        assert!(config.set("registry_port", "70000").is_err());
        assert!(config.set("circuit_length", "0").is_err());
        assert!(config.set("listen_port", "1").is_err());
        assert_eq!(config.registry_port, 8080);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "registry_port": 9000 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.registry_port, 9000);
        assert_eq!(config.user_base_port, 5000);
        assert_eq!(config.get("log_filter").as_deref(), Some("info"));
        assert_eq!(config.list().len(), 6);
    }
}
