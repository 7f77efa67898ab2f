//! Configuration module for roomrelay.

use serde::Deserialize;
use std::path::Path;

use crate::{RelayError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Close a WebSocket that sent nothing for this many seconds (0 = never).
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            idle_timeout_secs: 0,
        }
    }
}

/// Room configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Remove a room once its last member leaves.
    #[serde(default)]
    pub reap_empty: bool,
    /// Number of broadcast messages kept per room (0 = none).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    crate::chat::DEFAULT_HISTORY_LIMIT
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            reap_empty: false,
            history_limit: default_history_limit(),
        }
    }
}

/// Web frontend configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebConfig {
    /// CORS allowed origins (empty = any origin).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/roomrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Room configuration.
    #[serde(default)]
    pub rooms: RoomsConfig,
    /// Web frontend configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `ROOMRELAY_HOST`: bind address
    /// - `ROOMRELAY_PORT`: listen port (ignored unless it parses as a port number)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ROOMRELAY_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = std::env::var("ROOMRELAY_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid ROOMRELAY_PORT: {}", port),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(RelayError::Config("server.host must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.idle_timeout_secs, 0);

        assert!(!config.rooms.reap_empty);
        assert_eq!(config.rooms.history_limit, 100);

        assert!(config.web.cors_origins.is_empty());

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/roomrelay.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 8080
idle_timeout_secs = 600

[rooms]
reap_empty = true
history_limit = 25

[web]
cors_origins = ["http://localhost:3000", "http://localhost:5173"]

[logging]
level = "debug"
file = "custom/logs/app.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.idle_timeout_secs, 600);

        assert!(config.rooms.reap_empty);
        assert_eq!(config.rooms.history_limit, 25);

        assert_eq!(config.web.cors_origins.len(), 2);
        assert_eq!(config.web.cors_origins[1], "http://localhost:5173");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/app.log");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[server]
port = 4000

[rooms]
reap_empty = true
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.port, 4000);
        assert!(config.rooms.reap_empty);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.rooms.history_limit, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rooms.history_limit, 100);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(RelayError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 3131").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 3131);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(RelayError::Io(_))));
    }

    // Both env vars are exercised in one test so parallel tests cannot race on them.
    #[test]
    fn test_apply_env_overrides() {
        let original_host = std::env::var("ROOMRELAY_HOST").ok();
        let original_port = std::env::var("ROOMRELAY_PORT").ok();

        std::env::set_var("ROOMRELAY_HOST", "127.0.0.1");
        std::env::set_var("ROOMRELAY_PORT", "4321");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4321);

        std::env::set_var("ROOMRELAY_HOST", "");
        std::env::set_var("ROOMRELAY_PORT", "not-a-port");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);

        match original_host {
            Some(val) => std::env::set_var("ROOMRELAY_HOST", val),
            None => std::env::remove_var("ROOMRELAY_HOST"),
        }
        match original_port {
            Some(val) => std::env::set_var("ROOMRELAY_PORT", val),
            None => std::env::remove_var("ROOMRELAY_PORT"),
        }
    }

    #[test]
    fn test_validate_default() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_host() {
        let mut config = Config::default();
        config.server.host = "  ".to_string();

        let result = config.validate();
        assert!(matches!(result, Err(RelayError::Config(msg)) if msg.contains("host")));
    }
}
