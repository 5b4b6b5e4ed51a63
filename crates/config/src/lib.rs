// Configuration Management
//
// This crate handles all static configuration loading for the identity
// pipeline: server binding, database connection, directory endpoints,
// internal-directory endpoints and the local cache location.
//
// Identity-provider credentials (client id / tenant) are NOT static
// configuration: they are resolved at runtime from the durable store with a
// local-cache fallback by the services crate.

use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration loading interface
impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration: an explicit YAML file when `SALESDESK_CONFIG`
    /// points at one, environment variables otherwise.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("SALESDESK_CONFIG") {
            return Self::load_from_file(path);
        }

        Self::from_env().map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  host: 127.0.0.1
  port: 8081
identity:
  origin: "https://sales.example.com"
  config_load_timeout_secs: 3
"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.identity.origin, "https://sales.example.com");
        assert_eq!(config.identity.config_load_timeout_secs, 3);
        // Sections absent from the file fall back to defaults
        assert_eq!(config.directory.base_url, "https://graph.microsoft.com/v1.0");
    }

    #[test]
    fn test_load_from_file_rejects_malformed_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "server: [not, a, mapping").unwrap();

        let result = AppConfig::load_from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
