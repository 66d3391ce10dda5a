//! Register server configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! development defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Register server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Connection pool size
    pub max_connections: u32,

    /// Capacity of the committed-sale broadcast channel
    pub sale_channel_capacity: usize,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ServerConfig {
            bind_addr: lookup("MEDTILL_BIND_ADDR")
                .unwrap_or_else(|| "127.0.0.1:8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MEDTILL_BIND_ADDR".to_string()))?,

            database_path: lookup("MEDTILL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("medtill.db")),

            max_connections: lookup("MEDTILL_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MEDTILL_MAX_CONNECTIONS".to_string()))?,

            sale_channel_capacity: lookup("MEDTILL_SALE_CHANNEL_CAPACITY")
                .unwrap_or_else(|| "256".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("MEDTILL_SALE_CHANNEL_CAPACITY".to_string())
                })?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("MEDTILL_MAX_CONNECTIONS".to_string()));
        }
        if config.sale_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "MEDTILL_SALE_CHANNEL_CAPACITY".to_string(),
            ));
        }

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.database_path, PathBuf::from("medtill.db"));
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("MEDTILL_BIND_ADDR", "0.0.0.0:9000"),
            ("MEDTILL_DB_PATH", "/var/lib/medtill/till.db"),
            ("MEDTILL_MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.max_connections, 12);

        assert!(ServerConfig::from_lookup(lookup(&[("MEDTILL_BIND_ADDR", "nowhere")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("MEDTILL_MAX_CONNECTIONS", "0")])).is_err());
    }
}
