//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use dice_game::{
    db::{DatabaseConfig, parse_env_or},
    session::GameConfig,
};
use std::{net::SocketAddr, time::Duration};

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Lock store connection URL
    pub redis_url: String,
    /// Prometheus scrape endpoint; metrics are disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Wager limits and per-operation deadlines
    pub game: GameConfig,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args
    ///
    /// # Errors
    ///
    /// Returns error if an address variable is set but cannot be parsed
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND", DEFAULT_BIND)?,
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = overrides.database_url {
            database.database_url = url;
        }

        let redis_url = overrides
            .redis_url
            .or_else(|| std::env::var("REDIS_URL").ok())
            .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        let metrics_bind = match overrides.metrics_bind {
            Some(addr) => Some(addr),
            None => match std::env::var("METRICS_BIND") {
                Ok(raw) if !raw.is_empty() => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("'{raw}' is not a socket address"),
                })?),
                _ => None,
            },
        };

        let defaults = GameConfig::default();
        let game = GameConfig {
            starting_balance: parse_env_or("STARTING_BALANCE", defaults.starting_balance),
            max_bet_amount: parse_env_or("MAX_BET_AMOUNT", defaults.max_bet_amount),
            lock_ttl: Duration::from_secs(parse_env_or(
                "LOCK_TTL_SECS",
                defaults.lock_ttl.as_secs(),
            )),
            query_timeout: Duration::from_millis(parse_env_or(
                "QUERY_TIMEOUT_MS",
                defaults.query_timeout.as_millis() as u64,
            )),
            transaction_timeout: Duration::from_millis(parse_env_or(
                "TRANSACTION_TIMEOUT_MS",
                defaults.transaction_timeout.as_millis() as u64,
            )),
            lock_op_timeout: Duration::from_millis(parse_env_or(
                "LOCK_OP_TIMEOUT_MS",
                defaults.lock_op_timeout.as_millis() as u64,
            )),
        };

        Ok(ServerConfig {
            bind,
            database,
            redis_url,
            metrics_bind,
            game,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.max_bet_amount <= 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_BET_AMOUNT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.game.starting_balance < 0 {
            return Err(ConfigError::Invalid {
                var: "STARTING_BALANCE".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        for (var, value) in [
            ("QUERY_TIMEOUT_MS", self.game.query_timeout),
            ("TRANSACTION_TIMEOUT_MS", self.game.transaction_timeout),
            ("LOCK_OP_TIMEOUT_MS", self.game.lock_op_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }
        }

        // A lock that can expire mid-wager lets a second wager in
        if !self.game.lock_ttl_is_safe() {
            return Err(ConfigError::Invalid {
                var: "LOCK_TTL_SECS".to_string(),
                reason: format!(
                    "Must exceed the worst-case wager duration ({:?})",
                    self.game.worst_case_play()
                ),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed DB_MAX_CONNECTIONS ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse a socket address from `key`, falling back to `default`
fn parse_addr(key: &str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|_| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("'{raw}' is not a socket address"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            database: DatabaseConfig {
                database_url: "test".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_secs: 5,
                idle_timeout_secs: 300,
                max_lifetime_secs: 1800,
            },
            redis_url: DEFAULT_REDIS_URL.to_string(),
            metrics_bind: None,
            game: GameConfig::default(),
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "LOCK_TTL_SECS".to_string(),
            reason: "too short".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("LOCK_TTL_SECS"));
        assert!(msg.contains("too short"));
    }

    #[test]
    fn test_default_config_is_valid() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = ServerConfig::from_env(CliOverrides {
            bind: Some("0.0.0.0:9000".parse().unwrap()),
            database_url: Some("postgres://override/db".to_string()),
            redis_url: Some("redis://override:6379".to_string()),
            metrics_bind: Some("127.0.0.1:9100".parse().unwrap()),
        })
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.database.database_url, "postgres://override/db");
        assert_eq!(config.redis_url, "redis://override:6379");
        assert_eq!(config.metrics_bind.map(|a| a.port()), Some(9100));
    }

    #[test]
    fn test_unset_game_settings_use_engine_defaults() {
        let config = ServerConfig::from_env(CliOverrides::default()).unwrap();

        assert_eq!(config.game, GameConfig::default());
    }

    #[test]
    fn test_config_validation_max_bet_zero() {
        let mut config = valid_config();
        config.game.max_bet_amount = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "MAX_BET_AMOUNT"));
    }

    #[test]
    fn test_config_validation_negative_starting_balance() {
        let mut config = valid_config();
        config.game.starting_balance = -1;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = valid_config();
        config.game.lock_op_timeout = Duration::ZERO;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "LOCK_OP_TIMEOUT_MS"));
    }

    #[test]
    fn test_config_validation_lock_ttl_too_short() {
        let mut config = valid_config();
        config.game.lock_ttl = Duration::from_secs(10);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "LOCK_TTL_SECS"));
    }
}
