use std::{collections::HashMap, str::FromStr};

use chrono::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DATABASE_URL: &str = "sqlite://synergysphere.db";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3001";
const DEFAULT_JWT_TTL_HOURS: i64 = 168;
const DEFAULT_RELAY_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings of the server, read from the process environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub cors_origin: String,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Outbound frames buffered per connection before deliveries are dropped.
    pub channel_capacity: usize,
    /// Whether event frames emitted by clients are re-broadcast to their rooms.
    pub accept_client_events: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_RELAY_CHANNEL_CAPACITY,
            accept_client_events: true,
        }
    }
}

impl ServerConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match (get("BACKEND_PORT"), get("PORT")) {
            (Some(value), _) => parse("BACKEND_PORT", &value)?,
            (None, Some(value)) => parse("PORT", &value)?,
            (None, None) => DEFAULT_PORT,
        };

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_ttl_hours: i64 = match get("JWT_TTL_HOURS") {
            Some(value) => parse("JWT_TTL_HOURS", &value)?,
            None => DEFAULT_JWT_TTL_HOURS,
        };
        if jwt_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_TTL_HOURS",
                value: jwt_ttl_hours.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let jwt_ttl = Duration::try_hours(jwt_ttl_hours).ok_or_else(|| ConfigError::Invalid {
            name: "JWT_TTL_HOURS",
            value: jwt_ttl_hours.to_string(),
            reason: "out of range".to_string(),
        })?;

        let channel_capacity: usize = match get("RELAY_CHANNEL_CAPACITY") {
            Some(value) => parse("RELAY_CHANNEL_CAPACITY", &value)?,
            None => DEFAULT_RELAY_CHANNEL_CAPACITY,
        };
        if channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "RELAY_CHANNEL_CAPACITY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let accept_client_events = match get("RELAY_ACCEPT_CLIENT_EVENTS") {
            Some(value) => parse("RELAY_ACCEPT_CLIENT_EVENTS", &value)?,
            None => true,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            jwt_ttl,
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            relay: RelayConfig {
                channel_capacity,
                accept_client_events,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = ServerConfig::from_vars(&vars(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.database_url, "sqlite://synergysphere.db");
        assert_eq!(config.jwt_ttl, Duration::hours(168));
        assert_eq!(config.relay.channel_capacity, 256);
        assert!(config.relay.accept_client_events);
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn backend_port_wins_over_port() {
        let config = ServerConfig::from_vars(&vars(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("BACKEND_PORT", "9090"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn oversized_token_lifetime_is_rejected() {
        let err = ServerConfig::from_vars(&vars(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_TTL_HOURS", "9223372036854775807"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "JWT_TTL_HOURS",
                ..
            }
        ));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = ServerConfig::from_vars(&vars(&[("PORT", "8080")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = ServerConfig::from_vars(&vars(&[("JWT_SECRET", "s"), ("PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = ServerConfig::from_vars(&vars(&[
            ("JWT_SECRET", "s"),
            ("RELAY_ACCEPT_CLIENT_EVENTS", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "RELAY_ACCEPT_CLIENT_EVENTS",
                ..
            }
        ));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ServerConfig::from_vars(&vars(&[
            ("JWT_SECRET", "s"),
            ("RELAY_CHANNEL_CAPACITY", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "RELAY_CHANNEL_CAPACITY",
                ..
            }
        ));
    }
}
