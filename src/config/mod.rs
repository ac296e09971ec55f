use std::str::FromStr;
use std::time::Duration;

use crate::identity::KeycloakConfig;
use crate::utils::RetryConfig;

// ============================================================================
// Configuration - environment variables, optionally seeded from `.env`
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_bind: String,
    pub metrics_port: u16,

    pub database_url: String,
    pub database_max_connections: u32,

    pub kafka_bootstrap_servers: String,
    pub kafka_consumer_group: String,

    pub keycloak: KeycloakConfig,
    pub jwt_issuer: String,

    pub reconciliation_retry: RetryConfig,

    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: i64,
    /// How long published outbox rows are kept before the relay prunes them.
    pub outbox_retention: chrono::Duration,
}

impl AppConfig {
    /// Load `.env` when present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenv::dotenv().is_ok() {
            tracing::debug!("Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let keycloak_url = vars.or("KEYCLOAK_URL", "http://localhost:8080");
        let keycloak_realm = vars.or("KEYCLOAK_REALM", "ecommerce");
        let jwt_issuer = vars
            .get("JWT_ISSUER")
            .unwrap_or_else(|| format!("{}/realms/{}", keycloak_url, keycloak_realm));

        let keycloak = KeycloakConfig {
            base_url: keycloak_url,
            realm: keycloak_realm,
            client_id: vars.required("KEYCLOAK_CLIENT_ID")?,
            client_secret: vars.required("KEYCLOAK_CLIENT_SECRET")?,
            timeout: Duration::from_secs(vars.parse("KEYCLOAK_TIMEOUT_SECS", 10)?),
        };

        let reconciliation_retry = RetryConfig {
            max_attempts: vars.parse("RECONCILIATION_MAX_ATTEMPTS", 5)?,
            initial_delay: Duration::from_millis(vars.parse("RECONCILIATION_INITIAL_BACKOFF_MS", 5000)?),
            max_delay: Duration::from_millis(vars.parse("RECONCILIATION_MAX_BACKOFF_MS", 20000)?),
            multiplier: vars.parse("RECONCILIATION_BACKOFF_MULTIPLIER", 2.0)?,
        };
        if reconciliation_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "RECONCILIATION_MAX_ATTEMPTS".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            http_bind: vars.or("CUSTOMER_SERVICE_HTTP_BIND", "0.0.0.0:8081"),
            metrics_port: vars.parse("CUSTOMER_SERVICE_METRICS_PORT", 9090)?,
            database_url: vars.required("DATABASE_URL")?,
            database_max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", 10)?,
            kafka_bootstrap_servers: vars.or("KAFKA_BOOTSTRAP_SERVERS", "127.0.0.1:9092"),
            kafka_consumer_group: vars.or("KAFKA_CONSUMER_GROUP", "customer-service"),
            keycloak,
            jwt_issuer,
            reconciliation_retry,
            outbox_poll_interval: Duration::from_millis(vars.parse("OUTBOX_POLL_INTERVAL_MS", 1000)?),
            outbox_batch_size: vars.parse("OUTBOX_BATCH_SIZE", 100)?,
            outbox_retention: chrono::Duration::days(vars.parse::<u32>("OUTBOX_RETENTION_DAYS", 7)?.into()),
        })
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    /// Blank values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/customers"),
        ("KEYCLOAK_CLIENT_ID", "customer-service"),
        ("KEYCLOAK_CLIENT_SECRET", "s3cret"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.http_bind, "0.0.0.0:8081");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.kafka_consumer_group, "customer-service");
        assert_eq!(config.jwt_issuer, "http://localhost:8080/realms/ecommerce");
        assert_eq!(config.keycloak.timeout, Duration::from_secs(10));
        assert_eq!(config.reconciliation_retry, RetryConfig::reconciliation());
        assert_eq!(config.outbox_batch_size, 100);
        assert_eq!(config.outbox_retention, chrono::Duration::days(7));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("KEYCLOAK_URL", "https://sso.example.com"));
        pairs.push(("KEYCLOAK_REALM", "shop"));
        pairs.push(("RECONCILIATION_MAX_ATTEMPTS", "3"));
        pairs.push(("OUTBOX_POLL_INTERVAL_MS", "250"));
        pairs.push(("OUTBOX_RETENTION_DAYS", "30"));

        let config = load(&pairs).unwrap();

        assert_eq!(config.jwt_issuer, "https://sso.example.com/realms/shop");
        assert_eq!(config.reconciliation_retry.max_attempts, 3);
        assert_eq!(config.outbox_poll_interval, Duration::from_millis(250));
        assert_eq!(config.outbox_retention, chrono::Duration::days(30));
    }

    #[test]
    fn test_missing_required() {
        let err = load(&REQUIRED[1..]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL".to_string()));
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("OUTBOX_BATCH_SIZE", "lots"));

        let err = load(&pairs).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "OUTBOX_BATCH_SIZE".to_string(),
                value: "lots".to_string()
            }
        );
    }
}
