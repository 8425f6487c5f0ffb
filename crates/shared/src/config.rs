//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Posting transaction retry configuration.
    #[serde(default)]
    pub posting: PostingConfig,
    /// Document number generation configuration.
    #[serde(default)]
    pub sequence: SequenceConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Execution strategy settings for posting transactions.
///
/// Only transient store failures (serialization conflicts, dropped
/// connections) are retried; domain errors always surface immediately.
#[derive(Debug, Clone, Deserialize)]
pub struct PostingConfig {
    /// Total attempts per transaction, including the first one.
    #[serde(default = "default_posting_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry, doubled on each subsequent retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound for the backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_posting_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_posting_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Document number generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    /// Attempts at issuing a number when the insert hits a duplicate.
    #[serde(default = "default_sequence_attempts")]
    pub max_attempts: u32,
}

fn default_sequence_attempts() -> u32 {
    5
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_sequence_attempts(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Loads `.env` (if present) and then the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load_with_dotenv() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("TALLY__DATABASE__URL", Some("postgres://localhost/tally_test")),
                ("RUN_MODE", Some("test-does-not-exist")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/tally_test");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.posting.max_attempts, 3);
                assert_eq!(config.sequence.max_attempts, 5);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("TALLY__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("test-does-not-exist")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }

    #[test]
    fn test_defaults() {
        let posting = PostingConfig::default();
        assert_eq!(posting.initial_backoff_ms, 50);
        assert_eq!(posting.max_backoff_ms, 2_000);
        assert_eq!(SequenceConfig::default().max_attempts, 5);
    }
}
