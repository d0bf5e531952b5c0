//! Configuration for the exchange core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for snapshots
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Credit economy parameters
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Writer and retry configuration
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Snapshot configuration
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/exchange"),
            service_name: "exchange-core".to_string(),
            economy: EconomyConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

/// Credit economy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Credits granted on registration
    pub signup_credits: i64,

    /// Cost assigned to newly created courses
    pub default_course_cost: i64,

    /// Credits paid to the mentor per completion
    pub completion_reward: i64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            signup_credits: 5,
            default_course_cost: 1,
            completion_reward: 2,
        }
    }
}

/// Writer and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Bounded writer mailbox size (backpressure)
    pub mailbox_capacity: usize,

    /// Attempts per orchestration before giving up with `Conflict`
    pub max_commit_retries: u32,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            max_commit_retries: 8,
        }
    }
}

/// Snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Persist and reload snapshots from `data_dir`
    pub enabled: bool,

    /// Snapshot every N commits
    pub interval_commits: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_commits: 100,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("EXCHANGE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(value) = std::env::var("EXCHANGE_SNAPSHOTS") {
            config.snapshot.enabled = value != "0" && !value.eq_ignore_ascii_case("false");
        }

        if let Ok(value) = std::env::var("EXCHANGE_COMPLETION_REWARD") {
            config.economy.completion_reward = value
                .parse()
                .map_err(|e| crate::Error::Config(format!("EXCHANGE_COMPLETION_REWARD: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would break ledger invariants
    pub fn validate(&self) -> crate::Result<()> {
        if self.economy.signup_credits < 0 {
            return Err(crate::Error::Config("signup_credits cannot be negative".to_string()));
        }
        if self.economy.default_course_cost < 0 {
            return Err(crate::Error::Config("default_course_cost cannot be negative".to_string()));
        }
        if self.economy.completion_reward < 0 {
            return Err(crate::Error::Config("completion_reward cannot be negative".to_string()));
        }
        if self.concurrency.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox_capacity must be positive".to_string()));
        }
        if self.concurrency.max_commit_retries == 0 {
            return Err(crate::Error::Config("max_commit_retries must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "exchange-core");
        assert_eq!(config.economy.signup_credits, 5);
        assert_eq!(config.economy.default_course_cost, 1);
        assert_eq!(config.economy.completion_reward, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/tmp/exchange"
            service_name = "exchange-test"

            [economy]
            signup_credits = 10
            default_course_cost = 2
            completion_reward = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.economy.signup_credits, 10);
        assert_eq!(config.concurrency.max_commit_retries, 8);
        assert!(config.snapshot.enabled);
    }

    #[test]
    fn test_validate_rejects_negative_reward() {
        let mut config = Config::default();
        config.economy.completion_reward = -1;
        assert!(config.validate().is_err());
    }
}
