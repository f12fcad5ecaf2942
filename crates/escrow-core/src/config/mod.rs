//! Engine configuration.
//!
//! Parsed from TOML. Every field has a default matching the original
//! deployment (24h payment expiry, 3s polling, INR over UPI).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the configuration file.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Could not parse the configuration.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field failed validation.
    #[error("invalid config: {reason}")]
    Validation {
        /// What failed.
        reason: String,
    },
}

/// Escrow engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// ISO currency code embedded in payment payloads.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Memo prefix identifying this marketplace in payment payloads.
    /// Must not contain `-` (the prefix/transaction-id separator).
    #[serde(default = "default_memo_prefix")]
    pub memo_prefix: String,

    /// Hours until an unpaid transaction expires.
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: i64,

    /// Seconds between synchronization polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_memo_prefix() -> String {
    "SVIP".to_string()
}

const fn default_expiry_hours() -> i64 {
    24
}

const fn default_poll_interval_secs() -> u64 {
    3
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            memo_prefix: default_memo_prefix(),
            expiry_hours: default_expiry_hours(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl EscrowConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.memo_prefix.is_empty() || self.memo_prefix.contains('-') {
            return Err(ConfigError::Validation {
                reason: format!(
                    "memo_prefix {:?} must be non-empty and must not contain '-'",
                    self.memo_prefix
                ),
            });
        }
        if self.expiry_hours <= 0 {
            return Err(ConfigError::Validation {
                reason: format!("expiry_hours must be positive, got {}", self.expiry_hours),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Validation {
                reason: "poll_interval_secs must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// The payment expiry window as a duration.
    #[must_use]
    pub fn expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expiry_hours)
    }

    /// The polling interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EscrowConfig::default();
        assert_eq!(config.currency, "INR");
        assert_eq!(config.memo_prefix, "SVIP");
        assert_eq!(config.expiry_hours, 24);
        assert_eq!(config.poll_interval_secs, 3);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = EscrowConfig::from_toml("").unwrap();
        assert_eq!(config.currency, "INR");
        assert_eq!(config.poll_interval(), std::time::Duration::from_secs(3));
    }

    #[test]
    fn test_overrides() {
        let config = EscrowConfig::from_toml(
            r#"
            currency = "EUR"
            memo_prefix = "MKT"
            expiry_hours = 48
            poll_interval_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.currency, "EUR");
        assert_eq!(config.memo_prefix, "MKT");
        assert_eq!(config.expiry(), chrono::Duration::hours(48));
        assert_eq!(config.poll_interval_secs, 10);
    }

    #[test]
    fn test_validation_rejects_dashed_prefix_and_zero_windows() {
        assert!(EscrowConfig::from_toml(r#"memo_prefix = "A-B""#).is_err());
        assert!(EscrowConfig::from_toml(r#"memo_prefix = """#).is_err());
        assert!(EscrowConfig::from_toml("expiry_hours = 0").is_err());
        assert!(EscrowConfig::from_toml("poll_interval_secs = 0").is_err());
    }
}
