use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use validator::Validate;

use crate::errors::ServiceError;

/// Default values for configuration
const DEFAULT_RESERVATION_TTL_SECS: u64 = 900; // 15 minutes
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_BATCH_SIZE: usize = 100;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1_024;
const CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "STOCKLEDGER";

/// Engine configuration with validation.
///
/// Values come from `config/ledger.toml` (optional) layered under
/// `STOCKLEDGER_*` environment variables, with compiled-in defaults below.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Expiry applied to reservations created without an explicit expiry.
    #[serde(default = "default_reservation_ttl_secs")]
    #[validate(range(min = 1))]
    pub reservation_ttl_secs: u64,

    /// How long an operation waits for a SKU's critical section before
    /// returning a retryable `LockTimeout`.
    #[serde(default = "default_lock_timeout_ms")]
    #[validate(range(min = 1))]
    pub lock_timeout_ms: u64,

    /// Upper bound on bulk batch length; larger batches are rejected before
    /// any item is processed.
    #[serde(default = "default_max_batch_size")]
    #[validate(range(min = 1, max = 100))]
    pub max_batch_size: usize,

    /// Capacity of the outbound event channel.
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

fn default_reservation_ttl_secs() -> u64 {
    DEFAULT_RESERVATION_TTL_SECS
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reservation_ttl_secs: default_reservation_ttl_secs(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_batch_size: default_max_batch_size(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from the optional config file and environment,
    /// then validates ranges.
    pub fn load() -> Result<Self, ServiceError> {
        let settings = Config::builder()
            .add_source(File::with_name(&format!("{}/ledger", CONFIG_DIR)).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let cfg: LedgerConfig = settings
            .try_deserialize()
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?;
        cfg.validate().map_err(ServiceError::from_validation_errors)?;
        Ok(cfg)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reservation_ttl_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = LedgerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_batch_size, 100);
        assert_eq!(cfg.lock_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn oversized_batch_limit_is_rejected() {
        let cfg = LedgerConfig {
            max_batch_size: 250,
            ..LedgerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
