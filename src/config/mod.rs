//! Listener configuration.
//!
//! Type-safe configuration with environment loading through the `config`
//! and `dotenvy` crates. Values are read with the `HOOKSUB` prefix and `__`
//! as the nesting separator.
//!
//! # Example
//!
//! ```no_run
//! use hooksub::config::ListenerConfig;
//!
//! let config = ListenerConfig::load().expect("failed to load configuration");
//! config.validate().expect("invalid configuration");
//! ```

mod error;
mod transport;

pub use error::{ConfigError, ValidationError};
pub use transport::{
    DirectTransportConfig, EnvPortTransportConfig, MiddlewareTransportConfig,
    ReverseProxyTransportConfig, TransportConfig,
};

use serde::Deserialize;

/// Root listener configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListenerConfig {
    /// Signature freshness window.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Message-id deduplication cache sizing.
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl ListenerConfig {
    /// Load configuration from the environment.
    ///
    /// Reads `.env` if present, then environment variables such as
    /// `HOOKSUB__VERIFICATION__MAX_AGE_SECS=600` and
    /// `HOOKSUB__DEDUP__MAX_ENTRIES=10000`.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("HOOKSUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.verification.validate()?;
        self.dedup.validate()?;
        // The dedup cache must outlive the window in which a replayed
        // message would still pass the freshness check.
        if self.dedup.retention_secs < self.verification.max_age_secs {
            return Err(ValidationError::RetentionShorterThanFreshnessWindow);
        }
        Ok(())
    }
}

/// Freshness window applied to inbound message timestamps.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Maximum accepted message age in seconds.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Clock skew tolerance for timestamps from the future, in seconds.
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: u64,
}

impl VerificationConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_age_secs as i64)
    }

    pub fn max_clock_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_clock_skew_secs as i64)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_age_secs == 0 {
            return Err(ValidationError::InvalidFreshnessWindow);
        }
        Ok(())
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            max_clock_skew_secs: default_max_clock_skew_secs(),
        }
    }
}

/// Deduplication cache retention and sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// How long a seen message id is remembered, in seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Upper bound on remembered ids; oldest entries are evicted first.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl DedupConfig {
    pub fn retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.retention_secs)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_entries == 0 {
            return Err(ValidationError::InvalidDedupCapacity);
        }
        Ok(())
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_age_secs() -> u64 {
    600
}

fn default_max_clock_skew_secs() -> u64 {
    60
}

fn default_retention_secs() -> u64 {
    600
}

fn default_max_entries() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ListenerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.verification.max_age_secs, 600);
        assert_eq!(config.dedup.max_entries, 10_000);
    }

    #[test]
    fn zero_freshness_window_rejected() {
        let config = ListenerConfig {
            verification: VerificationConfig {
                max_age_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFreshnessWindow)
        ));
    }

    #[test]
    fn retention_must_cover_freshness_window() {
        let config = ListenerConfig {
            verification: VerificationConfig {
                max_age_secs: 600,
                ..Default::default()
            },
            dedup: DedupConfig {
                retention_secs: 60,
                ..Default::default()
            },
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::RetentionShorterThanFreshnessWindow)
        ));
    }
}
