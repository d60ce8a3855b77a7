//! Link controller configuration
//!
//! Stored as JSON. Missing fields take their defaults so older files keep
//! loading when new options are added.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wifi_rates::{PhyFamily, RateId};

use crate::error::ConfigError;
use crate::minstrel::AdapterConfig;
use crate::stats::StatsConfig;

/// Complete link controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Rate adaptation tuning
    pub adapter: AdapterConfig,
    /// History capacities of the statistics aggregator
    pub stats: StatsConfig,
    /// Family active at startup
    pub initial_family: PhyFamily,
    /// Rate used at startup (defaults to the family's most robust rate)
    pub initial_rate: Option<RateId>,
    /// Whether the rate adapter drives the transmit rate
    pub auto_rate: bool,
    /// Lowest PHY bitrate adaptation may select (Mbps)
    pub min_rate_mbps: Option<f64>,
    /// Highest PHY bitrate adaptation may select (Mbps)
    pub max_rate_mbps: Option<f64>,
    /// Throughput reporting interval (ms)
    pub tick_interval_ms: u64,
    /// Decision window length (ms)
    pub decision_window_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::default(),
            stats: StatsConfig::default(),
            initial_family: PhyFamily::Dsss,
            initial_rate: None,
            auto_rate: true,
            min_rate_mbps: None,
            max_rate_mbps: None,
            tick_interval_ms: 1000,
            decision_window_ms: 100,
        }
    }
}

impl LinkConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: LinkConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.adapter.validate()?;
        if self.stats.history_capacity == 0 || self.stats.snr_history_capacity == 0 {
            return Err(ConfigError::Invalid("history capacities must be positive".into()));
        }
        if self.tick_interval_ms == 0 || self.decision_window_ms == 0 {
            return Err(ConfigError::Invalid("timer periods must be positive".into()));
        }
        if let (Some(min), Some(max)) = (self.min_rate_mbps, self.max_rate_mbps) {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "min_rate_mbps {} exceeds max_rate_mbps {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Throughput reporting interval
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Decision window length
    pub fn decision_window(&self) -> Duration {
        Duration::from_millis(self.decision_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = LinkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.adapter.min_attempts, 10);
        assert_eq!(config.stats.history_capacity, 60);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"initial_family":"ofdm","adapter":{"min_attempts":5}}"#)
                .unwrap();
        assert_eq!(config.initial_family, PhyFamily::Ofdm);
        assert_eq!(config.adapter.min_attempts, 5);
        assert_eq!(config.adapter.ewma_alpha, 0.25);
        assert!(config.auto_rate);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LinkConfig::default();
        config.adapter.ewma_alpha = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = LinkConfig::default();
        config.adapter.snr_mid_db = 30.0;
        assert!(config.validate().is_err());

        let mut config = LinkConfig::default();
        config.adapter.target_per = Some(2.0);
        assert!(config.validate().is_err());

        let config = LinkConfig {
            min_rate_mbps: Some(11.0),
            max_rate_mbps: Some(2.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LinkConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("wifi-link-config-{}", std::process::id()));
        let path = dir.join("link.json");
        let config = LinkConfig {
            initial_family: PhyFamily::Ht,
            initial_rate: Some(RateId(18)),
            auto_rate: false,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = LinkConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_malformed() {
        let path = std::env::temp_dir().join(format!("wifi-link-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(LinkConfig::load(&path), Err(ConfigError::Json(_))));
        std::fs::remove_file(&path).unwrap();
    }
}
