//! Error types for the link controller

use thiserror::Error;
use wifi_rates::{PhyFamily, RateError, RateId};

/// Errors returned when a command or feedback event is rejected
///
/// A rejected command has no effect on the transmit configuration or on
/// statistics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    /// The rate id is not in the catalog
    #[error("unknown rate: {0}")]
    UnknownRate(RateId),

    /// The rate belongs to a family other than the active one
    #[error("rate {rate} belongs to {rate_family}, active family is {active}")]
    FamilyMismatch {
        /// Requested rate
        rate: RateId,
        /// Family of the requested rate
        rate_family: PhyFamily,
        /// Currently active family
        active: PhyFamily,
    },

    /// The family is unknown or has no rates in the catalog
    #[error("invalid PHY family: {0}")]
    InvalidFamily(String),

    /// Minimum bitrate limit above the maximum
    #[error("invalid rate limits: min {min} Mbps > max {max} Mbps")]
    InvalidRateLimits {
        /// Requested minimum (Mbps)
        min: f64,
        /// Requested maximum (Mbps)
        max: f64,
    },

    /// Target packet error rate outside [0, 1]
    #[error("target packet error rate must be in [0, 1], got {0}")]
    InvalidTargetPer(f64),

    /// Catalog error
    #[error("rate catalog error: {0}")]
    Catalog(RateError),

    /// The link actor is no longer running
    #[error("link actor is not running")]
    ActorStopped,
}

impl From<RateError> for LinkError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::UnknownRate(id) => LinkError::UnknownRate(id),
            RateError::InvalidFamily(name) => LinkError::InvalidFamily(name),
            other => LinkError::Catalog(other),
        }
    }
}

/// Errors from loading, saving or validating a link configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
