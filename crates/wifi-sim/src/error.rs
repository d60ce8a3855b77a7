//! Error types for the channel simulator

use thiserror::Error;
use wifi_link::LinkError;
use wifi_rates::RateError;

/// Errors that can occur while building or running a simulation
#[derive(Debug, Error)]
pub enum SimError {
    /// SNR profile contains a non-finite value
    #[error("invalid SNR profile: {0}")]
    InvalidProfile(String),

    /// Channel or traffic parameter out of range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The link controller rejected a request
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// The current rate could not be resolved
    #[error("rate catalog error: {0}")]
    Rate(#[from] RateError),
}
