//! Error types for the rate catalog

use thiserror::Error;

use crate::RateId;

/// Errors raised by catalog lookups and construction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateError {
    /// The rate id is not in the catalog
    #[error("unknown rate: {0}")]
    UnknownRate(RateId),

    /// No rate has the given short key
    #[error("unknown rate key: {0}")]
    UnknownRateKey(String),

    /// The family name is not recognized
    #[error("invalid PHY family: {0}")]
    InvalidFamily(String),

    /// Two entries share an id
    #[error("duplicate rate id {0}")]
    DuplicateRate(RateId),

    /// An entry violates a catalog invariant
    #[error("invalid rate entry {id}: {reason}")]
    InvalidEntry {
        /// Offending entry
        id: RateId,
        /// What is wrong with it
        reason: String,
    },
}
