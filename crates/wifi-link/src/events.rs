//! Events emitted by the link controller
//!
//! Configuration changes and rejected inputs are reported through a single
//! event stream so observers see them in the order they were applied.

use serde::Serialize;
use wifi_rates::{PhyFamily, RateId};

use crate::minstrel::DecisionReason;

/// What caused a rate change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RateChangeCause {
    /// Decision window of the rate adapter
    Adaptation(DecisionReason),
    /// SNR threshold fallback between decision windows
    Snr,
    /// Externally applied decision
    Applied,
    /// Operator fixed the rate
    Override,
}

/// Link controller events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LinkEvent {
    /// The transmit rate changed
    RateChanged {
        /// Previous rate
        from: RateId,
        /// New rate
        to: RateId,
        /// What triggered the change
        cause: RateChangeCause,
    },

    /// The active PHY family changed
    FamilyChanged {
        /// Previous family
        from: PhyFamily,
        /// New family
        to: PhyFamily,
        /// Most robust rate of the new family, now current
        rate: RateId,
    },

    /// Automatic rate adaptation was enabled or disabled
    AutoRateChanged {
        /// New state
        enabled: bool,
    },

    /// A command or feedback event was rejected
    Rejected {
        /// Error message
        reason: String,
    },

    /// Aggregated statistics were reset
    StatsReset,
}
