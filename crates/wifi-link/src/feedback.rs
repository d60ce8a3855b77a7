//! Feedback samples from the receive path

use std::time::Instant;

use wifi_rates::RateId;

/// Delivery outcome of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeSample {
    /// Rate the frame was sent at
    pub rate: RateId,
    /// Whether the frame was delivered
    pub success: bool,
    /// Frame length in bytes
    pub bytes: usize,
    /// When the outcome was observed
    pub timestamp: Instant,
}

impl OutcomeSample {
    /// Outcome observed now
    pub fn new(rate: RateId, success: bool, bytes: usize) -> Self {
        Self {
            rate,
            success,
            bytes,
            timestamp: Instant::now(),
        }
    }
}

/// Signal quality measured on the link
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnrSample {
    /// SNR in dB
    pub value_db: f64,
    /// Received signal strength in dBm, when the receiver reports it
    pub rssi_dbm: Option<f64>,
    /// When the sample was measured
    pub timestamp: Instant,
}

impl SnrSample {
    /// Sample measured now
    pub fn new(value_db: f64) -> Self {
        Self {
            value_db,
            rssi_dbm: None,
            timestamp: Instant::now(),
        }
    }

    /// Sample with signal strength, measured now
    pub fn with_rssi(value_db: f64, rssi_dbm: f64) -> Self {
        Self {
            rssi_dbm: Some(rssi_dbm),
            ..Self::new(value_db)
        }
    }
}
