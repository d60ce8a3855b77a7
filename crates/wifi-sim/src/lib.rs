//! Simulated radio channel for the Wi-Fi link controller
//!
//! Stands in for real hardware: [`SimulatedChannel`] decides whether each
//! frame is delivered from the rate's SNR requirement and a time-varying
//! [`SnrProfile`], and [`TrafficGenerator`] pushes frames through it while
//! feeding outcomes and SNR samples to a running [`wifi_link::LinkHandle`].

pub mod channel;
pub mod error;
pub mod traffic;

pub use channel::{
    required_snr_db, ChannelConfig, FrameResult, SimulatedChannel, SnrProfile, NOISE_FLOOR_DBM,
};
pub use error::SimError;
pub use traffic::{
    TrafficCommand, TrafficConfig, TrafficGenerator, TrafficSummary, MAX_PACKETS_PER_SECOND,
};
