//! Wi-Fi Link Controller
//!
//! This crate provides link adaptation and session control for a radio link
//! that can operate in several incompatible PHY families (802.11b DSSS/CCK,
//! 802.11a/g OFDM, 802.11n HT, 802.11ac VHT).
//!
//! # Architecture
//!
//! - [`LinkStats`] aggregates transmit/receive counters and a bounded
//!   throughput history. It is the only state shared between tasks and hands
//!   out [`LinkSnapshot`] copies.
//! - [`RateAdapter`] is a Minstrel-style engine: it turns delivery outcomes
//!   and SNR samples into a rate choice within the active family, once per
//!   decision window.
//! - [`LinkSession`] owns the adapter and the transmit configuration and
//!   validates every rate or family change against the catalog.
//! - [`run_link_actor`] serializes feedback and operator commands into the
//!   session and drives the reporting and decision timers. [`LinkHandle`] is
//!   the cloneable front end for the receive path, the transmit path and the
//!   display.
//!
//! # Example
//!
//! ```rust
//! use wifi_link::{LinkConfig, LinkSession, OutcomeSample};
//! use wifi_rates::{PhyFamily, RateId};
//!
//! let mut session = LinkSession::new(&LinkConfig::default()).unwrap();
//! for _ in 0..10 {
//!     session.handle_outcome(OutcomeSample::new(RateId(3), true, 1400)).unwrap();
//! }
//! session.end_window();
//! assert_eq!(session.current_configuration().rate, RateId(3));
//!
//! let rate = session.switch_family(PhyFamily::Ofdm).unwrap();
//! assert_eq!(rate, RateId(7));
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod events;
pub mod feedback;
pub mod minstrel;
pub mod session;
pub mod stats;

pub use actor::{run_link_actor, ActorTiming, LinkCommand, LinkHandle};
pub use config::LinkConfig;
pub use error::{ConfigError, LinkError};
pub use events::{LinkEvent, RateChangeCause};
pub use feedback::{OutcomeSample, SnrSample};
pub use minstrel::{AdapterConfig, Decision, DecisionReason, RateAdapter, RateStats};
pub use session::{ActiveConfig, LinkSession, RateStatsRow, TxConfig};
pub use stats::{LinkSnapshot, LinkStats, RxOutcome, SampleHistory, StatsConfig};
