//! Wi-Fi Rate Catalog
//!
//! This crate provides the static table of transmittable (mode, rate)
//! combinations across the 802.11 PHY families:
//!
//! - **DSSS/CCK** (802.11b): 1, 2, 5.5 and 11 Mbps with long or short preamble
//! - **OFDM** (802.11a/g): 6 to 54 Mbps
//! - **HT** (802.11n): MCS 0-7, 20 MHz, one spatial stream
//! - **VHT** (802.11ac): MCS 0-9, 20 MHz, one spatial stream
//!
//! # Architecture
//!
//! Every rate is a [`RateEntry`] identified by a stable [`RateId`]. Ids are a
//! durability contract: feedback that references an id must resolve for the
//! lifetime of a session, so new families are only ever appended.
//!
//! The [`airtime`] module computes the time needed to send a reference frame
//! at a given rate, including the family-specific preamble and header. Rate
//! adaptation compares rates by this effective throughput rather than by raw
//! PHY bitrate.
//!
//! # Example
//!
//! ```rust
//! use wifi_rates::{PhyFamily, RateCatalog, RateId};
//!
//! let catalog = RateCatalog::standard();
//! let entry = catalog.lookup(RateId(3)).unwrap();
//! assert_eq!(entry.mbps, 11.0);
//! assert_eq!(entry.family, PhyFamily::Dsss);
//!
//! let robust = catalog.most_robust(PhyFamily::Ofdm).unwrap();
//! assert_eq!(robust.key, "OFDM_6M");
//! ```

pub mod airtime;
pub mod catalog;
pub mod error;

use std::fmt;
use std::str::FromStr;

pub use airtime::{effective_throughput_mbps, tx_time, DEFAULT_FRAME_LEN};
pub use catalog::{RateCatalog, STANDARD_RATES};
pub use error::RateError;

/// Stable identifier of a rate across all PHY families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateId(pub u16);

impl RateId {
    /// Get the raw id value
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for RateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Physical-layer family
///
/// Rates of different families are incompatible at the bit level. The link
/// only adapts within the active family; switching families is an explicit
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PhyFamily {
    /// 802.11b DSSS and CCK
    Dsss,
    /// 802.11a/g OFDM
    Ofdm,
    /// 802.11n high throughput
    Ht,
    /// 802.11ac very high throughput
    Vht,
}

impl PhyFamily {
    /// All families, in catalog order
    pub const ALL: [PhyFamily; 4] = [
        PhyFamily::Dsss,
        PhyFamily::Ofdm,
        PhyFamily::Ht,
        PhyFamily::Vht,
    ];

    /// Returns a human-readable name for the family
    pub fn name(&self) -> &'static str {
        match self {
            PhyFamily::Dsss => "802.11b DSSS/CCK",
            PhyFamily::Ofdm => "802.11a/g OFDM",
            PhyFamily::Ht => "802.11n HT",
            PhyFamily::Vht => "802.11ac VHT",
        }
    }

    /// Compact encoding used to publish the family in an atomic word
    pub fn index(&self) -> u8 {
        match self {
            PhyFamily::Dsss => 0,
            PhyFamily::Ofdm => 1,
            PhyFamily::Ht => 2,
            PhyFamily::Vht => 3,
        }
    }

    /// Inverse of [`PhyFamily::index`]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Whether rates of this family use OFDM symbols
    pub fn is_ofdm(&self) -> bool {
        !matches!(self, PhyFamily::Dsss)
    }
}

impl fmt::Display for PhyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PhyFamily {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dsss" | "cck" | "dsss/cck" | "802.11b" | "11b" | "b" => Ok(PhyFamily::Dsss),
            "ofdm" | "802.11a" | "802.11g" | "802.11a/g" | "11a" | "11g" | "a" | "g" => {
                Ok(PhyFamily::Ofdm)
            }
            "ht" | "802.11n" | "11n" | "n" => Ok(PhyFamily::Ht),
            "vht" | "802.11ac" | "11ac" | "ac" => Ok(PhyFamily::Vht),
            _ => Err(RateError::InvalidFamily(s.to_string())),
        }
    }
}

/// Modulation scheme of a rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modulation {
    /// Direct sequence spread spectrum (DBPSK/DQPSK, 1 and 2 Mbps)
    Dsss,
    /// Complementary code keying (5.5 and 11 Mbps)
    Cck,
    /// Orthogonal frequency division multiplexing
    Ofdm,
}

impl Modulation {
    /// Returns a human-readable name for the modulation
    pub fn name(&self) -> &'static str {
        match self {
            Modulation::Dsss => "DSSS",
            Modulation::Cck => "CCK",
            Modulation::Ofdm => "OFDM",
        }
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Channel coding applied to the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Coding {
    /// No coding (DSSS/CCK)
    None,
    /// Binary convolutional coding
    Bcc,
    /// Low-density parity check
    Ldpc,
}

/// PLCP preamble used by DSSS/CCK rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Preamble {
    /// 144-bit preamble, header at 1 Mbps
    Long,
    /// 72-bit preamble, header at 2 Mbps
    Short,
}

/// One transmittable configuration
///
/// `preamble` is present exactly for DSSS-family entries.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RateEntry {
    /// Stable identifier
    pub id: RateId,
    /// PHY family
    pub family: PhyFamily,
    /// Modulation scheme
    pub modulation: Modulation,
    /// Payload coding
    pub coding: Coding,
    /// Channel bandwidth in MHz
    pub bandwidth_mhz: u16,
    /// PHY data rate in Mbps
    pub mbps: f64,
    /// Preamble variant (DSSS family only)
    pub preamble: Option<Preamble>,
    /// Short key, e.g. `11M_SHORT` or `OFDM_54M`
    pub key: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

impl RateEntry {
    /// Create an 802.11b entry on a 22 MHz channel
    pub const fn dsss(
        id: u16,
        modulation: Modulation,
        mbps: f64,
        preamble: Preamble,
        key: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            id: RateId(id),
            family: PhyFamily::Dsss,
            modulation,
            coding: Coding::None,
            bandwidth_mhz: 22,
            mbps,
            preamble: Some(preamble),
            key,
            description,
        }
    }

    /// Create an OFDM-based entry (802.11a/g, HT or VHT) on a 20 MHz channel
    pub const fn ofdm(
        id: u16,
        family: PhyFamily,
        mbps: f64,
        key: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            id: RateId(id),
            family,
            modulation: Modulation::Ofdm,
            coding: Coding::Bcc,
            bandwidth_mhz: 20,
            mbps,
            preamble: None,
            key,
            description,
        }
    }

    /// Human-readable rate name
    pub fn name(&self) -> &'static str {
        self.description
    }

    /// Check if this is an 802.11b DSSS or CCK rate
    pub fn is_dsss(&self) -> bool {
        matches!(self.modulation, Modulation::Dsss | Modulation::Cck)
    }

    /// Check if this rate is OFDM-based (802.11a/g/n/ac)
    pub fn is_ofdm(&self) -> bool {
        self.modulation == Modulation::Ofdm
    }

    /// Ordering key from most robust to fastest
    ///
    /// Lower bitrate is more robust; at equal bitrate the long preamble is
    /// more robust than the short one.
    pub(crate) fn robustness_rank(&self) -> (f64, u8) {
        let preamble_rank = match self.preamble {
            Some(Preamble::Long) => 0,
            Some(Preamble::Short) | None => 1,
        };
        (self.mbps, preamble_rank)
    }
}

impl fmt::Display for RateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description)
    }
}
