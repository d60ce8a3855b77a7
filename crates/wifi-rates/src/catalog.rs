//! Rate catalog
//!
//! The catalog is the ordered table of rates the link can transmit with. The
//! standard table covers 802.11b/a/g/n/ac; custom tables can be built for
//! tests and restricted hardware with [`RateCatalog::from_entries`].

use std::borrow::Cow;
use std::collections::HashSet;

use tracing::debug;

use crate::Modulation::{Cck, Dsss};
use crate::{PhyFamily, Preamble, RateEntry, RateError, RateId};

/// The standard rate table
///
/// Ids are stable: entries are only ever appended.
pub static STANDARD_RATES: &[RateEntry] = &[
    // 802.11b DSSS/CCK
    RateEntry::dsss(0, Dsss, 1.0, Preamble::Long, "1M_LONG", "1 Mbps DBPSK (long preamble)"),
    RateEntry::dsss(1, Dsss, 2.0, Preamble::Long, "2M_LONG", "2 Mbps DQPSK (long preamble)"),
    RateEntry::dsss(2, Cck, 5.5, Preamble::Long, "5.5M_LONG", "5.5 Mbps CCK (long preamble)"),
    RateEntry::dsss(3, Cck, 11.0, Preamble::Long, "11M_LONG", "11 Mbps CCK (long preamble)"),
    RateEntry::dsss(4, Dsss, 2.0, Preamble::Short, "2M_SHORT", "2 Mbps DQPSK (short preamble)"),
    RateEntry::dsss(5, Cck, 5.5, Preamble::Short, "5.5M_SHORT", "5.5 Mbps CCK (short preamble)"),
    RateEntry::dsss(6, Cck, 11.0, Preamble::Short, "11M_SHORT", "11 Mbps CCK (short preamble)"),
    // 802.11a/g OFDM
    RateEntry::ofdm(7, PhyFamily::Ofdm, 6.0, "OFDM_6M", "6 Mbps OFDM (BPSK 1/2)"),
    RateEntry::ofdm(8, PhyFamily::Ofdm, 9.0, "OFDM_9M", "9 Mbps OFDM (BPSK 3/4)"),
    RateEntry::ofdm(9, PhyFamily::Ofdm, 12.0, "OFDM_12M", "12 Mbps OFDM (QPSK 1/2)"),
    RateEntry::ofdm(10, PhyFamily::Ofdm, 18.0, "OFDM_18M", "18 Mbps OFDM (QPSK 3/4)"),
    RateEntry::ofdm(11, PhyFamily::Ofdm, 24.0, "OFDM_24M", "24 Mbps OFDM (16-QAM 1/2)"),
    RateEntry::ofdm(12, PhyFamily::Ofdm, 36.0, "OFDM_36M", "36 Mbps OFDM (16-QAM 3/4)"),
    RateEntry::ofdm(13, PhyFamily::Ofdm, 48.0, "OFDM_48M", "48 Mbps OFDM (64-QAM 2/3)"),
    RateEntry::ofdm(14, PhyFamily::Ofdm, 54.0, "OFDM_54M", "54 Mbps OFDM (64-QAM 3/4)"),
    // 802.11n HT, 20 MHz, 1 spatial stream, long GI
    RateEntry::ofdm(15, PhyFamily::Ht, 6.5, "HT_MCS0", "HT MCS0 6.5 Mbps (BPSK 1/2)"),
    RateEntry::ofdm(16, PhyFamily::Ht, 13.0, "HT_MCS1", "HT MCS1 13 Mbps (QPSK 1/2)"),
    RateEntry::ofdm(17, PhyFamily::Ht, 19.5, "HT_MCS2", "HT MCS2 19.5 Mbps (QPSK 3/4)"),
    RateEntry::ofdm(18, PhyFamily::Ht, 26.0, "HT_MCS3", "HT MCS3 26 Mbps (16-QAM 1/2)"),
    RateEntry::ofdm(19, PhyFamily::Ht, 39.0, "HT_MCS4", "HT MCS4 39 Mbps (16-QAM 3/4)"),
    RateEntry::ofdm(20, PhyFamily::Ht, 52.0, "HT_MCS5", "HT MCS5 52 Mbps (64-QAM 2/3)"),
    RateEntry::ofdm(21, PhyFamily::Ht, 58.5, "HT_MCS6", "HT MCS6 58.5 Mbps (64-QAM 3/4)"),
    RateEntry::ofdm(22, PhyFamily::Ht, 65.0, "HT_MCS7", "HT MCS7 65 Mbps (64-QAM 5/6)"),
    // 802.11ac VHT, 20 MHz, 1 spatial stream, long GI
    RateEntry::ofdm(23, PhyFamily::Vht, 6.5, "VHT_MCS0", "VHT MCS0 6.5 Mbps (BPSK 1/2)"),
    RateEntry::ofdm(24, PhyFamily::Vht, 13.0, "VHT_MCS1", "VHT MCS1 13 Mbps (QPSK 1/2)"),
    RateEntry::ofdm(25, PhyFamily::Vht, 19.5, "VHT_MCS2", "VHT MCS2 19.5 Mbps (QPSK 3/4)"),
    RateEntry::ofdm(26, PhyFamily::Vht, 26.0, "VHT_MCS3", "VHT MCS3 26 Mbps (16-QAM 1/2)"),
    RateEntry::ofdm(27, PhyFamily::Vht, 39.0, "VHT_MCS4", "VHT MCS4 39 Mbps (16-QAM 3/4)"),
    RateEntry::ofdm(28, PhyFamily::Vht, 52.0, "VHT_MCS5", "VHT MCS5 52 Mbps (64-QAM 2/3)"),
    RateEntry::ofdm(29, PhyFamily::Vht, 58.5, "VHT_MCS6", "VHT MCS6 58.5 Mbps (64-QAM 3/4)"),
    RateEntry::ofdm(30, PhyFamily::Vht, 65.0, "VHT_MCS7", "VHT MCS7 65 Mbps (64-QAM 5/6)"),
    RateEntry::ofdm(31, PhyFamily::Vht, 78.0, "VHT_MCS8", "VHT MCS8 78 Mbps (256-QAM 3/4)"),
    RateEntry::ofdm(32, PhyFamily::Vht, 86.7, "VHT_MCS9", "VHT MCS9 86.7 Mbps (256-QAM 5/6)"),
];

/// Read-only table of rates
#[derive(Debug, Clone, PartialEq)]
pub struct RateCatalog {
    entries: Cow<'static, [RateEntry]>,
}

impl Default for RateCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl RateCatalog {
    /// The standard 802.11b/a/g/n/ac catalog
    pub fn standard() -> Self {
        Self {
            entries: Cow::Borrowed(STANDARD_RATES),
        }
    }

    /// Build a catalog from a custom table
    ///
    /// Ids must be unique, bitrates positive and finite, and the preamble
    /// must be present exactly for DSSS-family entries.
    pub fn from_entries(entries: Vec<RateEntry>) -> Result<Self, RateError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.id) {
                return Err(RateError::DuplicateRate(entry.id));
            }
            if !(entry.mbps.is_finite() && entry.mbps > 0.0) {
                return Err(RateError::InvalidEntry {
                    id: entry.id,
                    reason: format!("bitrate must be positive, got {}", entry.mbps),
                });
            }
            let is_dsss_family = entry.family == PhyFamily::Dsss;
            if is_dsss_family != entry.preamble.is_some() {
                return Err(RateError::InvalidEntry {
                    id: entry.id,
                    reason: "preamble is required for DSSS rates and absent otherwise".into(),
                });
            }
        }
        debug!("Built rate catalog with {} entries", entries.len());
        Ok(Self {
            entries: Cow::Owned(entries),
        })
    }

    /// All entries in catalog order
    pub fn entries(&self) -> &[RateEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by id
    pub fn lookup(&self, id: RateId) -> Result<&RateEntry, RateError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or(RateError::UnknownRate(id))
    }

    /// Whether the id exists in the catalog
    pub fn contains(&self, id: RateId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Look up an entry by short key (case-insensitive), e.g. `11M_SHORT`
    pub fn by_key(&self, key: &str) -> Result<&RateEntry, RateError> {
        let key = key.trim();
        self.entries
            .iter()
            .find(|e| e.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| RateError::UnknownRateKey(key.to_string()))
    }

    /// Entries of one family, in catalog order
    pub fn family_rates(&self, family: PhyFamily) -> impl Iterator<Item = &RateEntry> {
        self.entries.iter().filter(move |e| e.family == family)
    }

    /// Families that have at least one entry, in catalog order
    pub fn families(&self) -> Vec<PhyFamily> {
        let mut families = Vec::new();
        for entry in self.entries.iter() {
            if !families.contains(&entry.family) {
                families.push(entry.family);
            }
        }
        families
    }

    /// Whether the catalog has any rate of `family`
    pub fn has_family(&self, family: PhyFamily) -> bool {
        self.entries.iter().any(|e| e.family == family)
    }

    /// Entries of one family ordered from most robust to fastest
    pub fn ranked(&self, family: PhyFamily) -> Vec<&RateEntry> {
        let mut rates: Vec<&RateEntry> = self.family_rates(family).collect();
        rates.sort_by(|a, b| {
            a.robustness_rank()
                .partial_cmp(&b.robustness_rank())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rates
    }

    /// Most robust rate of a family: lowest bitrate, long preamble on ties
    pub fn most_robust(&self, family: PhyFamily) -> Option<&RateEntry> {
        self.ranked(family).first().copied()
    }

    /// Fastest rate of a family
    pub fn fastest(&self, family: PhyFamily) -> Option<&RateEntry> {
        self.ranked(family).last().copied()
    }

    /// Middle entry of the ranked family table
    pub fn middle(&self, family: PhyFamily) -> Option<&RateEntry> {
        let ranked = self.ranked(family);
        ranked.get(ranked.len() / 2).copied()
    }
}
