//! Minstrel-style rate adaptation
//!
//! The adapter keeps one [`RateStats`] per catalog rate. Delivery feedback
//! updates attempt counters immediately; once per decision window the window
//! counters are folded into an exponentially weighted success probability
//! and an expected throughput derived from the rate's airtime for a
//! reference frame. Selection only ever considers rates of the active family.
//!
//! When no rate of the active family has enough attempts to be trusted, the
//! adapter falls back to an SNR threshold policy. Every `probe_interval`
//! windows it deliberately picks a rate other than the best one so that its
//! statistics stay fresh.
//!
//! With a target packet error rate set, trusted rates that lose more frames
//! than the target are passed over as long as some trusted rate meets it.
//!
//! The threshold policy reacts to every SNR sample until some rate is
//! trusted, so during warm-up a noisy SNR near a threshold can move the
//! rate on consecutive samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wifi_rates::{airtime, PhyFamily, RateCatalog, RateEntry, RateId, DEFAULT_FRAME_LEN};

use crate::error::{ConfigError, LinkError};

/// Rate adaptation tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Weight of the newest window in the success probability average
    pub ewma_alpha: f64,
    /// Attempts before a rate's statistics are trusted
    pub min_attempts: u64,
    /// One window in this many is a probe (0 disables probing)
    pub probe_interval: u32,
    /// SNR above which the fastest rate is used without history (dB)
    pub snr_high_db: f64,
    /// SNR above which the middle rate is used without history (dB)
    pub snr_mid_db: f64,
    /// Reference frame length for airtime comparison (bytes)
    pub frame_len_bytes: usize,
    /// Highest acceptable packet error rate for a selected rate
    pub target_per: Option<f64>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.25,
            min_attempts: 10,
            probe_interval: 10,
            snr_high_db: 25.0,
            snr_mid_db: 15.0,
            frame_len_bytes: DEFAULT_FRAME_LEN,
            target_per: None,
        }
    }
}

fn valid_target_per(per: f64) -> bool {
    (0.0..=1.0).contains(&per)
}

impl AdapterConfig {
    /// Check every value is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "ewma_alpha must be in (0, 1], got {}",
                self.ewma_alpha
            )));
        }
        if self.min_attempts == 0 {
            return Err(ConfigError::Invalid("min_attempts must be at least 1".into()));
        }
        if !(self.snr_mid_db.is_finite() && self.snr_high_db.is_finite())
            || self.snr_mid_db > self.snr_high_db
        {
            return Err(ConfigError::Invalid(format!(
                "SNR thresholds must satisfy mid <= high, got mid {} high {}",
                self.snr_mid_db, self.snr_high_db
            )));
        }
        if self.frame_len_bytes == 0 {
            return Err(ConfigError::Invalid("frame_len_bytes must be positive".into()));
        }
        if let Some(per) = self.target_per {
            if !valid_target_per(per) {
                return Err(ConfigError::Invalid(format!(
                    "target_per must be in [0, 1], got {}",
                    per
                )));
            }
        }
        Ok(())
    }
}

/// Running statistics for one rate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RateStats {
    /// Attempts since the last family reset
    pub attempts: u64,
    /// Successes since the last family reset
    pub successes: u64,
    /// Attempts in the current decision window
    pub window_attempts: u64,
    /// Successes in the current decision window
    pub window_successes: u64,
    /// Smoothed success probability in [0, 1]
    pub probability: f64,
    /// Expected useful throughput (Mbps)
    pub throughput_mbps: f64,
    /// Windows folded into `probability`
    pub windows: u64,
    /// Times this rate was chosen as a probe
    pub probes: u64,
}

impl RateStats {
    /// Fold the current window into the smoothed probability
    ///
    /// The first window with traffic sets the probability directly.
    fn fold_window(&mut self, alpha: f64) {
        if self.window_attempts == 0 {
            return;
        }
        let ratio = self.window_successes as f64 / self.window_attempts as f64;
        self.probability = if self.windows == 0 {
            ratio
        } else {
            alpha * ratio + (1.0 - alpha) * self.probability
        }
        .clamp(0.0, 1.0);
        self.windows += 1;
        self.window_attempts = 0;
        self.window_successes = 0;
    }
}

/// Why a rate was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionReason {
    /// Highest expected throughput among trusted rates
    Throughput,
    /// Not enough history; chosen from the latest SNR sample
    SnrFallback,
    /// Periodic probe of a non-selected rate
    Probe,
    /// Adaptation is disabled; the fixed rate is kept
    Fixed,
}

/// Outcome of a decision window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Rate to use from now on
    pub rate: RateId,
    /// Why it was chosen
    pub reason: DecisionReason,
}

/// Minstrel-style rate adapter
///
/// Has exactly one owner. Concurrent feedback sources must be serialized
/// before reaching it.
#[derive(Debug, Clone)]
pub struct RateAdapter {
    config: AdapterConfig,
    catalog: RateCatalog,
    stats: BTreeMap<RateId, RateStats>,
    active_family: PhyFamily,
    selected: RateId,
    enabled: bool,
    min_mbps: Option<f64>,
    max_mbps: Option<f64>,
    window_count: u64,
    probe_cursor: usize,
    last_snr_db: Option<f64>,
}

impl RateAdapter {
    /// Create an adapter for `family` starting at its most robust rate
    pub fn new(
        catalog: RateCatalog,
        family: PhyFamily,
        config: AdapterConfig,
    ) -> Result<Self, LinkError> {
        let selected = catalog
            .most_robust(family)
            .map(|e| e.id)
            .ok_or_else(|| LinkError::InvalidFamily(family.to_string()))?;
        let stats = catalog
            .entries()
            .iter()
            .map(|e| (e.id, RateStats::default()))
            .collect();
        Ok(Self {
            config,
            catalog,
            stats,
            active_family: family,
            selected,
            enabled: true,
            min_mbps: None,
            max_mbps: None,
            window_count: 0,
            probe_cursor: 0,
            last_snr_db: None,
        })
    }

    /// Tuning parameters
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Catalog the adapter selects from
    pub fn catalog(&self) -> &RateCatalog {
        &self.catalog
    }

    /// Family selection is restricted to
    pub fn active_family(&self) -> PhyFamily {
        self.active_family
    }

    /// Rate most recently selected
    pub fn selected(&self) -> RateId {
        self.selected
    }

    /// Whether adaptation is running
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Latest SNR sample seen
    pub fn last_snr_db(&self) -> Option<f64> {
        self.last_snr_db
    }

    /// Enable or freeze adaptation
    ///
    /// While disabled, feedback is still counted but every decision keeps the
    /// selected rate.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Pin the selected rate without a decision window
    ///
    /// Used when the operator overrides the rate. Fails for rates outside
    /// the catalog or the active family.
    pub fn force_rate(&mut self, rate: RateId) -> Result<(), LinkError> {
        let entry = self.catalog.lookup(rate)?;
        if entry.family != self.active_family {
            return Err(LinkError::FamilyMismatch {
                rate,
                rate_family: entry.family,
                active: self.active_family,
            });
        }
        self.selected = rate;
        Ok(())
    }

    /// Bound candidate rates by PHY bitrate (inclusive)
    pub fn set_rate_limits(
        &mut self,
        min_mbps: Option<f64>,
        max_mbps: Option<f64>,
    ) -> Result<(), LinkError> {
        if let (Some(min), Some(max)) = (min_mbps, max_mbps) {
            if min > max {
                return Err(LinkError::InvalidRateLimits { min, max });
            }
        }
        self.min_mbps = min_mbps;
        self.max_mbps = max_mbps;
        Ok(())
    }

    /// Set or clear the target packet error rate
    pub fn set_target_per(&mut self, target_per: Option<f64>) -> Result<(), LinkError> {
        if let Some(per) = target_per {
            if !valid_target_per(per) {
                return Err(LinkError::InvalidTargetPer(per));
            }
        }
        self.config.target_per = target_per;
        Ok(())
    }

    /// Statistics of one rate
    pub fn rate_stats(&self, rate: RateId) -> Option<&RateStats> {
        self.stats.get(&rate)
    }

    /// Statistics of every rate in `family`, most robust first
    pub fn stats_table(&self, family: PhyFamily) -> Vec<(&RateEntry, &RateStats)> {
        self.catalog
            .ranked(family)
            .into_iter()
            .filter_map(|entry| self.stats.get(&entry.id).map(|stats| (entry, stats)))
            .collect()
    }

    /// Record the delivery outcome of one frame sent at `rate`
    ///
    /// Outcomes for rates outside the active family are still counted; they
    /// are only ignored by selection.
    pub fn on_outcome(&mut self, rate: RateId, success: bool) -> Result<(), LinkError> {
        let stats = self
            .stats
            .get_mut(&rate)
            .ok_or(LinkError::UnknownRate(rate))?;
        stats.attempts += 1;
        stats.window_attempts += 1;
        if success {
            stats.successes += 1;
            stats.window_successes += 1;
        }
        Ok(())
    }

    /// Record an SNR sample
    ///
    /// Returns the new rate when the threshold policy applies (no trusted
    /// history in the active family) and changes the selection.
    pub fn on_snr(&mut self, snr_db: f64) -> Option<RateId> {
        if !snr_db.is_finite() {
            return None;
        }
        self.last_snr_db = Some(snr_db);
        if !self.enabled || self.has_confident_rate() {
            return None;
        }
        let rate = self.snr_policy(Some(snr_db))?;
        if rate == self.selected {
            return None;
        }
        debug!("SNR {:.1} dB without history, falling back to {}", snr_db, rate);
        self.selected = rate;
        Some(rate)
    }

    /// Close the current decision window and select the next rate
    pub fn end_window(&mut self) -> Decision {
        let alpha = self.config.ewma_alpha;
        let frame_len = self.config.frame_len_bytes;
        for entry in self.catalog.entries() {
            if let Some(stats) = self.stats.get_mut(&entry.id) {
                stats.fold_window(alpha);
                stats.throughput_mbps =
                    airtime::effective_throughput_mbps(entry, frame_len, stats.probability);
            }
        }

        if !self.enabled {
            return Decision {
                rate: self.selected,
                reason: DecisionReason::Fixed,
            };
        }

        self.window_count += 1;
        let (best, reason) = match self.best_confident() {
            Some(rate) => (rate, DecisionReason::Throughput),
            None => match self.snr_policy(self.last_snr_db) {
                Some(rate) => (rate, DecisionReason::SnrFallback),
                None => (self.selected, DecisionReason::Fixed),
            },
        };

        let probe_due = self.config.probe_interval > 0
            && self.window_count % u64::from(self.config.probe_interval) == 0;
        let decision = match probe_due.then(|| self.next_probe(best)).flatten() {
            Some(probe) => Decision {
                rate: probe,
                reason: DecisionReason::Probe,
            },
            None => Decision { rate: best, reason },
        };

        debug!(
            "Window {}: selected {} ({:?})",
            self.window_count, decision.rate, decision.reason
        );
        self.selected = decision.rate;
        decision
    }

    /// Make `family` active, zeroing the statistics of its rates
    ///
    /// Statistics of other families are kept. The selection moves to the
    /// family's most robust rate.
    pub fn reset_family(&mut self, family: PhyFamily) -> Result<RateId, LinkError> {
        let robust = self
            .catalog
            .most_robust(family)
            .map(|e| e.id)
            .ok_or_else(|| LinkError::InvalidFamily(family.to_string()))?;
        for entry in self.catalog.family_rates(family) {
            self.stats.insert(entry.id, RateStats::default());
        }
        self.active_family = family;
        self.selected = robust;
        self.window_count = 0;
        self.probe_cursor = 0;
        Ok(robust)
    }

    /// Active-family rates within the bitrate limits, most robust first
    fn candidates(&self) -> Vec<&RateEntry> {
        let ranked = self.catalog.ranked(self.active_family);
        let bounded: Vec<&RateEntry> = ranked
            .iter()
            .copied()
            .filter(|e| self.min_mbps.map_or(true, |min| e.mbps >= min))
            .filter(|e| self.max_mbps.map_or(true, |max| e.mbps <= max))
            .collect();
        if bounded.is_empty() {
            ranked
        } else {
            bounded
        }
    }

    fn is_confident(&self, stats: &RateStats) -> bool {
        stats.windows > 0 && stats.attempts >= self.config.min_attempts
    }

    fn has_confident_rate(&self) -> bool {
        self.candidates().iter().any(|e| {
            self.stats
                .get(&e.id)
                .is_some_and(|stats| self.is_confident(stats))
        })
    }

    /// Trusted candidate with the highest expected throughput; ties go to
    /// the higher raw bitrate
    ///
    /// Only rates meeting the target packet error rate compete, unless none
    /// of the trusted rates does.
    fn best_confident(&self) -> Option<RateId> {
        let trusted: Vec<(&RateEntry, &RateStats)> = self
            .candidates()
            .into_iter()
            .filter_map(|entry| self.stats.get(&entry.id).map(|stats| (entry, stats)))
            .filter(|(_, stats)| self.is_confident(stats))
            .collect();
        let compliant: Vec<(&RateEntry, &RateStats)> = match self.config.target_per {
            Some(target) => trusted
                .iter()
                .copied()
                .filter(|(_, stats)| 1.0 - stats.probability <= target)
                .collect(),
            None => Vec::new(),
        };
        let pool = if compliant.is_empty() { trusted } else { compliant };

        let mut best: Option<(&RateEntry, &RateStats)> = None;
        for (entry, stats) in pool {
            let better = match best {
                None => true,
                Some((best_entry, best_stats)) => {
                    (stats.throughput_mbps, entry.mbps)
                        > (best_stats.throughput_mbps, best_entry.mbps)
                }
            };
            if better {
                best = Some((entry, stats));
            }
        }
        best.map(|(entry, _)| entry.id)
    }

    /// Threshold policy: fastest above the high threshold, middle above the
    /// mid threshold, most robust otherwise or without any sample
    fn snr_policy(&self, snr_db: Option<f64>) -> Option<RateId> {
        let candidates = self.candidates();
        let entry = match snr_db {
            Some(snr) if snr > self.config.snr_high_db => candidates.last(),
            Some(snr) if snr > self.config.snr_mid_db => candidates.get(candidates.len() / 2),
            _ => candidates.first(),
        };
        entry.map(|e| e.id)
    }

    /// Next probe target in round-robin order, skipping `best`
    fn next_probe(&mut self, best: RateId) -> Option<RateId> {
        let candidates: Vec<RateId> = self.candidates().iter().map(|e| e.id).collect();
        if candidates.len() < 2 {
            return None;
        }
        for _ in 0..candidates.len() {
            let rate = candidates[self.probe_cursor % candidates.len()];
            self.probe_cursor = (self.probe_cursor + 1) % candidates.len();
            if rate != best {
                if let Some(stats) = self.stats.get_mut(&rate) {
                    stats.probes += 1;
                }
                return Some(rate);
            }
        }
        None
    }
}
