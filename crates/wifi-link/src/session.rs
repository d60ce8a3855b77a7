//! Session controller
//!
//! [`LinkSession`] owns the rate adapter and the transmit configuration. The
//! configuration is only changed through [`LinkSession::apply_decision`],
//! [`LinkSession::switch_family`] and the operator override, each validated
//! against the catalog and the active family. The current (rate, family)
//! pair is published in a single atomic word so the transmit path can read
//! it before every frame without locking.
//!
//! The atomic word is the authority on the current rate. The copy held by
//! the statistics aggregator is updated right after it, so a snapshot taken
//! during a change can briefly report the previous rate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use wifi_rates::{PhyFamily, RateCatalog, RateEntry, RateId};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::{LinkEvent, RateChangeCause};
use crate::feedback::{OutcomeSample, SnrSample};
use crate::minstrel::{Decision, RateAdapter, RateStats};
use crate::stats::LinkStats;

/// Transmit configuration read by the transmit path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfig {
    /// Rate for the next frame
    pub rate: RateId,
    /// Family of that rate
    pub family: PhyFamily,
}

/// Lock-free published transmit configuration
///
/// Rate id in the low 16 bits, family index above it.
#[derive(Debug)]
pub struct ActiveConfig(AtomicU32);

impl ActiveConfig {
    fn pack(config: TxConfig) -> u32 {
        (u32::from(config.family.index()) << 16) | u32::from(config.rate.0)
    }

    fn new(config: TxConfig) -> Self {
        Self(AtomicU32::new(Self::pack(config)))
    }

    /// Current configuration
    pub fn load(&self) -> TxConfig {
        let word = self.0.load(Ordering::Acquire);
        TxConfig {
            rate: RateId((word & 0xFFFF) as u16),
            family: PhyFamily::from_index((word >> 16) as u8).unwrap_or(PhyFamily::Dsss),
        }
    }

    fn store(&self, config: TxConfig) {
        self.0.store(Self::pack(config), Ordering::Release);
    }
}

/// One row of the per-rate statistics table
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RateStatsRow {
    /// Rate id
    pub rate: RateId,
    /// Short key
    pub key: &'static str,
    /// PHY bitrate (Mbps)
    pub mbps: f64,
    /// Adapter statistics
    pub stats: RateStats,
}

/// Multi-mode link session
pub struct LinkSession {
    adapter: RateAdapter,
    stats: Arc<LinkStats>,
    active: Arc<ActiveConfig>,
    auto_rate: bool,
    event_buffer: Vec<LinkEvent>,
}

impl LinkSession {
    /// Create a session over the standard catalog
    pub fn new(config: &LinkConfig) -> Result<Self, LinkError> {
        Self::with_catalog(RateCatalog::standard(), config)
    }

    /// Create a session over a custom catalog
    pub fn with_catalog(catalog: RateCatalog, config: &LinkConfig) -> Result<Self, LinkError> {
        let mut adapter = RateAdapter::new(catalog, config.initial_family, config.adapter)?;
        adapter.set_rate_limits(config.min_rate_mbps, config.max_rate_mbps)?;
        if let Some(rate) = config.initial_rate {
            adapter.force_rate(rate)?;
        }
        adapter.set_enabled(config.auto_rate);

        let initial = *adapter.catalog().lookup(adapter.selected())?;
        let stats = Arc::new(LinkStats::new(config.stats, &initial));
        let active = Arc::new(ActiveConfig::new(TxConfig {
            rate: initial.id,
            family: initial.family,
        }));
        info!(
            "Link session started on {} at {}",
            initial.family, initial.description
        );

        Ok(Self {
            adapter,
            stats,
            active,
            auto_rate: config.auto_rate,
            event_buffer: Vec::new(),
        })
    }

    /// Rate catalog
    pub fn catalog(&self) -> &RateCatalog {
        self.adapter.catalog()
    }

    /// Rate adapter state
    pub fn adapter(&self) -> &RateAdapter {
        &self.adapter
    }

    /// Shared statistics aggregator
    pub fn stats(&self) -> &Arc<LinkStats> {
        &self.stats
    }

    /// Handle for lock-free reads of the transmit configuration
    pub fn config_handle(&self) -> Arc<ActiveConfig> {
        Arc::clone(&self.active)
    }

    /// Current (rate, family)
    pub fn current_configuration(&self) -> TxConfig {
        self.active.load()
    }

    /// Entry of the current rate
    pub fn current_entry(&self) -> Result<&RateEntry, LinkError> {
        Ok(self.catalog().lookup(self.active.load().rate)?)
    }

    /// Whether the adapter drives the transmit rate
    pub fn is_auto_rate(&self) -> bool {
        self.auto_rate
    }

    /// Replace the current rate
    ///
    /// Fails with `UnknownRate` for ids outside the catalog and with
    /// `FamilyMismatch` for rates of another family; the configuration is
    /// left unchanged in both cases.
    pub fn apply_decision(&mut self, rate: RateId) -> Result<(), LinkError> {
        self.set_rate(rate, RateChangeCause::Applied)
    }

    /// Fix the rate and disable automatic adaptation
    pub fn override_rate(&mut self, rate: RateId) -> Result<(), LinkError> {
        self.set_rate(rate, RateChangeCause::Override)?;
        self.set_auto_rate(false);
        Ok(())
    }

    /// Enable or disable automatic adaptation
    pub fn set_auto_rate(&mut self, enabled: bool) {
        if self.auto_rate == enabled {
            return;
        }
        self.auto_rate = enabled;
        self.adapter.set_enabled(enabled);
        info!(
            "Automatic rate adaptation {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.event_buffer.push(LinkEvent::AutoRateChanged { enabled });
    }

    /// Bound the rates adaptation may select by PHY bitrate
    pub fn set_rate_limits(
        &mut self,
        min_mbps: Option<f64>,
        max_mbps: Option<f64>,
    ) -> Result<(), LinkError> {
        if let Err(e) = self.adapter.set_rate_limits(min_mbps, max_mbps) {
            self.reject(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Switch to another PHY family
    ///
    /// Resets the adapter statistics of that family and makes its most
    /// robust rate current. Aggregated link statistics are kept.
    pub fn switch_family(&mut self, family: PhyFamily) -> Result<RateId, LinkError> {
        if !self.catalog().has_family(family) {
            let err = LinkError::InvalidFamily(family.to_string());
            self.reject(&err);
            return Err(err);
        }
        let from = self.adapter.active_family();
        let rate = self.adapter.reset_family(family)?;
        let entry = *self.catalog().lookup(rate)?;
        self.publish(&entry);

        info!("Switched family {} -> {} at {}", from, family, entry.description);
        self.event_buffer.push(LinkEvent::FamilyChanged {
            from,
            to: family,
            rate,
        });
        Ok(rate)
    }

    /// Switch family by name, e.g. `"ofdm"` or `"802.11b"`
    pub fn switch_family_by_name(&mut self, name: &str) -> Result<RateId, LinkError> {
        match name.parse::<PhyFamily>() {
            Ok(family) => self.switch_family(family),
            Err(e) => {
                let err = LinkError::from(e);
                self.reject(&err);
                Err(err)
            }
        }
    }

    /// Count a frame handed to the transmit path
    pub fn record_transmit(&self, bytes: usize) {
        self.stats.record_transmit(bytes);
    }

    /// Feed one delivery outcome to the adapter and the aggregator
    pub fn handle_outcome(&mut self, sample: OutcomeSample) -> Result<(), LinkError> {
        if let Err(e) = self.adapter.on_outcome(sample.rate, sample.success) {
            self.reject(&e);
            return Err(e);
        }
        self.stats.record_receive(sample.success.into(), sample.bytes);
        Ok(())
    }

    /// Feed one SNR sample
    ///
    /// Returns the new rate when the SNR fallback changed it.
    pub fn handle_snr(&mut self, sample: SnrSample) -> Option<RateId> {
        self.stats.record_snr(sample.value_db);
        if let Some(rssi) = sample.rssi_dbm {
            self.stats.record_rssi(rssi);
        }
        let rate = self.adapter.on_snr(sample.value_db)?;
        match self.set_rate(rate, RateChangeCause::Snr) {
            Ok(()) => Some(rate),
            Err(e) => {
                warn!("SNR fallback selected unusable rate {}: {}", rate, e);
                None
            }
        }
    }

    /// Close a decision window and apply the adapter's choice
    pub fn end_window(&mut self) -> Decision {
        let decision = self.adapter.end_window();
        if self.auto_rate && decision.rate != self.active.load().rate {
            if let Err(e) = self.set_rate(decision.rate, RateChangeCause::Adaptation(decision.reason))
            {
                warn!("Adapter selected unusable rate {}: {}", decision.rate, e);
            }
        }
        decision
    }

    /// Clear the aggregated statistics
    pub fn reset_stats(&mut self) {
        self.stats.reset();
        info!("Link statistics reset");
        self.event_buffer.push(LinkEvent::StatsReset);
    }

    /// Adapter statistics for the active family, most robust first
    pub fn rate_table(&self) -> Vec<RateStatsRow> {
        self.adapter
            .stats_table(self.adapter.active_family())
            .into_iter()
            .map(|(entry, stats)| RateStatsRow {
                rate: entry.id,
                key: entry.key,
                mbps: entry.mbps,
                stats: *stats,
            })
            .collect()
    }

    /// Take all buffered events
    pub fn drain_events(&mut self) -> Vec<LinkEvent> {
        std::mem::take(&mut self.event_buffer)
    }

    fn set_rate(&mut self, rate: RateId, cause: RateChangeCause) -> Result<(), LinkError> {
        let from = self.active.load().rate;
        if let Err(e) = self.adapter.force_rate(rate) {
            self.reject(&e);
            return Err(e);
        }
        let entry = *self.catalog().lookup(rate)?;
        self.publish(&entry);
        if from != rate {
            info!("Rate {} -> {} ({:?})", from, entry.description, cause);
            self.event_buffer.push(LinkEvent::RateChanged {
                from,
                to: rate,
                cause,
            });
        } else {
            debug!("Rate {} kept ({:?})", rate, cause);
        }
        Ok(())
    }

    /// Store the transmit configuration, then the aggregator's copy
    fn publish(&self, entry: &RateEntry) {
        self.active.store(TxConfig {
            rate: entry.id,
            family: entry.family,
        });
        self.stats.set_current_rate(entry);
    }

    fn reject(&mut self, err: &LinkError) {
        warn!("Rejected: {}", err);
        self.stats.record_rejected();
        self.event_buffer.push(LinkEvent::Rejected {
            reason: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> LinkSession {
        LinkSession::new(&LinkConfig::default()).unwrap()
    }

    #[test]
    fn test_initial_configuration() {
        let session = session();
        assert_eq!(
            session.current_configuration(),
            TxConfig {
                rate: RateId(0),
                family: PhyFamily::Dsss
            }
        );
        assert!(session.is_auto_rate());
    }

    #[test]
    fn test_initial_rate_from_config() {
        let config = LinkConfig {
            initial_family: PhyFamily::Ofdm,
            initial_rate: Some(RateId(14)),
            ..Default::default()
        };
        let session = LinkSession::new(&config).unwrap();
        assert_eq!(session.current_configuration().rate, RateId(14));
        assert_eq!(session.stats().snapshot().current_rate, RateId(14));
    }

    #[test]
    fn test_initial_rate_wrong_family_fails() {
        let config = LinkConfig {
            initial_family: PhyFamily::Dsss,
            initial_rate: Some(RateId(14)),
            ..Default::default()
        };
        assert!(matches!(
            LinkSession::new(&config),
            Err(LinkError::FamilyMismatch { .. })
        ));
    }

    #[test]
    fn test_active_config_packing() {
        let active = ActiveConfig::new(TxConfig {
            rate: RateId(32),
            family: PhyFamily::Vht,
        });
        assert_eq!(active.load().rate, RateId(32));
        assert_eq!(active.load().family, PhyFamily::Vht);
    }

    #[test]
    fn test_apply_decision() {
        let mut session = session();
        session.apply_decision(RateId(6)).unwrap();
        assert_eq!(session.current_configuration().rate, RateId(6));
        assert_eq!(session.stats().snapshot().current_rate, RateId(6));
        let events = session.drain_events();
        assert_eq!(
            events,
            vec![LinkEvent::RateChanged {
                from: RateId(0),
                to: RateId(6),
                cause: RateChangeCause::Applied
            }]
        );
    }

    #[test]
    fn test_apply_decision_unknown_rate() {
        let mut session = session();
        assert_eq!(
            session.apply_decision(RateId(500)),
            Err(LinkError::UnknownRate(RateId(500)))
        );
        assert_eq!(session.current_configuration().rate, RateId(0));
        assert_eq!(session.stats().snapshot().rejected_events, 1);
    }

    #[test]
    fn test_switch_family_by_name() {
        let mut session = session();
        assert_eq!(session.switch_family_by_name("ofdm").unwrap(), RateId(7));
        assert!(matches!(
            session.switch_family_by_name("zigbee"),
            Err(LinkError::InvalidFamily(_))
        ));
        assert_eq!(session.current_configuration().family, PhyFamily::Ofdm);
    }

    #[test]
    fn test_switch_family_missing_from_catalog() {
        use wifi_rates::{Modulation, Preamble};
        let catalog = RateCatalog::from_entries(vec![RateEntry::dsss(
            0,
            Modulation::Dsss,
            1.0,
            Preamble::Long,
            "1M",
            "1 Mbps",
        )])
        .unwrap();
        let mut session = LinkSession::with_catalog(catalog, &LinkConfig::default()).unwrap();
        assert_eq!(
            session.switch_family(PhyFamily::Vht),
            Err(LinkError::InvalidFamily(PhyFamily::Vht.to_string()))
        );
        assert_eq!(session.current_configuration().family, PhyFamily::Dsss);
    }

    #[test]
    fn test_switch_family_keeps_aggregate_counters() {
        let mut session = session();
        session.record_transmit(100);
        session
            .handle_outcome(OutcomeSample::new(RateId(0), true, 100))
            .unwrap();
        session.switch_family(PhyFamily::Ht).unwrap();
        let snap = session.stats().snapshot();
        assert_eq!(snap.tx_packets, 1);
        assert_eq!(snap.rx_packets, 1);
        assert_eq!(snap.current_family, PhyFamily::Ht);
        assert_eq!(snap.current_rate, RateId(15));
    }

    #[test]
    fn test_override_disables_auto() {
        let mut session = session();
        session.override_rate(RateId(3)).unwrap();
        assert!(!session.is_auto_rate());
        for _ in 0..20 {
            session
                .handle_outcome(OutcomeSample::new(RateId(3), false, 100))
                .unwrap();
        }
        session.end_window();
        assert_eq!(session.current_configuration().rate, RateId(3));
        assert!(session
            .drain_events()
            .contains(&LinkEvent::AutoRateChanged { enabled: false }));
    }

    #[test]
    fn test_outcome_unknown_rate_rejected_without_counting() {
        let mut session = session();
        assert!(session
            .handle_outcome(OutcomeSample::new(RateId(77), true, 100))
            .is_err());
        let snap = session.stats().snapshot();
        assert_eq!(snap.rx_packets, 0);
        assert_eq!(snap.rejected_events, 1);
    }

    #[test]
    fn test_snr_fallback_applies_rate() {
        let mut session = session();
        assert_eq!(session.handle_snr(SnrSample::new(30.0)), Some(RateId(6)));
        assert_eq!(session.current_configuration().rate, RateId(6));
        assert_eq!(session.stats().snapshot().snr_db, Some(30.0));
    }

    #[test]
    fn test_snr_sample_carries_rssi() {
        let mut session = session();
        session.handle_snr(SnrSample::with_rssi(12.0, -83.0));
        session.handle_snr(SnrSample::new(14.0));
        let snap = session.stats().snapshot();
        assert_eq!(snap.snr_db, Some(14.0));
        assert_eq!(snap.rssi_dbm, Some(-83.0));
        assert_eq!(snap.avg_rssi_dbm, Some(-83.0));
    }

    #[test]
    fn test_snapshot_rate_matches_published_configuration() {
        let mut session = session();
        session.apply_decision(RateId(5)).unwrap();
        let snap = session.stats().snapshot();
        assert_eq!(snap.current_rate, session.current_configuration().rate);
    }

    #[test]
    fn test_end_window_applies_adapter_choice() {
        let mut session = session();
        for _ in 0..10 {
            session
                .handle_outcome(OutcomeSample::new(RateId(2), true, 100))
                .unwrap();
        }
        let decision = session.end_window();
        assert_eq!(decision.rate, RateId(2));
        assert_eq!(session.current_configuration().rate, RateId(2));
    }

    #[test]
    fn test_rate_table_follows_family() {
        let mut session = session();
        assert_eq!(session.rate_table().len(), 7);
        session.switch_family(PhyFamily::Vht).unwrap();
        let table = session.rate_table();
        assert_eq!(table.len(), 10);
        assert_eq!(table[0].key, "VHT_MCS0");
    }

    #[test]
    fn test_reset_stats_event() {
        let mut session = session();
        session.record_transmit(10);
        session.reset_stats();
        assert_eq!(session.stats().snapshot().tx_packets, 0);
        assert_eq!(session.drain_events(), vec![LinkEvent::StatsReset]);
    }
}
