//! Link statistics aggregator
//!
//! [`LinkStats`] is the only state shared between the receive path, the
//! reporting timer and the display. Every mutation takes a short
//! `parking_lot` lock; readers get an independent [`LinkSnapshot`] copy and
//! never hold the lock past the copy.

use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use wifi_rates::{Modulation, PhyFamily, RateEntry, RateId};

/// Default number of throughput samples kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;
/// Default number of SNR and RSSI samples kept
pub const DEFAULT_SNR_HISTORY_CAPACITY: usize = 100;

/// Capacities of the bounded histories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Throughput samples kept (one per reporting interval)
    pub history_capacity: usize,
    /// SNR and RSSI samples kept for averaging
    pub snr_history_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            snr_history_capacity: DEFAULT_SNR_HISTORY_CAPACITY,
        }
    }
}

/// Outcome of a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RxOutcome {
    /// Frame decoded and passed its checksum
    Success,
    /// Frame failed to decode
    Error,
}

impl From<bool> for RxOutcome {
    fn from(success: bool) -> Self {
        if success {
            RxOutcome::Success
        } else {
            RxOutcome::Error
        }
    }
}

/// Fixed-capacity sample ring, oldest evicted first
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleHistory {
    /// Create an empty history
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest at capacity
    pub fn push(&mut self, sample: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample
    pub fn last(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Largest sample
    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    /// Arithmetic mean
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
        }
    }

    /// Samples oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Point-in-time copy of the link statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    /// Frames handed to the transmit path
    pub tx_packets: u64,
    /// Frames received successfully
    pub rx_packets: u64,
    /// Frames received with errors
    pub rx_errors: u64,
    /// Bytes handed to the transmit path
    pub tx_bytes: u64,
    /// Bytes received successfully
    pub rx_bytes: u64,
    /// Feedback events and commands rejected by the controller
    pub rejected_events: u64,
    /// Rate used by the next transmission
    pub current_rate: RateId,
    /// Family of the current rate
    pub current_family: PhyFamily,
    /// Modulation of the current rate
    pub current_modulation: Modulation,
    /// Most recent throughput sample (Mbps)
    pub throughput_mbps_now: f64,
    /// Throughput samples, oldest first
    pub throughput_history: Vec<f64>,
    /// Capacity of the throughput history
    pub history_capacity: usize,
    /// Peak throughput over the history (Mbps)
    pub peak_throughput_mbps: f64,
    /// Mean throughput over the history (Mbps)
    pub avg_throughput_mbps: f64,
    /// Most recent SNR sample (dB)
    pub snr_db: Option<f64>,
    /// Mean SNR over the SNR history (dB)
    pub avg_snr_db: Option<f64>,
    /// Most recent received signal strength (dBm)
    pub rssi_dbm: Option<f64>,
    /// Mean RSSI over the RSSI history (dBm)
    pub avg_rssi_dbm: Option<f64>,
    /// Fraction of received frames with errors
    pub packet_error_rate: f64,
    /// Wall-clock time the statistics were started or last reset
    pub started_at: SystemTime,
    /// Time since `started_at`
    pub elapsed: Duration,
}

#[derive(Debug)]
struct StatsInner {
    tx_packets: u64,
    rx_packets: u64,
    rx_errors: u64,
    tx_bytes: u64,
    rx_bytes: u64,
    rejected_events: u64,
    /// Delivered bytes since the last `tick_elapsed`
    bytes_since_tick: u64,
    current_rate: RateId,
    current_family: PhyFamily,
    current_modulation: Modulation,
    throughput_now: f64,
    throughput: SampleHistory,
    snr: SampleHistory,
    rssi: SampleHistory,
    started_at: SystemTime,
    started: Instant,
}

impl StatsInner {
    fn new(
        config: StatsConfig,
        rate: RateId,
        family: PhyFamily,
        modulation: Modulation,
    ) -> Self {
        Self {
            tx_packets: 0,
            rx_packets: 0,
            rx_errors: 0,
            tx_bytes: 0,
            rx_bytes: 0,
            rejected_events: 0,
            bytes_since_tick: 0,
            current_rate: rate,
            current_family: family,
            current_modulation: modulation,
            throughput_now: 0.0,
            throughput: SampleHistory::new(config.history_capacity),
            snr: SampleHistory::new(config.snr_history_capacity),
            rssi: SampleHistory::new(config.snr_history_capacity),
            started_at: SystemTime::now(),
            started: Instant::now(),
        }
    }
}

/// Thread-safe accumulator of link counters and bounded histories
///
/// None of the operations fail. Counters are unsigned and only reset through
/// [`LinkStats::reset`].
#[derive(Debug)]
pub struct LinkStats {
    config: StatsConfig,
    inner: Mutex<StatsInner>,
}

impl LinkStats {
    /// Create an aggregator whose current rate is `initial`
    pub fn new(config: StatsConfig, initial: &RateEntry) -> Self {
        let inner = StatsInner::new(config, initial.id, initial.family, initial.modulation);
        Self {
            config,
            inner: Mutex::new(inner),
        }
    }

    /// Capacities this aggregator was built with
    pub fn config(&self) -> StatsConfig {
        self.config
    }

    /// Count one frame handed to the transmit path
    pub fn record_transmit(&self, bytes: usize) {
        let mut inner = self.inner.lock();
        inner.tx_packets += 1;
        inner.tx_bytes += bytes as u64;
    }

    /// Count one received frame
    pub fn record_receive(&self, outcome: RxOutcome, bytes: usize) {
        let mut inner = self.inner.lock();
        match outcome {
            RxOutcome::Success => {
                inner.rx_packets += 1;
                inner.rx_bytes += bytes as u64;
                inner.bytes_since_tick += bytes as u64;
            }
            RxOutcome::Error => inner.rx_errors += 1,
        }
    }

    /// Record an SNR sample
    pub fn record_snr(&self, snr_db: f64) {
        if snr_db.is_finite() {
            self.inner.lock().snr.push(snr_db);
        }
    }

    /// Record a received signal strength sample
    pub fn record_rssi(&self, rssi_dbm: f64) {
        if rssi_dbm.is_finite() {
            self.inner.lock().rssi.push(rssi_dbm);
        }
    }

    /// Count a rejected event or command
    pub fn record_rejected(&self) {
        self.inner.lock().rejected_events += 1;
    }

    /// Publish the rate used by the next transmission
    pub fn set_current_rate(&self, entry: &RateEntry) {
        let mut inner = self.inner.lock();
        inner.current_rate = entry.id;
        inner.current_family = entry.family;
        inner.current_modulation = entry.modulation;
    }

    /// Append one throughput sample
    pub fn tick(&self, throughput_mbps: f64) {
        let sample = if throughput_mbps.is_finite() {
            throughput_mbps.max(0.0)
        } else {
            0.0
        };
        let mut inner = self.inner.lock();
        inner.throughput_now = sample;
        inner.throughput.push(sample);
    }

    /// Append a throughput sample computed from bytes delivered since the
    /// previous call, over `interval`
    pub fn tick_elapsed(&self, interval: Duration) -> f64 {
        let mut inner = self.inner.lock();
        let secs = interval.as_secs_f64();
        let mbps = if secs > 0.0 {
            (inner.bytes_since_tick * 8) as f64 / secs / 1_000_000.0
        } else {
            0.0
        };
        inner.bytes_since_tick = 0;
        inner.throughput_now = mbps;
        inner.throughput.push(mbps);
        mbps
    }

    /// Independent copy of the current statistics
    pub fn snapshot(&self) -> LinkSnapshot {
        let inner = self.inner.lock();
        let received = inner.rx_packets + inner.rx_errors;
        let packet_error_rate = if received == 0 {
            0.0
        } else {
            inner.rx_errors as f64 / received as f64
        };
        LinkSnapshot {
            tx_packets: inner.tx_packets,
            rx_packets: inner.rx_packets,
            rx_errors: inner.rx_errors,
            tx_bytes: inner.tx_bytes,
            rx_bytes: inner.rx_bytes,
            rejected_events: inner.rejected_events,
            current_rate: inner.current_rate,
            current_family: inner.current_family,
            current_modulation: inner.current_modulation,
            throughput_mbps_now: inner.throughput_now,
            throughput_history: inner.throughput.to_vec(),
            history_capacity: inner.throughput.capacity(),
            peak_throughput_mbps: inner.throughput.max().unwrap_or(0.0),
            avg_throughput_mbps: inner.throughput.mean().unwrap_or(0.0),
            snr_db: inner.snr.last(),
            avg_snr_db: inner.snr.mean(),
            rssi_dbm: inner.rssi.last(),
            avg_rssi_dbm: inner.rssi.mean(),
            packet_error_rate,
            started_at: inner.started_at,
            elapsed: inner.started.elapsed(),
        }
    }

    /// Clear counters and histories and restart the clock
    ///
    /// The current rate is kept.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        *inner = StatsInner::new(
            self.config,
            inner.current_rate,
            inner.current_family,
            inner.current_modulation,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use wifi_rates::{RateCatalog, RateId};

    fn stats(capacity: usize) -> LinkStats {
        let catalog = RateCatalog::standard();
        let entry = catalog.lookup(RateId(0)).unwrap();
        LinkStats::new(
            StatsConfig {
                history_capacity: capacity,
                ..Default::default()
            },
            entry,
        )
    }

    #[test]
    fn test_counters() {
        let stats = stats(60);
        stats.record_transmit(100);
        stats.record_transmit(100);
        stats.record_receive(RxOutcome::Success, 100);
        stats.record_receive(RxOutcome::Error, 100);
        stats.record_receive(RxOutcome::Error, 100);

        let snap = stats.snapshot();
        assert_eq!(snap.tx_packets, 2);
        assert_eq!(snap.tx_bytes, 200);
        assert_eq!(snap.rx_packets, 1);
        assert_eq!(snap.rx_bytes, 100);
        assert_eq!(snap.rx_errors, 2);
        assert!((snap.packet_error_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_eviction() {
        let stats = stats(3);
        for sample in [1.0, 2.0, 3.0, 4.0] {
            stats.tick(sample);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.throughput_history, vec![2.0, 3.0, 4.0]);
        assert_eq!(snap.throughput_mbps_now, 4.0);
        assert_eq!(snap.peak_throughput_mbps, 4.0);
        assert!((snap.avg_throughput_mbps - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_rejects_nan() {
        let stats = stats(4);
        stats.tick(f64::NAN);
        stats.tick(-1.0);
        assert_eq!(stats.snapshot().throughput_history, vec![0.0, 0.0]);
    }

    #[test]
    fn test_tick_elapsed_uses_delivered_bytes() {
        let stats = stats(4);
        // 125_000 bytes = 1 Mbit
        stats.record_receive(RxOutcome::Success, 125_000);
        stats.record_receive(RxOutcome::Error, 125_000);
        let mbps = stats.tick_elapsed(Duration::from_secs(1));
        assert!((mbps - 1.0).abs() < 1e-9);

        // Counter restarts after each tick
        let mbps = stats.tick_elapsed(Duration::from_secs(1));
        assert_eq!(mbps, 0.0);
        assert_eq!(stats.snapshot().throughput_history.len(), 2);
    }

    #[test]
    fn test_snr_history() {
        let stats = stats(4);
        assert_eq!(stats.snapshot().snr_db, None);
        stats.record_snr(10.0);
        stats.record_snr(20.0);
        stats.record_snr(f64::INFINITY);
        let snap = stats.snapshot();
        assert_eq!(snap.snr_db, Some(20.0));
        assert_eq!(snap.avg_snr_db, Some(15.0));
    }

    #[test]
    fn test_rssi_history() {
        let catalog = RateCatalog::standard();
        let stats = LinkStats::new(
            StatsConfig {
                snr_history_capacity: 2,
                ..Default::default()
            },
            catalog.lookup(RateId(0)).unwrap(),
        );
        assert_eq!(stats.snapshot().rssi_dbm, None);
        stats.record_rssi(-80.0);
        stats.record_rssi(f64::NAN);
        stats.record_rssi(-70.0);
        stats.record_rssi(-60.0);
        let snap = stats.snapshot();
        assert_eq!(snap.rssi_dbm, Some(-60.0));
        // -80 was evicted
        assert_eq!(snap.avg_rssi_dbm, Some(-65.0));
        assert_eq!(snap.snr_db, None);

        stats.reset();
        assert_eq!(stats.snapshot().avg_rssi_dbm, None);
    }

    #[test]
    fn test_set_current_rate() {
        let catalog = RateCatalog::standard();
        let stats = stats(4);
        stats.set_current_rate(catalog.lookup(RateId(14)).unwrap());
        let snap = stats.snapshot();
        assert_eq!(snap.current_rate, RateId(14));
        assert_eq!(snap.current_family, PhyFamily::Ofdm);
        assert_eq!(snap.current_modulation, Modulation::Ofdm);
    }

    #[test]
    fn test_reset_keeps_rate() {
        let catalog = RateCatalog::standard();
        let stats = stats(4);
        stats.set_current_rate(catalog.lookup(RateId(3)).unwrap());
        stats.record_transmit(10);
        stats.record_rejected();
        stats.tick(5.0);
        stats.reset();

        let snap = stats.snapshot();
        assert_eq!(snap.tx_packets, 0);
        assert_eq!(snap.rejected_events, 0);
        assert!(snap.throughput_history.is_empty());
        assert_eq!(snap.current_rate, RateId(3));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let stats = stats(4);
        stats.tick(1.0);
        let before = stats.snapshot();
        stats.tick(2.0);
        stats.record_transmit(1);
        assert_eq!(before.throughput_history, vec![1.0]);
        assert_eq!(before.tx_packets, 0);
    }

    #[test]
    fn test_concurrent_transmit_and_snapshot() {
        let stats = Arc::new(stats(60));
        let mut workers = Vec::new();
        for _ in 0..4 {
            let stats = Arc::clone(&stats);
            workers.push(thread::spawn(move || {
                for _ in 0..1000 {
                    stats.record_transmit(1);
                }
            }));
        }
        for _ in 0..2 {
            let stats = Arc::clone(&stats);
            workers.push(thread::spawn(move || {
                let mut last = 0;
                for _ in 0..500 {
                    let snap = stats.snapshot();
                    assert!(snap.tx_packets >= last);
                    assert_eq!(snap.tx_bytes, snap.tx_packets);
                    last = snap.tx_packets;
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(stats.snapshot().tx_packets, 4000);
    }
}
