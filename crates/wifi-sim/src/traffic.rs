//! Simulated transmit path
//!
//! [`TrafficGenerator`] plays the role of the packet source and the receive
//! path at once: before each frame it reads the current transmit
//! configuration from the link, sends the frame over a
//! [`SimulatedChannel`], and reports the outcome and the measured SNR and
//! RSSI back.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};
use wifi_link::{LinkHandle, OutcomeSample, SnrSample};
use wifi_rates::RateCatalog;

use crate::channel::{FrameResult, SimulatedChannel, SnrProfile};
use crate::error::SimError;

/// Highest supported frame rate
pub const MAX_PACKETS_PER_SECOND: u32 = 1_000_000;

/// Traffic parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Frames per second
    pub packets_per_second: u32,
    /// Frame payload length (bytes)
    pub packet_size: usize,
    /// Stop after this long; `None` runs until shut down
    pub duration: Option<Duration>,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            packets_per_second: 10,
            packet_size: 100,
            duration: None,
        }
    }
}

/// Commands sent to a running generator
#[derive(Debug, Clone)]
pub enum TrafficCommand {
    /// Replace the channel SNR profile
    SetProfile(SnrProfile),
    /// Stop sending
    Shutdown,
}

/// Totals of a traffic run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficSummary {
    /// Frames sent
    pub frames_sent: u64,
    /// Frames delivered
    pub frames_delivered: u64,
}

/// Drives frames through a simulated channel and feeds the link controller
pub struct TrafficGenerator {
    link: LinkHandle,
    channel: SimulatedChannel,
    catalog: RateCatalog,
    config: TrafficConfig,
    summary: TrafficSummary,
}

impl TrafficGenerator {
    /// Create a generator
    pub fn new(
        link: LinkHandle,
        channel: SimulatedChannel,
        catalog: RateCatalog,
        config: TrafficConfig,
    ) -> Result<Self, SimError> {
        if !(1..=MAX_PACKETS_PER_SECOND).contains(&config.packets_per_second) {
            return Err(SimError::InvalidParameter(format!(
                "packets_per_second must be in 1..={}, got {}",
                MAX_PACKETS_PER_SECOND, config.packets_per_second
            )));
        }
        Ok(Self {
            link,
            channel,
            catalog,
            config,
            summary: TrafficSummary::default(),
        })
    }

    /// Totals so far
    pub fn summary(&self) -> TrafficSummary {
        self.summary
    }

    /// Send one frame at `elapsed` since the start of the run
    pub async fn send_frame(&mut self, elapsed: Duration) -> Result<FrameResult, SimError> {
        let tx = self.link.current_configuration();
        let entry = self.catalog.lookup(tx.rate)?;
        let size = self.config.packet_size;

        self.link.record_transmit(size);
        let result = self.channel.send(entry, elapsed);
        self.summary.frames_sent += 1;
        if result.delivered {
            self.summary.frames_delivered += 1;
        }

        self.link
            .report_outcome(OutcomeSample::new(tx.rate, result.delivered, size))
            .await?;
        self.link
            .report_snr(SnrSample::with_rssi(result.snr_db, result.rssi_dbm))
            .await?;
        Ok(result)
    }

    /// Send frames at the configured rate until the duration elapses, a
    /// `Shutdown` arrives or every command sender is dropped
    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<TrafficCommand>,
    ) -> Result<TrafficSummary, SimError> {
        let period = Duration::from_secs(1) / self.config.packets_per_second;
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let start = Instant::now();
        info!(
            "Traffic started: {} pps, {} byte frames",
            self.config.packets_per_second, self.config.packet_size
        );

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(TrafficCommand::SetProfile(profile)) => {
                            self.channel.set_profile(profile)?;
                            info!("SNR profile changed to {:?}", profile);
                        }
                        Some(TrafficCommand::Shutdown) | None => break,
                    }
                }

                _ = timer.tick() => {
                    let elapsed = start.elapsed();
                    if self.config.duration.is_some_and(|d| elapsed >= d) {
                        break;
                    }
                    let result = self.send_frame(elapsed).await?;
                    debug!(
                        "Frame {} at {:.1} dB: {}",
                        self.summary.frames_sent,
                        result.snr_db,
                        if result.delivered { "delivered" } else { "lost" }
                    );
                }
            }
        }

        info!(
            "Traffic stopped: {}/{} frames delivered",
            self.summary.frames_delivered, self.summary.frames_sent
        );
        Ok(self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use wifi_link::{LinkConfig, LinkSession};
    use wifi_rates::{PhyFamily, RateId};

    fn link() -> (LinkHandle, tokio::task::JoinHandle<()>) {
        let config = LinkConfig::default();
        let session = LinkSession::new(&config).unwrap();
        let (handle, _events, task) = LinkHandle::spawn(session, &config);
        (handle, task)
    }

    fn channel(snr_db: f64) -> SimulatedChannel {
        SimulatedChannel::new(ChannelConfig {
            profile: SnrProfile::Constant { snr_db },
            seed: Some(42),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_feeds_link() {
        let (handle, task) = link();
        let generator = TrafficGenerator::new(
            handle.clone(),
            channel(30.0),
            RateCatalog::standard(),
            TrafficConfig {
                packets_per_second: 50,
                packet_size: 1400,
                duration: Some(Duration::from_secs(2)),
            },
        )
        .unwrap();
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let summary = generator.run(cmd_rx).await.unwrap();
        assert!((95..=101).contains(&summary.frames_sent));

        // Round-trip so every queued outcome has been applied
        handle.rate_table().await.unwrap();
        let snap = handle.snapshot();
        assert_eq!(snap.tx_packets, summary.frames_sent);
        assert_eq!(snap.rx_packets, summary.frames_delivered);
        assert_eq!(snap.rx_packets + snap.rx_errors, summary.frames_sent);
        assert_eq!(snap.current_family, PhyFamily::Dsss);
        assert!(snap.snr_db.is_some());
        assert!(snap.avg_rssi_dbm.is_some_and(|rssi| rssi > -75.0 && rssi < -55.0));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_frame_uses_current_rate() {
        let (handle, task) = link();
        handle.switch_family(PhyFamily::Ofdm).await.unwrap();
        let mut generator = TrafficGenerator::new(
            handle.clone(),
            channel(40.0),
            RateCatalog::standard(),
            TrafficConfig::default(),
        )
        .unwrap();

        let result = generator.send_frame(Duration::ZERO).await.unwrap();
        assert!(result.delivered);
        let table = handle.rate_table().await.unwrap();
        let row = table.iter().find(|r| r.rate == RateId(7)).unwrap();
        assert_eq!(row.stats.attempts, 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_command_stops_run() {
        let (handle, task) = link();
        let generator = TrafficGenerator::new(
            handle.clone(),
            channel(20.0),
            RateCatalog::standard(),
            TrafficConfig::default(),
        )
        .unwrap();
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        cmd_tx.send(TrafficCommand::Shutdown).await.unwrap();
        let summary = generator.run(cmd_rx).await.unwrap();
        assert!(summary.frames_sent <= 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_at_max_rate() {
        let (handle, task) = link();
        let generator = TrafficGenerator::new(
            handle.clone(),
            channel(20.0),
            RateCatalog::standard(),
            TrafficConfig {
                packets_per_second: MAX_PACKETS_PER_SECOND,
                packet_size: 100,
                duration: Some(Duration::from_micros(50)),
            },
        )
        .unwrap();
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let summary = generator.run(cmd_rx).await.unwrap();
        assert!(summary.frames_sent >= 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_rate() {
        let (handle, task) = link();
        let result = TrafficGenerator::new(
            handle.clone(),
            channel(20.0),
            RateCatalog::standard(),
            TrafficConfig {
                packets_per_second: 0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(SimError::InvalidParameter(_))));

        for packets_per_second in [MAX_PACKETS_PER_SECOND + 1, 2_000_000_000, u32::MAX] {
            let result = TrafficGenerator::new(
                handle.clone(),
                channel(20.0),
                RateCatalog::standard(),
                TrafficConfig {
                    packets_per_second,
                    ..Default::default()
                },
            );
            assert!(matches!(result, Err(SimError::InvalidParameter(_))));
        }

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
