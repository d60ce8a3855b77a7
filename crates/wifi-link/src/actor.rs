//! Link actor
//!
//! The actor is the single consumer that owns the [`LinkSession`]. Receive
//! path feedback and operator commands arrive on one channel and are applied
//! in order; the reporting tick and the decision window run on timers in the
//! same task. Readers never go through the actor: snapshots come straight
//! from the shared aggregator and the transmit configuration from its atomic
//! word.
//!
//! # Example
//!
//! ```rust,ignore
//! use wifi_link::{LinkConfig, LinkHandle, LinkSession, OutcomeSample};
//!
//! let config = LinkConfig::default();
//! let session = LinkSession::new(&config)?;
//! let (handle, mut events, task) = LinkHandle::spawn(session, &config);
//!
//! let tx = handle.current_configuration();
//! handle.report_outcome(OutcomeSample::new(tx.rate, true, 1400)).await?;
//! println!("{:?}", handle.snapshot());
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use wifi_rates::{PhyFamily, RateId};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::LinkEvent;
use crate::feedback::{OutcomeSample, SnrSample};
use crate::session::{ActiveConfig, LinkSession, RateStatsRow, TxConfig};
use crate::stats::{LinkSnapshot, LinkStats};

/// Capacity of the command and event channels created by [`LinkHandle::spawn`]
pub const CHANNEL_CAPACITY: usize = 256;

/// Commands sent to the link actor
#[derive(Debug)]
pub enum LinkCommand {
    /// Delivery outcome from the receive path
    Outcome(OutcomeSample),

    /// SNR measurement from the receive path
    Snr(SnrSample),

    /// Replace the current rate
    ApplyDecision {
        /// Requested rate
        rate: RateId,
        /// Result channel
        response: oneshot::Sender<Result<(), LinkError>>,
    },

    /// Fix the rate and disable adaptation
    OverrideRate {
        /// Requested rate
        rate: RateId,
        /// Result channel
        response: oneshot::Sender<Result<(), LinkError>>,
    },

    /// Switch PHY family
    SwitchFamily {
        /// Target family
        family: PhyFamily,
        /// Result channel, carrying the new current rate
        response: oneshot::Sender<Result<RateId, LinkError>>,
    },

    /// Enable or disable automatic adaptation
    SetAutoRate {
        /// New state
        enabled: bool,
    },

    /// Bound adaptation by PHY bitrate
    SetRateLimits {
        /// Lowest bitrate (Mbps)
        min_mbps: Option<f64>,
        /// Highest bitrate (Mbps)
        max_mbps: Option<f64>,
        /// Result channel
        response: oneshot::Sender<Result<(), LinkError>>,
    },

    /// Clear aggregated statistics
    ResetStats,

    /// Query the adapter statistics of the active family
    QueryRateTable {
        /// Result channel
        response: oneshot::Sender<Vec<RateStatsRow>>,
    },

    /// Stop the actor
    Shutdown,
}

/// Timer periods of the actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorTiming {
    /// Throughput reporting interval
    pub tick: Duration,
    /// Decision window length
    pub decision_window: Duration,
}

impl From<&LinkConfig> for ActorTiming {
    fn from(config: &LinkConfig) -> Self {
        Self {
            tick: config.tick_interval(),
            decision_window: config.decision_window(),
        }
    }
}

/// Run the link actor until `Shutdown` or until every sender is dropped
pub async fn run_link_actor(
    mut session: LinkSession,
    mut cmd_rx: mpsc::Receiver<LinkCommand>,
    event_tx: mpsc::Sender<LinkEvent>,
    timing: ActorTiming,
) {
    info!(
        "Link actor started (tick {:?}, window {:?})",
        timing.tick, timing.decision_window
    );

    let mut tick_timer = interval(timing.tick);
    tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut window_timer = interval(timing.decision_window);
    window_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Both intervals fire immediately; consume that so the first sample
    // covers a full period.
    tick_timer.tick().await;
    window_timer.tick().await;
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                match cmd {
                    LinkCommand::Outcome(sample) => {
                        // Rejections are logged and counted by the session
                        let _ = session.handle_outcome(sample);
                    }

                    LinkCommand::Snr(sample) => {
                        session.handle_snr(sample);
                    }

                    LinkCommand::ApplyDecision { rate, response } => {
                        let _ = response.send(session.apply_decision(rate));
                    }

                    LinkCommand::OverrideRate { rate, response } => {
                        let _ = response.send(session.override_rate(rate));
                    }

                    LinkCommand::SwitchFamily { family, response } => {
                        let _ = response.send(session.switch_family(family));
                    }

                    LinkCommand::SetAutoRate { enabled } => {
                        session.set_auto_rate(enabled);
                    }

                    LinkCommand::SetRateLimits { min_mbps, max_mbps, response } => {
                        let _ = response.send(session.set_rate_limits(min_mbps, max_mbps));
                    }

                    LinkCommand::ResetStats => {
                        session.reset_stats();
                    }

                    LinkCommand::QueryRateTable { response } => {
                        let _ = response.send(session.rate_table());
                    }

                    LinkCommand::Shutdown => {
                        info!("Link actor shutting down");
                        break;
                    }
                }
            }

            _ = tick_timer.tick() => {
                let now = Instant::now();
                let mbps = session.stats().tick_elapsed(now - last_tick);
                last_tick = now;
                debug!("Throughput sample {:.3} Mbps", mbps);
            }

            _ = window_timer.tick() => {
                session.end_window();
            }
        }

        forward_events(&mut session, &event_tx);
    }

    forward_events(&mut session, &event_tx);
    info!("Link actor stopped");
}

/// Push buffered session events to observers without blocking the actor
fn forward_events(session: &mut LinkSession, event_tx: &mpsc::Sender<LinkEvent>) {
    for event in session.drain_events() {
        match event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event channel full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
}

/// Cloneable front end of a running link actor
///
/// Feedback and commands go through the actor; `snapshot` and
/// `current_configuration` are served directly from shared state.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    cmd_tx: mpsc::Sender<LinkCommand>,
    stats: Arc<LinkStats>,
    active: Arc<ActiveConfig>,
}

impl LinkHandle {
    /// Spawn the actor for `session` on the current tokio runtime
    pub fn spawn(
        session: LinkSession,
        config: &LinkConfig,
    ) -> (Self, mpsc::Receiver<LinkEvent>, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = Self {
            cmd_tx,
            stats: Arc::clone(session.stats()),
            active: session.config_handle(),
        };
        let task = tokio::spawn(run_link_actor(
            session,
            cmd_rx,
            event_tx,
            ActorTiming::from(config),
        ));
        (handle, event_rx, task)
    }

    /// Independent copy of the link statistics
    pub fn snapshot(&self) -> LinkSnapshot {
        self.stats.snapshot()
    }

    /// Current (rate, family), read without locking
    pub fn current_configuration(&self) -> TxConfig {
        self.active.load()
    }

    /// Count a frame handed to the transmit path
    pub fn record_transmit(&self, bytes: usize) {
        self.stats.record_transmit(bytes);
    }

    /// Queue a delivery outcome
    pub async fn report_outcome(&self, sample: OutcomeSample) -> Result<(), LinkError> {
        self.send(LinkCommand::Outcome(sample)).await
    }

    /// Queue an SNR sample
    pub async fn report_snr(&self, sample: SnrSample) -> Result<(), LinkError> {
        self.send(LinkCommand::Snr(sample)).await
    }

    /// Replace the current rate
    pub async fn apply_decision(&self, rate: RateId) -> Result<(), LinkError> {
        let (response, rx) = oneshot::channel();
        self.send(LinkCommand::ApplyDecision { rate, response }).await?;
        rx.await.map_err(|_| LinkError::ActorStopped)?
    }

    /// Fix the rate and disable adaptation
    pub async fn override_rate(&self, rate: RateId) -> Result<(), LinkError> {
        let (response, rx) = oneshot::channel();
        self.send(LinkCommand::OverrideRate { rate, response }).await?;
        rx.await.map_err(|_| LinkError::ActorStopped)?
    }

    /// Switch PHY family, returning the new current rate
    pub async fn switch_family(&self, family: PhyFamily) -> Result<RateId, LinkError> {
        let (response, rx) = oneshot::channel();
        self.send(LinkCommand::SwitchFamily { family, response })
            .await?;
        rx.await.map_err(|_| LinkError::ActorStopped)?
    }

    /// Enable or disable automatic adaptation
    pub async fn set_auto_rate(&self, enabled: bool) -> Result<(), LinkError> {
        self.send(LinkCommand::SetAutoRate { enabled }).await
    }

    /// Bound adaptation by PHY bitrate
    pub async fn set_rate_limits(
        &self,
        min_mbps: Option<f64>,
        max_mbps: Option<f64>,
    ) -> Result<(), LinkError> {
        let (response, rx) = oneshot::channel();
        self.send(LinkCommand::SetRateLimits {
            min_mbps,
            max_mbps,
            response,
        })
        .await?;
        rx.await.map_err(|_| LinkError::ActorStopped)?
    }

    /// Clear aggregated statistics
    pub async fn reset_stats(&self) -> Result<(), LinkError> {
        self.send(LinkCommand::ResetStats).await
    }

    /// Adapter statistics of the active family
    pub async fn rate_table(&self) -> Result<Vec<RateStatsRow>, LinkError> {
        let (response, rx) = oneshot::channel();
        self.send(LinkCommand::QueryRateTable { response }).await?;
        rx.await.map_err(|_| LinkError::ActorStopped)
    }

    /// Ask the actor to stop
    pub async fn shutdown(&self) -> Result<(), LinkError> {
        self.send(LinkCommand::Shutdown).await
    }

    async fn send(&self, cmd: LinkCommand) -> Result<(), LinkError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| LinkError::ActorStopped)
    }
}
