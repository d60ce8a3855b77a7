//! Simulated radio channel
//!
//! Frame delivery follows a logistic curve around the SNR each rate needs:
//! at the required SNR half the frames get through, a few dB above almost
//! all of them do. The channel SNR follows a [`SnrProfile`] over time with
//! Gaussian measurement noise on top.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use wifi_rates::{PhyFamily, RateEntry};

use crate::error::SimError;

/// Receiver noise floor for a 20 MHz channel (dBm)
pub const NOISE_FLOOR_DBM: f64 = -95.0;

/// Required SNR (dB) for OFDM-based rates by PHY bitrate
const OFDM_REQUIRED_SNR: &[(f64, f64)] = &[
    (6.0, 5.0),
    (9.0, 6.0),
    (12.0, 8.0),
    (18.0, 11.0),
    (24.0, 14.0),
    (36.0, 18.0),
    (48.0, 22.0),
    (54.0, 24.0),
    (65.0, 26.0),
    (78.0, 29.0),
    (86.7, 31.0),
];

/// SNR at which half of the frames sent at `entry` are delivered
pub fn required_snr_db(entry: &RateEntry) -> f64 {
    match entry.family {
        PhyFamily::Dsss => {
            if entry.mbps <= 1.0 {
                1.0
            } else if entry.mbps <= 2.0 {
                4.0
            } else if entry.mbps <= 5.5 {
                7.0
            } else {
                10.0
            }
        }
        PhyFamily::Ofdm | PhyFamily::Ht | PhyFamily::Vht => {
            interpolate(OFDM_REQUIRED_SNR, entry.mbps)
        }
    }
}

fn interpolate(table: &[(f64, f64)], x: f64) -> f64 {
    let Some(&(first_x, first_y)) = table.first() else {
        return 0.0;
    };
    if x <= first_x {
        return first_y;
    }
    for pair in table.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    table.last().map_or(first_y, |&(_, y)| y)
}

/// Channel SNR over time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnrProfile {
    /// Fixed SNR
    Constant {
        /// SNR (dB)
        snr_db: f64,
    },
    /// Linear change from `start_db` to `end_db`, then constant
    Ramp {
        /// SNR at time zero (dB)
        start_db: f64,
        /// SNR at the end of the ramp (dB)
        end_db: f64,
        /// Ramp length
        duration: Duration,
    },
    /// Sudden change at `at`
    Step {
        /// SNR before the step (dB)
        before_db: f64,
        /// SNR after the step (dB)
        after_db: f64,
        /// Time of the step
        at: Duration,
    },
}

impl Default for SnrProfile {
    fn default() -> Self {
        SnrProfile::Constant { snr_db: 20.0 }
    }
}

impl SnrProfile {
    /// SNR at `elapsed` since the start of the simulation
    pub fn snr_at(&self, elapsed: Duration) -> f64 {
        match *self {
            SnrProfile::Constant { snr_db } => snr_db,
            SnrProfile::Ramp {
                start_db,
                end_db,
                duration,
            } => {
                if duration.is_zero() || elapsed >= duration {
                    end_db
                } else {
                    let t = elapsed.as_secs_f64() / duration.as_secs_f64();
                    start_db + (end_db - start_db) * t
                }
            }
            SnrProfile::Step {
                before_db,
                after_db,
                at,
            } => {
                if elapsed < at {
                    before_db
                } else {
                    after_db
                }
            }
        }
    }

    fn validate(&self) -> Result<(), SimError> {
        let finite = match *self {
            SnrProfile::Constant { snr_db } => snr_db.is_finite(),
            SnrProfile::Ramp {
                start_db, end_db, ..
            } => start_db.is_finite() && end_db.is_finite(),
            SnrProfile::Step {
                before_db,
                after_db,
                ..
            } => before_db.is_finite() && after_db.is_finite(),
        };
        if finite {
            Ok(())
        } else {
            Err(SimError::InvalidProfile(format!("{:?}", self)))
        }
    }
}

/// Channel model parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// SNR over time
    pub profile: SnrProfile,
    /// Standard deviation of the SNR measurement noise (dB)
    pub snr_noise_db: f64,
    /// Width of the delivery curve (dB); smaller is steeper
    pub slope_db: f64,
    /// RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            profile: SnrProfile::default(),
            snr_noise_db: 1.0,
            slope_db: 1.0,
            seed: None,
        }
    }
}

/// Result of sending one frame over the channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameResult {
    /// SNR measured for this frame (dB)
    pub snr_db: f64,
    /// Signal strength measured for this frame (dBm)
    pub rssi_dbm: f64,
    /// Whether the frame was delivered
    pub delivered: bool,
}

/// Seeded simulated channel
#[derive(Debug, Clone)]
pub struct SimulatedChannel {
    config: ChannelConfig,
    rng: StdRng,
    noise: Normal<f64>,
}

impl SimulatedChannel {
    /// Create a channel
    pub fn new(config: ChannelConfig) -> Result<Self, SimError> {
        config.profile.validate()?;
        if !(config.slope_db.is_finite() && config.slope_db > 0.0) {
            return Err(SimError::InvalidParameter(format!(
                "slope_db must be positive, got {}",
                config.slope_db
            )));
        }
        let noise = Normal::new(0.0, config.snr_noise_db)
            .map_err(|e| SimError::InvalidParameter(format!("snr_noise_db: {}", e)))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { config, rng, noise })
    }

    /// Channel parameters
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Replace the SNR profile
    pub fn set_profile(&mut self, profile: SnrProfile) -> Result<(), SimError> {
        profile.validate()?;
        self.config.profile = profile;
        Ok(())
    }

    /// Probability that a frame at `entry` is delivered at `snr_db`
    pub fn delivery_probability(&self, entry: &RateEntry, snr_db: f64) -> f64 {
        let margin = snr_db - required_snr_db(entry);
        1.0 / (1.0 + (-margin / self.config.slope_db).exp())
    }

    /// Send one frame at `elapsed` since the start of the simulation
    pub fn send(&mut self, entry: &RateEntry, elapsed: Duration) -> FrameResult {
        let true_snr = self.config.profile.snr_at(elapsed);
        let p = self.delivery_probability(entry, true_snr);
        let delivered = self.rng.gen_bool(p.clamp(0.0, 1.0));
        let snr_db = true_snr + self.noise.sample(&mut self.rng);
        FrameResult {
            snr_db,
            rssi_dbm: NOISE_FLOOR_DBM + snr_db,
            delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wifi_rates::{RateCatalog, RateId};

    fn rate(id: u16) -> RateEntry {
        *RateCatalog::standard().lookup(RateId(id)).unwrap()
    }

    fn seeded(profile: SnrProfile) -> SimulatedChannel {
        SimulatedChannel::new(ChannelConfig {
            profile,
            seed: Some(7),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_required_snr_grows_with_rate() {
        assert!(required_snr_db(&rate(0)) < required_snr_db(&rate(3)));
        assert!(required_snr_db(&rate(7)) < required_snr_db(&rate(14)));
        assert!(required_snr_db(&rate(22)) < required_snr_db(&rate(32)));
        // 6.5 Mbps sits between the 6 and 9 Mbps points
        let ht0 = required_snr_db(&rate(15));
        assert!(ht0 > 5.0 && ht0 < 6.0);
    }

    #[test]
    fn test_profiles() {
        let ramp = SnrProfile::Ramp {
            start_db: 30.0,
            end_db: 10.0,
            duration: Duration::from_secs(10),
        };
        assert_eq!(ramp.snr_at(Duration::ZERO), 30.0);
        assert!((ramp.snr_at(Duration::from_secs(5)) - 20.0).abs() < 1e-9);
        assert_eq!(ramp.snr_at(Duration::from_secs(60)), 10.0);

        let step = SnrProfile::Step {
            before_db: 25.0,
            after_db: 5.0,
            at: Duration::from_secs(2),
        };
        assert_eq!(step.snr_at(Duration::from_secs(1)), 25.0);
        assert_eq!(step.snr_at(Duration::from_secs(2)), 5.0);
    }

    #[test]
    fn test_delivery_probability_curve() {
        let channel = seeded(SnrProfile::default());
        let entry = rate(3);
        let required = required_snr_db(&entry);
        assert!((channel.delivery_probability(&entry, required) - 0.5).abs() < 1e-9);
        assert!(channel.delivery_probability(&entry, required + 10.0) > 0.99);
        assert!(channel.delivery_probability(&entry, required - 10.0) < 0.01);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let mut a = seeded(SnrProfile::Constant { snr_db: 10.0 });
        let mut b = seeded(SnrProfile::Constant { snr_db: 10.0 });
        let entry = rate(3);
        for i in 0..100 {
            let t = Duration::from_millis(i);
            assert_eq!(a.send(&entry, t), b.send(&entry, t));
        }
    }

    #[test]
    fn test_high_snr_delivers_robust_rate() {
        let mut channel = seeded(SnrProfile::Constant { snr_db: 30.0 });
        let entry = rate(0);
        let delivered = (0..200)
            .filter(|_| channel.send(&entry, Duration::ZERO).delivered)
            .count();
        assert_eq!(delivered, 200);
    }

    #[test]
    fn test_rssi_tracks_snr() {
        let mut channel = seeded(SnrProfile::Constant { snr_db: 25.0 });
        let frame = channel.send(&rate(0), Duration::ZERO);
        assert!((frame.rssi_dbm - (NOISE_FLOOR_DBM + frame.snr_db)).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(
            SimulatedChannel::new(ChannelConfig {
                profile: SnrProfile::Constant { snr_db: f64::NAN },
                ..Default::default()
            }),
            Err(SimError::InvalidProfile(_))
        ));
        assert!(matches!(
            SimulatedChannel::new(ChannelConfig {
                slope_db: 0.0,
                ..Default::default()
            }),
            Err(SimError::InvalidParameter(_))
        ));
        assert!(matches!(
            SimulatedChannel::new(ChannelConfig {
                snr_noise_db: -1.0,
                ..Default::default()
            }),
            Err(SimError::InvalidParameter(_))
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn delivery_probability_is_monotone_in_snr(
                id in 0u16..33,
                snr in -20.0f64..60.0,
                delta in 0.0f64..20.0,
            ) {
                let channel = seeded(SnrProfile::default());
                let entry = rate(id);
                let low = channel.delivery_probability(&entry, snr);
                let high = channel.delivery_probability(&entry, snr + delta);
                prop_assert!((0.0..=1.0).contains(&low));
                prop_assert!(high >= low);
            }

            #[test]
            fn ramp_stays_between_endpoints(
                start in -10.0f64..40.0,
                end in -10.0f64..40.0,
                at_ms in 0u64..20_000,
            ) {
                let ramp = SnrProfile::Ramp {
                    start_db: start,
                    end_db: end,
                    duration: Duration::from_secs(10),
                };
                let snr = ramp.snr_at(Duration::from_millis(at_ms));
                prop_assert!(snr >= start.min(end) - 1e-9);
                prop_assert!(snr <= start.max(end) + 1e-9);
            }
        }
    }
}
