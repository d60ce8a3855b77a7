//! Command-line options

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use wifi_link::LinkConfig;
use wifi_rates::{PhyFamily, RateCatalog};
use wifi_sim::{ChannelConfig, SnrProfile, TrafficConfig, MAX_PACKETS_PER_SECOND};

/// Wi-Fi link adaptation monitor
#[derive(Parser, Debug)]
#[command(
    name = "wifi-monitor",
    version,
    about = "Run the Wi-Fi link controller over a simulated channel"
)]
pub struct Cli {
    /// Initial rate (e.g. 1M_LONG, 11M_SHORT, OFDM_54M, HT_MCS7)
    #[arg(short, long)]
    pub rate: Option<String>,

    /// Initial PHY family (dsss, ofdm, ht, vht)
    #[arg(short, long)]
    pub family: Option<String>,

    /// Enable automatic rate adaptation
    #[arg(short, long)]
    pub auto_rate: bool,

    /// Packets per second
    #[arg(
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_PACKETS_PER_SECOND))
    )]
    pub pps: u32,

    /// Packet size in bytes
    #[arg(long, default_value_t = 100)]
    pub packet_size: usize,

    /// Highest acceptable packet error rate for adapted rates (0.0-1.0)
    #[arg(long)]
    pub target_per: Option<f64>,

    /// Channel SNR in dB
    #[arg(long, default_value_t = 20.0)]
    pub snr: f64,

    /// Ramp the SNR linearly to this value over the run
    #[arg(long, requires = "duration")]
    pub snr_end: Option<f64>,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Channel RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Link configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the effective link configuration to this file
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Print status lines as JSON
    #[arg(long)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Run length, if bounded
    pub fn run_duration(&self) -> Option<Duration> {
        self.duration.map(Duration::from_secs)
    }

    /// Fold the command-line overrides into `config`
    ///
    /// A rate given without `--auto-rate` runs the link in manual mode.
    pub fn apply(&self, catalog: &RateCatalog, config: &mut LinkConfig) -> anyhow::Result<()> {
        let family = match &self.family {
            Some(name) => Some(
                name.parse::<PhyFamily>()
                    .with_context(|| format!("unknown family {:?}", name))?,
            ),
            None => None,
        };

        if let Some(key) = &self.rate {
            let entry = catalog
                .by_key(key)
                .with_context(|| format!("unknown rate {:?}", key))?;
            if let Some(family) = family {
                if entry.family != family {
                    bail!("rate {} belongs to {}, not {}", entry.key, entry.family, family);
                }
            }
            config.initial_family = entry.family;
            config.initial_rate = Some(entry.id);
            config.auto_rate = self.auto_rate;
        } else if let Some(family) = family {
            config.initial_family = family;
            config.initial_rate = None;
        }

        if self.auto_rate {
            config.auto_rate = true;
        }
        if self.target_per.is_some() {
            config.adapter.target_per = self.target_per;
        }
        Ok(())
    }

    /// Channel model for the run
    pub fn channel_config(&self) -> ChannelConfig {
        let profile = match (self.snr_end, self.run_duration()) {
            (Some(end_db), Some(duration)) => SnrProfile::Ramp {
                start_db: self.snr,
                end_db,
                duration,
            },
            _ => SnrProfile::Constant { snr_db: self.snr },
        };
        ChannelConfig {
            profile,
            seed: self.seed,
            ..Default::default()
        }
    }

    /// Traffic parameters for the run
    pub fn traffic_config(&self) -> TrafficConfig {
        TrafficConfig {
            packets_per_second: self.pps,
            packet_size: self.packet_size,
            duration: self.run_duration(),
        }
    }
}
