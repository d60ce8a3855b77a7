//! Wi-Fi Link Monitor
//!
//! Runs the link controller against a simulated channel and prints the link
//! state twice a second until the run ends or Ctrl-C is pressed.

mod cli;
mod display;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wifi_link::{LinkConfig, LinkHandle, LinkSession};
use wifi_rates::RateCatalog;
use wifi_sim::{SimulatedChannel, TrafficCommand, TrafficGenerator};

use cli::Cli;

const DISPLAY_INTERVAL: Duration = Duration::from_millis(500);

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "wifi_link=debug,wifi_rates=debug,wifi_sim=debug,wifi_monitor=debug"
    } else {
        "wifi_link=info,wifi_rates=info,wifi_sim=info,wifi_monitor=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let catalog = RateCatalog::standard();
    let mut config = match &cli.config {
        Some(path) => LinkConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => LinkConfig::default(),
    };
    cli.apply(&catalog, &mut config)?;
    config.validate().context("invalid link configuration")?;
    if let Some(path) = &cli.save_config {
        config
            .save(path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        info!("Saved configuration to {}", path.display());
    }

    let channel =
        SimulatedChannel::new(cli.channel_config()).context("invalid channel parameters")?;
    let session = LinkSession::with_catalog(catalog.clone(), &config)
        .context("failed to start link session")?;
    let (link, mut events, actor) = LinkHandle::spawn(session, &config);

    let generator = TrafficGenerator::new(
        link.clone(),
        channel,
        catalog.clone(),
        cli.traffic_config(),
    )?;
    let (traffic_tx, traffic_rx) = mpsc::channel(4);
    let mut traffic = tokio::spawn(generator.run(traffic_rx));

    info!(
        "Starting in {} at {} ({})",
        config.initial_family,
        link.current_configuration().rate,
        if config.auto_rate { "auto rate" } else { "manual" }
    );

    let mut display = interval(DISPLAY_INTERVAL);
    display.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut auto_rate = config.auto_rate;

    let traffic_result = loop {
        tokio::select! {
            result = &mut traffic => break result,

            _ = &mut ctrl_c => {
                info!("Stopping...");
                // The generator may already have finished on its own
                let _ = traffic_tx.send(TrafficCommand::Shutdown).await;
                break (&mut traffic).await;
            }

            Some(event) = events.recv() => {
                if let wifi_link::LinkEvent::AutoRateChanged { enabled } = event {
                    auto_rate = enabled;
                }
                info!("{}", display::describe_event(&catalog, &event));
            }

            _ = display.tick() => {
                let snapshot = link.snapshot();
                if cli.json {
                    println!("{}", display::status_json(&catalog, &snapshot, auto_rate)?);
                } else {
                    println!("{}", display::status_text(&catalog, &snapshot, auto_rate));
                }
            }
        }
    };
    let summary = traffic_result
        .context("traffic task panicked")?
        .context("traffic generator failed")?;

    let table = link.rate_table().await?;
    let snapshot = link.snapshot();
    link.shutdown().await?;
    actor.await.context("link actor panicked")?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "summary": summary,
                "stats": snapshot,
                "rates": table.iter().filter(|r| r.stats.attempts > 0).collect::<Vec<_>>(),
            })
        );
    } else {
        println!();
        print!(
            "{}",
            display::summary_text(&catalog, &snapshot, &summary, &table)
        );
    }
    Ok(())
}
