//! Status and summary output

use std::fmt::Write as _;

use serde::Serialize;
use wifi_link::{LinkEvent, LinkSnapshot, RateStatsRow};
use wifi_rates::{RateCatalog, RateId};
use wifi_sim::TrafficSummary;

fn rate_key(catalog: &RateCatalog, rate: RateId) -> &'static str {
    catalog.lookup(rate).map_or("?", |e| e.key)
}

fn format_snr(snr_db: Option<f64>) -> String {
    snr_db.map_or_else(|| "-".to_string(), |s| format!("{:.1} dB", s))
}

/// One status line
#[derive(Debug, Serialize)]
pub struct StatusLine<'a> {
    /// Current rate key
    pub rate: &'static str,
    /// Whether the adapter drives the rate
    pub auto_rate: bool,
    /// Snapshot of the link counters
    #[serde(flatten)]
    pub snapshot: &'a LinkSnapshot,
}

/// Render a status line as text
pub fn status_text(catalog: &RateCatalog, snapshot: &LinkSnapshot, auto_rate: bool) -> String {
    format!(
        "[{:>6.1}s] {} TX: {:6} | RX: {:6} | Rate: {:12} | Mod: {:4} | Tput: {:6.2} Mbps | SNR: {:>8} | PER: {:5.2}%",
        snapshot.elapsed.as_secs_f64(),
        if auto_rate { "AUTO  " } else { "MANUAL" },
        snapshot.tx_packets,
        snapshot.rx_packets,
        rate_key(catalog, snapshot.current_rate),
        snapshot.current_modulation.name(),
        snapshot.throughput_mbps_now,
        format_snr(snapshot.snr_db),
        snapshot.packet_error_rate * 100.0,
    )
}

/// Render a status line as JSON
pub fn status_json(
    catalog: &RateCatalog,
    snapshot: &LinkSnapshot,
    auto_rate: bool,
) -> serde_json::Result<String> {
    serde_json::to_string(&StatusLine {
        rate: rate_key(catalog, snapshot.current_rate),
        auto_rate,
        snapshot,
    })
}

/// Describe a controller event for the log
pub fn describe_event(catalog: &RateCatalog, event: &LinkEvent) -> String {
    match event {
        LinkEvent::RateChanged { from, to, cause } => format!(
            "rate {} -> {} ({:?})",
            rate_key(catalog, *from),
            rate_key(catalog, *to),
            cause
        ),
        LinkEvent::FamilyChanged { from, to, rate } => {
            format!("family {} -> {} at {}", from, to, rate_key(catalog, *rate))
        }
        LinkEvent::AutoRateChanged { enabled } => {
            format!("auto rate {}", if *enabled { "on" } else { "off" })
        }
        LinkEvent::Rejected { reason } => format!("rejected: {}", reason),
        LinkEvent::StatsReset => "statistics reset".to_string(),
    }
}

/// Final report
pub fn summary_text(
    catalog: &RateCatalog,
    snapshot: &LinkSnapshot,
    traffic: &TrafficSummary,
    table: &[RateStatsRow],
) -> String {
    let mut out = String::new();
    let secs = snapshot.elapsed.as_secs();
    let _ = writeln!(out, "Final Statistics:");
    let _ = writeln!(out, "  Runtime:            {}m {}s", secs / 60, secs % 60);
    let _ = writeln!(
        out,
        "  Frames:             {} sent, {} delivered",
        traffic.frames_sent, traffic.frames_delivered
    );
    let _ = writeln!(
        out,
        "  TX:                 {} packets, {} bytes",
        snapshot.tx_packets, snapshot.tx_bytes
    );
    let _ = writeln!(
        out,
        "  RX:                 {} packets, {} errors, {} bytes",
        snapshot.rx_packets, snapshot.rx_errors, snapshot.rx_bytes
    );
    let _ = writeln!(
        out,
        "  Packet error rate:  {:.2}%",
        snapshot.packet_error_rate * 100.0
    );
    let _ = writeln!(
        out,
        "  Throughput:         {:.2} Mbps avg, {:.2} Mbps peak",
        snapshot.avg_throughput_mbps, snapshot.peak_throughput_mbps
    );
    let _ = writeln!(out, "  Average SNR:        {}", format_snr(snapshot.avg_snr_db));
    if let Some(rssi) = snapshot.avg_rssi_dbm {
        let _ = writeln!(out, "  Average RSSI:       {:.1} dBm", rssi);
    }
    let _ = writeln!(
        out,
        "  Final rate:         {} ({})",
        rate_key(catalog, snapshot.current_rate),
        snapshot.current_family
    );
    if snapshot.rejected_events > 0 {
        let _ = writeln!(out, "  Rejected events:    {}", snapshot.rejected_events);
    }

    let used: Vec<_> = table.iter().filter(|r| r.stats.attempts > 0).collect();
    if !used.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  {:12} {:>8} {:>9} {:>7} {:>11} {:>7}",
            "Rate", "Attempts", "Successes", "Prob", "Tput (Mbps)", "Probes"
        );
        for row in used {
            let _ = writeln!(
                out,
                "  {:12} {:>8} {:>9} {:>6.1}% {:>11.2} {:>7}",
                row.key,
                row.stats.attempts,
                row.stats.successes,
                row.stats.probability * 100.0,
                row.stats.throughput_mbps,
                row.stats.probes
            );
        }
    }
    out
}
