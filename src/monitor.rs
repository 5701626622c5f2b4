//! OSC sniffer and live value display
//!
//! The sniffer prints every datagram the receive loop sees, using the same
//! drain path as normal operation. The live table renders the current
//! contents of a value store.

use anyhow::{Context, Result};
use colored::*;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::{PollConfig, ReceiverConfig};
use crate::error::DecodeError;
use crate::osc::Decoded;
use crate::receiver::OscReceiver;
use crate::store::ValueStore;

/// Shown when the store has no entries yet
pub const WAITING_PLACEHOLDER: &str = "(waiting for OSC…)";

/// Format one datagram for sniffer output
pub fn format_packet(
    timestamp_ms: u64,
    source: SocketAddr,
    result: &Result<Decoded, DecodeError>,
) -> String {
    let body = match result {
        Ok(Decoded::Message(message)) => message.to_string(),
        Ok(Decoded::Rejected(reason)) => format!("rejected ({})", reason),
        Err(e) => e.to_string(),
    };
    format!("[{:08}ms] {} | {}", timestamp_ms, source, body)
}

/// Render up to `max_rows` `key = value` lines, disabled entries marked
pub fn live_values(store: &ValueStore, max_rows: usize) -> Vec<String> {
    if store.is_empty() {
        return vec![WAITING_PLACEHOLDER.to_string()];
    }

    let mut lines: Vec<String> = store
        .entries()
        .into_iter()
        .take(max_rows)
        .filter_map(|entry| {
            let value = store.get(&entry.key)?;
            let marker = if entry.enabled { "" } else { " (disabled)" };
            Some(format!("{} = {}{}", entry.key, value, marker))
        })
        .collect();

    if store.len() > max_rows {
        lines.push(format!("… {} more", store.len() - max_rows));
    }
    lines
}

/// CLI OSC sniffer: print datagrams until Ctrl+C
pub async fn run_cli_sniffer(config: &ReceiverConfig, poll: &PollConfig) -> Result<()> {
    println!("{}", "=== OSC Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let mut receiver = OscReceiver::new().with_max_datagrams_per_poll(poll.max_datagrams_per_poll);
    let local_addr = receiver
        .start(config)
        .with_context(|| format!("Cannot start sniffer on {}", config.endpoint()))?;

    println!("{} {}", "Listening on".green(), local_addr);
    println!("{}", "Format: [timestamp] SOURCE | ADDRESS TAGS ARGS".dimmed());
    println!("{}\n", "─".repeat(80).dimmed());

    let start_time = Instant::now();
    let mut ticker = tokio::time::interval(tick_period(poll.tick_hz));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                receiver.drain(|source, result| {
                    let elapsed = start_time.elapsed().as_millis() as u64;
                    let line = format_packet(elapsed, source, &result);
                    match result {
                        Ok(Decoded::Message(_)) => println!("{}", line),
                        Ok(Decoded::Rejected(_)) => println!("{}", line.yellow()),
                        Err(_) => println!("{}", line.red()),
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping sniffer");
                break;
            }
        }
    }

    let stats = receiver.stats();
    receiver.stop();
    println!(
        "\n{} datagrams, {} messages, {} rejected, {} malformed",
        stats.datagrams, stats.messages, stats.rejected, stats.malformed
    );
    Ok(())
}

/// Period of a `hz` tick (at least 1 Hz)
pub fn tick_period(hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(hz.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::{OscArg, OscMessage, RejectReason};

    fn source() -> SocketAddr {
        "127.0.0.1:5000".parse().unwrap()
    }

    #[test]
    fn test_format_message() {
        let result = Ok(Decoded::Message(OscMessage::new(
            "/synth/freq",
            vec![OscArg::Float(440.0)],
        )));
        assert_eq!(
            format_packet(12, source(), &result),
            "[00000012ms] 127.0.0.1:5000 | /synth/freq ,f 440"
        );
    }

    #[test]
    fn test_format_rejected_and_malformed() {
        let rejected = Ok(Decoded::Rejected(RejectReason::Bundle));
        assert!(format_packet(0, source(), &rejected).ends_with("rejected (bundle)"));

        let malformed = Err(DecodeError::MalformedPacket { offset: 4 });
        assert!(format_packet(0, source(), &malformed).contains("offset 4"));
    }

    #[test]
    fn test_live_values_placeholder() {
        let store = ValueStore::new();
        assert_eq!(live_values(&store, 12), vec![WAITING_PLACEHOLDER.to_string()]);
    }

    #[test]
    fn test_live_values_rows_and_overflow() {
        let mut store = ValueStore::new();
        for i in 0..15 {
            store.apply(&format!("/ch/{:02}", i), Some(&OscArg::Int(i)), true);
        }
        store.set_enabled("osc_ch_00", false);

        let lines = live_values(&store, 12);
        assert_eq!(lines.len(), 13);
        assert_eq!(lines[0], "osc_ch_00 = 0 (disabled)");
        assert_eq!(lines[1], "osc_ch_01 = 1");
        assert_eq!(lines[12], "… 3 more");
    }

    #[test]
    fn test_tick_period() {
        assert_eq!(tick_period(1), Duration::from_secs(1));
        assert_eq!(tick_period(0), Duration::from_secs(1));
        assert!(tick_period(60) < Duration::from_millis(17));
    }
}
