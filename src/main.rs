//! OSC Recorder
//!
//! Listens for OSC over UDP, keeps every address as a live value, and
//! optionally records the values as keyframe series.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use osc_recorder::config::{AddressSeed, ConfigWatcher};
use osc_recorder::monitor::{self, tick_period};
use osc_recorder::osc::{self, OscArg, OscMessage};
use osc_recorder::paths::AppPaths;
use osc_recorder::{AppConfig, OscReceiver, Recorder, ValueStore};

/// OSC Recorder - live OSC values over UDP, with time-series recording
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write logs to a daily file in the logs directory
    #[arg(long)]
    log_file: bool,

    /// Local IP to listen on (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// UDP port to listen on (overrides config)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Ignore addresses that are not registered yet
    #[arg(long)]
    no_auto_add: bool,

    /// Record enabled values to CSV while running
    #[arg(long)]
    record: bool,

    /// Start with an empty store instead of the saved snapshot
    #[arg(long)]
    fresh: bool,

    /// Run in sniffer mode
    #[arg(long)]
    sniffer: bool,

    /// Send one OSC message to --target and exit
    #[arg(long, value_name = "ADDRESS")]
    send: Option<String>,

    /// Argument for --send (repeatable; int, float, true/false or string)
    #[arg(long = "arg", value_name = "VALUE", allow_hyphen_values = true)]
    send_args: Vec<String>,

    /// Destination for --send
    #[arg(long, default_value = "127.0.0.1:9000")]
    target: String,
}

/// Command-line settings that win over the config file, also across reloads
#[derive(Debug, Clone, Default)]
struct Overrides {
    bind: Option<String>,
    port: Option<u16>,
    no_auto_add: bool,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(bind) = &self.bind {
            config.receiver.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.receiver.port = port;
        }
        if self.no_auto_add {
            config.receiver.auto_add_addresses = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect();

    let log_dir = if args.log_file {
        paths.ensure_logs_dir()?;
        Some(paths.logs_dir.as_path())
    } else {
        None
    };
    let _log_guard = init_logging(&args.log_level, log_dir)?;

    if let Some(address) = &args.send {
        return send_message(address, &args.send_args, &args.target);
    }

    let overrides = Overrides {
        bind: args.bind.clone(),
        port: args.port,
        no_auto_add: args.no_auto_add,
    };

    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());
    let (config_watcher, mut config) = if config_path.exists() {
        info!("Configuration file: {}", config_path.display());
        let (watcher, config) = ConfigWatcher::new(config_path).await?;
        (Some(watcher), config)
    } else {
        info!(
            "No configuration file at {}, using defaults",
            config_path.display()
        );
        (None, AppConfig::default())
    };
    overrides.apply(&mut config);
    config.validate().context("Invalid settings")?;

    if args.sniffer {
        return monitor::run_cli_sniffer(&config.receiver, &config.poll).await;
    }

    info!("Starting OSC Recorder...");
    run_app(
        config,
        config_watcher,
        overrides,
        &paths,
        RunOptions {
            record: args.record,
            fresh: args.fresh,
        },
        shutdown_signal(),
    )
    .await?;

    info!("OSC Recorder shutdown complete");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct RunOptions {
    record: bool,
    fresh: bool,
}

async fn run_app(
    mut config: AppConfig,
    mut config_watcher: Option<ConfigWatcher>,
    overrides: Overrides,
    paths: &AppPaths,
    options: RunOptions,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let snapshot_path = config
        .store
        .snapshot
        .clone()
        .unwrap_or_else(|| paths.snapshot_path());

    // Value store owned by this task for the whole run
    let mut store = ValueStore::new();
    if !options.fresh && snapshot_path.exists() {
        match store.load_snapshot(&snapshot_path).await {
            Ok(()) => info!(
                "Restored {} OSC addresses from {}",
                store.len(),
                snapshot_path.display()
            ),
            Err(e) => warn!("Ignoring unreadable snapshot: {:#}", e),
        }
    }
    seed_addresses(&mut store, &config.store.addresses);

    let mut receiver =
        OscReceiver::new().with_max_datagrams_per_poll(config.poll.max_datagrams_per_poll);
    receiver
        .start(&config.receiver)
        .with_context(|| format!("Failed to start OSC on {}", config.receiver.endpoint()))?;

    let mut recorder = Recorder::new(config.recorder.fps);
    if options.record {
        recorder.start(&receiver)?;
    }

    let mut poll_tick = ticker(tick_period(config.poll.tick_hz));
    let mut frame_tick = ticker(tick_period(recorder.fps()));
    let mut monitor_tick = ticker(Duration::from_millis(config.monitor.refresh_ms.max(1)));
    let mut changed_since_display = false;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = poll_tick.tick() => {
                let summary = receiver.poll(&mut store);
                if summary.applied > 0 {
                    changed_since_display = true;
                }
                if summary.received > 0 {
                    debug!(
                        received = summary.received,
                        applied = summary.applied,
                        created = summary.created,
                        ignored = summary.ignored,
                        rejected = summary.rejected,
                        malformed = summary.malformed,
                        "OSC poll"
                    );
                }
            }

            _ = frame_tick.tick(), if recorder.is_recording() => {
                recorder.advance(&store);
            }

            _ = monitor_tick.tick() => {
                if changed_since_display || store.is_empty() {
                    for line in monitor::live_values(&store, config.monitor.max_rows) {
                        info!("  {}", line);
                    }
                    changed_since_display = false;
                }
            }

            Some(mut new_config) = next_config(&mut config_watcher) => {
                info!("Configuration file changed, reloading...");
                overrides.apply(&mut new_config);
                if let Err(e) = new_config.validate() {
                    warn!("Failed to reload config (keeping old config): {:#}", e);
                    continue;
                }

                seed_addresses(&mut store, &new_config.store.addresses);

                match receiver.reconfigure(&new_config.receiver, new_config.poll.max_datagrams_per_poll) {
                    Ok(true) => info!("OSC session restarted on {}", new_config.receiver.endpoint()),
                    Ok(false) => {}
                    Err(e) => {
                        error!("Failed to restart OSC: {}", e);
                        recorder.stop();
                    }
                }
                if new_config.poll.tick_hz != config.poll.tick_hz {
                    poll_tick = ticker(tick_period(new_config.poll.tick_hz));
                }
                if new_config.monitor.refresh_ms != config.monitor.refresh_ms {
                    monitor_tick = ticker(Duration::from_millis(new_config.monitor.refresh_ms.max(1)));
                }

                config = new_config;
                info!("Configuration reloaded");
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    recorder.stop();
    if recorder.keyframe_count() > 0 {
        let output = paths.recording_path(&config.recorder.output);
        if let Err(e) = recorder.export_csv(&output) {
            error!("Failed to export recording to {}: {}", output.display(), e);
        }
    }
    receiver.stop();

    if let Err(e) = store.save_snapshot(&snapshot_path).await {
        warn!("Failed to save snapshot: {:#}", e);
    } else {
        info!("Saved {} OSC addresses to {}", store.len(), snapshot_path.display());
    }

    Ok(())
}

/// Register configured addresses and apply their enabled flag
fn seed_addresses(store: &mut ValueStore, seeds: &[AddressSeed]) {
    for seed in seeds {
        let key = store.add_address(&seed.address);
        store.set_enabled(&key, seed.enabled);
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

fn send_message(address: &str, values: &[String], target: &str) -> Result<()> {
    if !address.starts_with('/') {
        anyhow::bail!("OSC address must start with '/': {}", address);
    }

    let message = OscMessage::new(address, values.iter().map(|v| OscArg::parse_cli(v)).collect());
    let packet = osc::encode(&message).context("Failed to encode OSC message")?;

    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to open UDP socket")?;
    socket
        .send_to(&packet, target)
        .with_context(|| format!("Failed to send to {}", target))?;

    info!("Sent {} ({} bytes) to {}", message, packet.len(), target);
    Ok(())
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "osc-recorder.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            Ok(None)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
