//! Hot reload of the YAML config file
//!
//! `notify` runs its callback on a private OS thread. Each modify event
//! schedules a debounced re-read on the Tokio runtime; configs that parse
//! and validate are forwarded over a channel, anything else is logged and
//! dropped so the running config stays in effect.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Editors often write a file in several steps
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Pending reloads buffered before senders wait
const RELOAD_QUEUE: usize = 10;

/// Delivers a fresh `AppConfig` every time the watched file changes
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    updates: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it
    ///
    /// Returns the watcher together with the initially loaded config. Fails
    /// when the initial file is unreadable or invalid.
    pub async fn new(config_path: PathBuf) -> Result<(Self, AppConfig)> {
        let initial = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        let (tx, updates) = mpsc::channel(RELOAD_QUEUE);
        let runtime = Handle::current();
        let watched = config_path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            on_fs_event(res, &runtime, &watched, &tx)
        })?;
        watcher
            .watch(&config_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", config_path.display()))?;

        info!("Watching {} for changes", config_path.display());
        Ok((
            Self {
                _watcher: watcher,
                updates,
            },
            initial,
        ))
    }

    /// Next successfully reloaded config, `None` once the watcher is gone
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.updates.recv().await
    }
}

fn on_fs_event(
    res: notify::Result<Event>,
    runtime: &Handle,
    path: &Path,
    tx: &mpsc::Sender<AppConfig>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!("Config watch error: {}", e);
            return;
        }
    };
    if !matches!(event.kind, EventKind::Modify(_)) {
        return;
    }

    debug!("Config file event: {:?}", event.paths);
    runtime.spawn(reload(path.to_path_buf(), tx.clone()));
}

async fn reload(path: PathBuf, tx: mpsc::Sender<AppConfig>) {
    tokio::time::sleep(RELOAD_DEBOUNCE).await;

    match AppConfig::load(&path).await {
        Ok(config) => {
            if tx.send(config).await.is_err() {
                debug!("Config reload dropped, nobody is listening");
            }
        }
        Err(e) => warn!("Ignoring config change ({:#})", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reload_delivers_new_config() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, "receiver:\n  port: 9001\n")?;

        let (mut watcher, config) = ConfigWatcher::new(path.clone()).await?;
        assert_eq!(config.receiver.port, 9001);

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&path, "receiver:\n  port: 9002\n  auto_add_addresses: false\n")?;

        let reloaded = tokio::time::timeout(Duration::from_secs(2), watcher.next_config())
            .await?
            .expect("watcher closed before delivering a reload");
        assert_eq!(reloaded.receiver.port, 9002);
        assert!(!reloaded.receiver.auto_add_addresses);

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_change_is_not_delivered() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, "receiver:\n  port: 9001\n")?;

        let (mut watcher, _) = ConfigWatcher::new(path.clone()).await?;

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&path, "receiver:\n  port: 0\n")?;

        let next = tokio::time::timeout(Duration::from_millis(500), watcher.next_config()).await;
        assert!(next.is_err(), "invalid config must not be forwarded");

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_initial_config_fails() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "receiver:\n  port: 0\n")?;

        assert!(ConfigWatcher::new(path).await.is_err());
        Ok(())
    }
}
