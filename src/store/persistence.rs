//! Value store persistence to JSON snapshots
//!
//! Keeps the address set, enabled flags and last values across restarts.

use super::types::{AddressEntry, StoreValue};
use super::value_store::ValueStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// One persisted address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub enabled: bool,
    pub value: StoreValue,
}

/// Store snapshot for JSON serialization
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Timestamp of snapshot creation (milliseconds since epoch)
    pub timestamp: i64,
    /// Version of the snapshot format
    pub version: String,
    /// Entries ordered by key
    pub entries: Vec<SnapshotEntry>,
}

impl StoreSnapshot {
    /// Current snapshot format version
    pub const VERSION: &'static str = "1.0.0";

    /// Create a new snapshot from the current store
    pub fn from_store(store: &ValueStore) -> Self {
        let entries = store
            .entries()
            .into_iter()
            .filter_map(|entry| {
                let value = store.get(&entry.key)?.clone();
                Some(SnapshotEntry {
                    key: entry.key,
                    enabled: entry.enabled,
                    value,
                })
            })
            .collect();

        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            version: Self::VERSION.to_string(),
            entries,
        }
    }

    /// Replace the store's contents with this snapshot
    pub fn load_into_store(&self, store: &mut ValueStore) {
        debug!("Restoring {} OSC addresses from snapshot", self.entries.len());
        store.restore_entries(self.entries.iter().map(|e| {
            (
                AddressEntry {
                    key: e.key.clone(),
                    enabled: e.enabled,
                },
                e.value.clone(),
            )
        }));
    }

    /// Save snapshot to JSON file
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize store snapshot")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write store snapshot: {}", path.display()))?;

        Ok(())
    }

    /// Load snapshot from JSON file
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read store snapshot: {}", path.display()))?;

        let snapshot: StoreSnapshot =
            serde_json::from_str(&json).context("Failed to parse store snapshot JSON")?;

        debug!(
            "Store snapshot loaded (version: {}, timestamp: {})",
            snapshot.version, snapshot.timestamp
        );

        Ok(snapshot)
    }
}

impl ValueStore {
    /// Save current entries to a JSON file
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        StoreSnapshot::from_store(self).save_to_file(path).await
    }

    /// Replace current entries with the contents of a JSON file
    pub async fn load_snapshot(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = StoreSnapshot::load_from_file(path).await?;
        snapshot.load_into_store(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::OscArg;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("state").join("values.json");

        let mut store = ValueStore::new();
        store.apply("/synth/freq", Some(&OscArg::Float(440.0)), true);
        store.apply("/gate", Some(&OscArg::Bool(true)), true);
        store.apply("/label", Some(&OscArg::String("intro".into())), true);
        store.set_enabled("osc_gate", false);
        store.save_snapshot(&path).await?;

        let mut restored = ValueStore::new();
        restored.apply("/stale", None, true);
        restored.load_snapshot(&path).await?;

        assert_eq!(restored.len(), 3);
        assert!(restored.get("osc_stale").is_none());
        assert_eq!(restored.get("osc_synth_freq"), Some(&StoreValue::Float(440.0)));
        assert_eq!(restored.get("osc_label"), Some(&StoreValue::Text("intro".into())));
        assert_eq!(restored.entry("osc_gate").map(|e| e.enabled), Some(false));
        assert_eq!(restored.get("osc_gate"), Some(&StoreValue::Bool(true)));
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_does_not_notify() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("values.json");

        let mut store = ValueStore::new();
        store.apply("/a", Some(&OscArg::Int(1)), true);
        store.save_snapshot(&path).await?;

        let mut restored = ValueStore::new();
        let (tx, rx) = std::sync::mpsc::channel();
        restored.subscribe(move |update| {
            let _ = tx.send(update.key.clone());
        });
        restored.load_snapshot(&path).await?;

        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let mut store = ValueStore::new();
        assert!(store.load_snapshot(dir.path().join("nope.json")).await.is_err());
    }
}
