//! Application path management for local and per-user modes.
//!
//! - **Local mode**: a `config.yaml` in the current working directory wins;
//!   state, logs and recordings live next to it.
//! - **User mode** (default): data lives in the per-user data directory
//!   (`%APPDATA%\OSC Recorder`, `~/.local/share/OSC Recorder`, ...).

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in user mode
const APP_NAME: &str = "OSC Recorder";

/// Application paths for config, state, logs and recordings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Directory for value store snapshots
    pub state_dir: PathBuf,
    /// Directory for log files
    pub logs_dir: PathBuf,
    /// Directory for CSV recordings
    pub recordings_dir: PathBuf,
    /// Whether the working directory is used
    pub is_local: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    pub fn detect() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if cwd.join("config.yaml").exists() {
            return Self::rooted_at(&cwd, true);
        }

        let base = dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .unwrap_or(cwd);
        Self::rooted_at(&base, false)
    }

    /// Lay out all paths under `base`
    pub fn rooted_at(base: &Path, is_local: bool) -> Self {
        let (state, logs, recordings) = if is_local {
            (".state", "logs", "recordings")
        } else {
            ("state", "logs", "recordings")
        };

        Self {
            config: base.join("config.yaml"),
            state_dir: base.join(state),
            logs_dir: base.join(logs),
            recordings_dir: base.join(recordings),
            is_local,
        }
    }

    /// Default value store snapshot location
    pub fn snapshot_path(&self) -> PathBuf {
        self.state_dir.join("values.json")
    }

    /// Resolve a recording output path; relative paths go to `recordings_dir`
    pub fn recording_path(&self, output: &Path) -> PathBuf {
        if output.is_absolute() {
            output.to_path_buf()
        } else {
            self.recordings_dir.join(output)
        }
    }

    /// Ensure the log directory exists (state and recordings are created on write)
    pub fn ensure_logs_dir(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_layout() {
        let paths = AppPaths::rooted_at(Path::new("proj"), true);

        assert!(paths.is_local);
        assert_eq!(paths.config, PathBuf::from("proj/config.yaml"));
        assert_eq!(paths.state_dir, PathBuf::from("proj/.state"));
        assert_eq!(paths.snapshot_path(), PathBuf::from("proj/.state/values.json"));
    }

    #[test]
    fn test_recording_path() {
        let paths = AppPaths::rooted_at(Path::new("/data/osc"), false);

        assert_eq!(
            paths.recording_path(Path::new("take1.csv")),
            PathBuf::from("/data/osc/recordings/take1.csv")
        );
        let absolute = std::env::temp_dir().join("take2.csv");
        assert_eq!(paths.recording_path(&absolute), absolute);
    }

    #[test]
    fn test_ensure_logs_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = AppPaths::rooted_at(dir.path(), false);
        paths.ensure_logs_dir().unwrap();
        assert!(paths.logs_dir.is_dir());
    }
}
