//! Time-series recording of live OSC values
//!
//! While recording, every frame advance samples all enabled store keys and
//! appends a keyframe per key. The recorder only reads the store.

use crate::error::RecorderError;
use crate::receiver::OscReceiver;
use crate::store::ValueStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// One sampled value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keyframe {
    pub frame: i64,
    pub value: f64,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    frame: i64,
    key: &'a str,
    value: f64,
}

/// Samples the value store into per-key keyframe series
#[derive(Debug)]
pub struct Recorder {
    fps: u32,
    frame: i64,
    recording: bool,
    series: BTreeMap<String, Vec<Keyframe>>,
}

impl Recorder {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            frame: 0,
            recording: false,
            series: BTreeMap::new(),
        }
    }

    /// Frames per second used to derive the frame tick
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Current frame index
    pub fn frame(&self) -> i64 {
        self.frame
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Begin recording; requires a listening receiver
    pub fn start(&mut self, receiver: &OscReceiver) -> Result<(), RecorderError> {
        if !receiver.is_listening() {
            return Err(RecorderError::NotListening);
        }
        if !self.recording {
            self.recording = true;
            info!("Recording OSC at {} fps from frame {}", self.fps, self.frame);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.recording {
            self.recording = false;
            info!("Stopped recording at frame {}", self.frame);
        }
    }

    /// Move to the next frame and sample the store (no-op unless recording)
    pub fn advance(&mut self, store: &ValueStore) -> usize {
        if !self.recording {
            return 0;
        }
        self.frame += 1;
        self.capture(self.frame, store)
    }

    /// Keyframe every enabled key at `frame`
    ///
    /// Text values cannot be keyframed and are skipped. Returns the number
    /// of keyframes written.
    pub fn capture(&mut self, frame: i64, store: &ValueStore) -> usize {
        let mut written = 0;
        for (key, value) in store.iter_enabled() {
            let Some(value) = value.as_keyframe_value() else {
                debug!("Failed to keyframe {}: text values are not animatable", key);
                continue;
            };

            let series = self.series.entry(key.to_string()).or_default();
            insert_keyframe(series, Keyframe { frame, value });
            written += 1;
        }
        written
    }

    /// Keyframes recorded for a key, ordered by frame
    pub fn series(&self, key: &str) -> Option<&[Keyframe]> {
        self.series.get(key).map(Vec::as_slice)
    }

    /// Keys that have at least one keyframe
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Total number of keyframes
    pub fn keyframe_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// Drop all recorded data and rewind to frame 0
    pub fn clear(&mut self) {
        self.series.clear();
        self.frame = 0;
    }

    /// Write all series as long-format CSV (`frame,key,value`)
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), RecorderError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        for (key, series) in &self.series {
            for kf in series {
                writer.serialize(CsvRow {
                    frame: kf.frame,
                    key,
                    value: kf.value,
                })?;
            }
        }
        writer.flush()?;

        info!(
            "Exported {} keyframes for {} keys to {}",
            self.keyframe_count(),
            self.series.len(),
            path.display()
        );
        Ok(())
    }
}

/// Insert keeping frame order; an existing keyframe at the same frame is replaced
fn insert_keyframe(series: &mut Vec<Keyframe>, keyframe: Keyframe) {
    match series.binary_search_by_key(&keyframe.frame, |kf| kf.frame) {
        Ok(idx) => series[idx] = keyframe,
        Err(idx) => series.insert(idx, keyframe),
    }
}
