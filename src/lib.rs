//! OSC Recorder
//!
//! Receives Open Sound Control messages over UDP and exposes every distinct
//! address as a live value that can be sampled and recorded as a time series.
//!
//! The pipeline, leaf first:
//! - [`address`]: OSC address -> store key
//! - [`osc`]: datagram codec (single messages, no bundles)
//! - [`store`]: keyed values with per-address enable/auto-add policy
//! - [`receiver`]: non-blocking drain loop feeding the store
//! - [`recorder`]: samples the store into keyframe series

pub mod address;
pub mod config;
pub mod error;
pub mod monitor;
pub mod osc;
pub mod paths;
pub mod receiver;
pub mod recorder;
pub mod store;

pub use config::{AppConfig, ReceiverConfig};
pub use error::{DecodeError, ReceiverError, RecorderError};
pub use receiver::{OscReceiver, PollSummary, ReceiverState};
pub use recorder::Recorder;
pub use store::{StoreValue, ValueStore};
