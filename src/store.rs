//! Value store - live OSC values keyed by normalized address
//!
//! Holds one entry per distinct normalized address together with its
//! current value and enabled flag. The store is owned by whoever drives
//! the receive loop and is passed explicitly to `OscReceiver::poll`.

mod persistence;
mod types;
mod value_store;

pub use persistence::{SnapshotEntry, StoreSnapshot};
pub use types::{AddressEntry, ApplyOutcome, IgnoreReason, StoreUpdate, StoreValue};
pub use value_store::ValueStore;
