//! Minimal OSC 1.0 codec
//!
//! Single messages only. Bundles are recognised and rejected; pattern
//! matching is not supported. Decoding is hand-rolled for its truncation
//! tolerance; encoding goes through `rosc`.

mod decoder;
mod types;

pub use decoder::{decode, Decoded, RejectReason};
pub use types::{OscArg, OscMessage};

/// Marker at the start of every OSC bundle
pub const BUNDLE_TAG: &[u8] = b"#bundle";

/// Largest UDP payload we ever read (`rosc::decoder::MTU` would truncate)
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Encode a message into an OSC datagram
///
/// The type tag written is derived from `args`.
pub fn encode(message: &OscMessage) -> Result<Vec<u8>, rosc::OscError> {
    rosc::encoder::encode(&message.to_packet())
}
