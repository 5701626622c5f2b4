//! OSC message decoding
//!
//! Decoding is tolerant: an unknown type tag or a truncated numeric argument
//! ends the argument list early instead of failing. The only hard failure is
//! an OSC string without a null terminator.

use super::types::{OscArg, OscMessage};
use super::BUNDLE_TAG;
use crate::error::DecodeError;

/// Outcome of decoding one datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A single OSC message
    Message(OscMessage),
    /// Structurally valid but unsupported content
    Rejected(RejectReason),
}

/// Why a datagram was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `#bundle` packets are not supported
    Bundle,
    /// Address does not start with `/`
    InvalidAddress,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Bundle => write!(f, "bundle"),
            RejectReason::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

/// Decode a single OSC message from a datagram
pub fn decode(packet: &[u8]) -> Result<Decoded, DecodeError> {
    if packet.starts_with(BUNDLE_TAG) {
        return Ok(Decoded::Rejected(RejectReason::Bundle));
    }

    let mut cursor = 0;
    let address = read_padded_string(packet, &mut cursor)?;
    if !address.starts_with('/') {
        return Ok(Decoded::Rejected(RejectReason::InvalidAddress));
    }

    let type_tag = read_padded_string(packet, &mut cursor)?;
    let Some(tags) = type_tag.strip_prefix(',') else {
        return Ok(Decoded::Message(OscMessage {
            address,
            type_tag: String::new(),
            args: Vec::new(),
        }));
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'i' => match read_word(packet, &mut cursor) {
                Some(word) => OscArg::Int(i32::from_be_bytes(word)),
                None => break,
            },
            'f' => match read_word(packet, &mut cursor) {
                Some(word) => OscArg::Float(f32::from_be_bytes(word)),
                None => break,
            },
            'T' => OscArg::Bool(true),
            'F' => OscArg::Bool(false),
            's' => OscArg::String(read_padded_string(packet, &mut cursor)?),
            _ => break,
        };
        args.push(arg);
    }

    Ok(Decoded::Message(OscMessage {
        address,
        type_tag,
        args,
    }))
}

/// Read a null-terminated string padded to a 4-byte boundary
///
/// The cursor may end up past the end of the packet when the trailing
/// padding is missing; later reads treat that as an empty remainder.
fn read_padded_string(packet: &[u8], cursor: &mut usize) -> Result<String, DecodeError> {
    let start = *cursor;
    let rest = packet.get(start..).unwrap_or_default();
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::MalformedPacket { offset: start })?;

    let text = String::from_utf8_lossy(&rest[..len]).into_owned();
    *cursor = start + padded_len(len + 1);
    Ok(text)
}

/// Read 4 raw bytes, or `None` if the packet is too short
fn read_word(packet: &[u8], cursor: &mut usize) -> Option<[u8; 4]> {
    let end = cursor.checked_add(4)?;
    let word: [u8; 4] = packet.get(*cursor..end)?.try_into().ok()?;
    *cursor = end;
    Some(word)
}

/// Round up to the next multiple of 4
fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}
