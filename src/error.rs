//! Error types for the OSC receive pipeline
//!
//! Only bind failures ever reach the user. Decode errors are recovered
//! per datagram inside the receive loop.

use std::net::SocketAddr;

/// Errors raised when starting or running a receive session
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    /// Socket could not be bound (port in use, invalid address, ...)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested `bind_address:port`
        addr: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A session is already running on this receiver
    #[error("Receiver is already listening on {0}")]
    AlreadyListening(SocketAddr),
}

/// Datagram-level decode failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// An OSC string had no null terminator before the end of the packet
    #[error("Malformed packet: unterminated string at offset {offset}")]
    MalformedPacket {
        /// Byte offset where the string started
        offset: usize,
    },
}

/// Recorder errors
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// Recording needs a live receive session
    #[error("Recording requires a listening OSC receiver")]
    NotListening,

    /// CSV export error
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
