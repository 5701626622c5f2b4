//! Non-blocking OSC receive loop
//!
//! `OscReceiver` owns a UDP socket while a session is running. Each call to
//! [`OscReceiver::poll`] drains the datagrams currently queued on the socket,
//! decodes them and applies accepted messages to a [`ValueStore`]. Nothing
//! here blocks or spawns: the caller decides the cadence (timer, fixed-rate
//! loop, test harness).
//!
//! ```text
//! Idle --start()--> Listening --stop()--> Idle
//! ```

use crate::config::ReceiverConfig;
use crate::error::{DecodeError, ReceiverError};
use crate::osc::{self, Decoded, MAX_DATAGRAM_SIZE};
use crate::store::{ApplyOutcome, ValueStore};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, info, trace, warn};

#[cfg(test)]
mod tests;

/// Default bound on datagrams read by a single `poll`/`drain` call
pub const DEFAULT_MAX_DATAGRAMS_PER_POLL: usize = 4096;

/// Receive session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Listening,
}

/// Counters for one `poll` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Datagrams read from the socket
    pub received: usize,
    /// Messages that changed the store
    pub applied: usize,
    /// Of which created a new entry
    pub created: usize,
    /// Messages left out by the address policy
    pub ignored: usize,
    /// Bundles and non-`/` addresses
    pub rejected: usize,
    /// Datagrams with an unterminated string
    pub malformed: usize,
}

/// Cumulative counters across sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub sessions: u64,
    pub datagrams: u64,
    pub bytes: u64,
    pub messages: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub recv_errors: u64,
}

struct Session {
    socket: UdpSocket,
    config: ReceiverConfig,
    local_addr: SocketAddr,
}

/// UDP OSC receiver
pub struct OscReceiver {
    session: Option<Session>,
    buffer: Vec<u8>,
    max_datagrams_per_poll: usize,
    stats: ReceiverStats,
}

impl OscReceiver {
    /// Create an idle receiver
    pub fn new() -> Self {
        Self {
            session: None,
            buffer: vec![0u8; MAX_DATAGRAM_SIZE],
            max_datagrams_per_poll: DEFAULT_MAX_DATAGRAMS_PER_POLL,
            stats: ReceiverStats::default(),
        }
    }

    /// Bound the number of datagrams processed per call (minimum 1)
    pub fn with_max_datagrams_per_poll(mut self, max: usize) -> Self {
        self.set_max_datagrams_per_poll(max);
        self
    }

    pub fn set_max_datagrams_per_poll(&mut self, max: usize) {
        self.max_datagrams_per_poll = max.max(1);
    }

    pub fn max_datagrams_per_poll(&self) -> usize {
        self.max_datagrams_per_poll
    }

    /// Bind the socket and start listening
    ///
    /// On failure the receiver stays Idle. Port 0 asks the OS for a free
    /// port; the bound address is returned.
    pub fn start(&mut self, config: &ReceiverConfig) -> Result<SocketAddr, ReceiverError> {
        if let Some(session) = &self.session {
            return Err(ReceiverError::AlreadyListening(session.local_addr));
        }

        let endpoint = config.endpoint();
        let bind_error = |source| ReceiverError::Bind {
            addr: endpoint.clone(),
            source,
        };

        let socket =
            UdpSocket::bind((config.bind_address.as_str(), config.port)).map_err(bind_error)?;
        socket.set_nonblocking(true).map_err(bind_error)?;
        let local_addr = socket.local_addr().map_err(bind_error)?;

        info!("OSC listening on {}", local_addr);

        self.stats.sessions += 1;
        self.session = Some(Session {
            socket,
            config: config.clone(),
            local_addr,
        });
        Ok(local_addr)
    }

    /// Align the receiver with new settings
    ///
    /// A new session is started when the receiver is Idle (including after
    /// a failed earlier restart) or when `config` differs from the running
    /// session. Returns whether a session was (re)started. On a bind
    /// failure the receiver is left Idle.
    pub fn reconfigure(
        &mut self,
        config: &ReceiverConfig,
        max_datagrams_per_poll: usize,
    ) -> Result<bool, ReceiverError> {
        self.set_max_datagrams_per_poll(max_datagrams_per_poll);
        if self.config() == Some(config) {
            return Ok(false);
        }

        self.stop();
        self.start(config)?;
        Ok(true)
    }

    /// Close the socket and return to Idle (no-op when already Idle)
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            info!("OSC receiver stopped ({})", session.local_addr);
        }
    }

    pub fn state(&self) -> ReceiverState {
        if self.session.is_some() {
            ReceiverState::Listening
        } else {
            ReceiverState::Idle
        }
    }

    pub fn is_listening(&self) -> bool {
        self.session.is_some()
    }

    /// Address the socket is bound to while Listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref().map(|s| s.local_addr)
    }

    /// Config of the running session
    pub fn config(&self) -> Option<&ReceiverConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Drain queued datagrams and apply decoded messages to `store`
    ///
    /// Returns immediately when nothing is queued or the receiver is Idle.
    /// Bad datagrams are skipped; they never stop the drain.
    pub fn poll(&mut self, store: &mut ValueStore) -> PollSummary {
        let Some(auto_add) = self.config().map(|c| c.auto_add_addresses) else {
            return PollSummary::default();
        };

        let mut summary = PollSummary::default();
        let received = self.drain(|source, result| match result {
            Ok(Decoded::Message(message)) => {
                match store.apply(&message.address, message.first_arg(), auto_add) {
                    ApplyOutcome::Created { .. } => {
                        summary.applied += 1;
                        summary.created += 1;
                    }
                    ApplyOutcome::Updated { .. } => summary.applied += 1,
                    ApplyOutcome::Ignored { key, reason } => {
                        trace!(%source, key = %key, ?reason, "OSC message ignored");
                        summary.ignored += 1;
                    }
                }
            }
            Ok(Decoded::Rejected(reason)) => {
                debug!(%source, "Rejected OSC datagram: {}", reason);
                summary.rejected += 1;
            }
            Err(e) => {
                debug!(%source, "Skipping OSC datagram: {}", e);
                summary.malformed += 1;
            }
        });
        summary.received = received;
        summary
    }

    /// Read up to the per-call limit of queued datagrams, decoding each
    ///
    /// `on_packet` receives the sender and the decode result of every
    /// datagram. Stops on "would block" or on any receive error. Returns the
    /// number of datagrams read.
    pub fn drain<F>(&mut self, mut on_packet: F) -> usize
    where
        F: FnMut(SocketAddr, Result<Decoded, DecodeError>),
    {
        let Some(session) = &self.session else {
            return 0;
        };

        let mut received = 0;
        while received < self.max_datagrams_per_poll {
            let (len, source) = match session.socket.recv_from(&mut self.buffer) {
                Ok(result) => result,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    // Transient (e.g. ICMP port unreachable on some platforms)
                    warn!("OSC receive error on {}: {}", session.local_addr, e);
                    self.stats.recv_errors += 1;
                    break;
                }
            };
            received += 1;

            let result = osc::decode(&self.buffer[..len]);
            self.stats.datagrams += 1;
            self.stats.bytes += len as u64;
            match &result {
                Ok(Decoded::Message(_)) => self.stats.messages += 1,
                Ok(Decoded::Rejected(_)) => self.stats.rejected += 1,
                Err(_) => self.stats.malformed += 1,
            }

            on_packet(source, result);
        }

        if received == self.max_datagrams_per_poll {
            debug!(
                "OSC drain hit the per-poll limit ({}), remaining datagrams wait for the next tick",
                received
            );
        }
        received
    }
}

impl Default for OscReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OscReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}
