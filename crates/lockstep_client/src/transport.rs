//! # Transport Boundary
//!
//! The client only needs a polled inbox and an outbox. Reconnect, framing and
//! TLS belong to whatever implements [`Transport`].
//!
//! [`ChannelTransport`] is an in-process duplex backed by `crossbeam-channel`.
//! A socket reader on another thread (or a test) drives the [`AuthorityEnd`].

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use lockstep_shared::{EncodeError, OutboundInput, ParseResult, ServerMessage};
use thiserror::Error;

/// Something the transport observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection to the authority is up.
    Connected,
    /// One complete inbound message.
    Message(Vec<u8>),
    /// The connection is gone.
    Disconnected,
    /// A transport-level failure that did not close the connection.
    Error(String),
}

/// Outbound delivery failed. Never affects simulation state.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No connection is up.
    #[error("not connected")]
    NotConnected,
    /// The peer side of the transport is gone.
    #[error("transport closed")]
    Closed,
    /// A message could not be serialized for sending.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Duplex message transport.
pub trait Transport {
    /// Next pending event, if any. Never blocks.
    fn poll(&mut self) -> Option<TransportEvent>;

    /// Queues one outbound message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the message cannot be delivered.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransportStats {
    /// Messages sent.
    pub messages_sent: u64,
    /// Messages received.
    pub messages_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send errors.
    pub send_errors: u64,
    /// Error events received.
    pub recv_errors: u64,
}

/// Client side of an in-process duplex.
pub struct ChannelTransport {
    inbound: Receiver<TransportEvent>,
    outbound: Sender<Vec<u8>>,
    connected: bool,
    stats: TransportStats,
}

/// Authority side of a [`ChannelTransport`].
pub struct AuthorityEnd {
    events: Sender<TransportEvent>,
    outbound: Receiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Creates a connected-pair of client transport and authority end.
    #[must_use]
    pub fn pair() -> (Self, AuthorityEnd) {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (outbound_tx, outbound_rx) = crossbeam_channel::unbounded();
        (
            Self {
                inbound: events_rx,
                outbound: outbound_tx,
                connected: false,
                stats: TransportStats::default(),
            },
            AuthorityEnd {
                events: events_tx,
                outbound: outbound_rx,
            },
        )
    }

    /// Whether a `Connected` event has been seen since the last disconnect.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns statistics.
    #[must_use]
    pub const fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

impl Transport for ChannelTransport {
    fn poll(&mut self) -> Option<TransportEvent> {
        match self.inbound.try_recv() {
            Ok(event) => {
                match &event {
                    TransportEvent::Connected => self.connected = true,
                    TransportEvent::Disconnected => self.connected = false,
                    TransportEvent::Message(bytes) => {
                        self.stats.messages_received += 1;
                        self.stats.bytes_received += bytes.len() as u64;
                    }
                    TransportEvent::Error(_) => self.stats.recv_errors += 1,
                }
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            // Peer dropped without saying goodbye; report it once.
            Err(TryRecvError::Disconnected) if self.connected => {
                self.connected = false;
                Some(TransportEvent::Disconnected)
            }
            Err(TryRecvError::Disconnected) => None,
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            self.stats.send_errors += 1;
            return Err(TransportError::NotConnected);
        }
        match self.outbound.send(bytes.to_vec()) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += bytes.len() as u64;
                Ok(())
            }
            Err(_) => {
                self.stats.send_errors += 1;
                Err(TransportError::Closed)
            }
        }
    }
}

impl AuthorityEnd {
    /// Signals that the connection is up.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] if the client side is gone.
    pub fn connect(&self) -> Result<(), TransportError> {
        self.push(TransportEvent::Connected)
    }

    /// Signals that the connection dropped.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] if the client side is gone.
    pub fn disconnect(&self) -> Result<(), TransportError> {
        self.push(TransportEvent::Disconnected)
    }

    /// Reports a non-fatal transport error.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] if the client side is gone.
    pub fn fail(&self, reason: impl Into<String>) -> Result<(), TransportError> {
        self.push(TransportEvent::Error(reason.into()))
    }

    /// Sends a protocol message.
    ///
    /// # Errors
    ///
    /// Encoding failures or a closed client side.
    pub fn send(&self, message: &ServerMessage) -> Result<(), TransportError> {
        self.send_raw(message.encode()?)
    }

    /// Sends arbitrary bytes, well-formed or not.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] if the client side is gone.
    pub fn send_raw(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.push(TransportEvent::Message(bytes))
    }

    /// Drains and parses everything the client has sent so far.
    ///
    /// # Errors
    ///
    /// Fails on the first message that is not an [`OutboundInput`].
    pub fn received_inputs(&self) -> ParseResult<Vec<OutboundInput>> {
        self.outbound.try_iter().map(|bytes| OutboundInput::decode(&bytes)).collect()
    }

    fn push(&self, event: TransportEvent) -> Result<(), TransportError> {
        self.events.send(event).map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_requires_connection() {
        let (mut client, authority) = ChannelTransport::pair();
        assert!(matches!(client.send(b"x"), Err(TransportError::NotConnected)));

        authority.connect().unwrap();
        assert_eq!(client.poll(), Some(TransportEvent::Connected));
        client.send(b"{}").unwrap();
        assert_eq!(client.stats().messages_sent, 1);
        assert_eq!(client.stats().send_errors, 1);
    }

    #[test]
    fn test_dropped_peer_reports_disconnect_once() {
        let (mut client, authority) = ChannelTransport::pair();
        authority.connect().unwrap();
        drop(authority);

        assert_eq!(client.poll(), Some(TransportEvent::Connected));
        assert_eq!(client.poll(), Some(TransportEvent::Disconnected));
        assert_eq!(client.poll(), None);
        assert!(!client.is_connected());
    }

    #[test]
    fn test_stats_count_messages() {
        let (mut client, authority) = ChannelTransport::pair();
        authority.send_raw(vec![1, 2, 3]).unwrap();
        authority.fail("checksum").unwrap();

        assert_eq!(client.poll(), Some(TransportEvent::Message(vec![1, 2, 3])));
        assert_eq!(client.poll(), Some(TransportEvent::Error("checksum".to_string())));
        assert_eq!(client.stats().bytes_received, 3);
        assert_eq!(client.stats().recv_errors, 1);
    }
}
