//! Peer Connection
//!
//! One authenticated meta-protocol session with a directly adjacent peer.
//! The connection owns its inbound and outbound byte queues; the transport
//! feeds received bytes in and drains queued bytes out, while the daemon's
//! request handlers only ever touch the queues through this type.

use super::OutgoingAttempt;
use crate::mesh::{NodeAddress, NodeId};
use crate::protocol::RequestType;
use std::fmt;
use thiserror::Error;

/// Errors queueing data on a connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Unique identifier for a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Who opened the underlying stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionDirection {
    /// The peer connected to us.
    Inbound,
    /// We connected to the peer.
    Outbound,
}

impl fmt::Display for ConnectionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionDirection::Inbound => "inbound",
            ConnectionDirection::Outbound => "outbound",
        };
        write!(f, "{}", s)
    }
}

/// An authenticated meta-protocol session.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,

    // === Peer Identity ===
    /// Peer node name.
    name: String,
    /// Peer hostname, for diagnostics only.
    hostname: String,
    /// Node table entry of the peer, once known.
    node: Option<NodeId>,
    /// Our end of the underlying stream.
    local_address: NodeAddress,

    // === Liveness ===
    /// A PING is outstanding.
    pinged: bool,
    /// When the last PING was sent, or the connection came up (Unix ms).
    last_ping_time_ms: u64,

    // === Framing ===
    /// Length of a TCP fallback packet whose raw bytes come next.
    pending_tcp_len: Option<u16>,
    /// Received bytes not yet framed into a line or packet.
    inbuf: Vec<u8>,
    /// Bytes queued for the transport.
    outbuf: Vec<u8>,
    /// The only request number currently accepted (None = any).
    allow_request: Option<RequestType>,

    // === Lifecycle ===
    /// Retry bookkeeping, present only if we initiated this connection.
    outgoing: Option<OutgoingAttempt>,
    active: bool,
}

impl Connection {
    /// Create a connection for a peer whose handshake has completed.
    pub fn new(
        id: ConnectionId,
        name: impl Into<String>,
        hostname: impl Into<String>,
        local_address: NodeAddress,
        current_time_ms: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            hostname: hostname.into(),
            node: None,
            local_address,
            pinged: false,
            last_ping_time_ms: current_time_ms,
            pending_tcp_len: None,
            inbuf: Vec::new(),
            outbuf: Vec::new(),
            allow_request: None,
            outgoing: None,
            active: true,
        }
    }

    /// Attach outgoing-attempt bookkeeping (we initiated this connection).
    pub fn with_outgoing(mut self, outgoing: OutgoingAttempt) -> Self {
        self.outgoing = Some(outgoing);
        self
    }

    // === Accessors ===

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub(crate) fn set_node(&mut self, node: Option<NodeId>) {
        self.node = node;
    }

    pub fn local_address(&self) -> &NodeAddress {
        &self.local_address
    }

    pub fn direction(&self) -> ConnectionDirection {
        if self.outgoing.is_some() {
            ConnectionDirection::Outbound
        } else {
            ConnectionDirection::Inbound
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_pinged(&self) -> bool {
        self.pinged
    }

    pub fn last_ping_time_ms(&self) -> u64 {
        self.last_ping_time_ms
    }

    pub fn pending_tcp_len(&self) -> Option<u16> {
        self.pending_tcp_len
    }

    pub fn allow_request(&self) -> Option<RequestType> {
        self.allow_request
    }

    /// Restrict accepted requests to `request`, or lift the restriction.
    pub fn set_allow_request(&mut self, request: Option<RequestType>) {
        self.allow_request = request;
    }

    /// Whether `request` may be processed on this connection now.
    pub fn allows(&self, request: RequestType) -> bool {
        self.allow_request.is_none_or(|allowed| allowed == request)
    }

    pub fn outgoing(&self) -> Option<&OutgoingAttempt> {
        self.outgoing.as_ref()
    }

    pub fn outgoing_mut(&mut self) -> Option<&mut OutgoingAttempt> {
        self.outgoing.as_mut()
    }

    // === Liveness ===

    /// Record that a PING is about to be sent.
    pub fn mark_pinged(&mut self, current_time_ms: u64) {
        self.pinged = true;
        self.last_ping_time_ms = current_time_ms;
    }

    /// Record that the outstanding PING was answered.
    pub fn clear_pinged(&mut self) {
        self.pinged = false;
    }

    /// Whether an outstanding PING has gone unanswered for `timeout_ms`.
    pub fn is_ping_timed_out(&self, current_time_ms: u64, timeout_ms: u64) -> bool {
        self.pinged && self.last_ping_time_ms.saturating_add(timeout_ms) <= current_time_ms
    }

    /// Whether it is time to send the next PING.
    pub fn is_ping_due(&self, current_time_ms: u64, interval_ms: u64) -> bool {
        !self.pinged && self.last_ping_time_ms.saturating_add(interval_ms) <= current_time_ms
    }

    // === Framing ===

    /// Announce that the next `len` received bytes are a packet body.
    pub fn expect_tcp_packet(&mut self, len: u16) {
        self.pending_tcp_len = Some(len);
    }

    /// Append received bytes to the input buffer.
    pub(crate) fn buffer_input(&mut self, data: &[u8]) {
        self.inbuf.extend_from_slice(data);
    }

    pub(crate) fn buffered_input_len(&self) -> usize {
        self.inbuf.len()
    }

    /// Take the pending packet body if all of it has arrived.
    ///
    /// Clears the pending length once the body is taken, so the next read
    /// resumes line framing.
    pub(crate) fn take_tcp_packet(&mut self) -> Option<Vec<u8>> {
        let len = usize::from(self.pending_tcp_len?);
        if self.inbuf.len() < len {
            return None;
        }
        self.pending_tcp_len = None;
        let rest = self.inbuf.split_off(len);
        Some(std::mem::replace(&mut self.inbuf, rest))
    }

    /// Take the next complete line, without its terminator.
    pub(crate) fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.inbuf.iter().position(|&b| b == b'\n')?;
        let rest = self.inbuf.split_off(pos + 1);
        let mut line = std::mem::replace(&mut self.inbuf, rest);
        line.pop();
        Some(line)
    }

    // === Outbound Queue ===

    /// Queue a request line; the terminator is appended here.
    pub fn queue_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        self.ensure_active()?;
        self.outbuf.reserve(line.len() + 1);
        self.outbuf.extend_from_slice(line.as_bytes());
        self.outbuf.push(b'\n');
        Ok(())
    }

    /// Queue raw bytes that follow a framing line.
    pub fn queue_raw(&mut self, data: &[u8]) -> Result<(), ConnectionError> {
        self.ensure_active()?;
        self.outbuf.extend_from_slice(data);
        Ok(())
    }

    /// Bytes waiting for the transport.
    pub fn outbound_queue_len(&self) -> usize {
        self.outbuf.len()
    }

    /// Hand all queued bytes to the transport.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbuf)
    }

    fn ensure_active(&self) -> Result<(), ConnectionError> {
        if self.active {
            Ok(())
        } else {
            Err(ConnectionError::Closed(self.id))
        }
    }

    // === Lifecycle ===

    /// The session proved alive: end retry bookkeeping for an outgoing
    /// connection.
    pub fn mark_alive(&mut self) {
        if let Some(outgoing) = self.outgoing.as_mut() {
            outgoing.reset();
        }
    }

    /// Close the connection. Pending framing and outgoing state are dropped
    /// at once; queued output is discarded.
    pub fn close(&mut self) {
        self.active = false;
        self.pending_tcp_len = None;
        self.outgoing = None;
        self.inbuf.clear();
        self.outbuf.clear();
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.hostname)
    }
}
