//! Inbound framing and request dispatch.

use crate::daemon::{Daemon, Disposition, MetaError, TcpPacket};
use crate::peer::ConnectionId;
use crate::protocol::{split_request, RequestType, VpnPacket, MAX_REQUEST_LEN};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, trace};

impl Daemon {
    /// Feed bytes read from a connection's stream.
    ///
    /// Buffered input is framed into request lines, except while a PACKET
    /// header is pending: then exactly the announced number of raw bytes is
    /// taken as a packet body before line framing resumes. Processing stops
    /// at the first request that closes the connection.
    pub fn receive_meta(&mut self, conn_id: ConnectionId, data: &[u8]) -> Disposition {
        match self.connections.get_mut(&conn_id) {
            Some(conn) if conn.is_active() => conn.buffer_input(data),
            _ => return Disposition::CloseViolation(MetaError::ConnectionNotFound(conn_id)),
        }

        loop {
            let Some(conn) = self.connections.get_mut(&conn_id) else {
                return Disposition::CloseViolation(MetaError::ConnectionNotFound(conn_id));
            };

            if conn.pending_tcp_len().is_some() {
                match conn.take_tcp_packet() {
                    Some(body) => {
                        self.deliver_tcp_packet(conn_id, body);
                        continue;
                    }
                    None => return Disposition::Continue,
                }
            }

            let Some(line) = conn.take_line() else {
                let buffered = conn.buffered_input_len();
                if buffered > MAX_REQUEST_LEN {
                    error!(peer = %conn, buffered, "Request line too long");
                    return Disposition::CloseViolation(MetaError::RequestTooLong {
                        max: MAX_REQUEST_LEN,
                        got: buffered,
                    });
                }
                return Disposition::Continue;
            };

            if line.len() > MAX_REQUEST_LEN {
                error!(peer = %conn, len = line.len(), "Request line too long");
                return Disposition::CloseViolation(MetaError::RequestTooLong {
                    max: MAX_REQUEST_LEN,
                    got: line.len(),
                });
            }

            let Ok(line) = String::from_utf8(line) else {
                error!(peer = %conn, "Received request that is not valid UTF-8");
                return Disposition::CloseViolation(MetaError::InvalidUtf8);
            };

            let outcome = self.receive_request(conn_id, &line);
            if !outcome.keeps_open() {
                return outcome;
            }
        }
    }

    /// Process a single request line received on a connection.
    pub fn receive_request(&mut self, conn_id: ConnectionId, line: &str) -> Disposition {
        let Some(conn) = self.connections.get(&conn_id) else {
            return Disposition::CloseViolation(MetaError::ConnectionNotFound(conn_id));
        };

        let (request, args) = match split_request(line) {
            Ok(parts) => parts,
            Err(e) => {
                error!(peer = %conn, error = %e, "Rejected request");
                return Disposition::CloseViolation(e.into());
            }
        };

        if !conn.allows(request) {
            error!(peer = %conn, request = %request, "Unauthorized request");
            return Disposition::CloseViolation(MetaError::Unauthorized(request));
        }

        debug!(peer = %conn, request = %request, "Got request");

        let outcome = match request {
            RequestType::Status => self.handle_status(conn_id, args),
            RequestType::Error => self.handle_error(conn_id, args),
            RequestType::TermReq => self.handle_termreq(conn_id, args),
            RequestType::Ping => self.handle_ping(conn_id, args),
            RequestType::Pong => self.handle_pong(conn_id, args),
            RequestType::Packet => self.handle_tcp_packet(conn_id, args),
            RequestType::UdpInfo => self.handle_udp_info(conn_id, args),
        };

        if !outcome.keeps_open() {
            debug!(
                peer = %self.peer_display(conn_id),
                request = %request,
                violation = outcome.is_violation(),
                "Request closes connection"
            );
        }
        outcome
    }

    /// Log and reject a request that failed validation.
    pub(in crate::daemon) fn reject_request(
        &self,
        conn_id: ConnectionId,
        request: RequestType,
        err: impl Into<MetaError>,
    ) -> Disposition {
        let err = err.into();
        error!(
            peer = %self.peer_display(conn_id),
            request = %request,
            error = %err,
            "Got bad request"
        );
        Disposition::CloseViolation(err)
    }

    /// Hand a received TCP fallback packet to the data plane.
    ///
    /// Delivery is best effort: with no data plane attached, or a full
    /// channel, the packet is dropped.
    fn deliver_tcp_packet(&self, conn_id: ConnectionId, body: Vec<u8>) {
        let packet = match VpnPacket::new(body) {
            Ok(p) => p,
            Err(e) => {
                debug!(conn = %conn_id, error = %e, "Discarding oversized TCP packet");
                return;
            }
        };

        let node = self.connections.get(&conn_id).and_then(|c| c.node());
        let Some(tx) = &self.packet_tx else {
            trace!(conn = %conn_id, len = packet.len(), "No data plane attached, dropping TCP packet");
            return;
        };

        let len = packet.len();
        match tx.try_send(TcpPacket {
            connection: conn_id,
            node,
            packet,
        }) {
            Ok(()) => trace!(conn = %conn_id, len, "TCP packet delivered"),
            Err(TrySendError::Full(_)) => {
                debug!(conn = %conn_id, len, "Data plane channel full, dropping TCP packet")
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn = %conn_id, len, "Data plane channel closed, dropping TCP packet")
            }
        }
    }
}
