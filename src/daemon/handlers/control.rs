//! Liveness and session control: STATUS, ERROR, TERMREQ, PING, PONG.

use crate::daemon::{Daemon, Disposition, MetaError};
use crate::peer::ConnectionId;
use crate::protocol::{encode_bare, ErrorReport, RequestType, StatusReport};
use tracing::{debug, info};

impl Daemon {
    /// Send an informational status report.
    pub fn send_status(
        &mut self,
        conn_id: ConnectionId,
        code: i32,
        text: Option<&str>,
    ) -> Result<(), MetaError> {
        self.send_request(conn_id, &StatusReport::new(code, text).encode())
    }

    /// STATUS is informational and never closes the connection unless it
    /// is malformed.
    pub(in crate::daemon) fn handle_status(&mut self, conn_id: ConnectionId, args: &str) -> Disposition {
        let status = match StatusReport::decode(args) {
            Ok(s) => s,
            Err(e) => return self.reject_request(conn_id, RequestType::Status, e),
        };

        info!(
            peer = %self.peer_display(conn_id),
            code = status.code,
            text = %status.text,
            "Status message"
        );
        Disposition::Continue
    }

    /// Report an error to the peer. The peer will close the connection.
    pub fn send_error(
        &mut self,
        conn_id: ConnectionId,
        code: i32,
        text: Option<&str>,
    ) -> Result<(), MetaError> {
        self.send_request(conn_id, &ErrorReport::new(code, text).encode())
    }

    /// Any ERROR from a peer ends the session.
    pub(in crate::daemon) fn handle_error(&mut self, conn_id: ConnectionId, args: &str) -> Disposition {
        let report = match ErrorReport::decode(args) {
            Ok(r) => r,
            Err(e) => return self.reject_request(conn_id, RequestType::Error, e),
        };

        info!(
            peer = %self.peer_display(conn_id),
            code = report.code,
            text = %report.text,
            "Error message"
        );
        Disposition::CloseClean
    }

    /// Ask the peer to close the connection in an orderly way.
    pub fn send_termreq(&mut self, conn_id: ConnectionId) -> Result<(), MetaError> {
        self.send_request(conn_id, &encode_bare(RequestType::TermReq))
    }

    pub(in crate::daemon) fn handle_termreq(&mut self, conn_id: ConnectionId, _args: &str) -> Disposition {
        debug!(peer = %self.peer_display(conn_id), "Peer requested termination");
        Disposition::CloseClean
    }

    /// Probe the peer. The connection is marked as awaiting a PONG from now.
    pub fn send_ping(&mut self, conn_id: ConnectionId) -> Result<(), MetaError> {
        let now_ms = self.now_ms;
        let conn = self
            .connections
            .get_mut(&conn_id)
            .ok_or(MetaError::ConnectionNotFound(conn_id))?;
        conn.mark_pinged(now_ms);

        self.send_request(conn_id, &encode_bare(RequestType::Ping))
    }

    /// Answer every PING immediately.
    pub(in crate::daemon) fn handle_ping(&mut self, conn_id: ConnectionId, _args: &str) -> Disposition {
        match self.send_pong(conn_id) {
            Ok(()) => Disposition::Continue,
            Err(e) => Disposition::CloseViolation(e),
        }
    }

    pub fn send_pong(&mut self, conn_id: ConnectionId) -> Result<(), MetaError> {
        self.send_request(conn_id, &encode_bare(RequestType::Pong))
    }

    /// A PONG proves the session alive. For a connection we initiated this
    /// is what ends retry bookkeeping.
    pub(in crate::daemon) fn handle_pong(&mut self, conn_id: ConnectionId, _args: &str) -> Disposition {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return Disposition::CloseViolation(MetaError::ConnectionNotFound(conn_id));
        };

        conn.clear_pinged();
        if conn.outgoing().is_some() {
            conn.mark_alive();
            debug!(peer = %conn, "Outgoing connection confirmed, retry state reset");
        }
        Disposition::Continue
    }
}
