//! TCP fallback data channel.
//!
//! When no UDP path exists, tunnel packets travel inside the meta
//! connection: a PACKET line carrying the length, followed by the raw
//! bytes. Outbound packets are subject to random early drop so that a
//! congested meta connection sheds tunnel traffic before control traffic.

use crate::daemon::{Daemon, Disposition, MetaError};
use crate::peer::ConnectionId;
use crate::protocol::{PacketHeader, RequestType, VpnPacket};
use rand::Rng;
use tracing::trace;

/// Probability of dropping an outbound TCP packet at the given queue fill.
///
/// `2 * fill - 1` with `fill = queue_len / max_queue_len`: never drops
/// below half full, certain at full. It is deliberately not clamped, so an
/// overfull queue always drops.
pub fn red_drop_probability(queue_len: usize, max_queue_len: usize) -> f64 {
    2.0 * queue_len as f64 / max_queue_len as f64 - 1.0
}

impl Daemon {
    /// Send a tunnel packet over a meta connection.
    ///
    /// A packet discarded by random early drop is reported as sent; losing
    /// it is no different from losing a UDP datagram.
    pub fn send_tcp_packet(&mut self, conn_id: ConnectionId, packet: &VpnPacket) -> Result<(), MetaError> {
        let conn = self
            .connections
            .get(&conn_id)
            .ok_or(MetaError::ConnectionNotFound(conn_id))?;

        let queued = conn.outbound_queue_len();
        let drop_probability = red_drop_probability(queued, self.max_outbound_queue_bytes);
        let draw: f64 = self.rng.random();
        if drop_probability > draw {
            trace!(
                peer = %conn,
                queued,
                len = packet.len(),
                "Dropping TCP packet, outbound queue congested"
            );
            return Ok(());
        }

        let header = PacketHeader { len: packet.len() };
        self.send_request(conn_id, &header.encode())?;
        self.send_meta(conn_id, packet.data())
    }

    /// PACKET announces a raw body; the connection reader picks it up on
    /// the next read.
    pub(in crate::daemon) fn handle_tcp_packet(&mut self, conn_id: ConnectionId, args: &str) -> Disposition {
        let header = match PacketHeader::decode(args) {
            Ok(h) => h,
            Err(e) => return self.reject_request(conn_id, RequestType::Packet, e),
        };

        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return Disposition::CloseViolation(MetaError::ConnectionNotFound(conn_id));
        };
        conn.expect_tcp_packet(header.len);
        Disposition::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_drops_below_half_full() {
        let max = 10_000;
        for queued in 0..=max / 2 {
            assert!(red_drop_probability(queued, max) <= 0.0, "queued={queued}");
        }
    }

    #[test]
    fn test_certain_drop_at_full() {
        assert_eq!(red_drop_probability(15_180, 15_180), 1.0);
        assert_eq!(red_drop_probability(0, 15_180), -1.0);
        assert_eq!(red_drop_probability(7_590, 15_180), 0.0);
    }

    #[test]
    fn test_monotonic() {
        let max = 4_096;
        let mut last = f64::NEG_INFINITY;
        for queued in 0..=3 * max {
            let p = red_drop_probability(queued, max);
            assert!(p >= last, "queued={queued}");
            last = p;
        }
    }

    #[test]
    fn test_unclamped_above_full() {
        assert_eq!(red_drop_probability(2_000, 1_000), 3.0);
    }
}
