//! UDP rendezvous hints.
//!
//! UDP_INFO tells nodes along the relay path what address a node's
//! packets appear to come from, so that two nodes without a direct
//! connection can try a direct UDP path. Each hop re-applies the same
//! routing rules, so a hint stops by itself once forwarding it further is
//! pointless. Hints never travel past a static relay.

use crate::daemon::{Daemon, Disposition, MetaError};
use crate::mesh::{NodeAddress, NodeId, NodeName, NodeOptions};
use crate::peer::ConnectionId;
use crate::protocol::{RequestType, UdpInfo, UDP_INFO_MIN_VERSION};
use std::fmt;
use tracing::{debug, error, trace, warn};

/// Why a UDP_INFO hint is not sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UdpInfoSkip {
    /// The hint would be addressed to ourselves.
    ToSelf,
    /// Destination is not reachable.
    Unreachable,
    /// We originate the hint and already talk to the destination directly.
    DirectlyConnected,
    /// We, the origin or the destination only use TCP.
    TcpOnly,
    /// The next hop predates UDP_INFO.
    NextHopTooOld,
    /// No connection to the next hop exists.
    NoNextHopConnection,
    /// We know no address for the origin.
    UnknownAddress,
}

impl fmt::Display for UdpInfoSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UdpInfoSkip::ToSelf => "destination is ourselves",
            UdpInfoSkip::Unreachable => "destination unreachable",
            UdpInfoSkip::DirectlyConnected => "directly connected",
            UdpInfoSkip::TcpOnly => "TCP only",
            UdpInfoSkip::NextHopTooOld => "next hop too old",
            UdpInfoSkip::NoNextHopConnection => "no connection to next hop",
            UdpInfoSkip::UnknownAddress => "origin address unknown",
        };
        write!(f, "{}", s)
    }
}

/// Routing decision for a UDP_INFO hint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UdpInfoRoute {
    Skip(UdpInfoSkip),
    Send {
        connection: ConnectionId,
        message: UdpInfo,
    },
}

impl Daemon {
    /// Decide whether and where a hint about `from` for `to` goes.
    pub fn route_udp_info(&self, from: NodeId, to: NodeId) -> Result<UdpInfoRoute, MetaError> {
        let myself = self.myself;
        let from_node = self.nodes.get(from).ok_or(MetaError::NodeNotFound(from))?;
        let to_node = self.nodes.get(to).ok_or(MetaError::NodeNotFound(to))?;

        // Stop at a static relay; skip over ourselves otherwise
        let to = if to_node.via() == myself {
            to_node.nexthop()
        } else {
            to_node.via()
        };
        let to_node = &self.nodes[to];

        if to == myself {
            return Ok(UdpInfoRoute::Skip(UdpInfoSkip::ToSelf));
        }
        if !to_node.status().reachable {
            return Ok(UdpInfoRoute::Skip(UdpInfoSkip::Unreachable));
        }
        if from == myself && to_node.connection().is_some() {
            return Ok(UdpInfoRoute::Skip(UdpInfoSkip::DirectlyConnected));
        }
        let options = self.nodes[myself].options() | from_node.options() | to_node.options();
        if options.intersects(NodeOptions::TCP_ONLY) {
            return Ok(UdpInfoRoute::Skip(UdpInfoSkip::TcpOnly));
        }
        let nexthop = &self.nodes[to_node.nexthop()];
        if nexthop.options().version() < UDP_INFO_MIN_VERSION {
            return Ok(UdpInfoRoute::Skip(UdpInfoSkip::NextHopTooOld));
        }
        let Some(connection) = nexthop
            .connection()
            .filter(|id| self.connections.contains_key(id))
        else {
            return Ok(UdpInfoRoute::Skip(UdpInfoSkip::NoNextHopConnection));
        };

        // The first hop ignores the originator's own claim, so when we
        // originate, the local end of the next-hop connection stands in
        let address = if from != myself {
            from_node.address()
        } else {
            self.connections[&connection].local_address()
        };
        if address.is_unspecified() {
            return Ok(UdpInfoRoute::Skip(UdpInfoSkip::UnknownAddress));
        }
        let (address, port) = address.render();

        Ok(UdpInfoRoute::Send {
            connection,
            message: UdpInfo {
                from: from_node.name().to_string(),
                to: to_node.name().to_string(),
                address,
                port,
            },
        })
    }

    /// Send a UDP address hint about `from` towards `to`.
    ///
    /// Hints that routing rules suppress count as sent.
    pub fn send_udp_info(&mut self, from: NodeId, to: NodeId) -> Result<(), MetaError> {
        match self.route_udp_info(from, to)? {
            UdpInfoRoute::Skip(UdpInfoSkip::NoNextHopConnection) => {
                debug!(from = %from, to = %to, "No connection to next hop, dropping UDP_INFO");
                Ok(())
            }
            UdpInfoRoute::Skip(reason) => {
                trace!(from = %from, to = %to, reason = %reason, "Not sending UDP_INFO");
                Ok(())
            }
            UdpInfoRoute::Send { connection, message } => {
                debug!(
                    peer = %self.peer_display(connection),
                    from = %message.from,
                    to = %message.to,
                    address = %message.address,
                    port = %message.port,
                    "Sending UDP_INFO"
                );
                self.send_request(connection, &message.encode())
            }
        }
    }

    /// Handle a relayed UDP address hint.
    ///
    /// Learns `from`'s address when we have no better source for it, then
    /// passes the hint on towards `to`. Unknown names and hints that
    /// crossed a static relay are dropped without closing the connection.
    pub(in crate::daemon) fn handle_udp_info(&mut self, conn_id: ConnectionId, args: &str) -> Disposition {
        let info = match UdpInfo::decode(args) {
            Ok(i) => i,
            Err(e) => return self.reject_request(conn_id, RequestType::UdpInfo, e),
        };

        if let Err(e) = NodeName::parse(&info.from).and_then(|_| NodeName::parse(&info.to)) {
            return self.reject_request(conn_id, RequestType::UdpInfo, e);
        }

        let Some(from) = self.nodes.lookup(&info.from) else {
            error!(
                peer = %self.peer_display(conn_id),
                origin = %info.from,
                "Got UDP_INFO from unknown origin"
            );
            return Disposition::Continue;
        };

        let from_node = &self.nodes[from];
        if !from_node.is_own_relay() {
            warn!(
                peer = %self.peer_display(conn_id),
                origin = %from_node.name(),
                "Got UDP_INFO from node we can't reach directly"
            );
            return Disposition::Continue;
        }

        // Having relayed this hint, we see from's real address better than it does
        if from_node.connection().is_none() && !from_node.status().udp_confirmed {
            let address = NodeAddress::parse(&info.address, &info.port);
            if !address.is_unspecified()
                && &address != from_node.address()
                && let Err(e) = self.update_node_udp(from, address)
            {
                return Disposition::CloseViolation(e);
            }
        }

        let Some(to) = self.nodes.lookup(&info.to) else {
            error!(
                peer = %self.peer_display(conn_id),
                destination = %info.to,
                "Got UDP_INFO for unknown destination"
            );
            return Disposition::Continue;
        };

        match self.send_udp_info(from, to) {
            Ok(()) => Disposition::Continue,
            Err(e) => {
                error!(
                    peer = %self.peer_display(conn_id),
                    error = %e,
                    "Failed to forward UDP_INFO"
                );
                Disposition::CloseViolation(e)
            }
        }
    }
}
