//! Mesh participant state.

use super::{NodeAddress, NodeId, NodeName, NodeOptions};
use crate::peer::ConnectionId;

/// Default link MTU used to seed path MTU discovery.
pub const MTU: u16 = 1518;

/// Reachability flags for a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStatus {
    /// Node is reachable through the current mesh graph.
    pub reachable: bool,
    /// A UDP path to the node has been confirmed by our own probes,
    /// as opposed to merely asserted by a third party.
    pub udp_confirmed: bool,
}

/// Path MTU discovery progress for a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PmtuState {
    pub min_mtu: u16,
    pub max_mtu: u16,
    pub mtu_probes: u32,
}

impl Default for PmtuState {
    fn default() -> Self {
        Self {
            min_mtu: 0,
            max_mtu: MTU,
            mtu_probes: 0,
        }
    }
}

/// A named participant of the mesh, not necessarily directly connected.
///
/// `via` and `nexthop` are arena indices into the owning
/// [`NodeTable`](super::NodeTable). A node's own id in either field means
/// "no indirection": `via == self` means no static relay, `nexthop == self`
/// means directly connected.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    name: NodeName,
    hostname: String,
    address: NodeAddress,
    via: NodeId,
    nexthop: NodeId,
    connection: Option<ConnectionId>,
    options: NodeOptions,
    status: NodeStatus,
    pmtu: PmtuState,
}

impl Node {
    pub(super) fn new(id: NodeId, name: NodeName) -> Self {
        let address = NodeAddress::default();
        Self {
            id,
            name,
            hostname: address.to_string(),
            address,
            via: id,
            nexthop: id,
            connection: None,
            options: NodeOptions::empty(),
            status: NodeStatus::default(),
            pmtu: PmtuState::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Diagnostic hostname, derived from the last known address.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Static relay for this node's traffic (self if none).
    pub fn via(&self) -> NodeId {
        self.via
    }

    /// Directly adjacent node carrying this node's traffic (self if direct).
    pub fn nexthop(&self) -> NodeId {
        self.nexthop
    }

    /// Whether this node's traffic is not pinned behind a static relay.
    pub fn is_own_relay(&self) -> bool {
        self.via == self.id
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn options(&self) -> NodeOptions {
        self.options
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn pmtu(&self) -> PmtuState {
        self.pmtu
    }

    pub fn set_options(&mut self, options: NodeOptions) {
        self.options = options;
    }

    pub fn set_reachable(&mut self, reachable: bool) {
        self.status.reachable = reachable;
    }

    pub fn set_udp_confirmed(&mut self, confirmed: bool) {
        self.status.udp_confirmed = confirmed;
    }

    pub(super) fn set_route(&mut self, via: NodeId, nexthop: NodeId) {
        self.via = via;
        self.nexthop = nexthop;
    }

    pub(crate) fn set_connection(&mut self, connection: Option<ConnectionId>) {
        self.connection = connection;
    }

    /// Record a new UDP address. Forgets any previous confirmation and
    /// restarts path MTU discovery, since neither holds for a new path.
    pub(super) fn set_udp_address(&mut self, address: NodeAddress) {
        self.hostname = address.to_string();
        self.address = address;
        self.status.udp_confirmed = false;
        self.pmtu = PmtuState::default();
    }
}
