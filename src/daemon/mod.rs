//! Meta-Protocol Daemon Context
//!
//! The [`Daemon`] holds all process-wide state the meta-protocol handlers
//! need: the local node, the node table, live peer connections, the
//! outbound queue limit driving random early drop, the current clock and
//! the channel to the data plane. It is driven from a single dispatch
//! loop; every handler runs to completion without blocking, so no locking
//! is needed around node state.

mod handlers;
#[cfg(test)]
mod tests;

pub use handlers::{red_drop_probability, UdpInfoRoute, UdpInfoSkip};

use crate::config::{Config, ConfigError, NodeSeed};
use crate::mesh::{MeshError, NameError, NodeAddress, NodeId, NodeName, NodeOptions, NodeTable};
use crate::peer::{Connection, ConnectionError, ConnectionId, OutgoingAttempt};
use crate::protocol::{ProtocolError, RequestType, VpnPacket};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Errors from meta-protocol processing.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid name: {0}")]
    Name(#[from] NameError),

    #[error("node table error: {0}")]
    Mesh(#[from] MeshError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("unauthorized request: {0}")]
    Unauthorized(RequestType),

    #[error("request is not valid UTF-8")]
    InvalidUtf8,

    #[error("request too long: max {max}, got {got}")]
    RequestTooLong { max: usize, got: usize },
}

/// What the caller must do with a connection after a request.
///
/// On the wire both close variants look the same; they are kept apart so
/// that an orderly shutdown is not reported as misbehaviour.
#[derive(Debug)]
pub enum Disposition {
    /// Request accepted; keep reading.
    Continue,
    /// The peer asked to end the session (TERMREQ, or a well-formed ERROR).
    CloseClean,
    /// The session cannot continue: malformed or unauthorized input, or a
    /// reply that could not be queued.
    CloseViolation(MetaError),
}

impl Disposition {
    /// Whether the connection stays open.
    pub fn keeps_open(&self) -> bool {
        matches!(self, Disposition::Continue)
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, Disposition::CloseViolation(_))
    }
}

/// A tunnel packet received over a TCP fallback channel.
#[derive(Clone, Debug)]
pub struct TcpPacket {
    /// Connection it arrived on.
    pub connection: ConnectionId,
    /// Node at the other end of that connection, if known.
    pub node: Option<NodeId>,
    pub packet: VpnPacket,
}

/// Channel sender for packets handed to the data plane.
pub type TcpPacketTx = tokio::sync::mpsc::Sender<TcpPacket>;

/// Channel receiver for packets handed to the data plane.
pub type TcpPacketRx = tokio::sync::mpsc::Receiver<TcpPacket>;

/// Create a data-plane packet channel with the given buffer size.
pub fn tcp_packet_channel(buffer: usize) -> (TcpPacketTx, TcpPacketRx) {
    tokio::sync::mpsc::channel(buffer)
}

/// Current Unix time in milliseconds.
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Process-wide meta-protocol state.
pub struct Daemon {
    // === Configuration ===
    config: Config,

    // === Mesh ===
    /// The local node.
    myself: NodeId,
    /// Every known node, including ourselves.
    nodes: NodeTable,

    // === Connections ===
    connections: HashMap<ConnectionId, Connection>,
    next_connection_id: u64,

    // === Congestion ===
    /// Outbound queue size at which TCP packets are always dropped.
    max_outbound_queue_bytes: usize,
    /// Source of random early drop draws.
    rng: StdRng,

    // === Clock ===
    /// Dispatch loop time (Unix milliseconds).
    now_ms: u64,

    // === Data Plane ===
    packet_tx: Option<TcpPacketTx>,
}

impl Daemon {
    /// Create a daemon from configuration.
    ///
    /// The local node is registered first, then any statically configured
    /// nodes with their routes, addresses and connections.
    pub fn new(config: Config) -> Result<Self, MetaError> {
        config.validate()?;
        let own_name = config.node_name()?;

        let mut nodes = NodeTable::new();
        let myself = nodes.insert(own_name)?;
        let mut own_options = NodeOptions::empty().with_version(config.node.protocol_minor());
        if config.node.tcp_only {
            own_options.insert(NodeOptions::TCP_ONLY);
        }
        nodes[myself].set_options(own_options);
        nodes[myself].set_reachable(true);

        let max_outbound_queue_bytes = config.meta.max_output_buffer_size();
        let seeds = config.nodes.clone();

        let mut daemon = Self {
            config,
            myself,
            nodes,
            connections: HashMap::new(),
            next_connection_id: 1,
            max_outbound_queue_bytes,
            rng: StdRng::from_os_rng(),
            now_ms: unix_now_ms(),
            packet_tx: None,
        };

        for seed in &seeds {
            daemon.add_node(&seed.name)?;
        }
        for seed in &seeds {
            daemon.apply_seed(seed)?;
        }

        info!(
            name = %daemon.nodes[myself].name(),
            nodes = daemon.nodes.len(),
            connections = daemon.connections.len(),
            max_outbound_queue_bytes,
            "Meta-protocol daemon created"
        );

        Ok(daemon)
    }

    fn apply_seed(&mut self, seed: &NodeSeed) -> Result<(), MetaError> {
        let id = self.lookup_required(&seed.name, &seed.name)?;
        let via = match &seed.via {
            Some(name) => self.lookup_required(&seed.name, name)?,
            None => id,
        };
        let nexthop = match &seed.nexthop {
            Some(name) => self.lookup_required(&seed.name, name)?,
            None => id,
        };
        self.nodes.set_route(id, via, nexthop)?;

        if let Some(address) = &seed.address {
            let port = seed.port.unwrap_or(0).to_string();
            self.nodes.set_udp_address(id, NodeAddress::parse(address, &port))?;
        }

        let mut options = NodeOptions::empty().with_version(seed.protocol_minor());
        if seed.tcp_only {
            options.insert(NodeOptions::TCP_ONLY);
        }
        let node = &mut self.nodes[id];
        node.set_options(options);
        node.set_reachable(seed.reachable);

        if seed.connected {
            self.connect_node(id, NodeAddress::Unspecified, None)?;
        }
        Ok(())
    }

    fn lookup_required(&self, seed: &str, name: &str) -> Result<NodeId, MetaError> {
        self.nodes.lookup(name).ok_or_else(|| {
            MetaError::Config(ConfigError::UnknownReference {
                node: seed.to_string(),
                reference: name.to_string(),
            })
        })
    }

    // === Accessors ===

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The local node.
    pub fn myself(&self) -> NodeId {
        self.myself
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeTable {
        &mut self.nodes
    }

    pub fn max_outbound_queue_bytes(&self) -> usize {
        self.max_outbound_queue_bytes
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Advance the dispatch loop clock.
    pub fn set_now_ms(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }

    /// Attach the data-plane channel for received TCP packets.
    pub fn set_packet_tx(&mut self, tx: TcpPacketTx) {
        self.packet_tx = Some(tx);
    }

    // === Nodes ===

    /// Register a node by name.
    pub fn add_node(&mut self, name: &str) -> Result<NodeId, MetaError> {
        let name = NodeName::parse(name)?;
        Ok(self.nodes.insert(name)?)
    }

    /// Record a better UDP address for a node.
    ///
    /// Our own address is never rewritten from hints.
    pub fn update_node_udp(&mut self, node: NodeId, address: NodeAddress) -> Result<(), MetaError> {
        if node == self.myself {
            warn!("Trying to update UDP address of myself");
            return Ok(());
        }

        self.nodes.set_udp_address(node, address)?;

        let node = &self.nodes[node];
        debug!(
            node = %node.name(),
            address = %node.hostname(),
            "UDP address updated"
        );
        Ok(())
    }

    // === Connections ===

    /// Allocate a new connection id.
    pub fn allocate_connection_id(&mut self) -> ConnectionId {
        let id = ConnectionId::new(self.next_connection_id);
        self.next_connection_id += 1;
        id
    }

    /// Register an established connection, linking it to its node.
    pub fn add_connection(
        &mut self,
        mut connection: Connection,
        node: Option<NodeId>,
    ) -> Result<ConnectionId, MetaError> {
        let id = connection.id();
        if let Some(node_id) = node {
            let node = self.nodes.get_mut(node_id).ok_or(MetaError::NodeNotFound(node_id))?;
            node.set_connection(Some(id));
        }
        connection.set_node(node);

        debug!(
            peer = %connection,
            conn = %id,
            direction = %connection.direction(),
            "Connection registered"
        );
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Open a connection to a known node.
    pub fn connect_node(
        &mut self,
        node: NodeId,
        local_address: NodeAddress,
        outgoing: Option<OutgoingAttempt>,
    ) -> Result<ConnectionId, MetaError> {
        if self.nodes.get(node).is_none() {
            return Err(MetaError::NodeNotFound(node));
        }
        let id = self.allocate_connection_id();
        let target = &self.nodes[node];
        let mut connection = Connection::new(
            id,
            target.name(),
            target.hostname(),
            local_address,
            self.now_ms,
        );
        if let Some(outgoing) = outgoing {
            connection = connection.with_outgoing(outgoing);
        }
        self.add_connection(connection, Some(node))
    }

    /// Tear down a connection. Its framing and outgoing state are gone as
    /// soon as this returns.
    pub fn close_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let mut connection = self.connections.remove(&id)?;
        connection.close();

        if let Some(node_id) = connection.node()
            && let Some(node) = self.nodes.get_mut(node_id)
            && node.connection() == Some(id)
        {
            node.set_connection(None);
        }

        info!(peer = %connection, conn = %id, "Connection closed");
        Some(connection)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Ids of all registered connections, in allocation order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        ids.sort();
        ids
    }

    /// "name (hostname)" of a connection's peer, for log fields.
    pub(crate) fn peer_display(&self, id: ConnectionId) -> String {
        match self.connections.get(&id) {
            Some(conn) => conn.to_string(),
            None => id.to_string(),
        }
    }

    // === Outbound ===

    /// Queue a request line on a connection.
    pub(crate) fn send_request(&mut self, id: ConnectionId, line: &str) -> Result<(), MetaError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(MetaError::ConnectionNotFound(id))?;
        trace!(peer = %conn, request = %line, "Sending request");
        conn.queue_line(line)?;
        Ok(())
    }

    /// Queue raw bytes directly after a framing line.
    pub(crate) fn send_meta(&mut self, id: ConnectionId, data: &[u8]) -> Result<(), MetaError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(MetaError::ConnectionNotFound(id))?;
        conn.queue_raw(data)?;
        Ok(())
    }
}
