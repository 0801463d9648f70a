//! meshmeta: mesh VPN meta-protocol control layer
//!
//! Line-oriented control traffic between directly connected mesh daemons:
//! liveness probing, a TCP fallback channel for tunnel packets, and
//! relayed UDP address hints that let indirectly connected nodes find a
//! direct path to each other.

pub mod config;
pub mod daemon;
pub mod mesh;
pub mod peer;
pub mod protocol;

// Re-export config types
pub use config::{Config, ConfigError, MetaConfig, NodeConfig, NodeSeed};

// Re-export daemon types
pub use daemon::{
    red_drop_probability, tcp_packet_channel, unix_now_ms, Daemon, Disposition, MetaError,
    TcpPacket, TcpPacketRx, TcpPacketTx, UdpInfoRoute, UdpInfoSkip,
};

// Re-export mesh types
pub use mesh::{
    is_valid_name, MeshError, NameError, Node, NodeAddress, NodeId, NodeName, NodeOptions,
    NodeStatus, NodeTable, PmtuState, MTU,
};

// Re-export peer types
pub use peer::{
    Connection, ConnectionDirection, ConnectionError, ConnectionId, OutgoingAttempt,
    OutgoingConfig,
};

// Re-export protocol types
pub use protocol::{
    ErrorReport, PacketHeader, ProtocolError, RequestType, StatusReport, UdpInfo, VpnPacket,
};
