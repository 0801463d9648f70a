//! Node UDP addresses as carried in meta-protocol text.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Best-known UDP address of a node.
///
/// Addresses received as text that do not parse as a numeric IP and port
/// are kept verbatim so they can still be compared and relayed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeAddress {
    /// Nothing known yet.
    #[default]
    Unspecified,
    /// A numeric socket address.
    Inet(SocketAddr),
    /// Unparseable address text, kept as received.
    Unknown { address: String, port: String },
}

const UNSPECIFIED_TEXT: &str = "unspec";

impl NodeAddress {
    /// Parse address and port fields as they appear on the wire.
    pub fn parse(address: &str, port: &str) -> Self {
        if address == UNSPECIFIED_TEXT {
            return NodeAddress::Unspecified;
        }
        match (address.parse::<IpAddr>(), port.parse::<u16>()) {
            (Ok(ip), Ok(port)) => NodeAddress::Inet(SocketAddr::new(ip, port)),
            _ => NodeAddress::Unknown {
                address: address.to_string(),
                port: port.to_string(),
            },
        }
    }

    /// Render as (address, port) wire fields.
    pub fn render(&self) -> (String, String) {
        match self {
            NodeAddress::Unspecified => (UNSPECIFIED_TEXT.to_string(), "0".to_string()),
            NodeAddress::Inet(sa) => (sa.ip().to_string(), sa.port().to_string()),
            NodeAddress::Unknown { address, port } => (address.clone(), port.clone()),
        }
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            NodeAddress::Inet(sa) => Some(*sa),
            _ => None,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, NodeAddress::Unspecified)
    }
}

impl From<SocketAddr> for NodeAddress {
    fn from(sa: SocketAddr) -> Self {
        NodeAddress::Inet(sa)
    }
}

/// Human-readable form used as a node's diagnostic hostname.
impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (address, port) = self.render();
        match self {
            NodeAddress::Unspecified => f.write_str(UNSPECIFIED_TEXT),
            _ => write!(f, "{} port {}", address, port),
        }
    }
}
