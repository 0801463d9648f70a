//! Mesh Node Table
//!
//! Arena of every node known to this daemon. Nodes are addressed by
//! [`NodeId`], a stable index that stays valid for the lifetime of the
//! table (nodes are never removed, only marked unreachable). Relay links
//! between nodes (`via`, `nexthop`) are stored as ids, so the back-reference
//! graph needs no shared ownership.

mod address;
mod name;
mod node;
mod options;

pub use address::NodeAddress;
pub use name::{is_valid_name, NameError, NodeName};
pub use node::{Node, NodeStatus, PmtuState, MTU};
pub use options::NodeOptions;

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::ops::{Index, IndexMut};
use thiserror::Error;

/// Errors related to node table operations.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("node already exists: {0}")]
    DuplicateName(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("invalid node name: {0}")]
    Name(#[from] NameError),
}

/// Stable index of a node in the [`NodeTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// All known mesh nodes, with name and UDP-address lookups.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    by_udp_address: HashMap<SocketAddr, NodeId>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. It starts as its own relay and next hop.
    pub fn insert(&mut self, name: NodeName) -> Result<NodeId, MeshError> {
        if self.by_name.contains_key(name.as_str()) {
            return Err(MeshError::DuplicateName(name.to_string()));
        }
        let id = NodeId(self.nodes.len());
        self.by_name.insert(name.to_string(), id);
        self.nodes.push(Node::new(id, name));
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Find a node by name. The name is not validated here.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Find the node currently recorded at a UDP address.
    pub fn lookup_udp(&self, addr: &SocketAddr) -> Option<NodeId> {
        self.by_udp_address.get(addr).copied()
    }

    /// Set a node's static relay and next hop.
    pub fn set_route(&mut self, id: NodeId, via: NodeId, nexthop: NodeId) -> Result<(), MeshError> {
        for check in [id, via, nexthop] {
            if self.get(check).is_none() {
                return Err(MeshError::NodeNotFound(check));
            }
        }
        self.nodes[id.0].set_route(via, nexthop);
        Ok(())
    }

    /// Record a node's UDP address and keep the address index in step.
    pub fn set_udp_address(&mut self, id: NodeId, address: NodeAddress) -> Result<(), MeshError> {
        let node = self.nodes.get_mut(id.0).ok_or(MeshError::NodeNotFound(id))?;

        if let Some(old) = node.address().socket_addr()
            && self.by_udp_address.get(&old) == Some(&id)
        {
            self.by_udp_address.remove(&old);
        }
        if let Some(new) = address.socket_addr() {
            self.by_udp_address.insert(new, id);
        }
        node.set_udp_address(address);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}

impl Index<NodeId> for NodeTable {
    type Output = Node;

    /// Ids are only minted by [`NodeTable::insert`] and never invalidated.
    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for NodeTable {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> NodeName {
        NodeName::parse(s).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = NodeTable::new();
        let a = table.insert(name("alpha")).unwrap();
        let b = table.insert(name("beta")).unwrap();

        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("alpha"), Some(a));
        assert_eq!(table.lookup("beta"), Some(b));
        assert_eq!(table.lookup("gamma"), None);
        assert_eq!(table.lookup("not-valid"), None);

        let node = &table[a];
        assert_eq!(node.name(), "alpha");
        assert_eq!(node.via(), a);
        assert_eq!(node.nexthop(), a);
        assert!(node.is_own_relay());
        assert!(node.connection().is_none());
    }

    #[test]
    fn test_duplicate_name() {
        let mut table = NodeTable::new();
        table.insert(name("alpha")).unwrap();
        assert!(matches!(
            table.insert(name("alpha")),
            Err(MeshError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_set_route() {
        let mut table = NodeTable::new();
        let a = table.insert(name("a")).unwrap();
        let r = table.insert(name("r")).unwrap();

        table.set_route(a, r, r).unwrap();
        assert_eq!(table[a].via(), r);
        assert_eq!(table[a].nexthop(), r);
        assert!(!table[a].is_own_relay());

        let bogus = NodeId(42);
        assert!(matches!(
            table.set_route(a, bogus, r),
            Err(MeshError::NodeNotFound(id)) if id == bogus
        ));
    }

    #[test]
    fn test_udp_address_index() {
        let mut table = NodeTable::new();
        let a = table.insert(name("a")).unwrap();
        let first: SocketAddr = "192.0.2.1:655".parse().unwrap();
        let second: SocketAddr = "192.0.2.2:655".parse().unwrap();

        table[a].set_udp_confirmed(true);
        table.set_udp_address(a, first.into()).unwrap();
        assert_eq!(table.lookup_udp(&first), Some(a));
        assert!(!table[a].status().udp_confirmed);
        assert_eq!(table[a].hostname(), "192.0.2.1 port 655");

        table.set_udp_address(a, second.into()).unwrap();
        assert_eq!(table.lookup_udp(&first), None);
        assert_eq!(table.lookup_udp(&second), Some(a));

        table
            .set_udp_address(a, NodeAddress::parse("somewhere", "1"))
            .unwrap();
        assert_eq!(table.lookup_udp(&second), None);
    }

    #[test]
    fn test_udp_address_resets_pmtu() {
        let mut table = NodeTable::new();
        let a = table.insert(name("a")).unwrap();
        table.set_udp_address(a, "192.0.2.1:655".parse::<SocketAddr>().unwrap().into()).unwrap();
        assert_eq!(table[a].pmtu(), PmtuState::default());
        assert_eq!(table[a].pmtu().max_mtu, MTU);
    }
}
