//! Node capability flags.

use std::fmt;
use std::ops::BitOr;

/// Capability and configuration bits advertised by a node.
///
/// The low bits are feature flags; the top byte carries the node's
/// protocol minor version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeOptions(u32);

impl NodeOptions {
    /// Node cannot receive UDP directly.
    pub const INDIRECT: NodeOptions = NodeOptions(0x0001);
    /// Node only uses TCP; no UDP path discovery.
    pub const TCP_ONLY: NodeOptions = NodeOptions(0x0002);
    /// Node performs path MTU discovery.
    pub const PMTU_DISCOVERY: NodeOptions = NodeOptions(0x0004);
    /// Node clamps TCP MSS.
    pub const CLAMP_MSS: NodeOptions = NodeOptions(0x0008);

    const VERSION_SHIFT: u32 = 24;
    const FLAGS_MASK: u32 = 0x00ff_ffff;

    pub const fn empty() -> Self {
        NodeOptions(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        NodeOptions(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: NodeOptions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set.
    pub const fn intersects(self, other: NodeOptions) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: NodeOptions) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: NodeOptions) {
        self.0 &= !other.0;
    }

    /// Protocol minor version from the top byte.
    pub const fn version(self) -> u8 {
        (self.0 >> Self::VERSION_SHIFT) as u8
    }

    /// Replace the protocol minor version, keeping the flag bits.
    pub const fn with_version(self, version: u8) -> Self {
        NodeOptions((self.0 & Self::FLAGS_MASK) | ((version as u32) << Self::VERSION_SHIFT))
    }
}

impl BitOr for NodeOptions {
    type Output = NodeOptions;

    fn bitor(self, rhs: NodeOptions) -> NodeOptions {
        NodeOptions(self.0 | rhs.0)
    }
}

impl fmt::Display for NodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_byte() {
        let opts = NodeOptions::TCP_ONLY.with_version(7);
        assert_eq!(opts.version(), 7);
        assert!(opts.contains(NodeOptions::TCP_ONLY));
        assert_eq!(opts.bits(), 0x0700_0002);

        let opts = opts.with_version(255);
        assert_eq!(opts.version(), 255);
        assert!(opts.contains(NodeOptions::TCP_ONLY));
    }

    #[test]
    fn test_flags() {
        let mut opts = NodeOptions::empty();
        assert!(!opts.intersects(NodeOptions::TCP_ONLY));
        opts.insert(NodeOptions::TCP_ONLY | NodeOptions::PMTU_DISCOVERY);
        assert!(opts.contains(NodeOptions::PMTU_DISCOVERY));
        opts.remove(NodeOptions::TCP_ONLY);
        assert!(!opts.intersects(NodeOptions::TCP_ONLY));
        assert_eq!(opts.version(), 0);
    }
}
