//! Node and meta-protocol configuration subsections.
//!
//! Optional values fall back to the daemon defaults through accessor
//! methods, so that merging can tell "unset" from "set to the default".

use serde::{Deserialize, Serialize};

/// Default protocol minor version advertised by this daemon.
pub const DEFAULT_PROTOCOL_MINOR: u8 = 7;

/// Default outbound queue limit: ten full-size frames.
pub const DEFAULT_MAX_OUTPUT_BUFFER_SIZE: usize = 10 * crate::mesh::MTU as usize;

/// Local node configuration (`node.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Our node name (`node.name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Use TCP only, never UDP (`node.tcp_only`).
    #[serde(default)]
    pub tcp_only: bool,

    /// Protocol minor version we advertise (`node.protocol_minor`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_minor: Option<u8>,
}

impl NodeConfig {
    pub fn protocol_minor(&self) -> u8 {
        self.protocol_minor.unwrap_or(DEFAULT_PROTOCOL_MINOR)
    }
}

/// Meta-protocol tuning (`meta.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Outbound queue size at which TCP fallback packets are always
    /// dropped (`meta.max_output_buffer_size`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_buffer_size: Option<usize>,

    /// Seconds between PINGs on an idle connection (`meta.ping_interval_secs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_interval_secs: Option<u64>,

    /// Seconds to wait for a PONG (`meta.ping_timeout_secs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_timeout_secs: Option<u64>,

    /// Cap on the outgoing retry delay (`meta.max_timeout_secs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_secs: Option<u64>,
}

impl MetaConfig {
    pub fn max_output_buffer_size(&self) -> usize {
        self.max_output_buffer_size
            .unwrap_or(DEFAULT_MAX_OUTPUT_BUFFER_SIZE)
    }

    pub fn ping_interval_secs(&self) -> u64 {
        self.ping_interval_secs.unwrap_or(60)
    }

    pub fn ping_timeout_secs(&self) -> u64 {
        self.ping_timeout_secs.unwrap_or(5)
    }

    pub fn max_timeout_secs(&self) -> u64 {
        self.max_timeout_secs.unwrap_or(900)
    }

    pub(super) fn merge(&mut self, other: MetaConfig) {
        if other.max_output_buffer_size.is_some() {
            self.max_output_buffer_size = other.max_output_buffer_size;
        }
        if other.ping_interval_secs.is_some() {
            self.ping_interval_secs = other.ping_interval_secs;
        }
        if other.ping_timeout_secs.is_some() {
            self.ping_timeout_secs = other.ping_timeout_secs;
        }
        if other.max_timeout_secs.is_some() {
            self.max_timeout_secs = other.max_timeout_secs;
        }
    }
}

/// A statically known mesh node (`nodes[]`).
///
/// Lets a daemon start with a populated node table before the topology
/// layer has run, and drives the replay tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSeed {
    /// Node name.
    pub name: String,

    /// Last known UDP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Last known UDP port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Static relay; defaults to the node itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,

    /// Next hop; defaults to the node itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nexthop: Option<String>,

    /// Node is currently reachable.
    #[serde(default = "NodeSeed::default_reachable")]
    pub reachable: bool,

    /// Node only uses TCP.
    #[serde(default)]
    pub tcp_only: bool,

    /// Advertised protocol minor version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_minor: Option<u8>,

    /// We hold a direct meta connection to this node.
    #[serde(default)]
    pub connected: bool,
}

impl NodeSeed {
    fn default_reachable() -> bool {
        true
    }

    pub fn protocol_minor(&self) -> u8 {
        self.protocol_minor.unwrap_or(DEFAULT_PROTOCOL_MINOR)
    }
}
