//! Daemon Configuration
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./meshmeta.yaml` (current directory - highest priority)
//! 2. `~/.config/meshmeta/meshmeta.yaml` (user config directory)
//! 3. `/etc/meshmeta/meshmeta.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority files.
//!
//! # YAML Structure
//!
//! ```yaml
//! node:
//!   name: alpha
//!   protocol_minor: 7
//! meta:
//!   max_output_buffer_size: 15180
//!   ping_interval_secs: 60
//! nodes:
//!   - name: beta
//!     address: 192.0.2.2
//!     port: 655
//!     connected: true
//! ```

mod node;

use crate::mesh::{is_valid_name, NameError, NodeName};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use node::{
    MetaConfig, NodeConfig, NodeSeed, DEFAULT_MAX_OUTPUT_BUFFER_SIZE, DEFAULT_PROTOCOL_MINOR,
};

/// Default config filename.
const CONFIG_FILENAME: &str = "meshmeta.yaml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("node.name is not set")]
    MissingName,

    #[error("invalid node name: {0}")]
    Name(#[from] NameError),

    #[error("node {node} refers to unknown node {reference}")]
    UnknownReference { node: String, reference: String },

    #[error("meta.max_output_buffer_size must be greater than zero")]
    ZeroOutputBuffer,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local node configuration (`node.*`).
    #[serde(default)]
    pub node: NodeConfig,

    /// Meta-protocol tuning (`meta.*`).
    #[serde(default)]
    pub meta: MetaConfig,

    /// Statically known mesh nodes (`nodes`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeSeed>,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with only the local node name set.
    pub fn with_name(name: &str) -> Self {
        let mut config = Self::default();
        config.node.name = Some(name.to_string());
        config
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/meshmeta").join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("meshmeta").join(CONFIG_FILENAME));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        if other.node.name.is_some() {
            self.node.name = other.node.name;
        }
        if other.node.tcp_only {
            self.node.tcp_only = true;
        }
        if other.node.protocol_minor.is_some() {
            self.node.protocol_minor = other.node.protocol_minor;
        }
        self.meta.merge(other.meta);
        // Node list is replaced wholesale, never interleaved
        if !other.nodes.is_empty() {
            self.nodes = other.nodes;
        }
    }

    /// The validated local node name.
    pub fn node_name(&self) -> Result<NodeName, ConfigError> {
        let name = self.node.name.as_deref().ok_or(ConfigError::MissingName)?;
        Ok(NodeName::parse(name)?)
    }

    /// Check the configuration for values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let own = self.node_name()?;

        if self.meta.max_output_buffer_size() == 0 {
            return Err(ConfigError::ZeroOutputBuffer);
        }

        let known = |name: &str| name == own.as_str() || self.nodes.iter().any(|n| n.name == name);
        for seed in &self.nodes {
            NodeName::parse(&seed.name)?;
            for reference in [&seed.via, &seed.nexthop].into_iter().flatten() {
                if !is_valid_name(reference) || !known(reference) {
                    return Err(ConfigError::UnknownReference {
                        node: seed.name.clone(),
                        reference: reference.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
