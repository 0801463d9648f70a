//! Node name validation.
//!
//! Names are the addressing key of the meta-protocol and arrive from
//! untrusted peers, so every name is checked before it is used for a
//! lookup.

use std::fmt;
use thiserror::Error;

/// Errors from node name validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("empty node name")]
    Empty,

    #[error("invalid character {ch:?} in node name {name:?}")]
    InvalidChar { name: String, ch: char },
}

/// Check whether `name` is a syntactically valid node name.
///
/// Valid names are non-empty and consist of ASCII letters, digits and
/// underscores only.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A validated node name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeName(String);

impl NodeName {
    /// Validate and wrap a node name.
    pub fn parse(name: &str) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if let Some(ch) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(NameError::InvalidChar {
                name: name.chars().take(64).collect(),
                ch,
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["alpha", "node_1", "A", "_", "R2D2"] {
            assert!(is_valid_name(name), "{name}");
            assert_eq!(NodeName::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_invalid_names() {
        assert!(!is_valid_name(""));
        assert_eq!(NodeName::parse(""), Err(NameError::Empty));

        for name in ["a-b", "a.b", "a b", "a/b", "ümlaut", "x\0"] {
            assert!(!is_valid_name(name), "{name:?}");
            assert!(matches!(NodeName::parse(name), Err(NameError::InvalidChar { .. })));
        }
    }
}
