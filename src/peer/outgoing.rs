//! Retry bookkeeping for connections we initiate.
//!
//! An outgoing attempt walks the configured addresses of a peer, resolving
//! each into candidate socket addresses, and backs off between failures.
//! All of it is discarded once the peer answers a PING.

use std::net::SocketAddr;
use std::vec;

/// Retry delay added after each failed attempt, in seconds.
pub const RETRY_STEP_SECS: u64 = 5;

/// The configured peer address currently being tried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingConfig {
    pub host: String,
    pub port: u16,
}

/// Outgoing-connection bookkeeping owned by a single connection.
#[derive(Debug)]
pub struct OutgoingAttempt {
    /// Name of the peer we are trying to reach.
    name: String,
    /// Delay before the next attempt, in seconds.
    timeout_secs: u64,
    /// Address entry currently being tried.
    config: Option<OutgoingConfig>,
    /// Remaining resolved candidates for `config`.
    addresses: Option<vec::IntoIter<SocketAddr>>,
}

impl OutgoingAttempt {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout_secs: 0,
            config: None,
            addresses: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn config(&self) -> Option<&OutgoingConfig> {
        self.config.as_ref()
    }

    pub fn has_addresses(&self) -> bool {
        self.addresses.is_some()
    }

    /// Start trying a configured address with its resolved candidates.
    pub fn begin(&mut self, config: OutgoingConfig, resolved: Vec<SocketAddr>) {
        self.config = Some(config);
        self.addresses = Some(resolved.into_iter());
    }

    /// Next resolved candidate for the current address entry.
    pub fn next_address(&mut self) -> Option<SocketAddr> {
        self.addresses.as_mut()?.next()
    }

    /// Grow the retry delay after a failed attempt, capped at `max_secs`.
    /// Returns the new delay.
    pub fn record_failure(&mut self, max_secs: u64) -> u64 {
        self.timeout_secs = self.timeout_secs.saturating_add(RETRY_STEP_SECS).min(max_secs);
        self.timeout_secs
    }

    /// Drop all retry state; the session is known to be alive.
    pub fn reset(&mut self) {
        self.timeout_secs = 0;
        self.config = None;
        self.addresses = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OutgoingConfig {
        OutgoingConfig {
            host: "relay.example".into(),
            port: 655,
        }
    }

    #[test]
    fn test_backoff_linear_with_cap() {
        let mut attempt = OutgoingAttempt::new("relay");
        assert_eq!(attempt.record_failure(12), 5);
        assert_eq!(attempt.record_failure(12), 10);
        assert_eq!(attempt.record_failure(12), 12);
        assert_eq!(attempt.record_failure(12), 12);
    }

    #[test]
    fn test_address_walk() {
        let mut attempt = OutgoingAttempt::new("relay");
        assert_eq!(attempt.next_address(), None);

        let a: SocketAddr = "192.0.2.1:655".parse().unwrap();
        let b: SocketAddr = "[2001:db8::1]:655".parse().unwrap();
        attempt.begin(config(), vec![a, b]);
        assert_eq!(attempt.config(), Some(&config()));
        assert_eq!(attempt.next_address(), Some(a));
        assert_eq!(attempt.next_address(), Some(b));
        assert_eq!(attempt.next_address(), None);
        assert!(attempt.has_addresses());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut attempt = OutgoingAttempt::new("relay");
        attempt.record_failure(900);
        attempt.begin(config(), vec!["192.0.2.1:655".parse().unwrap()]);

        attempt.reset();
        assert_eq!(attempt.timeout_secs(), 0);
        assert!(attempt.config().is_none());
        assert!(!attempt.has_addresses());
        assert_eq!(attempt.name(), "relay");
    }
}
