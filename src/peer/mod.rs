//! Peer connections.
//!
//! A [`Connection`] is one authenticated meta-protocol session with a
//! directly adjacent peer. Connections we initiated additionally carry an
//! [`OutgoingAttempt`] with retry bookkeeping until the peer proves alive.

mod connection;
mod outgoing;

pub use connection::{Connection, ConnectionDirection, ConnectionError, ConnectionId};
pub use outgoing::{OutgoingAttempt, OutgoingConfig, RETRY_STEP_SECS};
