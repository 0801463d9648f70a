//! Liveness timers for meta connections.

use crate::daemon::Daemon;
use crate::peer::ConnectionId;
use tracing::{debug, info};

impl Daemon {
    /// Probe idle connections and report those whose PING went unanswered.
    ///
    /// Called periodically by the dispatch loop. Returned connections are
    /// left registered; the caller closes them. For a connection we
    /// initiated, the retry delay grows before it is reported.
    pub fn check_ping_timeouts(&mut self) -> Vec<ConnectionId> {
        if self.connections.is_empty() {
            return Vec::new();
        }

        let now_ms = self.now_ms;
        let interval_ms = self.config.meta.ping_interval_secs() * 1000;
        let timeout_ms = self.config.meta.ping_timeout_secs() * 1000;
        let max_timeout_secs = self.config.meta.max_timeout_secs();

        let mut timed_out = Vec::new();
        let mut due = Vec::new();
        for (id, conn) in &self.connections {
            if !conn.is_active() {
                continue;
            }
            if conn.is_ping_timed_out(now_ms, timeout_ms) {
                timed_out.push(*id);
            } else if conn.is_ping_due(now_ms, interval_ms) {
                due.push(*id);
            }
        }
        due.sort();

        for id in due {
            if let Err(e) = self.send_ping(id) {
                debug!(conn = %id, error = %e, "Failed to send PING");
                timed_out.push(id);
            }
        }

        for id in &timed_out {
            let Some(conn) = self.connections.get_mut(id) else {
                continue;
            };
            let idle_secs = now_ms.saturating_sub(conn.last_ping_time_ms()) / 1000;
            match conn.outgoing_mut() {
                Some(outgoing) => {
                    let retry_secs = outgoing.record_failure(max_timeout_secs);
                    info!(
                        peer = %conn,
                        idle_secs,
                        retry_secs,
                        "Peer didn't respond to PING, will retry"
                    );
                }
                None => info!(peer = %conn, idle_secs, "Peer didn't respond to PING"),
            }
        }

        timed_out.sort();
        timed_out
    }
}
