use super::*;
use crate::mesh::NodeId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

mod tcp_packet;

pub(super) fn make_daemon() -> Daemon {
    Daemon::new(Config::with_name("alpha")).unwrap()
}

pub(super) fn make_daemon_with(seeds: Vec<NodeSeed>) -> Daemon {
    let mut config = Config::with_name("alpha");
    config.nodes = seeds;
    Daemon::new(config).unwrap()
}

pub(super) fn seed(name: &str) -> NodeSeed {
    NodeSeed {
        name: name.to_string(),
        address: None,
        port: None,
        via: None,
        nexthop: None,
        reachable: true,
        tcp_only: false,
        protocol_minor: None,
        connected: false,
    }
}

pub(super) fn node(daemon: &Daemon, name: &str) -> NodeId {
    daemon.nodes().lookup(name).unwrap()
}

/// Register a node and open a connection to it.
pub(super) fn connect_new_node(daemon: &mut Daemon, name: &str) -> ConnectionId {
    let id = daemon.add_node(name).unwrap();
    daemon.nodes_mut()[id].set_reachable(true);
    daemon
        .connect_node(id, NodeAddress::Unspecified, None)
        .unwrap()
}

pub(super) fn socket_addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

/// Drain a connection's outbound queue as text lines.
pub(super) fn take_lines(daemon: &mut Daemon, conn: ConnectionId) -> Vec<String> {
    let bytes = daemon.connection_mut(conn).unwrap().take_outbound();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Counts ERROR-level events.
#[derive(Clone, Default)]
struct ErrorCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run `f` and report how many errors it logged.
pub(super) fn count_errors<T>(f: impl FnOnce() -> T) -> (T, usize) {
    let counter = ErrorCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counter.0.load(Ordering::SeqCst))
}

// === Construction ===

#[test]
fn test_new_daemon() {
    let daemon = make_daemon();
    let me = &daemon.nodes()[daemon.myself()];
    assert_eq!(me.name(), "alpha");
    assert!(me.status().reachable);
    assert_eq!(me.options().version(), crate::config::DEFAULT_PROTOCOL_MINOR);
    assert!(!me.options().contains(NodeOptions::TCP_ONLY));
    assert_eq!(daemon.max_outbound_queue_bytes(), 15_180);
    assert_eq!(daemon.connection_count(), 0);
}

#[test]
fn test_new_daemon_requires_name() {
    assert!(matches!(
        Daemon::new(Config::new()),
        Err(MetaError::Config(ConfigError::MissingName))
    ));
}

#[test]
fn test_new_daemon_tcp_only() {
    let mut config = Config::with_name("alpha");
    config.node.tcp_only = true;
    let daemon = Daemon::new(config).unwrap();
    assert!(
        daemon.nodes()[daemon.myself()]
            .options()
            .contains(NodeOptions::TCP_ONLY)
    );
}

#[test]
fn test_seeds_applied() {
    let mut beta = seed("beta");
    beta.address = Some("192.0.2.2".into());
    beta.port = Some(655);
    beta.connected = true;
    let mut gamma = seed("gamma");
    gamma.nexthop = Some("beta".into());
    gamma.reachable = false;
    gamma.protocol_minor = Some(4);

    let daemon = make_daemon_with(vec![beta, gamma]);
    let beta = node(&daemon, "beta");
    let gamma = node(&daemon, "gamma");

    assert_eq!(daemon.nodes().len(), 3);
    assert_eq!(
        daemon.nodes()[beta].address(),
        &NodeAddress::Inet(socket_addr("192.0.2.2:655"))
    );
    assert_eq!(daemon.nodes().lookup_udp(&socket_addr("192.0.2.2:655")), Some(beta));
    let conn = daemon.nodes()[beta].connection().unwrap();
    assert_eq!(daemon.connection(conn).unwrap().node(), Some(beta));

    assert_eq!(daemon.nodes()[gamma].nexthop(), beta);
    assert!(daemon.nodes()[gamma].is_own_relay());
    assert!(!daemon.nodes()[gamma].status().reachable);
    assert_eq!(daemon.nodes()[gamma].options().version(), 4);
}

// === Node Address Learning ===

#[test]
fn test_update_node_udp() {
    let mut daemon = make_daemon();
    let beta = daemon.add_node("beta").unwrap();
    daemon.nodes_mut()[beta].set_udp_confirmed(true);

    let addr = socket_addr("198.51.100.7:655");
    daemon.update_node_udp(beta, addr.into()).unwrap();

    let node = &daemon.nodes()[beta];
    assert_eq!(node.address(), &NodeAddress::Inet(addr));
    assert_eq!(node.hostname(), "198.51.100.7 port 655");
    assert!(!node.status().udp_confirmed);
    assert_eq!(node.pmtu(), crate::mesh::PmtuState::default());
    assert_eq!(daemon.nodes().lookup_udp(&addr), Some(beta));

    let moved = socket_addr("198.51.100.8:655");
    daemon.update_node_udp(beta, moved.into()).unwrap();
    assert_eq!(daemon.nodes().lookup_udp(&addr), None);
    assert_eq!(daemon.nodes().lookup_udp(&moved), Some(beta));
}

#[test]
fn test_update_node_udp_refuses_myself() {
    let mut daemon = make_daemon();
    let me = daemon.myself();
    daemon
        .update_node_udp(me, socket_addr("198.51.100.7:655").into())
        .unwrap();
    assert!(daemon.nodes()[me].address().is_unspecified());
}

// === Connection Lifecycle ===

#[test]
fn test_close_connection_invalidates_state() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");
    let beta = node(&daemon, "beta");

    daemon.connection_mut(conn).unwrap().expect_tcp_packet(100);
    let closed = daemon.close_connection(conn).unwrap();

    assert!(!closed.is_active());
    assert_eq!(closed.pending_tcp_len(), None);
    assert!(daemon.connection(conn).is_none());
    assert_eq!(daemon.nodes()[beta].connection(), None);
    assert!(daemon.close_connection(conn).is_none());
    assert!(matches!(
        daemon.send_ping(conn),
        Err(MetaError::ConnectionNotFound(_))
    ));
}

#[test]
fn test_connection_ids_in_allocation_order() {
    let mut daemon = make_daemon();
    let first = connect_new_node(&mut daemon, "beta");
    let second = connect_new_node(&mut daemon, "gamma");
    let third = connect_new_node(&mut daemon, "delta");
    assert_eq!(daemon.connection_ids(), vec![first, second, third]);
    assert_eq!(daemon.connection_count(), 3);
}
