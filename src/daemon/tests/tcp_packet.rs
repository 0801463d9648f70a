//! TCP fallback packets: random early drop and PACKET framing.

use super::*;
use crate::protocol::PacketHeader;

fn fill_queue(daemon: &mut Daemon, conn: ConnectionId, bytes: usize) {
    let c = daemon.connection_mut(conn).unwrap();
    c.take_outbound();
    c.queue_raw(&vec![0u8; bytes]).unwrap();
}

#[test]
fn test_send_tcp_packet_framing() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");
    let packet = VpnPacket::new(b"\x45\n\x00".to_vec()).unwrap();

    daemon.send_tcp_packet(conn, &packet).unwrap();
    let bytes = daemon.connection_mut(conn).unwrap().take_outbound();
    assert_eq!(bytes, b"17 3\n\x45\n\x00".to_vec());
}

#[test]
fn test_send_empty_tcp_packet() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");
    let packet = VpnPacket::new(Vec::new()).unwrap();

    daemon.send_tcp_packet(conn, &packet).unwrap();
    assert_eq!(take_lines(&mut daemon, conn), vec!["17 0"]);
}

#[test]
fn test_no_drop_up_to_half_full() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");
    let half = daemon.max_outbound_queue_bytes() / 2;
    let packet = VpnPacket::new(vec![1u8; 100]).unwrap();

    for _ in 0..200 {
        fill_queue(&mut daemon, conn, half);
        daemon.send_tcp_packet(conn, &packet).unwrap();
        let queued = daemon.connection(conn).unwrap().outbound_queue_len();
        assert_eq!(queued, half + "17 100\n".len() + 100);
    }
}

#[test]
fn test_always_drop_when_full() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");
    let max = daemon.max_outbound_queue_bytes();
    let packet = VpnPacket::new(vec![1u8; 100]).unwrap();

    for fill in [max, max + 1, 3 * max] {
        fill_queue(&mut daemon, conn, fill);
        for _ in 0..200 {
            // Dropped packets still count as sent
            daemon.send_tcp_packet(conn, &packet).unwrap();
        }
        assert_eq!(daemon.connection(conn).unwrap().outbound_queue_len(), fill);
    }
}

#[test]
fn test_send_tcp_packet_unknown_connection() {
    let mut daemon = make_daemon();
    let packet = VpnPacket::new(vec![1u8; 4]).unwrap();
    assert!(matches!(
        daemon.send_tcp_packet(ConnectionId::new(99), &packet),
        Err(MetaError::ConnectionNotFound(_))
    ));
}

#[test]
fn test_packet_header_sets_pending_len() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");

    for len in 0..=u16::MAX {
        let line = PacketHeader { len }.encode();
        assert!(daemon.receive_request(conn, &line).keeps_open());
        assert_eq!(daemon.connection(conn).unwrap().pending_tcp_len(), Some(len));
    }
}

#[test]
fn test_packet_header_rejects_bad_length() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");

    for line in ["17", "17 65536", "17 -1", "17 many"] {
        let (outcome, errors) = count_errors(|| daemon.receive_request(conn, line));
        assert!(outcome.is_violation(), "{line}");
        assert_eq!(errors, 1, "{line}");
        assert_eq!(daemon.connection(conn).unwrap().pending_tcp_len(), None);
    }
}

#[tokio::test]
async fn test_received_packet_reaches_data_plane() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");
    let beta = node(&daemon, "beta");
    let (tx, mut rx) = tcp_packet_channel(8);
    daemon.set_packet_tx(tx);

    // Body bytes that look like requests must not be parsed
    assert!(daemon.receive_meta(conn, b"17 6\n8\n7\n\n").keeps_open());
    assert!(daemon.receive_meta(conn, b"\n8\n").keeps_open());

    let delivered = rx.recv().await.unwrap();
    assert_eq!(delivered.connection, conn);
    assert_eq!(delivered.node, Some(beta));
    assert_eq!(delivered.packet.data(), b"8\n7\n\n\n");
    assert!(rx.try_recv().is_err());

    assert_eq!(daemon.connection(conn).unwrap().pending_tcp_len(), None);
    assert_eq!(take_lines(&mut daemon, conn), vec!["9"]);
}

#[tokio::test]
async fn test_full_data_plane_drops_packet() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");
    let (tx, mut rx) = tcp_packet_channel(1);
    daemon.set_packet_tx(tx);

    assert!(daemon.receive_meta(conn, b"17 1\na17 1\nb").keeps_open());

    assert_eq!(rx.recv().await.unwrap().packet.data(), b"a");
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_packet_without_data_plane_is_discarded() {
    let mut daemon = make_daemon();
    let conn = connect_new_node(&mut daemon, "beta");

    assert!(daemon.receive_meta(conn, b"17 2\nxy8\n").keeps_open());
    assert_eq!(take_lines(&mut daemon, conn), vec!["9"]);
}
