//! meshmeta replay tool
//!
//! Builds a daemon from configuration, feeds standard input to it as the
//! byte stream received from one peer, and writes whatever the daemon
//! queues for that peer to standard output. Logs go to standard error.

use clap::Parser;
use meshmeta::{tcp_packet_channel, unix_now_ms, Config, Daemon, Disposition, NodeAddress};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Mesh meta-protocol replay tool
#[derive(Parser, Debug)]
#[command(name = "meshmeta", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Peer the input is received from
    #[arg(short, long, value_name = "NAME")]
    peer: String,
}

const READ_CHUNK: usize = 4096;

/// Data-plane channel capacity. Every packet in a chunk needs at least
/// its own PACKET line, so one chunk can never deliver more than this.
const DATA_PLANE_BUFFER: usize = READ_CHUNK;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (config, loaded_paths) = if let Some(config_path) = &args.config {
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    let mut daemon = match Daemon::new(config) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("Failed to create daemon: {}", e);
            std::process::exit(1);
        }
    };

    let (packet_tx, mut packet_rx) = tcp_packet_channel(DATA_PLANE_BUFFER);
    daemon.set_packet_tx(packet_tx);

    let Some(peer) = daemon.nodes().lookup(&args.peer) else {
        error!(peer = %args.peer, "Unknown peer");
        std::process::exit(1);
    };
    let conn = match daemon.nodes()[peer].connection() {
        Some(conn) => conn,
        None => match daemon.connect_node(peer, NodeAddress::Unspecified, None) {
            Ok(conn) => conn,
            Err(e) => {
                error!(peer = %args.peer, "Failed to open connection: {}", e);
                std::process::exit(1);
            }
        },
    };

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = match stdin.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        daemon.set_now_ms(unix_now_ms());
        let outcome = daemon.receive_meta(conn, &buf[..n]);
        let timed_out = daemon.check_ping_timeouts();

        if let Some(c) = daemon.connection_mut(conn) {
            let out = c.take_outbound();
            if let Err(e) = stdout.write_all(&out).await {
                error!("Failed to write output: {}", e);
                break;
            }
        }

        while let Ok(packet) = packet_rx.try_recv() {
            info!(
                conn = %packet.connection,
                len = packet.packet.len(),
                "Received TCP packet"
            );
        }

        match outcome {
            Disposition::Continue => {}
            Disposition::CloseClean => {
                info!(peer = %args.peer, "Peer closed the session");
                break;
            }
            Disposition::CloseViolation(e) => {
                error!(peer = %args.peer, "Closing connection: {}", e);
                break;
            }
        }
        if timed_out.contains(&conn) {
            break;
        }
    }

    if let Err(e) = stdout.flush().await {
        debug!("Failed to flush output: {}", e);
    }
    daemon.close_connection(conn);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_of_empty_packets_fits_data_plane() {
        let mut daemon = Daemon::new(Config::with_name("alpha")).unwrap();
        let beta = daemon.add_node("beta").unwrap();
        let conn = daemon
            .connect_node(beta, NodeAddress::Unspecified, None)
            .unwrap();
        let (tx, mut rx) = tcp_packet_channel(DATA_PLANE_BUFFER);
        daemon.set_packet_tx(tx);

        let header = b"17 0\n";
        let count = READ_CHUNK / header.len();
        let chunk = header.repeat(count);
        assert!(chunk.len() <= READ_CHUNK);
        assert!(daemon.receive_meta(conn, &chunk).keeps_open());

        let mut delivered = 0;
        while rx.try_recv().is_ok() {
            delivered += 1;
        }
        assert_eq!(delivered, count);
    }
}
