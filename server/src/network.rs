//! TCP listener and per-connection handling
//!
//! Each accepted socket gets its own task. The task splits the stream, spawns
//! a writer that drains the connection's outbox, and feeds every received
//! line into the shared [`RaceCoordinator`].

use crate::race::RaceCoordinator;
use log::{debug, error, info, warn};
use shared::default_name;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Accepts racers and hands them to the coordinator
pub struct RaceServer {
    listener: TcpListener,
    coordinator: RaceCoordinator,
}

impl RaceServer {
    pub async fn bind(
        addr: &str,
        coordinator: RaceCoordinator,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            coordinator,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop; returns once `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Server waiting for connections");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Server shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let coordinator = self.coordinator.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, addr, coordinator).await;
                            });
                        }
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }
            }
        }

        self.coordinator.shutdown();
    }
}

/// Drives one connection from accept to disconnect.
///
/// `leave` is called exactly once on the way out, whether the peer closed
/// the socket cleanly or the read failed.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, coordinator: RaceCoordinator) {
    debug!("Connection accepted from {}", addr);

    let (reader, writer) = stream.into_split();
    let (outbox, rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(write_lines(writer, rx, addr));

    let id = coordinator.join(outbox.clone()).await.id;

    let mut lines = BufReader::new(reader).lines();
    if let Err(e) = read_session(&mut lines, id, &coordinator).await {
        warn!("Connection of horse {} ({}) failed: {}", id, addr, e);
    }

    info!("Horse {} disconnected ({})", id, addr);
    coordinator.leave(Some(id), &outbox).await;
    // The writer stops once no sender for this outbox is left
    drop(outbox);

    if let Err(e) = writer_task.await {
        error!("Writer task for {} panicked: {}", addr, e);
    }
}

async fn read_session(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    id: u32,
    coordinator: &RaceCoordinator,
) -> std::io::Result<()> {
    let Some(first) = lines.next_line().await? else {
        return Ok(());
    };

    let name = first.trim();
    let name = if name.is_empty() {
        default_name(id)
    } else {
        name.to_string()
    };
    coordinator.rename(id, &name).await;
    coordinator.announce_join(id).await;

    while let Some(line) = lines.next_line().await? {
        if let Err(e) = coordinator.handle_message(id, &line).await {
            warn!("Protocol violation from horse {}: {}", id, e);
        }
    }

    Ok(())
}

async fn write_lines(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
    addr: SocketAddr,
) {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Failed to write to {}: {}", addr, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::timeout;

    async fn start_server() -> (SocketAddr, RaceCoordinator, CancellationToken) {
        let shutdown = CancellationToken::new();
        let coordinator =
            RaceCoordinator::with_countdown_interval(Duration::from_millis(10), shutdown.clone());
        let server = RaceServer::bind("127.0.0.1:0", coordinator.clone())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run(shutdown.clone()));
        (addr, coordinator, shutdown)
    }

    struct TestPeer {
        lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl TestPeer {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, writer) = stream.into_split();
            Self {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{}\n", line).as_bytes())
                .await
                .unwrap();
        }

        async fn recv(&mut self) -> String {
            timeout(Duration::from_secs(2), self.lines.next_line())
                .await
                .expect("timed out")
                .unwrap()
                .expect("connection closed")
        }
    }

    #[tokio::test]
    async fn test_handshake_sends_id_roster_and_status() {
        let (addr, _coordinator, shutdown) = start_server().await;

        let mut peer = TestPeer::connect(addr).await;
        assert_eq!(peer.recv().await, "1");
        peer.send("Pegasus").await;
        assert_eq!(peer.recv().await, "players:1-Pegasus,");
        assert_eq!(peer.recv().await, "wait_players");

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_blank_name_uses_default() {
        let (addr, coordinator, shutdown) = start_server().await;

        let mut peer = TestPeer::connect(addr).await;
        assert_eq!(peer.recv().await, "1");
        peer.send("   ").await;
        assert_eq!(peer.recv().await, "players:1-Player 1,");
        assert_eq!(coordinator.roster().await, vec![(1, "Player 1".to_string())]);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_malformed_report_keeps_connection() {
        let (addr, coordinator, shutdown) = start_server().await;

        let mut peer = TestPeer::connect(addr).await;
        peer.recv().await;
        peer.send("Comet").await;
        peer.recv().await;
        peer.recv().await;

        peer.send("clicks_sent:lots").await;
        peer.send("clicks_sent:7").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = coordinator.snapshot(1).await.unwrap();
        assert_eq!(snapshot.reported_clicks, 7);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_removes_participant() {
        let (addr, coordinator, shutdown) = start_server().await;

        let mut first = TestPeer::connect(addr).await;
        first.recv().await;
        first.send("First").await;
        first.recv().await;
        first.recv().await;

        let mut second = TestPeer::connect(addr).await;
        assert_eq!(second.recv().await, "2");
        second.send("Second").await;
        assert_eq!(first.recv().await, "players:1-First,2-Second,");
        assert_eq!(first.recv().await, "can_start");

        drop(second);
        assert_eq!(first.recv().await, "wait_players");
        assert_eq!(coordinator.participant_count().await, 1);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_before_name() {
        let (addr, coordinator, shutdown) = start_server().await;

        let mut peer = TestPeer::connect(addr).await;
        assert_eq!(peer.recv().await, "1");
        drop(peer);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(coordinator.participant_count().await, 0);

        shutdown.cancel();
    }
}
