//! Best-effort flooding of accepted records to topology neighbors.
//!
//! Each neighbor gets its own spawned task that nobody waits on. A failed
//! send is logged and forgotten: no retry, no acknowledgement.
//!
//! Loop avoidance only remembers two servers per hop, the record's origin
//! and whoever relayed it to us. That stops ping-pong between two servers
//! but not re-delivery around longer cycles; there the last-writer-wins
//! check in the directory is what eventually quiets the flood, since a
//! server that already holds the record does not re-flood it.

use log::{info, warn};
use shared::{ClientRecord, Topology};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Upper bound on a single neighbor send, connect included.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers one `AT` line to a neighbor.
pub trait PeerSender: Send + Sync + 'static {
    fn send(&self, peer: SocketAddr, line: String) -> impl Future<Output = io::Result<()>> + Send;
}

/// Opens a fresh TCP connection per message, writes the line and closes.
#[derive(Debug, Clone)]
pub struct TcpPeerSender {
    timeout: Duration,
}

impl TcpPeerSender {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpPeerSender {
    fn default() -> Self {
        Self::new(SEND_TIMEOUT)
    }
}

impl PeerSender for TcpPeerSender {
    fn send(&self, peer: SocketAddr, line: String) -> impl Future<Output = io::Result<()>> + Send {
        let timeout = self.timeout;
        async move {
            let exchange = async {
                let mut stream = TcpStream::connect(peer).await?;
                stream.write_all(line.as_bytes()).await?;
                stream.write_all(b"\n").await?;
                stream.shutdown().await
            };
            tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "send timed out"))?
        }
    }
}

pub struct FloodPropagator<S> {
    local: String,
    topology: Arc<Topology>,
    sender: Arc<S>,
}

impl<S: PeerSender> FloodPropagator<S> {
    pub fn new(local: impl Into<String>, topology: Arc<Topology>, sender: S) -> Self {
        Self {
            local: local.into(),
            topology,
            sender: Arc::new(sender),
        }
    }

    /// Sends `record` to every neighbor not in `excluded`, stamped with this
    /// server as sender. Returns immediately with the number of sends started.
    pub fn propagate(&self, record: &ClientRecord, excluded: &[&str]) -> usize {
        let line = record.relay_line(&self.local);
        let mut started = 0;

        for neighbor in self.topology.neighbors(&self.local) {
            if excluded.contains(&neighbor) {
                continue;
            }
            let Some(addr) = self.topology.address(neighbor) else {
                warn!("No address known for neighbor {}", neighbor);
                continue;
            };

            let sender = Arc::clone(&self.sender);
            let line = line.clone();
            let neighbor = neighbor.to_string();
            tokio::spawn(async move {
                info!("Flooding to {}: {}", neighbor, line);
                if let Err(e) = sender.send(addr, line).await {
                    warn!("Failed to flood to {} at {}: {}", neighbor, addr, e);
                }
            });
            started += 1;
        }

        started
    }
}
