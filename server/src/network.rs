//! Server network layer: accepts connections and dispatches the one
//! command each connection carries.

use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::flood::{FloodPropagator, PeerSender};
use crate::places::PlaceSearch;
use crate::resolver::QueryResolver;
use crate::utils::unix_time;
use log::{debug, error, info, warn};
use shared::{rejection, ClientRecord, ClockSkew, Command, Coordinate, Timestamp, Topology};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Longest message read from a single connection.
pub const MAX_MESSAGE_BYTES: u64 = 64 * 1024;

/// One member of the herd.
pub struct Server<S, P> {
    name: String,
    topology: Arc<Topology>,
    directory: Arc<Directory>,
    flood: FloodPropagator<S>,
    resolver: QueryResolver<P>,
    clock: fn() -> f64,
}

impl<S: PeerSender, P: PlaceSearch> Server<S, P> {
    pub fn new(name: &str, topology: Arc<Topology>, sender: S, places: P) -> Result<Self> {
        let directory = Arc::new(Directory::new());
        let resolver = QueryResolver::new(Arc::clone(&directory), places);
        Self::with_resolver(name, topology, sender, directory, resolver)
    }

    /// Like [`Server::new`] with a resolver built by the caller around `directory`.
    pub fn with_resolver(
        name: &str,
        topology: Arc<Topology>,
        sender: S,
        directory: Arc<Directory>,
        resolver: QueryResolver<P>,
    ) -> Result<Self> {
        if !topology.contains(name) {
            return Err(Error::UnknownServer(name.to_string()));
        }
        Ok(Server {
            name: name.to_string(),
            flood: FloodPropagator::new(name, Arc::clone(&topology), sender),
            topology,
            directory,
            resolver,
            clock: unix_time,
        })
    }

    /// Replaces the wall clock used to stamp receipt times.
    pub fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Processes one raw message received at `received_at` and returns the
    /// reply, if the command gets one.
    pub async fn handle_message(&self, raw: &str, received_at: f64) -> Option<String> {
        match Command::parse(raw, &self.topology) {
            Command::IAmAt {
                client_id,
                coordinate,
                sent_at,
            } => Some(self.handle_iamat(client_id, coordinate, sent_at, received_at)),
            Command::WhatsAt {
                client_id,
                radius_km,
                limit,
            } => match self.resolver.resolve(&client_id, radius_km, limit).await {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!("WHATSAT for {} failed: {}", client_id, e);
                    Some(rejection(raw))
                }
            },
            Command::At { record, sender } => {
                self.handle_at(record, sender);
                None
            }
            Command::Invalid {
                from_peer: true,
                reason,
            } => {
                debug!("Dropping invalid AT ({}): {}", reason, raw.trim_end());
                None
            }
            Command::Invalid {
                from_peer: false,
                reason,
            } => {
                info!("Rejecting message ({}): {}", reason, raw.trim_end());
                Some(rejection(raw))
            }
        }
    }

    /// Records a client's own report and floods it to every neighbor.
    ///
    /// The client is answered even when the report is older than what is
    /// already stored; it just isn't stored or flooded.
    fn handle_iamat(
        &self,
        client_id: String,
        coordinate: Coordinate,
        sent_at: Timestamp,
        received_at: f64,
    ) -> String {
        let record = ClientRecord {
            client_id,
            origin_server: self.name.clone(),
            clock_skew: ClockSkew::between(received_at, &sent_at),
            coordinate,
            report_timestamp: sent_at,
        };
        let response = record.to_string();

        if self.directory.upsert(record.clone()) {
            self.flood.propagate(&record, &[]);
        }
        response
    }

    /// Applies a relayed record and re-floods it, skipping its origin and
    /// the neighbor it came from. Stale records stop here.
    fn handle_at(&self, record: ClientRecord, sender: String) {
        if !self.directory.upsert(record.clone()) {
            return;
        }
        info!(
            "Learned {} from {} (origin {})",
            record.client_id, sender, record.origin_server
        );
        self.flood
            .propagate(&record, &[record.origin_server.as_str(), sender.as_str()]);
    }

    /// Serves a single connection: one message in, at most one reply out.
    pub async fn handle_connection<T>(&self, stream: T) -> std::io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = BufReader::new(stream);
        let mut buf = Vec::new();
        let read = (&mut stream)
            .take(MAX_MESSAGE_BYTES)
            .read_until(b'\n', &mut buf)
            .await?;
        let received_at = (self.clock)();

        let reply = if read as u64 == MAX_MESSAGE_BYTES && buf.last() != Some(&b'\n') {
            match discard_line(&mut stream).await? {
                0 => self.dispatch(&buf, received_at).await,
                rest => {
                    warn!(
                        "Rejecting oversized message ({} bytes)",
                        MAX_MESSAGE_BYTES + rest
                    );
                    // Too long to echo back; peers never get a reply.
                    let from_peer =
                        String::from_utf8_lossy(&buf).split_whitespace().next() == Some("AT");
                    (!from_peer).then(|| rejection(""))
                }
            }
        } else {
            self.dispatch(&buf, received_at).await
        };

        if let Some(response) = reply {
            info!("Sending message: {}", response.trim_end());
            stream.write_all(response.as_bytes()).await?;
        }
        stream.shutdown().await
    }

    async fn dispatch(&self, buf: &[u8], received_at: f64) -> Option<String> {
        let raw = String::from_utf8_lossy(buf);
        info!("Received message: {}", raw.trim_end());
        self.handle_message(&raw, received_at).await
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!("Server {} listening on {}", self.name, listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            warn!("Connection from {} failed: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Skips the rest of the current line, returning how many bytes were dropped.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<u64> {
    let mut discarded = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(discarded);
        }
        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        reader.consume(used);
        discarded += used as u64;
        if done {
            return Ok(discarded);
        }
    }
}
