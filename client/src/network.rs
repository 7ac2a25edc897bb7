use log::{debug, info};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Sends one line to `server` and reads the reply until the server closes.
///
/// An empty reply is normal for `AT` lines.
pub async fn send_line(server: SocketAddr, line: &str, wait: Duration) -> io::Result<String> {
    let exchange = async {
        let mut stream = TcpStream::connect(server).await?;
        info!("Send: {}", line);
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.shutdown().await?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;
        debug!("Received {} bytes", reply.len());
        Ok(reply)
    };

    timeout(wait, exchange)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no reply from server"))?
}
