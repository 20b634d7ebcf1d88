//! Outbound TCP connections with a deadline.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;

/// Connect to `host:port`, giving up after `timeout`.
///
/// A timeout surfaces as `io::ErrorKind::TimedOut` so callers can tell it
/// apart from a refused or unreachable peer.
pub async fn dial(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {}:{} timed out after {:?}", host, port, timeout),
            )
        })??;
    stream.set_nodelay(true)?;
    Ok(stream)
}
