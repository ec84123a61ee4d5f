use std::io;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

/// Open and immediately close a TCP connection to `addr`.
///
/// A connect that does not finish within `limit` is reported as
/// `ErrorKind::TimedOut`, the same as any other I/O failure.
pub async fn probe_tcp(addr: SocketAddr, limit: Duration) -> io::Result<()> {
    let conn_fut = TcpStream::connect(addr);
    let conn = timeout(limit, conn_fut).await.map_err(|_| {
        io::Error::new(io::ErrorKind::TimedOut, format!("connect to {} timed out", addr))
    })??;
    drop(conn);
    Ok(())
}
