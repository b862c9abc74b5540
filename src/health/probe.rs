//! Non-consuming liveness probe for an idle broker connection.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;

/// Check that `stream` is still usable without reading application bytes.
///
/// Fails on a pending socket error, on peer EOF (seen via `peek`) or if the
/// socket does not become writable within `window`. Data waiting to be read
/// is left in place.
pub async fn probe(stream: &TcpStream, window: Duration) -> io::Result<()> {
    if let Some(err) = stream.take_error()? {
        return Err(err);
    }

    let mut byte = [0u8; 1];
    match time::timeout(window, stream.peek(&mut byte)).await {
        // Nothing pending: an idle, open connection.
        Err(_) => {}
        Ok(Ok(0)) => {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "broker closed the connection",
            ))
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(e),
    }

    match time::timeout(window, stream.writable()).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "broker connection not writable")),
    }
}
