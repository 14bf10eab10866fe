/// Accept loop for the values endpoint
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tokio::time::timeout;

use crate::boards::SharedSnapshot;
use crate::server::routes::{route, Response};

/// Request line plus headers
const MAX_REQUEST_BYTES: u64 = 8 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("Serving values on http://{}", listener.local_addr()?);
    Ok(listener)
}

/// Serve until the task is dropped. Each connection gets its own task.
pub async fn serve(listener: TcpListener, snapshot: SharedSnapshot) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let snapshot = snapshot.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &snapshot, READ_TIMEOUT).await {
                warn!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

async fn handle_connection<S>(
    stream: S,
    snapshot: &SharedSnapshot,
    read_timeout: Duration,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);

    let response = match timeout(read_timeout, read_request_head(&mut reader)).await {
        Ok(Ok(Some(request_line))) => {
            let response = route(&request_line, snapshot);
            debug!("{} -> {}", request_line, response.status);
            response
        }
        Ok(Ok(None)) => Response::plain(431),
        Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => Response::plain(400),
        Ok(Err(e)) => return Err(e),
        Err(_) => Response::plain(408),
    };

    let mut stream = reader.into_inner();
    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await
}

/// Read the request line and drain the headers after it.
///
/// Returns `None` when the head does not fit in `MAX_REQUEST_BYTES`.
async fn read_request_head<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = reader.take(MAX_REQUEST_BYTES);

    let mut request_line = String::new();
    limited.read_line(&mut request_line).await?;
    if !request_line.ends_with('\n') && limited.limit() == 0 {
        return Ok(None);
    }

    let mut header = String::new();
    loop {
        header.clear();
        let read = limited.read_line(&mut header).await?;
        if !header.ends_with('\n') && limited.limit() == 0 {
            return Ok(None);
        }
        if read == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    Ok(Some(request_line.trim_end().to_string()))
}
