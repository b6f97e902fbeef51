//! Request handling module
//!
//! Reads one request from a connection, resolves it against the content
//! root and writes exactly one response.

pub mod static_files;
pub mod writer;

use crate::config::Config;
use crate::http::{self, response, Status};
use crate::logger::{self, AccessLogEntry};
use static_files::{ContentRoot, Resolution};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use writer::ResponseParams;

/// Everything a worker needs, shared read-only across connections
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub content_root: ContentRoot,
    pub server_name: String,
    pub range_forced_extensions: Vec<String>,
    pub max_request_size: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub access_log: bool,
    pub access_log_format: String,
}

impl RequestContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            content_root: ContentRoot::from_config(&config.content),
            server_name: config.http.server_name.clone(),
            range_forced_extensions: config.content.range_forced_extensions.clone(),
            max_request_size: config.http.max_request_size,
            read_timeout: config.performance.read_deadline(),
            write_timeout: config.performance.write_deadline(),
            access_log: config.logging.access_log,
            access_log_format: config.logging.access_log_format.clone(),
        }
    }

    fn is_range_forced(&self, extension: &str) -> bool {
        !extension.is_empty() && self.range_forced_extensions.iter().any(|e| e == extension)
    }
}

/// Failure that ends one connection
#[derive(Debug)]
pub enum ServeError {
    /// Client did not finish sending the request in time
    ReadTimeout,
    /// Response could not be written in time
    WriteTimeout,
    /// Socket or file I/O failed
    Io(io::Error),
}

impl std::fmt::Display for ServeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadTimeout => write!(f, "timed out reading request"),
            Self::WriteTimeout => write!(f, "timed out writing response"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::ReadTimeout | Self::WriteTimeout => None,
        }
    }
}

impl From<io::Error> for ServeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Serve one request on `conn`
///
/// Returns the status sent, or `None` when the client closed without sending
/// anything. The connection is left for the caller to drop.
pub async fn handle_connection<S>(
    conn: &mut S,
    peer_addr: SocketAddr,
    ctx: &RequestContext,
) -> Result<Option<Status>, ServeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(peer_addr.to_string());

    let read = read_request_head(conn, ctx.max_request_size);
    let raw = tokio::time::timeout(ctx.read_timeout, read)
        .await
        .map_err(|_| ServeError::ReadTimeout)??;
    if raw.is_empty() {
        logger::log_debug(&format!("{peer_addr} closed without sending a request"));
        return Ok(None);
    }

    let respond = dispatch(conn, &raw, ctx, &mut entry);
    let result = tokio::time::timeout(ctx.write_timeout, respond)
        .await
        .map_err(|_| ServeError::WriteTimeout)
        .and_then(|r| r);

    if ctx.access_log && entry.status != 0 {
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &ctx.access_log_format);
    }

    result.map(Some)
}

/// Parse, resolve and respond; fills in `entry` as it goes
async fn dispatch<S>(
    conn: &mut S,
    raw: &[u8],
    ctx: &RequestContext,
    entry: &mut AccessLogEntry,
) -> Result<Status, ServeError>
where
    S: AsyncWrite + Unpin,
{
    let request = match http::parse(raw) {
        Ok(r) => r,
        Err(e) => {
            let peer = &entry.remote_addr;
            logger::log_warning(&format!("Rejecting request from {peer}: {e}"));
            let head = response::build_400_head(&ctx.server_name);
            return send_head(conn, &head, Status::BadRequest, entry).await;
        }
    };

    entry.method.clone_from(&request.method);
    entry.path.clone_from(&request.path);
    entry.range = request.range.to_string();

    if !request.is_get() {
        let head = response::build_405_head(&ctx.server_name);
        return send_head(conn, &head, Status::MethodNotAllowed, entry).await;
    }

    let file = match ctx.content_root.resolve(&request.path).await {
        Ok(Resolution::Found(f)) => Some(f),
        Ok(Resolution::NotFound) => {
            logger::log_debug(&format!("File not found: {}", request.path));
            None
        }
        Err(e) => {
            logger::log_error(&format!("Failed to open '{}': {e}", request.path));
            let head = response::build_500_head();
            send_head(conn, &head, Status::InternalServerError, entry).await?;
            return Err(ServeError::Io(e));
        }
    };

    let params = ResponseParams {
        server_name: &ctx.server_name,
        extension: &request.extension,
        range: request.range,
        range_forced: ctx.is_range_forced(&request.extension),
    };

    // Record the status even if the body write fails half way
    let summary = writer::respond(conn, file, params).await.inspect_err(|_| {
        entry.status = Status::InternalServerError.code();
    })?;
    entry.status = summary.status.code();
    entry.body_bytes = summary.body_bytes;
    Ok(summary.status)
}

async fn send_head<S>(
    conn: &mut S,
    head: &[u8],
    status: Status,
    entry: &mut AccessLogEntry,
) -> Result<Status, ServeError>
where
    S: AsyncWrite + Unpin,
{
    entry.status = status.code();
    conn.write_all(head).await?;
    conn.flush().await?;
    Ok(status)
}

/// Read until the blank line ending the header section, EOF, or `limit` bytes
///
/// A request that fills `limit` without a blank line is returned as is; the
/// parser only needs its first lines.
async fn read_request_head<R>(conn: &mut R, limit: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(limit.min(1024));
    let mut chunk = [0u8; 1024];

    while buf.len() < limit {
        let want = chunk.len().min(limit - buf.len());
        let n = conn.read(&mut chunk[..want]).await?;
        if n == 0 {
            break;
        }
        // Only the tail near the new bytes can complete the terminator
        let scan_from = buf.len().saturating_sub(3);
        buf.extend_from_slice(&chunk[..n]);
        if contains_terminator(&buf[scan_from..]) {
            break;
        }
    }
    Ok(buf)
}

fn contains_terminator(bytes: &[u8]) -> bool {
    bytes.windows(4).any(|w| w == b"\r\n\r\n") || bytes.windows(2).any(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::static_files::test_support::ScratchDir;
    use super::*;
    use tokio::io::duplex;

    fn test_context(dir: &ScratchDir) -> RequestContext {
        RequestContext {
            content_root: ContentRoot::new(dir.path(), true),
            server_name: "BBBserver".to_string(),
            range_forced_extensions: vec!["mp4".to_string()],
            max_request_size: 8192,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            access_log: false,
            access_log_format: "common".to_string(),
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    /// Send `request`, half-close, and collect the whole response
    async fn exchange(
        ctx: &RequestContext,
        request: &[u8],
    ) -> (Result<Option<Status>, ServeError>, Vec<u8>) {
        let (mut client, mut server) = duplex(64 * 1024);
        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();

        let result = handle_connection(&mut server, peer(), ctx).await;
        drop(server);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        (result, out)
    }

    #[tokio::test]
    async fn test_serves_full_file() {
        let dir = ScratchDir::new("conn-full");
        let data = dir.write_patterned("index.html", 200);
        let ctx = test_context(&dir);

        let (result, out) = exchange(&ctx, b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert_eq!(result.unwrap(), Some(Status::Ok));
        assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with(&data));
    }

    #[tokio::test]
    async fn test_serves_range() {
        let dir = ScratchDir::new("conn-range");
        let data = dir.write_patterned("index.html", 200);
        let ctx = test_context(&dir);

        let (result, out) = exchange(
            &ctx,
            b"GET /index.html HTTP/1.1\r\nRange: bytes=50-149\r\n\r\n",
        )
        .await;
        assert_eq!(result.unwrap(), Some(Status::PartialContent));
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("Content-Range: bytes 50-149/200\r\n"));
        assert!(out.ends_with(&data[50..150]));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = ScratchDir::new("conn-missing");
        let ctx = test_context(&dir);

        let (result, out) = exchange(&ctx, b"GET /missing.txt HTTP/1.1\r\n\r\n").await;
        assert_eq!(result.unwrap(), Some(Status::NotFound));
        assert!(out.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
        assert!(out.ends_with(b"\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_malformed_request_gets_400() {
        let dir = ScratchDir::new("conn-bad");
        let ctx = test_context(&dir);

        let (result, out) = exchange(&ctx, b"GARBAGE\r\n\r\n").await;
        assert_eq!(result.unwrap(), Some(Status::BadRequest));
        assert!(out.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_non_get_gets_405() {
        let dir = ScratchDir::new("conn-post");
        dir.write("index.html", b"x");
        let ctx = test_context(&dir);

        let (result, out) = exchange(&ctx, b"POST /index.html HTTP/1.1\r\n\r\n").await;
        assert_eq!(result.unwrap(), Some(Status::MethodNotAllowed));
        assert!(out.starts_with(b"HTTP/1.1 405 Method Not Allowed\r\n"));
    }

    #[tokio::test]
    async fn test_empty_connection() {
        let dir = ScratchDir::new("conn-empty");
        let ctx = test_context(&dir);

        let (result, out) = exchange(&ctx, b"").await;
        assert_eq!(result.unwrap(), None);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let dir = ScratchDir::new("conn-timeout");
        let mut ctx = test_context(&dir);
        ctx.read_timeout = Duration::from_millis(50);

        // Client never sends the blank line and never closes
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(b"GET /index.html HTTP/1.1\r\n")
            .await
            .unwrap();

        let result = handle_connection(&mut server, peer(), &ctx).await;
        assert!(matches!(result, Err(ServeError::ReadTimeout)));
    }

    #[tokio::test]
    async fn test_read_stops_at_terminator() {
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(b"GET / HTTP/1.1\r\n\r\nleftover")
            .await
            .unwrap();
        // Client stays open: reading must not wait for EOF
        let head = read_request_head(&mut server, 8192).await.unwrap();
        assert!(head.starts_with(b"GET / HTTP/1.1\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_read_respects_limit() {
        let (mut client, mut server) = duplex(64 * 1024);
        client.write_all(&[b'a'; 5000]).await.unwrap();
        let head = read_request_head(&mut server, 100).await.unwrap();
        assert_eq!(head.len(), 100);
    }

    #[test]
    fn test_terminator_detection() {
        assert!(contains_terminator(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(contains_terminator(b"GET / HTTP/1.0\n\n"));
        assert!(!contains_terminator(b"GET / HTTP/1.1\r\n"));
    }
}
