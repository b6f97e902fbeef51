// Connection handling module
// Admits accepted TCP connections and serves each one in its own task

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::handler::{self, RequestContext};
use crate::logger;

/// Decrements the active connection counter when the worker ends
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept and process a connection, checking limits and logging.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `ctx` - Shared request handling context
/// * `conn_counter` - Active connection counter
/// * `max_connections` - Admission limit, `None` for unbounded
///
/// Returns `false` if the connection was rejected.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: &Arc<RequestContext>,
    conn_counter: &Arc<AtomicUsize>,
    max_connections: Option<u64>,
) -> bool {
    // Increment counter first, then check limit
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);
    let guard = ActiveGuard(Arc::clone(conn_counter));

    if let Some(max_conn) = max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(guard);
            drop(stream);
            return false;
        }
    }

    if ctx.access_log {
        logger::log_connection_accepted(&peer_addr, prev_count + 1);
    }

    handle_connection(stream, peer_addr, Arc::clone(ctx), guard);
    true
}

/// Serve a single connection in a spawned task.
///
/// Any failure ends only this connection; the stream is shut down and
/// dropped on every path.
fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<RequestContext>,
    guard: ActiveGuard,
) {
    tokio::spawn(async move {
        let _guard = guard;

        match handler::handle_connection(&mut stream, peer_addr, &ctx).await {
            Ok(_) => {
                // Best effort: the peer may already be gone
                let _ = stream.shutdown().await;
            }
            Err(err) => logger::log_connection_error(&peer_addr, &err),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_decrements() {
        let counter = Arc::new(AtomicUsize::new(1));
        {
            let _guard = ActiveGuard(Arc::clone(&counter));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
