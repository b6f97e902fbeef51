// Server loop module
// Accepts connections until shutdown is requested

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::handler::RequestContext;
use crate::logger;

/// Configuration for server loop behavior
pub struct ServerLoopConfig {
    pub ctx: Arc<RequestContext>,
    pub active_connections: Arc<AtomicUsize>,
    pub max_connections: Option<u64>,
    pub shutdown: Arc<Notify>,
}

/// Accept loop: one spawned worker per connection, no pooling
///
/// Accept errors are logged and the loop keeps going. Returns once
/// `shutdown` is notified; workers still running are left to finish.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(listener: TcpListener, config: ServerLoopConfig) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &config.ctx,
                            &config.active_connections,
                            config.max_connections,
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            _ = config.shutdown.notified() => {
                logger::log_shutdown(config.active_connections.load(Ordering::SeqCst));
                return;
            }
        }
    }
}
