use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::Notify;

mod config;
mod handler;
mod http;
mod logger;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = config::port_from_args(std::env::args())?;
    let cfg = config::Config::load_from(config::DEFAULT_CONFIG_FILE, port)?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sizing the worker pool from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;
    logger::log_server_start(&listener.local_addr()?, &cfg);

    let shutdown = Arc::new(Notify::new());
    server::signal::start_signal_handler(Arc::clone(&shutdown))?;

    server::start_server_loop(
        listener,
        server::ServerLoopConfig {
            ctx: Arc::new(handler::RequestContext::from_config(&cfg)),
            active_connections: Arc::new(AtomicUsize::new(0)),
            max_connections: cfg.performance.max_connections,
            shutdown,
        },
    )
    .await;
    Ok(())
}
