use clap::Parser;
use std::sync::Arc;

mod cli;
mod config;
mod error;
mod handler;
mod http;
mod logger;
mod metrics;
mod monitor;
mod routing;
mod server;

use monitor::{LoadMonitor, LoadSource};
use server::{Server, Shutdown};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::Args::parse();
    let cfg = config::Config::load(&args)?;
    logger::init(&cfg)?;

    // Worker pool size comes from the second positional argument or the config
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.server.workers.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let state = Arc::new(config::AppState::new(&cfg));
    let shutdown = Arc::new(Shutdown::new());

    let server = Server::new(Arc::clone(&state), Arc::clone(&shutdown))?;
    let listener = server.bind(addr)?;
    server::start_signal_handler(Arc::clone(&shutdown))?;

    let bound = server.endpoint().local_addr().unwrap_or(addr);
    logger::log_server_start(&bound, &cfg);

    let monitor = cfg.monitor.enabled.then(|| {
        let source: Arc<dyn LoadSource> = Arc::clone(server.endpoint()) as Arc<dyn LoadSource>;
        LoadMonitor::new(Arc::downgrade(&source), cfg.monitor_interval(), Arc::clone(&shutdown)).start()
    });

    server.serve(listener).await;

    if let Some(handle) = monitor {
        if let Err(e) = handle.await {
            logger::log_error(&format!("Load monitor task failed: {e}"));
        }
    }

    logger::log_shutdown(state.metrics.len());
    Ok(())
}
