pub mod clipboard;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod monitor;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod testing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use log::{info, warn};

use clipboard::SystemClipboard;
use config::MonitorConfig;
use http::HttpTransport;
use monitor::Monitor;
use uploader::Uploader;

pub fn run(config: MonitorConfig, verbose: u8) -> anyhow::Result<()> {
    init_logging(verbose);

    info!("Starting clipup v{}", env!("CARGO_PKG_VERSION"));

    let stop = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(stop.clone())?;

    // Opened lazily; a clipboard that is not ready yet is retried each tick.
    let clipboard = SystemClipboard::new();
    let transport = HttpTransport::new().context("Failed to build the HTTP client")?;
    let uploader = Uploader::new(transport, &config);

    let mut monitor = Monitor::new(clipboard, uploader, config);
    monitor.run(&stop);
    Ok(())
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // The fmt subscriber also installs the bridge for `log` records.
    if fmt()
        .with_env_filter(filter)
        .with_target(verbose > 1)
        .try_init()
        .is_err()
    {
        eprintln!("Logging was already initialised");
    }
}

/// Raises `stop` on Ctrl+C (or SIGTERM on unix). The monitor sees it on its next tick.
fn spawn_interrupt_listener(stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("Failed to start the signal runtime")?;

    thread::Builder::new()
        .name("interrupt-listener".to_string())
        .spawn(move || {
            runtime.block_on(wait_for_interrupt());
            info!("Interrupt received, stopping after the current cycle");
            stop.store(true, Ordering::SeqCst);
        })
        .context("Failed to spawn the interrupt listener")?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Could not listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
