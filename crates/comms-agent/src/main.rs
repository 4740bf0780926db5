//! # comms-agent
//!
//! Push channel server binary: loads settings, wires the credential store,
//! broker and service together, and serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use comms_auth::MemoryAuthProvider;
use comms_server::{CommsServer, CommsService, LocalBroker, ServerConfig};
use comms_settings::CommsSettings;
use comms_settings::loader::{load_settings_from_path, settings_path};

/// How long in-flight work gets after ctrl-c.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Comms push channel server.
#[derive(Parser, Debug)]
#[command(name = "comms-agent", about = "Realtime push channel server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.comms/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut CommsSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let path = args.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);

    comms_core::logging::init_subscriber(&settings.logging.level);
    let metrics = comms_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = ServerConfig::from_settings(&settings);
    let provider = Arc::new(MemoryAuthProvider::from_settings(&settings.auth));
    let broker = Arc::new(LocalBroker::new());
    let service = CommsService::new(config.comms_config(), provider, broker);
    service
        .start()
        .await
        .context("Failed to start comms service")?;

    let server = CommsServer::new(config, Arc::clone(&service)).with_metrics(metrics);
    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to start server")?;
    server.shutdown().track(handle);
    tracing::info!(
        "comms agent listening on http://{addr}{}",
        server.config().comms_path()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received");

    service.stop();
    server
        .shutdown()
        .graceful_shutdown(Some(SHUTDOWN_TIMEOUT))
        .await;
    Ok(())
}
