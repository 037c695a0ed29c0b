//! Security perimeter service.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                SECURITY PERIMETER                │
//!   Client request     │  ┌──────────┐   ┌────────────┐   ┌────────────┐  │
//!   ───────────────────┼─▶│ request  │──▶│  security  │──▶│  handlers  │  │
//!                      │  │ id/trace │   │ middleware │   │ + admin API│  │
//!                      │  └──────────┘   └─────┬──────┘   └─────┬──────┘  │
//!                      │                       │                │         │
//!                      │          csrf/origin/session     webhook replay  │
//!                      │                       │          quarantine      │
//!                      │                       ▼                ▼         │
//!                      │                  ┌──────────────────────────┐    │
//!                      │                  │   audit (drain worker)   │    │
//!                      │                  └──────────────────────────┘    │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use security_perimeter::config::{load_or_default, watcher};
use security_perimeter::crypto::FieldCipher;
use security_perimeter::lifecycle::{retention, signals, startup};
use security_perimeter::observability::{logging, metrics};
use security_perimeter::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "security-perimeter", version, about = "Security perimeter service")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "PERIMETER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "security-perimeter starting");

    // Fail fast on a malformed field key even though no route encrypts.
    FieldCipher::from_config_key(&config.encryption.key)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        app_url = %config.app.url,
        production = config.app.production,
        admins = config.admin.user_ids.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let collaborators = startup::build_collaborators(&config, &shutdown)?;
    let server = HttpServer::new(config.clone(), collaborators)?;

    retention::spawn_retention_job(
        server.state().audit.clone(),
        config.audit.retention_days,
        Duration::from_secs(config.audit.cleanup_interval_secs.max(1)),
        shutdown.subscribe(),
    );

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match &args.config {
        Some(path) => {
            let (config_watcher, updates) = watcher::ConfigWatcher::new(path);
            let handle = config_watcher.run()?;
            tokio::spawn(watcher::apply_policy_updates(
                server.state().policy.clone(),
                updates,
                shutdown.subscribe(),
            ));
            Some(handle)
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
