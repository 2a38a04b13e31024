//! `Subvend` Daemon
//!
//! Opens the ledger, the inventory, and the catalog, and runs the
//! expiry-reminder scanner. The chat layer talks to the engine through
//! the library API.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use subvend_core::catalog::Catalog;
use subvend_core::config::EngineConfig;
use subvend_daemon::inventory::{Allocator, InventoryStore};
use subvend_daemon::jobs::ExpiryScanner;
use subvend_daemon::notify::LogNotifier;
use subvend_daemon::purchase::PurchaseEngine;
use subvend_daemon::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "subvend-daemon")]
#[command(version, about = "Subvend daemon - storefront inventory and ledger engine")]
struct Args {
    /// Engine settings file path
    #[arg(long, env = "SUBVEND_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger database file path
    #[arg(long, env = "SUBVEND_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Inventory file path
    #[arg(long, env = "SUBVEND_INVENTORY_PATH")]
    inventory_path: Option<PathBuf>,

    /// Catalog file path
    #[arg(long, env = "SUBVEND_CATALOG_PATH")]
    catalog_path: Option<PathBuf>,

    /// Log level filter for the daemon (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "SUBVEND_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "SUBVEND_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_filter = format!("subvend_daemon={}", args.log_level);
    subvend_core::tracing_init::init_tracing(&log_filter, args.log_json);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting subvend-daemon");

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load(&default_base_dir()?.join("settings.json"))?,
    };

    let db_path = resolve_path(args.db_path, config.storage.database_path.clone(), "ledger.db")?;
    let inventory_path =
        resolve_path(args.inventory_path, config.storage.inventory_path.clone(), "inventory.json")?;
    let catalog_path =
        resolve_path(args.catalog_path, config.storage.catalog_path.clone(), "catalog.json")?;

    let db = Database::open(&db_path).await?;
    let inventory = Arc::new(InventoryStore::open(&inventory_path)?);
    let catalog = Catalog::load(&catalog_path)?;
    let notifier = Arc::new(LogNotifier);

    let engine = PurchaseEngine::new(
        db.clone(),
        Allocator::new(Arc::clone(&inventory)),
        catalog.clone(),
        notifier.clone(),
    );

    // Startup availability report, one line per sellable tier.
    for duration in &catalog.durations {
        for option in catalog.options_for(duration.id) {
            let available = engine.availability(duration.id, option.traffic_gb).await;
            info!(
                duration_tier = duration.id,
                traffic_gb = option.traffic_gb,
                available,
                "Tier availability"
            );
        }
    }
    info!(tokens = inventory.total_tokens().await, "Engine ready");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scanner = ExpiryScanner::new(db, notifier, &config.expiry);
    let scanner_handle = tokio::spawn(scanner.run(shutdown_rx));

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = scanner_handle.await;

    info!("Daemon stopped");
    Ok(())
}

fn resolve_path(
    cli: Option<PathBuf>,
    config: Option<PathBuf>,
    file_name: &str,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli.or(config) {
        return Ok(path);
    }
    Ok(default_base_dir()?.join(file_name))
}

/// Default data directory: ~/.subvend/
fn default_base_dir() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".subvend"))
}
