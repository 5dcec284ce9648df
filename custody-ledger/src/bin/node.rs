//! Custody ledger node binary
//!
//! Usage: `ledger-node [config.toml]`. Without a file, configuration comes
//! from `LEDGER_*` environment variables.

use anyhow::Context;
use custody_ledger::{reporting, Config, CustodyLedger, GenesisState, RecordingTransfers};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting custody ledger node");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    let _span = tracing::info_span!("node", service = %config.service_name).entered();

    let ledger = CustodyLedger::open(&config, Arc::new(RecordingTransfers::new()))
        .context("opening ledger")?;
    tracing::info!(backend = ?config.backend, data_dir = ?config.data_dir, "Ledger opened");

    if let Some(path) = &config.genesis_path {
        let mut tx = ledger.begin();
        if tx.scan_prefix(&[])?.is_empty() {
            let genesis = GenesisState::read_from_file(path)
                .with_context(|| format!("reading genesis {}", path.display()))?;
            let imported = reporting::import_genesis(&mut tx, ledger.ledgers(), &genesis)
                .context("importing genesis")?;
            tx.commit()?;
            tracing::info!(entries = imported, "Genesis applied");
        } else {
            tracing::info!("Store not empty, genesis skipped");
        }
    }

    let summary = reporting::summarize(&ledger.begin(), ledger.ledgers())?;
    tracing::info!(
        depositors = summary.depositors,
        total_deposits = %summary.total_deposits,
        last_swept_epoch = ?summary.last_swept_epoch,
        state_hash = %summary.state_hash,
        "Ledger state"
    );

    Ok(())
}
