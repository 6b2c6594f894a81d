use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::error::LedgerError;
use crate::models::{Config, OutputFormat};
use crate::services::{ProgressLedger, create_backend};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let (vector_store_connected, vector_store_points) =
        match create_backend(&config.vector_store, u64::from(config.embedding.dimension)) {
            Ok(store) => {
                let connected = store.health_check().await.unwrap_or(false);
                let points = if connected {
                    store
                        .get_collection_info()
                        .await
                        .ok()
                        .flatten()
                        .map_or(0, |info| info.points_count)
                } else {
                    0
                };
                (connected, points)
            }
            Err(_) => (false, 0),
        };

    let ledger_path = config.ledger_path();
    let (ledger_completed, ledger_failed, build_in_progress) = match ledger_path {
        Some(ref path) if path.exists() => match ProgressLedger::open(path) {
            Ok(ledger) => (
                Some(ledger.completed_count() as u64),
                ledger.failed_count().ok().map(|c| c as u64),
                false,
            ),
            Err(LedgerError::Locked(_)) => (None, None, true),
            Err(_) => (None, None, false),
        },
        _ => (None, None, false),
    };

    let status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        embedding_model: config.embedding.model.clone(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        vector_store_points,
        collection: config.vector_store.collection.clone(),
        ledger_path: ledger_path.map(|p| p.display().to_string()),
        ledger_completed,
        ledger_failed,
        build_in_progress,
    };

    print!("{}", formatter.format_status(&status));

    if !vector_store_connected {
        eprintln!();
        eprintln!("Warning: Qdrant not reachable. Start with: docker-compose up -d qdrant");
    }

    Ok(())
}
