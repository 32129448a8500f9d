//! Persistence layer.
//!
//! The live store is in memory (see [`store`]). Opportunity history is
//! saved to and reloaded from a JSON file so it survives restarts.

pub mod store;

pub use store::{OpportunityStore, StoreStats};

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, error, info};

use crate::types::OpportunityRecord;

/// Write history records to a JSON file.
///
/// The records go to a sibling `.tmp` file first, which is then renamed
/// over `path`, so a crash mid-write leaves the previous file intact.
pub fn save_history(records: &[OpportunityRecord], path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .context("Failed to serialise opportunity history")?;

    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, &json)
        .context(format!("Failed to write history to {tmp}"))?;
    std::fs::rename(&tmp, path)
        .context(format!("Failed to move history into place at {path}"))?;

    debug!(path, records = records.len(), "History saved");
    Ok(())
}

/// Load history records from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_history(path: &str) -> Result<Option<Vec<OpportunityRecord>>> {
    if !Path::new(path).exists() {
        info!(path, "No saved history found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read history from {path}"))?;

    let records: Vec<OpportunityRecord> = serde_json::from_str(&json)
        .context(format!("Failed to parse history from {path}"))?;

    info!(path, records = records.len(), "History loaded from disk");
    Ok(Some(records))
}

/// Seed `store` from the history file at `path`.
///
/// An unreadable or corrupt file is logged and skipped so the service
/// still starts, with empty history. Returns the number of records restored.
pub async fn restore_history_file(store: &OpportunityStore, path: &str) -> usize {
    match load_history(path) {
        Ok(Some(records)) => {
            let count = records.len();
            store.restore_history(records).await;
            count
        }
        Ok(None) => 0,
        Err(e) => {
            error!(path, error = %format!("{e:#}"), "Ignoring unreadable history file, starting empty");
            0
        }
    }
}

/// Delete the history file (for testing or reset).
pub fn delete_history(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete history file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
