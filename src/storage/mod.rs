//! Persistence boundary.
//!
//! Sweep results leave the engine through the `PriceTableSink` trait.
//! The shipped sink keeps every item's latest mutation price table in a
//! single JSON file keyed by item+rarity; a database-backed sink can
//! replace it without touching the engine.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::types::{table_key, MutationPriceTable, Rarity};

/// All stored tables, keyed by `table_key(item, rarity)`.
pub type PriceTables = BTreeMap<String, MutationPriceTable>;

/// Destination for freshly swept price tables.
#[async_trait]
pub trait PriceTableSink: Send + Sync {
    /// Store (replace) the table for its item+rarity.
    async fn store(&self, table: &MutationPriceTable) -> Result<()>;
}

/// Save price tables to a JSON file.
pub async fn save_tables(tables: &PriceTables, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(tables).context("Failed to serialise price tables")?;

    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write price tables to {}", path.display()))?;

    debug!(path = %path.display(), tables = tables.len(), "Price tables saved");
    Ok(())
}

/// Load price tables from a JSON file.
/// Returns an empty set if the file doesn't exist.
pub async fn load_tables(path: &Path) -> Result<PriceTables> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No saved price tables found, starting empty");
            return Ok(PriceTables::new());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read price tables from {}", path.display()))
        }
    };

    let tables: PriceTables = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse price tables from {}", path.display()))?;

    info!(path = %path.display(), tables = tables.len(), "Price tables loaded from disk");
    Ok(tables)
}

/// JSON-file-backed sink. Writes are serialised through a mutex so
/// concurrent item sweeps cannot interleave read-modify-write cycles.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest stored table for an item+rarity, if any.
    pub async fn get(&self, item: &str, rarity: Rarity) -> Result<Option<MutationPriceTable>> {
        let _guard = self.lock.lock().await;
        Ok(load_tables(&self.path).await?.remove(&table_key(item, rarity)))
    }

    /// Every stored table.
    pub async fn all(&self) -> Result<PriceTables> {
        let _guard = self.lock.lock().await;
        load_tables(&self.path).await
    }
}

#[async_trait]
impl PriceTableSink for JsonFileStore {
    async fn store(&self, table: &MutationPriceTable) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut tables = load_tables(&self.path).await?;
        tables.insert(table.key(), table.clone());
        save_tables(&tables, &self.path).await?;
        info!(item = %table.item, rarity = %table.rarity, prices = table.prices.len(), "Price table stored");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
