//! On-disk artifact store.
//!
//! The cleaned transaction table is the contract between the pipeline and
//! everything downstream. Opening the store validates that contract; a
//! missing or drifted table is rebuilt from the raw feed exactly once, and
//! a second validation failure is fatal rather than silently retried.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use polars::prelude::*;

use crate::config::Settings;
use crate::io;
use crate::pipeline::dedup::{self, CLEAN_COLUMNS};
use crate::types::{StatsSet, TopCommune};

pub struct Store {
    settings: Settings,
    rows: usize,
}

impl Store {
    /// Open the store, self-healing the transaction table if needed.
    pub fn open(settings: &Settings) -> Result<Self> {
        let transactions = match load_transactions(settings) {
            Ok(df) => df,
            Err(err) => {
                log::warn!("[store] transaction table unusable ({err:#}); rebuilding from raw feed");
                rebuild_transactions(settings)?;
                load_transactions(settings)
                    .context("[store] Transaction table still invalid after rebuild")?
            }
        };
        log::info!("[store] opened transaction table ({} rows)", transactions.height());
        Ok(Self { settings: settings.clone(), rows: transactions.height() })
    }

    /// Fresh lazy scan over the cleaned transaction table. Each call opens
    /// its own read of the parquet file and drops it with the frame, so a
    /// pipeline re-run is picked up by the next computation without a
    /// restart.
    pub fn scan_transactions(&self) -> Result<LazyFrame> {
        io::parquet::scan_parquet(&self.settings.transactions_path())
    }

    /// Row count observed when the store was opened and validated.
    pub fn transaction_count(&self) -> usize {
        self.rows
    }

    pub fn write_stats(&self, set: &StatsSet) -> Result<()> {
        write_json(&self.settings.stats_path(), set)
    }

    pub fn load_stats(&self) -> Result<StatsSet> {
        read_json(&self.settings.stats_path())
    }

    pub fn write_top(&self, top: &[TopCommune]) -> Result<()> {
        write_json(&self.settings.top_path(), &top)
    }

    pub fn load_top(&self) -> Result<Vec<TopCommune>> {
        read_json(&self.settings.top_path())
    }
}

/// Read and validate the cleaned transaction table.
fn load_transactions(settings: &Settings) -> Result<DataFrame> {
    let path = settings.transactions_path();
    ensure!(path.exists(), "[store] Missing transaction table: {}", path.display());
    let df = io::parquet::read_parquet(&path)?;
    let names = df.get_column_names_str();
    for required in CLEAN_COLUMNS {
        ensure!(
            names.contains(&required),
            "[store] Transaction table at {} is missing column '{}'",
            path.display(),
            required
        );
    }
    Ok(df)
}

/// Rebuild the transaction table from the raw feed (the one-shot heal).
fn rebuild_transactions(settings: &Settings) -> Result<()> {
    let raw = io::csv::read_raw_feed(&settings.raw_dir())?;
    let clean = dedup::deduplicate(raw)?;
    std::fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("[store] Failed to create {}", settings.data_dir.display()))?;
    io::parquet::write_parquet(clean, &settings.transactions_path())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[store] Failed to create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("[store] Failed to write JSON to {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("[store] Failed to open {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("[store] Failed to parse JSON from {}", path.display()))
}
