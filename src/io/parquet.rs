//! Parquet reading and writing operations.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

/// Writes a Polars DataFrame to a Parquet file at `path`.
pub(crate) fn write_parquet(mut df: DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::parquet] Failed to create {}", path.display()))?;
    let writer: BufWriter<File> = BufWriter::new(file);
    ParquetWriter::new(writer)
        .finish(&mut df)
        .with_context(|| format!("[io::parquet] Failed to write Parquet to {}", path.display()))?;
    Ok(())
}

/// Reads a Parquet file fully into memory.
pub(crate) fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::parquet] Failed to open {}", path.display()))?;
    ParquetReader::new(file)
        .finish()
        .with_context(|| format!("[io::parquet] Failed to read Parquet from {}", path.display()))
}

/// Opens a fresh lazy frame over a Parquet file. Each call owns its read,
/// so concurrent callers never share reader state.
pub(crate) fn scan_parquet(path: &Path) -> Result<LazyFrame> {
    read_parquet(path).map(DataFrame::lazy)
}
