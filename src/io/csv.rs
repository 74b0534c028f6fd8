//! Raw DVF feed reading.

use std::fs::File;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use polars::prelude::*;

/// Reads a pipe-delimited DVF `.txt` file with a header row into a Polars
/// DataFrame. Every column is read as a string: the feed uses French
/// decimal commas and department codes with leading zeros (`01`, `2A`),
/// so numeric inference would mangle both.
pub(crate) fn read_pipe_delimited_txt(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv] Failed to open DVF file: {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|po| po.with_separator(b'|'))
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::csv] Failed to read DVF file from {:?}", path))
}

/// Reads and vertically concatenates every `.txt` file in the raw feed
/// directory (one file per year in the published dataset).
pub(crate) fn read_raw_feed(dir: &Path) -> Result<DataFrame> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("[io::csv] Failed to list raw feed dir: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();
    ensure!(!paths.is_empty(), "[io::csv] No .txt files in raw feed dir: {}", dir.display());

    let frames: Vec<LazyFrame> = paths
        .iter()
        .map(|p| read_pipe_delimited_txt(p).map(DataFrame::lazy))
        .collect::<Result<_>>()?;

    concat(frames, UnionArgs::default())
        .context("[io::csv] Failed to concatenate raw feed files")?
        .collect()
        .context("[io::csv] Failed to materialize raw feed")
}
