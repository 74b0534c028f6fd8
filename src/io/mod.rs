//! File format plumbing: DVF text feed, parquet tables, WKB geometries.

pub(crate) mod csv;
pub(crate) mod parquet;
pub(crate) mod wkb;
