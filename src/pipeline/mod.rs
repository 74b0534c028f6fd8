//! Offline batch pipeline: deduplication of the raw transaction feed,
//! then hierarchical statistics aggregation. Steps run sequentially and
//! each fully materializes its output before the next one reads it.

pub mod dedup;
pub mod rollup;
pub mod stats;
