//! Residential property price statistics over the French open
//! transaction feed, plus cadastral parcel tiles for map rendering.
//!
//! Two entry points share this crate: the offline `pipeline` command
//! (deduplicate the raw feed, compute five-level price statistics) and
//! the `serve` command (statistics API, parcel vector tiles, TTL-cached
//! aggregates).

pub mod cli;
pub mod commands;
pub mod config;
pub mod io;
pub mod pipeline;
pub mod refdata;
pub mod serve;
pub mod store;
pub mod tile;
pub mod types;
