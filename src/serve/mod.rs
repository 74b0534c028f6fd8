//! HTTP serving layer.
//!
//! Startup opens the store (self-healing the transaction table if
//! needed), loads reference data, and builds the parcel index when the
//! cadastre export is present. Aggregate computations run on blocking
//! threads; shared state is immutable apart from the cache and the
//! resolver's commune statistics.

pub mod cache;
pub mod handlers;

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use crate::config::Settings;
use crate::pipeline::stats::Aggregator;
use crate::refdata::RefTables;
use crate::store::Store;
use crate::tile::index::ParcelIndex;
use crate::tile::TileResolver;
use crate::types::{AreaLevel, StatsTable};
use cache::AggregateCache;

pub struct AppState {
    pub settings: Settings,
    pub refs: RefTables,
    pub store: Store,
    pub cache: AggregateCache,
    /// Absent when no cadastre export exists; tile requests then 404.
    tiles: Option<RwLock<TileResolver>>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let store = Store::open(&settings)?;
        let refs = RefTables::load(&settings)?;

        let cadastre = settings.cadastre_path();
        let tiles = if cadastre.exists() {
            let index = ParcelIndex::from_parquet(&cadastre)?;
            // Pre-computed commune statistics seed the tile join; without
            // them parcels render zero-filled until a refresh.
            let commune_stats = match store.load_stats() {
                Ok(set) => set.commune,
                Err(err) => {
                    log::warn!("[serve] no usable statistics file ({err:#}); tiles start zero-filled");
                    StatsTable::default()
                }
            };
            Some(RwLock::new(TileResolver::new(&settings, index, commune_stats)?))
        } else {
            log::warn!(
                "[serve] cadastre export missing at {}; parcel tiles disabled",
                cadastre.display()
            );
            None
        };

        let cache = AggregateCache::new(settings.cache_ttl);
        Ok(Self { settings, refs, store, cache, tiles })
    }

    /// Statistics for one level, through the cache.
    pub fn stats_for(&self, level: AreaLevel) -> Result<Value> {
        self.cache.get_or_compute(level.as_str(), || {
            let aggregator = Aggregator::new(&self.settings, &self.refs);
            let table = aggregator.level_stats(self.store.scan_transactions()?, level)?;
            serde_json::to_value(&table).context("[serve] Failed to serialize statistics")
        })
    }

    /// Drop the cached entry for a level and recompute it. A commune
    /// refresh also swaps the tile resolver's join table.
    pub fn refresh(&self, level: AreaLevel) -> Result<Value> {
        self.cache.invalidate(level.as_str());
        let value = self.stats_for(level)?;
        if level == AreaLevel::Commune {
            if let Some(tiles) = &self.tiles {
                let table: StatsTable = serde_json::from_value(value.clone())
                    .context("[serve] Failed to decode refreshed commune statistics")?;
                tiles.write().unwrap_or_else(PoisonError::into_inner).set_commune_stats(table);
            }
        }
        Ok(value)
    }

    /// Resolve one parcel tile, if tiles are enabled.
    pub fn resolve_tile(&self, z: u8, x: u64, y: u64) -> Option<Result<Vec<u8>>> {
        let tiles = self.tiles.as_ref()?;
        Some(tiles.read().unwrap_or_else(PoisonError::into_inner).resolve(z, x, y))
    }

    pub fn tiles_enabled(&self) -> bool {
        self.tiles.is_some()
    }

    pub fn parcel_count(&self) -> Option<usize> {
        let tiles = self.tiles.as_ref()?;
        Some(tiles.read().unwrap_or_else(PoisonError::into_inner).parcel_count())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/stats/{level}", get(handlers::get_stats))
        .route("/api/stats/{level}/refresh", post(handlers::refresh_stats))
        .route("/api/tiles/{z}/{x}/{y}", get(handlers::get_tile))
        .route("/api/top10", get(handlers::top10))
        .with_state(state)
}

pub async fn run(addr: &str, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("[serve] Failed to bind {addr}"))?;
    log::info!("[serve] listening on {addr}");
    axum::serve(listener, router(state))
        .await
        .context("[serve] Server terminated abnormally")
}
