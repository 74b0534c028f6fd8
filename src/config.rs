use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime settings for the pipeline and the serving side.
///
/// Everything here is plain data: paths under a single data directory plus
/// the filtering and capping thresholds. Defaults match the published
/// dataset conventions (DVF transaction feed, Admin Express boundaries,
/// Lambert-93 cadastre).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory for all inputs and outputs.
    pub data_dir: PathBuf,

    /// Price-per-m2 plausibility band applied before any aggregation.
    pub min_price_m2: f64,
    pub max_price_m2: f64,

    /// An area is published only with at least this many sales.
    pub min_sales: u32,
    /// Stricter threshold for the top-expensive-communes report.
    pub top_min_sales: u32,

    /// Tiles below this zoom return an empty body (parcel detail threshold).
    pub min_tile_zoom: u8,
    /// Cap on bbox-prefilter candidates per tile request.
    pub max_bbox_candidates: usize,
    /// Cap on exact-intersection survivors per tile.
    pub max_tile_features: usize,
    /// Margin added to the reprojected tile bbox, as a fraction of each
    /// dimension. Reprojection is not bbox-preserving, so the cheap
    /// pre-filter box must be inflated to avoid dropping edge geometries.
    pub bbox_margin: f64,

    /// Time-to-live for cached aggregate results.
    pub cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            min_price_m2: 100.0,
            max_price_m2: 50_000.0,
            min_sales: 5,
            top_min_sales: 100,
            min_tile_zoom: 17,
            max_bbox_candidates: 50_000,
            max_tile_features: 20_000,
            bbox_margin: 0.2,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl Settings {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::default() }
    }

    /// Directory holding the raw pipe-delimited DVF text files.
    pub fn raw_dir(&self) -> PathBuf { self.data_dir.join("raw") }

    /// Cleaned, deduplicated transaction table.
    pub fn transactions_path(&self) -> PathBuf { self.data_dir.join("transactions.parquet") }

    /// Externally produced cadastral parcels (Lambert-93 WKB geometries).
    pub fn cadastre_path(&self) -> PathBuf { self.data_dir.join("cadastre.parquet") }

    /// Five-level statistics set produced by the aggregator.
    pub fn stats_path(&self) -> PathBuf { self.data_dir.join("stats.json") }

    /// Top-expensive-communes report.
    pub fn top_path(&self) -> PathBuf { self.data_dir.join("top_expensive.json") }

    /// Admin Express COMMUNE shapefile (source of the commune→canton map).
    pub fn commune_shapefile(&self) -> PathBuf {
        self.data_dir.join("admin_express").join("COMMUNE.shp")
    }

    pub fn transactions_exist(&self) -> bool {
        Path::new(&self.transactions_path()).exists()
    }
}
