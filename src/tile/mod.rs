//! Parcel tile resolution.
//!
//! A tile request turns into: zoom gate, reprojected bbox pre-filter over
//! the R-tree, exact intersection against the projected tile footprint,
//! a zero-filled statistics join, then MVT encoding. Both filter stages
//! are capped so a single request cannot scan the whole cadastre.

pub mod bbox;
pub mod encode;
pub mod index;

use anyhow::{Context, Result};
use geo::{Intersects, MapCoords};

use crate::config::Settings;
use crate::types::StatsTable;
use bbox::Reprojector;
use encode::TileFeature;
use index::ParcelIndex;

pub struct TileResolver {
    settings: Settings,
    index: ParcelIndex,
    /// Commune-level statistics used for the zero-fill join.
    commune_stats: StatsTable,
    to_lambert93: Reprojector,
    to_wgs84: Reprojector,
}

impl TileResolver {
    pub fn new(settings: &Settings, index: ParcelIndex, commune_stats: StatsTable) -> Result<Self> {
        Ok(Self {
            settings: settings.clone(),
            index,
            commune_stats,
            to_lambert93: Reprojector::wgs84_to_lambert93()?,
            to_wgs84: Reprojector::lambert93_to_wgs84()?,
        })
    }

    pub fn parcel_count(&self) -> usize {
        self.index.len()
    }

    /// Swap in a fresh commune statistics table (after a refresh).
    pub fn set_commune_stats(&mut self, commune_stats: StatsTable) {
        self.commune_stats = commune_stats;
    }

    /// Resolve one tile request to encoded MVT bytes. Below the zoom gate
    /// and for tiles with no intersecting parcels the body is empty.
    pub fn resolve(&self, z: u8, x: u64, y: u64) -> Result<Vec<u8>> {
        if z < self.settings.min_tile_zoom {
            return Ok(Vec::new());
        }

        let footprint = bbox::tile_polygon_lambert93(z, x, y, &self.to_lambert93)?;
        let envelope = bbox::inflated_envelope(&footprint, self.settings.bbox_margin);
        let candidates = self.index.candidates(&envelope, self.settings.max_bbox_candidates);

        let mut survivors = Vec::new();
        for idx in candidates {
            if survivors.len() >= self.settings.max_tile_features {
                log::warn!(
                    "[tile] feature cap ({}) reached for tile {}/{}/{}",
                    self.settings.max_tile_features,
                    z,
                    x,
                    y
                );
                break;
            }
            if self.index.parcel(idx).shape.intersects(&footprint) {
                survivors.push(idx);
            }
        }
        if survivors.is_empty() {
            return Ok(Vec::new());
        }

        let mut features = Vec::with_capacity(survivors.len());
        for idx in survivors {
            let parcel = self.index.parcel(idx);
            let shape = parcel
                .shape
                .try_map_coords(|coord| self.to_wgs84.project(coord))
                .with_context(|| format!("[tile] Failed to reproject parcel {}", parcel.id))?;
            // Zero-fill: parcels keep rendering even when their commune
            // has no published statistics.
            let stats = self.commune_stats.get(&parcel.commune);
            features.push(TileFeature {
                id: parcel.id.clone(),
                commune: parcel.commune.clone(),
                price_m2: stats.and_then(|s| s.median_price_m2).unwrap_or(0.0),
                n_sales: stats.map(|s| s.n_sales).unwrap_or(0),
                contenance: parcel.contenance,
                shape,
            });
        }

        encode::encode_tile(&features, z, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AreaStats;
    use geo::{polygon, Coord, MultiPolygon, Rect};
    use index::Parcel;

    /// Builds an index holding one square parcel centered on the given
    /// WGS84 point, with geometry and bounds in Lambert-93.
    fn single_parcel_index(lon: f64, lat: f64, half_size_m: f64) -> ParcelIndex {
        let to_l93 = Reprojector::wgs84_to_lambert93().unwrap();
        let center = to_l93.project(Coord { x: lon, y: lat }).unwrap();
        let (x, y, h) = (center.x, center.y, half_size_m);
        let shape = MultiPolygon(vec![polygon![
            (x: x - h, y: y - h),
            (x: x + h, y: y - h),
            (x: x + h, y: y + h),
            (x: x - h, y: y + h),
            (x: x - h, y: y - h),
        ]]);
        let bounds = Rect::new(Coord { x: x - h, y: y - h }, Coord { x: x + h, y: y + h });
        let parcel = Parcel {
            id: "330630000A0001".into(),
            commune: "33063".into(),
            contenance: Some(4.0 * h * h),
            shape,
        };
        ParcelIndex::new(vec![parcel], vec![bounds])
    }

    fn stats_for(commune: &str, median: f64, n: u32) -> StatsTable {
        let mut table = StatsTable::default();
        table.insert(
            commune.into(),
            AreaStats { median_price_m2: Some(median), q25: None, q75: None, n_sales: n },
        );
        table
    }

    const LON: f64 = -0.5792;
    const LAT: f64 = 44.8378;

    #[test]
    fn below_zoom_gate_returns_empty_body() {
        let settings = Settings::default();
        let index = single_parcel_index(LON, LAT, 20.0);
        let resolver = TileResolver::new(&settings, index, StatsTable::default()).unwrap();
        let bytes = resolver.resolve(16, 0, 0).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn tile_over_parcel_produces_features() {
        let settings = Settings::default();
        let index = single_parcel_index(LON, LAT, 20.0);
        let resolver =
            TileResolver::new(&settings, index, stats_for("33063", 4_500.0, 12)).unwrap();
        let z = 18;
        let x = bbox::lon_to_tile_x(LON, z);
        let y = bbox::lat_to_tile_y(LAT, z);
        let bytes = resolver.resolve(z, x, y).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn tile_without_parcels_is_empty() {
        let settings = Settings::default();
        let index = single_parcel_index(LON, LAT, 20.0);
        let resolver = TileResolver::new(&settings, index, StatsTable::default()).unwrap();
        // A Paris tile while the only parcel sits in Bordeaux.
        let z = 18;
        let x = bbox::lon_to_tile_x(2.3522, z);
        let y = bbox::lat_to_tile_y(48.8566, z);
        let bytes = resolver.resolve(z, x, y).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn missing_commune_stats_still_render() {
        // Zero-fill: no statistics for the commune, the parcel encodes
        // anyway.
        let settings = Settings::default();
        let index = single_parcel_index(LON, LAT, 20.0);
        let resolver = TileResolver::new(&settings, index, StatsTable::default()).unwrap();
        let z = 18;
        let x = bbox::lon_to_tile_x(LON, z);
        let y = bbox::lat_to_tile_y(LAT, z);
        let bytes = resolver.resolve(z, x, y).unwrap();
        assert!(!bytes.is_empty());
    }
}
