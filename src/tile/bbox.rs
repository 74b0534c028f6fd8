//! Tile addressing and coordinate reprojection.
//!
//! Slippy-map tile coordinates resolve to WGS84 bounds, which are then
//! reprojected into Lambert-93 (the cadastre CRS) for spatial filtering.
//! Reprojection bends straight edges, so the tile boundary is densified
//! before projection and the pre-filter envelope is inflated by a margin.

use std::f64::consts::PI;

use anyhow::{anyhow, Context, Result};
use geo::{Coord, LineString, Polygon, Rect};
use proj4rs::{proj::Proj as Proj4, transform::transform};

pub(crate) const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";
pub(crate) const LAMBERT93_PROJ4: &str = "+proj=lcc +lat_0=46.5 +lon_0=3 +lat_1=49 +lat_2=44 \
     +x_0=700000 +y_0=6600000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs";

/// Samples per tile edge when projecting the tile boundary.
const EDGE_SAMPLES: usize = 8;

/// A one-way coordinate transform between two PROJ.4 CRS definitions.
pub(crate) struct Reprojector {
    from: Proj4,
    to: Proj4,
    /// Angular CRS ends exchange radians with proj4rs; projected ends
    /// exchange meters.
    from_angular: bool,
    to_angular: bool,
}

impl Reprojector {
    pub(crate) fn new(from: &str, to: &str) -> Result<Self> {
        let from_angular = from.contains("+proj=longlat");
        let to_angular = to.contains("+proj=longlat");
        let from = Proj4::from_proj_string(from)
            .with_context(|| anyhow!("[tile::bbox] failed to build source PROJ.4: {from}"))?;
        let to = Proj4::from_proj_string(to)
            .with_context(|| anyhow!("[tile::bbox] failed to build target PROJ.4: {to}"))?;
        Ok(Self { from, to, from_angular, to_angular })
    }

    pub(crate) fn wgs84_to_lambert93() -> Result<Self> {
        Self::new(WGS84_PROJ4, LAMBERT93_PROJ4)
    }

    pub(crate) fn lambert93_to_wgs84() -> Result<Self> {
        Self::new(LAMBERT93_PROJ4, WGS84_PROJ4)
    }

    /// Project one coordinate. Angular CRS ends are in degrees here;
    /// radians are proj4rs's concern, not the caller's.
    pub(crate) fn project(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.from_angular {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.from, &self.to, &mut point)
            .map_err(|e| anyhow!("[tile::bbox] CRS transform failed: {e}"))?;
        if self.to_angular {
            Ok(Coord { x: point.0.to_degrees(), y: point.1.to_degrees() })
        } else {
            Ok(Coord { x: point.0, y: point.1 })
        }
    }
}

/// WGS84 bounds of a slippy-map tile: (west, south, east, north) degrees.
pub(crate) fn tile_lonlat_bounds(z: u8, x: u64, y: u64) -> (f64, f64, f64, f64) {
    let n = 2.0_f64.powi(z as i32);
    let west = x as f64 / n * 360.0 - 180.0;
    let east = (x + 1) as f64 / n * 360.0 - 180.0;
    let north = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();
    let south = (PI * (1.0 - 2.0 * (y + 1) as f64 / n)).sinh().atan().to_degrees();
    (west, south, east, north)
}

/// Tile X containing a longitude at a zoom level.
#[cfg(test)]
pub(crate) fn lon_to_tile_x(lon: f64, zoom: u8) -> u64 {
    let n = 2.0_f64.powi(zoom as i32);
    ((lon + 180.0) / 360.0 * n).floor() as u64
}

/// Tile Y containing a latitude at a zoom level.
#[cfg(test)]
pub(crate) fn lat_to_tile_y(lat: f64, zoom: u8) -> u64 {
    let n = 2.0_f64.powi(zoom as i32);
    let lat_rad = lat.to_radians();
    ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor() as u64
}

/// The tile boundary as a densified ring in WGS84 degrees (closed).
fn tile_boundary_lonlat(z: u8, x: u64, y: u64) -> Vec<Coord<f64>> {
    let (west, south, east, north) = tile_lonlat_bounds(z, x, y);
    let mut ring = Vec::with_capacity(4 * EDGE_SAMPLES + 1);
    let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / EDGE_SAMPLES as f64;
        ring.push(Coord { x: lerp(west, east, t), y: south });
    }
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / EDGE_SAMPLES as f64;
        ring.push(Coord { x: east, y: lerp(south, north, t) });
    }
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / EDGE_SAMPLES as f64;
        ring.push(Coord { x: lerp(east, west, t), y: north });
    }
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / EDGE_SAMPLES as f64;
        ring.push(Coord { x: west, y: lerp(north, south, t) });
    }
    ring.push(ring[0]);
    ring
}

/// The tile footprint projected into Lambert-93, as an exact-test polygon.
pub(crate) fn tile_polygon_lambert93(
    z: u8,
    x: u64,
    y: u64,
    to_l93: &Reprojector,
) -> Result<Polygon<f64>> {
    let ring: Vec<Coord<f64>> = tile_boundary_lonlat(z, x, y)
        .into_iter()
        .map(|c| to_l93.project(c))
        .collect::<Result<_>>()?;
    Ok(Polygon::new(LineString::from(ring), Vec::new()))
}

/// Axis-aligned Lambert-93 envelope of a projected tile footprint,
/// inflated by `margin` (a fraction of each dimension) for the bbox
/// pre-filter.
pub(crate) fn inflated_envelope(footprint: &Polygon<f64>, margin: f64) -> Rect<f64> {
    let mut min = Coord { x: f64::INFINITY, y: f64::INFINITY };
    let mut max = Coord { x: f64::NEG_INFINITY, y: f64::NEG_INFINITY };
    for coord in footprint.exterior().coords() {
        min.x = min.x.min(coord.x);
        min.y = min.y.min(coord.y);
        max.x = max.x.max(coord.x);
        max.y = max.y.max(coord.y);
    }
    let dx = (max.x - min.x) * margin;
    let dy = (max.y - min.y) * margin;
    Rect::new(
        Coord { x: min.x - dx, y: min.y - dy },
        Coord { x: max.x + dx, y: max.y + dy },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_zero_tile_covers_the_world() {
        let (west, south, east, north) = tile_lonlat_bounds(0, 0, 0);
        assert_eq!(west, -180.0);
        assert_eq!(east, 180.0);
        assert!(north > 85.0 && north < 86.0);
        assert!((south + north).abs() < 1e-9);
    }

    #[test]
    fn tile_lookup_inverts_bounds() {
        // Bordeaux city center at z17.
        let (lon, lat) = (-0.5792, 44.8378);
        let x = lon_to_tile_x(lon, 17);
        let y = lat_to_tile_y(lat, 17);
        let (west, south, east, north) = tile_lonlat_bounds(17, x, y);
        assert!(west <= lon && lon < east);
        assert!(south <= lat && lat < north);
    }

    #[test]
    fn lambert93_round_trip_is_stable() {
        let to_l93 = Reprojector::wgs84_to_lambert93().unwrap();
        let to_wgs84 = Reprojector::lambert93_to_wgs84().unwrap();
        let paris = Coord { x: 2.3522, y: 48.8566 };
        let projected = to_l93.project(paris).unwrap();
        // Lambert-93 places Paris around (652km, 6862km).
        assert!((projected.x - 652_000.0).abs() < 5_000.0);
        assert!((projected.y - 6_862_000.0).abs() < 5_000.0);
        let back = to_wgs84.project(projected).unwrap();
        assert!((back.x - paris.x).abs() < 1e-6);
        assert!((back.y - paris.y).abs() < 1e-6);
    }

    #[test]
    fn envelope_inflation_grows_both_dimensions() {
        let to_l93 = Reprojector::wgs84_to_lambert93().unwrap();
        let x = lon_to_tile_x(2.3522, 17);
        let y = lat_to_tile_y(48.8566, 17);
        let footprint = tile_polygon_lambert93(17, x, y, &to_l93).unwrap();
        let tight = inflated_envelope(&footprint, 0.0);
        let inflated = inflated_envelope(&footprint, 0.2);
        assert!(inflated.width() > tight.width());
        assert!(inflated.height() > tight.height());
        assert!(inflated.min().x < tight.min().x);
        assert!(inflated.max().y > tight.max().y);
    }
}
