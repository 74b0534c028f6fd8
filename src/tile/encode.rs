//! Mapbox Vector Tile encoding for parcel features.
//!
//! Geometries arrive in WGS84, get mapped through Web Mercator into
//! tile-local coordinates, are clipped to the buffered tile square with
//! Sutherland-Hodgman, then encoded into a single `parcels` layer.

use std::f64::consts::PI;

use anyhow::{Context, Result};
use geo::MultiPolygon;
use mvt::{GeomEncoder, GeomType, Tile};

const EXTENT: u32 = 4096;
/// Clip buffer beyond the tile edge, in tile units. Keeps geometries that
/// cross tile boundaries free of seams at render time.
const BUFFER: f64 = 256.0;
pub(crate) const LAYER_NAME: &str = "parcels";

/// One parcel ready for encoding, with its zero-filled statistics.
pub struct TileFeature {
    pub id: String,
    pub commune: String,
    pub price_m2: f64,
    pub n_sales: u32,
    pub contenance: Option<f64>,
    /// WGS84 geometry.
    pub shape: MultiPolygon<f64>,
}

fn lon_to_mercator_x(lon: f64) -> f64 {
    lon.to_radians()
}

fn lat_to_mercator_y(lat: f64) -> f64 {
    (PI / 4.0 + lat.to_radians() / 2.0).tan().ln()
}

/// Web Mercator bounds of a tile, in radians.
fn tile_bounds(z: u8, x: u64, y: u64) -> (f64, f64, f64, f64) {
    let n = 2.0_f64.powi(z as i32);
    let min_x = (x as f64 / n) * 2.0 * PI - PI;
    let max_x = ((x + 1) as f64 / n) * 2.0 * PI - PI;
    let min_y = PI - ((y + 1) as f64 / n) * 2.0 * PI;
    let max_y = PI - (y as f64 / n) * 2.0 * PI;
    (min_x, min_y, max_x, max_y)
}

/// Map a lon/lat to tile-local coordinates (may land outside [0, extent];
/// clipping happens afterwards). MVT Y grows downward, so latitude is
/// inverted.
fn world_to_tile_coords(lon: f64, lat: f64, z: u8, x: u64, y: u64, extent: f64) -> (f64, f64) {
    let (tile_min_x, tile_min_y, tile_max_x, tile_max_y) = tile_bounds(z, x, y);
    let merc_x = lon_to_mercator_x(lon);
    let merc_y = lat_to_mercator_y(lat);
    let tile_x = ((merc_x - tile_min_x) / (tile_max_x - tile_min_x)) * extent;
    let tile_y = extent - ((merc_y - tile_min_y) / (tile_max_y - tile_min_y)) * extent;
    (tile_x, tile_y)
}

/// Sutherland-Hodgman clip against one edge.
fn clip_against_edge<F, I>(polygon: &[(f64, f64)], inside: F, intersect: I) -> Vec<(f64, f64)>
where
    F: Fn(&(f64, f64)) -> bool,
    I: Fn(&(f64, f64), &(f64, f64)) -> (f64, f64),
{
    if polygon.is_empty() {
        return Vec::new();
    }
    let mut output = Vec::new();
    let n = polygon.len();
    for i in 0..n {
        let current = &polygon[i];
        let next = &polygon[(i + 1) % n];
        match (inside(current), inside(next)) {
            (true, true) => output.push(*next),
            (true, false) => output.push(intersect(current, next)),
            (false, true) => {
                output.push(intersect(current, next));
                output.push(*next);
            }
            (false, false) => {}
        }
    }
    output
}

/// Clip a ring to the buffered tile square, interpolating intersection
/// points instead of clamping coordinates.
fn clip_ring_to_tile(ring: &[(f64, f64)], extent: f64, buffer: f64) -> Vec<(f64, f64)> {
    if ring.is_empty() {
        return Vec::new();
    }
    let min_bound = -buffer;
    let max_bound = extent + buffer;

    let mut output = ring.to_vec();
    output = clip_against_edge(&output, |p| p.0 >= min_bound, |p1, p2| {
        let t = (min_bound - p1.0) / (p2.0 - p1.0);
        (min_bound, p1.1 + t * (p2.1 - p1.1))
    });
    output = clip_against_edge(&output, |p| p.0 <= max_bound, |p1, p2| {
        let t = (max_bound - p1.0) / (p2.0 - p1.0);
        (max_bound, p1.1 + t * (p2.1 - p1.1))
    });
    output = clip_against_edge(&output, |p| p.1 >= min_bound, |p1, p2| {
        let t = (min_bound - p1.1) / (p2.1 - p1.1);
        (p1.0 + t * (p2.0 - p1.0), min_bound)
    });
    output = clip_against_edge(&output, |p| p.1 <= max_bound, |p1, p2| {
        let t = (max_bound - p1.1) / (p2.1 - p1.1);
        (p1.0 + t * (p2.0 - p1.0), max_bound)
    });
    output
}

/// Drop consecutive duplicates, the closing duplicate and A-B-A
/// backtracks; a ring that shrinks below 3 points is discarded.
fn clean_ring(ring: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    if ring.is_empty() {
        return ring;
    }
    let mut cleaned = vec![ring[0]];
    for point in ring.into_iter().skip(1) {
        let prev = cleaned[cleaned.len() - 1];
        if (point.0 - prev.0).abs() > f64::EPSILON || (point.1 - prev.1).abs() > f64::EPSILON {
            cleaned.push(point);
        }
    }
    if cleaned.len() > 1 {
        let (first, last) = (cleaned[0], cleaned[cleaned.len() - 1]);
        if (last.0 - first.0).abs() < f64::EPSILON && (last.1 - first.1).abs() < f64::EPSILON {
            cleaned.pop();
        }
    }
    if cleaned.len() >= 3 {
        let mut deduped = vec![cleaned[0]];
        for point in cleaned.into_iter().skip(1) {
            if deduped.len() >= 2 {
                let before_prev = deduped[deduped.len() - 2];
                if (point.0 - before_prev.0).abs() < f64::EPSILON
                    && (point.1 - before_prev.1).abs() < f64::EPSILON
                {
                    continue;
                }
            }
            deduped.push(point);
        }
        cleaned = deduped;
    }
    if cleaned.len() < 3 {
        return Vec::new();
    }
    cleaned
}

/// Project, clip and round one ring into tile-local integer coordinates.
fn ring_to_tile(
    ring: &geo::LineString<f64>,
    z: u8,
    x: u64,
    y: u64,
) -> Vec<(f64, f64)> {
    let raw: Vec<(f64, f64)> = ring
        .coords()
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .map(|c| world_to_tile_coords(c.x, c.y, z, x, y, EXTENT as f64))
        .collect();
    let clipped = clip_ring_to_tile(&raw, EXTENT as f64, BUFFER);
    clean_ring(clipped.into_iter().map(|(px, py)| (px.round(), py.round())).collect())
}

/// Encode a set of parcel features into one MVT tile.
///
/// Features whose geometry collapses after clipping contribute nothing;
/// the caller decides what an entirely empty tile means.
pub fn encode_tile(features: &[TileFeature], z: u8, x: u64, y: u64) -> Result<Vec<u8>> {
    let mut tile = Tile::new(EXTENT);
    let mut layer = tile.create_layer(LAYER_NAME);

    for (idx, feature) in features.iter().enumerate() {
        let mut encoder = GeomEncoder::new(GeomType::Polygon);
        let mut any_ring = false;

        for polygon in &feature.shape.0 {
            let exterior = ring_to_tile(polygon.exterior(), z, x, y);
            if exterior.len() < 3 {
                continue;
            }
            for (px, py) in &exterior {
                encoder = encoder.point(*px, *py).context("[tile::encode] geometry encoding")?;
            }
            encoder = encoder.complete().context("[tile::encode] geometry encoding")?;
            any_ring = true;

            for interior in polygon.interiors() {
                let ring = ring_to_tile(interior, z, x, y);
                if ring.len() < 3 {
                    continue;
                }
                for (px, py) in &ring {
                    encoder =
                        encoder.point(*px, *py).context("[tile::encode] geometry encoding")?;
                }
                encoder = encoder.complete().context("[tile::encode] geometry encoding")?;
            }
        }
        if !any_ring {
            continue;
        }

        let geom = encoder.encode().context("[tile::encode] geometry encoding")?;
        let mut mvt_feature = layer.into_feature(geom);
        mvt_feature.set_id(idx as u64);
        mvt_feature.add_tag_string("id", &feature.id);
        mvt_feature.add_tag_string("commune", &feature.commune);
        mvt_feature.add_tag_double("price_m2", feature.price_m2);
        mvt_feature.add_tag_uint("n_sales", feature.n_sales as u64);
        if let Some(contenance) = feature.contenance {
            mvt_feature.add_tag_double("contenance", contenance);
        }
        layer = mvt_feature.into_layer();
    }

    tile.add_layer(layer).context("[tile::encode] failed to add layer")?;
    tile.to_bytes().context("[tile::encode] failed to serialize tile")
}
