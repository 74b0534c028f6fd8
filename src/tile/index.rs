//! In-memory spatial index over the cadastral parcel table.
//!
//! The parcel parquet carries precomputed Lambert-93 bounds alongside the
//! WKB geometry, so the R-tree is built straight from the bound columns
//! and geometries are decoded once at load. The index is immutable after
//! startup and shared read-only across requests.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use geo::{Coord, MultiPolygon, Rect};
use polars::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

use crate::io;

#[derive(Debug, Clone)]
pub struct Parcel {
    pub id: String,
    pub commune: String,
    /// Registered parcel area in square meters, when present.
    pub contenance: Option<f64>,
    pub shape: MultiPolygon<f64>,
}

#[derive(Debug, Clone)]
struct BoundingBox {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

pub struct ParcelIndex {
    parcels: Vec<Parcel>,
    rtree: RTree<BoundingBox>,
}

impl ParcelIndex {
    /// Build an index from parcels and their Lambert-93 bounds.
    pub fn new(parcels: Vec<Parcel>, bounds: Vec<Rect<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                bounds
                    .into_iter()
                    .enumerate()
                    .map(|(idx, bbox)| BoundingBox { idx, bbox })
                    .collect(),
            ),
            parcels,
        }
    }

    /// Load the parcel table produced by the external cadastre export.
    pub fn from_parquet(path: &Path) -> Result<Self> {
        let df = io::parquet::read_parquet(path)?;
        for required in ["id", "commune", "contenance", "xmin", "ymin", "xmax", "ymax", "geometry"]
        {
            ensure!(
                df.get_column_names_str().contains(&required),
                "[tile::index] Parcel table at {} is missing column '{}'",
                path.display(),
                required
            );
        }

        let ids = df.column("id")?.str()?.clone();
        let communes = df.column("commune")?.str()?.clone();
        let contenances = df.column("contenance")?.cast(&DataType::Float64)?;
        let contenances = contenances.f64()?;
        let xmins = df.column("xmin")?.f64()?.clone();
        let ymins = df.column("ymin")?.f64()?.clone();
        let xmaxs = df.column("xmax")?.f64()?.clone();
        let ymaxs = df.column("ymax")?.f64()?.clone();
        let geometries = df.column("geometry")?.binary()?.clone();

        let mut parcels = Vec::with_capacity(df.height());
        let mut bounds = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let (Some(id), Some(commune), Some(wkb)) =
                (ids.get(row), communes.get(row), geometries.get(row))
            else {
                continue;
            };
            let (Some(xmin), Some(ymin), Some(xmax), Some(ymax)) =
                (xmins.get(row), ymins.get(row), xmaxs.get(row), ymaxs.get(row))
            else {
                continue;
            };
            let shape = io::wkb::decode_multipolygon(wkb)
                .with_context(|| format!("[tile::index] Bad geometry for parcel {id}"))?;
            parcels.push(Parcel {
                id: id.to_string(),
                commune: commune.to_string(),
                contenance: contenances.get(row),
                shape,
            });
            bounds.push(Rect::new(Coord { x: xmin, y: ymin }, Coord { x: xmax, y: ymax }));
        }
        log::info!("[tile::index] loaded {} parcels from {}", parcels.len(), path.display());
        Ok(Self::new(parcels, bounds))
    }

    /// Parcels whose bounds intersect `envelope`, capped at `cap` entries.
    /// The cap keeps degenerate requests from scanning the whole table;
    /// truncation is logged because it means a visibly incomplete tile.
    pub fn candidates(&self, envelope: &Rect<f64>, cap: usize) -> Vec<usize> {
        let search = AABB::from_corners(envelope.min().into(), envelope.max().into());
        let mut out = Vec::new();
        for item in self.rtree.locate_in_envelope_intersecting(&search) {
            if out.len() >= cap {
                log::warn!("[tile::index] bbox candidate cap ({cap}) reached; tile will be incomplete");
                break;
            }
            out.push(item.idx);
        }
        out
    }

    pub fn parcel(&self, idx: usize) -> &Parcel {
        &self.parcels[idx]
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }
}
