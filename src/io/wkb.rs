//! Minimal WKB (Well-Known Binary) decoding for the cadastre geometry
//! column. Only Polygon and MultiPolygon are accepted; anything else in
//! the parcel table is a data defect.

use anyhow::{ensure, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use std::io::{Cursor, Read};

const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOLYGON: u32 = 6;
const WKB_LE: u8 = 1;

struct WkbCursor<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> WkbCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(bytes) }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.cursor.read_exact(&mut buf).context("[io::wkb] Truncated WKB (u8)")?;
        Ok(buf[0])
    }

    fn read_u32(&mut self, le: bool) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.cursor.read_exact(&mut buf).context("[io::wkb] Truncated WKB (u32)")?;
        Ok(if le { u32::from_le_bytes(buf) } else { u32::from_be_bytes(buf) })
    }

    fn read_f64(&mut self, le: bool) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.cursor.read_exact(&mut buf).context("[io::wkb] Truncated WKB (f64)")?;
        Ok(if le { f64::from_le_bytes(buf) } else { f64::from_be_bytes(buf) })
    }

    fn read_ring(&mut self, le: bool) -> Result<LineString<f64>> {
        let len = self.read_u32(le)?;
        let mut coords = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let x = self.read_f64(le)?;
            let y = self.read_f64(le)?;
            coords.push(Coord { x, y });
        }
        Ok(LineString::from(coords))
    }

    /// Reads one polygon body (ring count + rings); the header must
    /// already be consumed.
    fn read_polygon_body(&mut self, le: bool) -> Result<Polygon<f64>> {
        let num_rings = self.read_u32(le)?;
        ensure!(num_rings > 0, "[io::wkb] Polygon must have at least one ring");
        let exterior = self.read_ring(le)?;
        let mut interiors = Vec::with_capacity(num_rings as usize - 1);
        for _ in 1..num_rings {
            interiors.push(self.read_ring(le)?);
        }
        Ok(Polygon::new(exterior, interiors))
    }

    /// Reads a geometry header: byte order flag + geometry type.
    fn read_header(&mut self) -> Result<(bool, u32)> {
        let le = self.read_u8()? == WKB_LE;
        let geom_type = self.read_u32(le)?;
        // Mask off the EWKB SRID/Z flags some producers set.
        Ok((le, geom_type & 0xFF))
    }
}

/// Decode a WKB Polygon or MultiPolygon into a MultiPolygon.
pub(crate) fn decode_multipolygon(bytes: &[u8]) -> Result<MultiPolygon<f64>> {
    let mut wkb = WkbCursor::new(bytes);
    let (le, geom_type) = wkb.read_header()?;
    match geom_type {
        WKB_POLYGON => Ok(MultiPolygon(vec![wkb.read_polygon_body(le)?])),
        WKB_MULTIPOLYGON => {
            let count = wkb.read_u32(le)?;
            let mut polygons = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (inner_le, inner_type) = wkb.read_header()?;
                ensure!(
                    inner_type == WKB_POLYGON,
                    "[io::wkb] MultiPolygon member has type {}, expected Polygon",
                    inner_type
                );
                polygons.push(wkb.read_polygon_body(inner_le)?);
            }
            Ok(MultiPolygon(polygons))
        }
        other => anyhow::bail!("[io::wkb] Unsupported WKB geometry type: {}", other),
    }
}

/// Encode a polygon as little-endian WKB (test fixtures).
#[cfg(test)]
pub(crate) fn encode_polygon(polygon: &Polygon<f64>) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(WKB_LE);
    out.extend_from_slice(&WKB_POLYGON.to_le_bytes());
    let num_rings = 1 + polygon.interiors().len() as u32;
    out.extend_from_slice(&num_rings.to_le_bytes());
    let mut write_ring = |ring: &LineString<f64>| {
        out.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
        for coord in &ring.0 {
            out.extend_from_slice(&coord.x.to_le_bytes());
            out.extend_from_slice(&coord.y.to_le_bytes());
        }
    };
    write_ring(polygon.exterior());
    for interior in polygon.interiors() {
        write_ring(interior);
    }
    out
}
