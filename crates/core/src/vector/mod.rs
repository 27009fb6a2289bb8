//! Area-of-interest geometry
//!
//! Tasks carry their AOI as a GeoJSON `Polygon` geometry object. The JSON is
//! kept as written so the task store round-trips it untouched; conversion to
//! `geo_types` happens on demand.

use geo::BoundingRect;
use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Axis-aligned bounding box in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// `[west, south, east, north]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

/// GeoJSON polygon: `{"type": "Polygon", "coordinates": [[[x, y], ...], ...]}`.
///
/// The first ring is the exterior, the rest are holes. Positions may carry a
/// third (elevation) ordinate, which is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoiPolygon {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<Vec<Vec<f64>>>,
}

impl AoiPolygon {
    /// Build from rings of `[x, y]` positions.
    pub fn from_rings(rings: Vec<Vec<[f64; 2]>>) -> Result<Self> {
        let polygon = Self {
            kind: "Polygon".to_string(),
            coordinates: rings
                .into_iter()
                .map(|ring| ring.into_iter().map(|p| p.to_vec()).collect())
                .collect(),
        };
        polygon.validate()?;
        Ok(polygon)
    }

    /// Parse from a GeoJSON string and validate.
    pub fn from_geojson_str(s: &str) -> Result<Self> {
        let polygon: AoiPolygon = serde_json::from_str(s)
            .map_err(|e| Error::InvalidGeometry(format!("not a GeoJSON polygon: {e}")))?;
        polygon.validate()?;
        Ok(polygon)
    }

    /// Serialize back to compact GeoJSON.
    pub fn to_geojson_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Raw ring coordinates
    pub fn rings(&self) -> &[Vec<Vec<f64>>] {
        &self.coordinates
    }

    /// Check type tag, ring count, ring length and coordinate sanity.
    pub fn validate(&self) -> Result<()> {
        if self.kind != "Polygon" {
            return Err(Error::InvalidGeometry(format!(
                "expected geometry type Polygon, got {}",
                self.kind
            )));
        }
        if self.coordinates.is_empty() {
            return Err(Error::InvalidGeometry("polygon has no rings".into()));
        }
        for (i, ring) in self.coordinates.iter().enumerate() {
            if ring.len() < 3 {
                return Err(Error::InvalidGeometry(format!(
                    "ring {i} has {} position(s), need at least 3",
                    ring.len()
                )));
            }
            for pos in ring {
                if pos.len() < 2 || !pos[0].is_finite() || !pos[1].is_finite() {
                    return Err(Error::InvalidGeometry(format!(
                        "ring {i} has an invalid position {pos:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Convert to a `geo_types` polygon (rings are closed automatically).
    pub fn to_polygon(&self) -> Result<Polygon<f64>> {
        self.validate()?;
        let mut rings = self.coordinates.iter().map(|ring| {
            LineString::from(
                ring.iter()
                    .map(|p| Coord { x: p[0], y: p[1] })
                    .collect::<Vec<_>>(),
            )
        });
        // validate() guarantees at least one ring
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Ok(Polygon::new(exterior, rings.collect()))
    }

    /// Bounding box of the exterior ring.
    pub fn bbox(&self) -> Result<BBox> {
        let rect = self
            .to_polygon()?
            .bounding_rect()
            .ok_or_else(|| Error::InvalidGeometry("polygon has no extent".into()))?;
        Ok(BBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}
