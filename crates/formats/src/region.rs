use std::collections::BTreeSet;

use foundation::bounds::Aabb2;
use foundation::math::GeoPoint;
use serde_json::{Map, Value};

/// Closed ring: first point repeated at the end.
pub type Ring = Vec<GeoPoint>;

#[derive(Debug, Clone, PartialEq)]
pub enum RegionGeometry {
    Empty,
    /// Exterior ring followed by holes.
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

/// One decoded boundary shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: String,
    pub properties: Map<String, Value>,
    pub geometry: RegionGeometry,
}

impl Region {
    /// Display name from the `name` property, falling back to the id.
    pub fn name(&self) -> &str {
        self.properties
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.id)
    }

    /// Polygons as ring slices; a `Polygon` yields one entry.
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match &self.geometry {
            RegionGeometry::Empty => Vec::new(),
            RegionGeometry::Polygon(rings) => vec![rings.as_slice()],
            RegionGeometry::MultiPolygon(polys) => polys.iter().map(|p| p.as_slice()).collect(),
        }
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons().into_iter().flat_map(|p| p.iter())
    }

    pub fn ring_count(&self) -> usize {
        self.rings().count()
    }

    /// Lon/lat bounds of every ring.
    pub fn bbox(&self) -> Aabb2 {
        let mut b = Aabb2::empty();
        for ring in self.rings() {
            for p in ring {
                b.extend(p.lon_deg, p.lat_deg);
            }
        }
        b
    }

    /// Area-weighted planar centroid in lon/lat. Holes subtract; degenerate
    /// shapes fall back to the vertex mean.
    pub fn geo_centroid(&self) -> Option<GeoPoint> {
        let mut area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        let mut mean = (0.0, 0.0, 0usize);

        for polygon in self.polygons() {
            for (i, ring) in polygon.iter().enumerate() {
                let (a, x, y) = ring_moments(ring.iter().map(|p| (p.lon_deg, p.lat_deg)));
                let sign = if i == 0 { 1.0 } else { -1.0 };
                let a_abs = a.abs();
                if a_abs > 0.0 {
                    area += sign * a_abs;
                    cx += sign * a_abs * (x / a);
                    cy += sign * a_abs * (y / a);
                }
                for p in ring {
                    mean.0 += p.lon_deg;
                    mean.1 += p.lat_deg;
                    mean.2 += 1;
                }
            }
        }

        if area.abs() > 1e-12 {
            return Some(GeoPoint::new(cx / area, cy / area));
        }
        if mean.2 == 0 {
            return None;
        }
        let n = mean.2 as f64;
        Some(GeoPoint::new(mean.0 / n, mean.1 / n))
    }

    /// Even-odd containment in lon/lat over every ring, so holes and
    /// disjoint parts both work.
    pub fn contains(&self, p: GeoPoint) -> bool {
        let mut inside = false;
        for ring in self.rings() {
            for w in ring.windows(2) {
                let (a, b) = (w[0], w[1]);
                if (a.lat_deg > p.lat_deg) != (b.lat_deg > p.lat_deg) {
                    let t = (p.lat_deg - a.lat_deg) / (b.lat_deg - a.lat_deg);
                    if p.lon_deg < a.lon_deg + t * (b.lon_deg - a.lon_deg) {
                        inside = !inside;
                    }
                }
            }
        }
        inside
    }
}

/// Signed shoelace area of a closed ring and its first moments, such that
/// the ring centroid is `(mx / area, my / area)`.
pub fn ring_moments(points: impl IntoIterator<Item = (f64, f64)>) -> (f64, f64, f64) {
    let pts: Vec<(f64, f64)> = points.into_iter().collect();
    let mut a = 0.0;
    let mut mx = 0.0;
    let mut my = 0.0;
    for w in pts.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        let cross = x0 * y1 - x1 * y0;
        a += cross;
        mx += (x0 + x1) * cross;
        my += (y0 + y1) * cross;
    }
    let area = a * 0.5;
    (area, mx / 6.0, my / 6.0)
}

/// Exclusion predicate applied while decoding. Never mutates the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFilter {
    excluded: BTreeSet<String>,
}

impl RegionFilter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_flags(
        hide_antarctica: bool,
        hide_hawaii_and_alaska: bool,
        exclude: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut excluded: BTreeSet<String> = exclude.into_iter().collect();
        if hide_antarctica {
            excluded.insert("ATA".to_string());
        }
        if hide_hawaii_and_alaska {
            excluded.insert("HI".to_string());
            excluded.insert("AK".to_string());
        }
        Self { excluded }
    }

    pub fn excludes(&self, id: &str) -> bool {
        self.excluded.contains(id)
    }

    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}
