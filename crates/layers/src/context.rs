use std::collections::{BTreeMap, HashMap};

use formats::region::Region;
use foundation::math::{Projection, Vec2, Viewport};
use foundation::time::Time;
use scene::reconcile::ReconcileReport;
use serde_json::Value;

use crate::path::PathGenerator;
use crate::symbology::Fills;

/// Regions drawn in the current pass with their projected centroids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionIndex {
    regions: Vec<Region>,
    by_id: HashMap<String, usize>,
    centroids: Vec<Option<Vec2>>,
}

impl RegionIndex {
    pub fn build(regions: Vec<Region>, path: &PathGenerator<'_>) -> Self {
        let centroids = regions.iter().map(|r| path.centroid(r)).collect();
        let by_id = regions
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        Self {
            regions,
            by_id,
            centroids,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Region> {
        self.by_id.get(id).map(|&i| &self.regions[i])
    }

    /// Projected centroid of a rendered region.
    pub fn centroid(&self, id: &str) -> Option<Vec2> {
        self.by_id.get(id).and_then(|&i| self.centroids[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Everything an overlay needs from the map for one render pass. All
/// coordinates in a pass come from the same projection snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub projection: &'a Projection,
    pub path: PathGenerator<'a>,
    pub regions: &'a RegionIndex,
    pub fills: &'a Fills,
    pub filters: &'a BTreeMap<String, String>,
    pub viewport: Viewport,
    pub now: Time,
}

/// Overlay input rejected before anything is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayError {
    pub overlay: String,
    pub reason: String,
}

impl std::fmt::Display for OverlayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} overlay: {}", self.overlay, self.reason)
    }
}

impl std::error::Error for OverlayError {}

/// Requires array input, as every data-driven overlay does.
pub fn expect_array<'v>(overlay: &str, data: &'v Value) -> Result<&'v Vec<Value>, OverlayError> {
    data.as_array().ok_or_else(|| OverlayError {
        overlay: overlay.to_string(),
        reason: format!("{overlay} must be an array"),
    })
}

/// Result of one overlay render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayOutcome {
    pub report: ReconcileReport,
    /// Items dropped because a position could not be resolved.
    pub omitted: Vec<String>,
}

impl From<ReconcileReport> for OverlayOutcome {
    fn from(report: ReconcileReport) -> Self {
        Self {
            report,
            omitted: Vec::new(),
        }
    }
}

/// Reads `key` from the datum, else from the overlay default.
pub fn datum_f64(datum: &Value, key: &str, default: Option<f64>) -> Option<f64> {
    datum.get(key).and_then(|v| v.as_f64()).or(default)
}

pub fn datum_str<'v>(datum: &'v Value, key: &str) -> Option<&'v str> {
    datum.get(key).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::{RegionIndex, datum_f64, expect_array};
    use crate::path::PathGenerator;
    use formats::region::{Region, RegionGeometry};
    use foundation::math::{GeoPoint, Projection, ProjectionKind, Viewport};
    use serde_json::{Map, json};

    #[test]
    fn non_arrays_are_rejected() {
        let err = expect_array("bubbles", &json!({"a": 1})).unwrap_err();
        assert_eq!(err.to_string(), "bubbles overlay: bubbles must be an array");
        assert_eq!(expect_array("arc", &json!([1, 2])).unwrap().len(), 2);
    }

    #[test]
    fn index_caches_centroids() {
        let p = Projection::world(ProjectionKind::Equirectangular, Viewport::new(960.0, 540.0), [0.0; 3]);
        let path = PathGenerator::new(&p);
        let ring = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(10.0, 0.0),
            GeoPoint::new(10.0, 10.0),
            GeoPoint::new(0.0, 0.0),
        ];
        let regions = vec![
            Region {
                id: "T".into(),
                properties: Map::new(),
                geometry: RegionGeometry::Polygon(vec![ring]),
            },
            Region {
                id: "E".into(),
                properties: Map::new(),
                geometry: RegionGeometry::Empty,
            },
        ];
        let index = RegionIndex::build(regions, &path);
        assert_eq!(index.len(), 2);
        assert!(index.centroid("T").is_some());
        assert!(index.centroid("E").is_none());
        assert!(index.centroid("ZZZ").is_none());
        assert_eq!(datum_f64(&json!({"radius": 4}), "radius", Some(1.0)), Some(4.0));
        assert_eq!(datum_f64(&json!({}), "radius", Some(1.0)), Some(1.0));
    }
}
