use std::collections::BTreeMap;

use foundation::bounds::Aabb2;
use foundation::math::GeoPoint;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::region::{Region, RegionFilter, RegionGeometry, Ring};

/// Quantization transform of a TopoJSON topology.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

/// Undecoded geometry object. Arcs stay as raw JSON until decoding so a
/// malformed member only fails the collection that references it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopoGeometry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub arcs: Option<Value>,
    #[serde(default)]
    pub geometries: Option<Vec<TopoGeometry>>,
}

/// Shared-arc boundary encoding. Read-only once parsed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Topology {
    #[serde(rename = "type")]
    pub kind: String,
    pub objects: BTreeMap<String, TopoGeometry>,
    pub arcs: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopologyError {
    InvalidJson(String),
    NotATopology,
    MissingCollection(String),
    ArcOutOfRange { index: i64 },
    UnsupportedGeometry { index: usize, kind: String },
    InvalidGeometry { index: usize, reason: String },
}

impl std::fmt::Display for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyError::InvalidJson(e) => write!(f, "invalid topology JSON: {e}"),
            TopologyError::NotATopology => write!(f, "expected TopoJSON Topology"),
            TopologyError::MissingCollection(name) => {
                write!(f, "missing geography collection: {name}")
            }
            TopologyError::ArcOutOfRange { index } => write!(f, "arc index out of range: {index}"),
            TopologyError::UnsupportedGeometry { index, kind } => {
                write!(f, "unsupported geometry at index {index}: {kind}")
            }
            TopologyError::InvalidGeometry { index, reason } => {
                write!(f, "invalid geometry at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for TopologyError {}

impl Topology {
    pub fn from_json_str(payload: &str) -> Result<Self, TopologyError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| TopologyError::InvalidJson(e.to_string()))?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Self, TopologyError> {
        let is_topology = value
            .get("type")
            .and_then(|v| v.as_str())
            .is_some_and(|t| t == "Topology");
        if !is_topology {
            return Err(TopologyError::NotATopology);
        }
        serde_json::from_value(value).map_err(|e| TopologyError::InvalidJson(e.to_string()))
    }

    /// Names of the object collections, sorted.
    pub fn collections(&self) -> Vec<&str> {
        self.objects.keys().map(|k| k.as_str()).collect()
    }

    /// Decodes every arc into absolute lon/lat points.
    fn decoded_arcs(&self) -> Vec<Vec<GeoPoint>> {
        self.arcs
            .iter()
            .map(|arc| {
                let mut x = 0.0;
                let mut y = 0.0;
                arc.iter()
                    .filter(|p| p.len() >= 2)
                    .map(|p| match &self.transform {
                        Some(t) => {
                            x += p[0];
                            y += p[1];
                            GeoPoint::new(x * t.scale[0] + t.translate[0], y * t.scale[1] + t.translate[1])
                        }
                        None => GeoPoint::new(p[0], p[1]),
                    })
                    .collect()
            })
            .collect()
    }

    /// One region per geometry of `collection`, in source order, minus ids
    /// rejected by `filter`.
    pub fn regions(&self, collection: &str, filter: &RegionFilter) -> Result<Vec<Region>, TopologyError> {
        let object = self
            .objects
            .get(collection)
            .ok_or_else(|| TopologyError::MissingCollection(collection.to_string()))?;
        let members: Vec<&TopoGeometry> = match (&object.kind, &object.geometries) {
            (Some(kind), Some(geoms)) if kind == "GeometryCollection" => geoms.iter().collect(),
            _ => vec![object],
        };

        let arcs = self.decoded_arcs();
        let mut regions = Vec::with_capacity(members.len());
        for (index, geom) in members.into_iter().enumerate() {
            let id = match &geom.id {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => index.to_string(),
            };
            if filter.excludes(&id) {
                continue;
            }
            let geometry = decode_geometry(&arcs, geom, index)?;
            regions.push(Region {
                id,
                properties: geom.properties.clone().unwrap_or_default(),
                geometry,
            });
        }
        tracing::debug!(collection, regions = regions.len(), "decoded topology collection");
        Ok(regions)
    }

    /// Geographic bounds of the filtered collection.
    pub fn bbox(&self, collection: &str, filter: &RegionFilter) -> Result<Aabb2, TopologyError> {
        let mut b = Aabb2::empty();
        for region in self.regions(collection, filter)? {
            b.union(&region.bbox());
        }
        Ok(b)
    }
}

fn decode_geometry(
    arcs: &[Vec<GeoPoint>],
    geom: &TopoGeometry,
    index: usize,
) -> Result<RegionGeometry, TopologyError> {
    let kind = match geom.kind.as_deref() {
        None => return Ok(RegionGeometry::Empty),
        Some(k) => k,
    };
    let raw = geom.arcs.clone().unwrap_or(Value::Array(Vec::new()));
    let invalid = |e: serde_json::Error| TopologyError::InvalidGeometry {
        index,
        reason: e.to_string(),
    };
    match kind {
        "Polygon" => {
            let rings: Vec<Vec<i64>> = serde_json::from_value(raw).map_err(invalid)?;
            Ok(RegionGeometry::Polygon(decode_polygon(arcs, &rings)?))
        }
        "MultiPolygon" => {
            let polys: Vec<Vec<Vec<i64>>> = serde_json::from_value(raw).map_err(invalid)?;
            let decoded = polys
                .iter()
                .map(|rings| decode_polygon(arcs, rings))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RegionGeometry::MultiPolygon(decoded))
        }
        other => Err(TopologyError::UnsupportedGeometry {
            index,
            kind: other.to_string(),
        }),
    }
}

fn decode_polygon(arcs: &[Vec<GeoPoint>], rings: &[Vec<i64>]) -> Result<Vec<Ring>, TopologyError> {
    rings.iter().map(|r| decode_ring(arcs, r)).collect()
}

fn decode_ring(arcs: &[Vec<GeoPoint>], refs: &[i64]) -> Result<Ring, TopologyError> {
    let mut ring: Ring = Vec::new();
    for &i in refs {
        let (idx, reversed) = if i < 0 { ((!i) as usize, true) } else { (i as usize, false) };
        let arc = arcs.get(idx).ok_or(TopologyError::ArcOutOfRange { index: i })?;
        let skip = usize::from(!ring.is_empty());
        if reversed {
            ring.extend(arc.iter().rev().skip(skip).copied());
        } else {
            ring.extend(arc.iter().skip(skip).copied());
        }
    }
    if let Some(&first) = ring.first() {
        while ring.len() < 4 {
            ring.push(first);
        }
    }
    Ok(ring)
}
