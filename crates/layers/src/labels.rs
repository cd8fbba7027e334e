use std::collections::{BTreeMap, HashSet};

use foundation::math::{GeoPoint, Vec2};
use scene::element::{Shape, VisualState};
use scene::reconcile::{Binding, ReconcileTiming};
use scene::style::Style;
use serde_json::Value;

use crate::context::{OverlayOutcome, RenderContext};
use crate::layer::Layer;

pub const LABEL_CLASS: &str = "datamaps-label";
pub const LEADER_CLASS: &str = "datamaps-label-leader";

/// Regions too small to hold their own label; their labels are stacked
/// off the coast and joined to the region by a leader line.
const STACKED: &[&str] = &["VT", "NH", "MA", "RI", "CT", "NJ", "DE", "MD", "DC"];
const STACK_ORIGIN: GeoPoint = GeoPoint {
    lon_deg: -67.707617,
    lat_deg: 42.722131,
};

const DEFAULT_FONT_SIZE: f64 = 10.0;
const STACK_FONT_SIZE: f64 = 12.0;
const STACK_GAP_PX: f64 = 2.0;
const GRID_CELL_PX: f64 = 16.0;
const GRID_PADDING_PX: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelsConfig {
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub label_color: Option<String>,
    pub line_width: Option<f64>,
    pub custom_label_text: BTreeMap<String, String>,
    /// Drops labels that would overlap an already placed one.
    pub avoid_overlap: bool,
}

impl LabelsConfig {
    fn color(&self) -> String {
        self.label_color.clone().unwrap_or_else(|| "#000".to_string())
    }

    fn text_style(&self) -> Style {
        Style {
            fill: Some(self.color()),
            font_size: Some(self.font_size.unwrap_or(DEFAULT_FONT_SIZE)),
            font_family: Some(self.font_family.clone().unwrap_or_else(|| "Verdana".to_string())),
            ..Style::default()
        }
    }

    fn leader_style(&self) -> Style {
        Style {
            stroke: Some(self.color()),
            stroke_width: Some(self.line_width.unwrap_or(1.0)),
            ..Style::default()
        }
    }

    pub fn text_for<'a>(&'a self, id: &'a str) -> &'a str {
        self.custom_label_text
            .get(id)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(id)
    }
}

/// Hand-tuned `(x, y)` offsets from the centroid.
fn label_offset(id: &str) -> (f64, f64) {
    let x = match id {
        "FL" | "KY" | "MI" => -2.5,
        "NY" => -1.0,
        "LA" => 13.0,
        _ => 7.5,
    };
    let y = if id == "MI" { 18.0 } else { 5.0 };
    (x, y)
}

fn estimate_text_size(text: &str, font_size: f64) -> [f64; 2] {
    let count = text.chars().count().max(1) as f64;
    [font_size * 0.6 * count, font_size]
}

fn try_place_label(occupied: &mut HashSet<u64>, anchor: Vec2, size: [f64; 2]) -> bool {
    // Text is anchored at its baseline start.
    let min_x = ((anchor.x - GRID_PADDING_PX) / GRID_CELL_PX).floor() as i32;
    let max_x = ((anchor.x + size[0] + GRID_PADDING_PX) / GRID_CELL_PX).floor() as i32;
    let min_y = ((anchor.y - size[1] - GRID_PADDING_PX) / GRID_CELL_PX).floor() as i32;
    let max_y = ((anchor.y + GRID_PADDING_PX) / GRID_CELL_PX).floor() as i32;

    for cy in min_y..=max_y {
        for cx in min_x..=max_x {
            if occupied.contains(&cell_key(cx, cy)) {
                return false;
            }
        }
    }

    for cy in min_y..=max_y {
        for cx in min_x..=max_x {
            occupied.insert(cell_key(cx, cy));
        }
    }

    true
}

fn cell_key(cx: i32, cy: i32) -> u64 {
    ((cx as u64) << 32) ^ (cy as u32 as u64)
}

/// Places one text label per rendered region, plus leader lines for the
/// stacked small regions.
pub fn render(ctx: &RenderContext<'_>, layer: &mut Layer, config: &LabelsConfig) -> OverlayOutcome {
    let stack_origin = ctx.projection.project(STACK_ORIGIN);
    let stack_step = STACK_GAP_PX + config.font_size.unwrap_or(STACK_FONT_SIZE);
    let font_size = config.font_size.unwrap_or(DEFAULT_FONT_SIZE);
    let mut occupied = HashSet::new();
    let mut omitted = Vec::new();
    let mut bindings = Vec::new();

    for region in ctx.regions.iter() {
        let id = region.id.as_str();
        let Some(center) = ctx.regions.centroid(id) else {
            continue;
        };
        let text = config.text_for(id);
        let stacked = STACKED
            .iter()
            .position(|s| *s == id)
            .zip(stack_origin)
            .map(|(idx, origin)| Vec2::new(origin.x, origin.y + idx as f64 * stack_step));
        let position = stacked.unwrap_or_else(|| {
            let (dx, dy) = label_offset(id);
            Vec2::new(center.x - dx, center.y + dy)
        });

        if config.avoid_overlap && !try_place_label(&mut occupied, position, estimate_text_size(text, font_size)) {
            tracing::debug!(region = %id, "label overlaps a placed label; skipping");
            omitted.push(id.to_string());
            continue;
        }

        if stacked.is_some() {
            bindings.push(Binding::new(
                format!("leader:{id}"),
                LEADER_CLASS,
                Value::String(id.to_string()),
                VisualState::new(
                    Shape::Line {
                        x1: position.x - 3.0,
                        y1: position.y - 5.0,
                        x2: center.x,
                        y2: center.y,
                    },
                    config.leader_style(),
                ),
            ));
        }
        bindings.push(Binding::new(
            format!("label:{id}"),
            LABEL_CLASS,
            Value::String(id.to_string()),
            VisualState::new(
                Shape::Text {
                    x: position.x,
                    y: position.y,
                    text: text.to_string(),
                },
                config.text_style(),
            ),
        ));
    }

    let report = layer.elements.reconcile(bindings, ctx.now, &ReconcileTiming::INSTANT);
    OverlayOutcome { report, omitted }
}

#[cfg(test)]
mod tests {
    use super::{LabelsConfig, cell_key, estimate_text_size, label_offset, render, try_place_label};
    use crate::context::{RegionIndex, RenderContext};
    use crate::layer::{Layer, LayerId};
    use crate::path::PathGenerator;
    use crate::symbology::Fills;
    use formats::region::{Region, RegionGeometry};
    use foundation::math::{GeoPoint, Projection, Vec2, Viewport};
    use foundation::time::Time;
    use scene::element::Shape;
    use serde_json::Map;
    use std::collections::{BTreeMap, HashSet};

    fn square(id: &str, lon: f64, lat: f64, size: f64) -> Region {
        Region {
            id: id.into(),
            properties: Map::new(),
            geometry: RegionGeometry::Polygon(vec![vec![
                GeoPoint::new(lon, lat),
                GeoPoint::new(lon + size, lat),
                GeoPoint::new(lon + size, lat + size),
                GeoPoint::new(lon, lat + size),
                GeoPoint::new(lon, lat),
            ]]),
        }
    }

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    struct Fixture {
        projection: Projection,
        regions: RegionIndex,
        fills: Fills,
        filters: BTreeMap<String, String>,
    }

    impl Fixture {
        fn usa(regions: Vec<Region>) -> Self {
            let projection = Projection::albers_usa(Viewport::new(960.0, 540.0));
            let regions = RegionIndex::build(regions, &PathGenerator::new(&projection));
            Self {
                projection,
                regions,
                fills: Fills::default(),
                filters: BTreeMap::new(),
            }
        }

        fn ctx(&self) -> RenderContext<'_> {
            RenderContext {
                projection: &self.projection,
                path: PathGenerator::new(&self.projection),
                regions: &self.regions,
                fills: &self.fills,
                filters: &self.filters,
                viewport: Viewport::new(960.0, 540.0),
                now: Time::ZERO,
            }
        }
    }

    fn text_at(layer: &Layer, key: &str) -> (f64, f64, String) {
        match &layer.elements.get(key).unwrap().state.shape {
            Shape::Text { x, y, text } => (*x, *y, text.clone()),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn offsets_follow_the_hand_tuned_table() {
        assert_eq!(label_offset("TX"), (7.5, 5.0));
        assert_eq!(label_offset("MI"), (-2.5, 18.0));
        assert_eq!(label_offset("NY"), (-1.0, 5.0));
        assert_eq!(label_offset("LA"), (13.0, 5.0));
    }

    #[test]
    fn labels_sit_near_centroids_and_small_states_stack() {
        let fx = Fixture::usa(vec![
            square("KS", -100.0, 37.0, 4.0),
            square("VT", -73.0, 43.0, 1.0),
            square("NH", -72.0, 43.0, 1.0),
        ]);
        let mut config = LabelsConfig::default();
        config.custom_label_text.insert("KS".into(), "Kansas".into());
        let mut layer = Layer::new(LayerId(1), "labels");
        let out = render(&fx.ctx(), &mut layer, &config);
        assert!(out.omitted.is_empty());
        assert_eq!(layer.elements.len(), 5);

        let center = fx.regions.centroid("KS").unwrap();
        let (x, y, text) = text_at(&layer, "label:KS");
        assert_eq!(text, "Kansas");
        assert_close(x, center.x - 7.5, 1e-9);
        assert_close(y, center.y + 5.0, 1e-9);

        let (vx, vy, _) = text_at(&layer, "label:VT");
        let (nx, ny, _) = text_at(&layer, "label:NH");
        assert_close(vx, nx, 1e-9);
        assert_close(ny - vy, 14.0, 1e-9);
        assert!(layer.elements.get("leader:VT").is_some());
        assert!(layer.elements.get("leader:KS").is_none());
        let style = &layer.elements.get("label:KS").unwrap().state.style;
        assert_eq!(style.font_size, Some(10.0));
        assert_eq!(style.font_family.as_deref(), Some("Verdana"));
    }

    #[test]
    fn overlap_avoidance_drops_colliding_labels() {
        let mut occupied = HashSet::new();
        let size = estimate_text_size("AB", 10.0);
        assert!(try_place_label(&mut occupied, Vec2::new(100.0, 100.0), size));
        assert!(!try_place_label(&mut occupied, Vec2::new(104.0, 100.0), size));
        assert!(try_place_label(&mut occupied, Vec2::new(300.0, 300.0), size));
        assert_ne!(cell_key(1, 2), cell_key(2, 1));
    }
}
