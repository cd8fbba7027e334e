use foundation::math::{GeoPoint, Vec2, format_fixed, great_circle_points};
use scene::element::{Shape, VisualState};
use scene::reconcile::{Binding, ExitEffect, ReconcileTiming};
use scene::style::Style;
use scene::transition::TransitionSpec;
use serde_json::Value;

use crate::context::{OverlayOutcome, RenderContext, datum_f64, datum_str};
use crate::layer::Layer;
use crate::popup::PopupTemplate;

pub const ARC_CLASS: &str = "datamaps-arc";

/// Control point offset, in pixels, at sharpness 1.
pub const ARC_BEND_PX: f64 = 90.0;

const ENTER_DELAY_MS: f64 = 100.0;
const EXIT_MS: f64 = 250.0;
const GREAT_ARC_STEP_DEG: f64 = 1.0;

/// Fixed endpoints for a few countries whose centroid is a poor anchor.
const ANCHORS: &[(&str, f64, f64)] = &[
    ("CAN", 56.624472, -114.665293),
    ("CHL", -33.448890, -70.669265),
    ("HRV", 45.815011, 15.981919),
    ("IDN", -6.208763, 106.845599),
    ("JPN", 35.689487, 139.691706),
    ("MYS", 3.139003, 101.686855),
    ("NOR", 59.913869, 10.752245),
    ("USA", 41.140276, -100.760145),
    ("VNM", 21.027764, 105.834160),
];

pub fn anchor(id: &str) -> Option<GeoPoint> {
    ANCHORS
        .iter()
        .find(|(code, _, _)| *code == id)
        .map(|&(_, lat, lng)| GeoPoint::from_lat_lng(lat, lng))
}

#[derive(Debug, Clone)]
pub struct ArcConfig {
    pub stroke_color: String,
    pub stroke_width: f64,
    pub arc_sharpness: f64,
    pub animation_speed_ms: f64,
    pub great_arc: bool,
    pub popup_on_hover: bool,
    pub popup_template: PopupTemplate,
}

impl Default for ArcConfig {
    fn default() -> Self {
        Self {
            stroke_color: "#DD1C77".to_string(),
            stroke_width: 1.0,
            arc_sharpness: 1.0,
            animation_speed_ms: 600.0,
            great_arc: false,
            popup_on_hover: false,
            popup_template: PopupTemplate::arc_default(),
        }
    }
}

impl ArcConfig {
    fn timing(&self) -> ReconcileTiming {
        ReconcileTiming {
            enter: TransitionSpec::from_ms(ENTER_DELAY_MS, self.animation_speed_ms),
            update: TransitionSpec::INSTANT,
            exit: TransitionSpec::from_ms(0.0, EXIT_MS),
            exit_effect: ExitEffect::FadeOut,
        }
    }
}

/// Lifts fields of a legacy nested `options` object onto the arc itself.
/// Fields already on the arc win.
pub fn flatten_options(datum: &Value) -> Value {
    let mut out = datum.clone();
    if let Value::Object(map) = &mut out
        && let Some(Value::Object(options)) = map.remove("options")
    {
        for (k, v) in options {
            map.entry(k).or_insert(v);
        }
    }
    out
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Endpoint {
    geo: Option<GeoPoint>,
    screen: Vec2,
}

fn resolve_endpoint(ctx: &RenderContext<'_>, value: &Value) -> Option<Endpoint> {
    match value {
        Value::String(id) => {
            if let Some(geo) = anchor(id) {
                let screen = ctx.projection.project(geo)?;
                return Some(Endpoint {
                    geo: Some(geo),
                    screen,
                });
            }
            let screen = ctx.regions.centroid(id)?;
            let geo = ctx
                .regions
                .get(id)
                .and_then(|r| r.geo_centroid())
                .or_else(|| ctx.projection.invert(screen));
            Some(Endpoint { geo, screen })
        }
        Value::Object(_) => {
            let lat = datum_f64(value, "latitude", None)?;
            let lng = datum_f64(value, "longitude", None)?;
            let geo = GeoPoint::from_lat_lng(lat, lng);
            Some(Endpoint {
                geo: Some(geo),
                screen: ctx.projection.project(geo)?,
            })
        }
        _ => None,
    }
}

/// Quadratic arc bowed to the chord's left by `ARC_BEND_PX * sharpness`.
pub fn quadratic_path(origin: Vec2, destination: Vec2, sharpness: f64) -> String {
    let mid = origin.lerp(destination, 0.5);
    let control = match (destination - origin).left_normal() {
        Some(n) => mid + n.scale(ARC_BEND_PX * sharpness),
        None => mid,
    };
    let pt = |p: Vec2| format!("{},{}", format_fixed(p.x, 2), format_fixed(p.y, 2));
    format!("M{}Q{} {}", pt(origin), pt(control), pt(destination))
}

fn arc_path(ctx: &RenderContext<'_>, origin: Endpoint, destination: Endpoint, great: bool, sharpness: f64) -> String {
    if great && let (Some(a), Some(b)) = (origin.geo, destination.geo) {
        let d = ctx.path.line(&great_circle_points(a, b, GREAT_ARC_STEP_DEG));
        if !d.is_empty() {
            return d;
        }
    }
    quadratic_path(origin.screen, destination.screen, sharpness)
}

/// Reconciles arcs against `data`, keyed by their serialized value. Arcs
/// with an unresolvable endpoint are omitted.
pub fn render(ctx: &RenderContext<'_>, layer: &mut Layer, data: &[Value], config: &ArcConfig) -> OverlayOutcome {
    let mut omitted = Vec::new();
    let mut bindings = Vec::with_capacity(data.len());
    for raw in data {
        let datum = flatten_options(raw);
        let key = datum.to_string();
        let origin = datum.get("origin").and_then(|v| resolve_endpoint(ctx, v));
        let destination = datum.get("destination").and_then(|v| resolve_endpoint(ctx, v));
        let (Some(origin), Some(destination)) = (origin, destination) else {
            tracing::warn!(arc = %key, "arc endpoint unresolved; omitting");
            omitted.push(key);
            continue;
        };
        let great = datum.get("greatArc").and_then(|v| v.as_bool()).unwrap_or(config.great_arc);
        let sharpness = datum_f64(&datum, "arcSharpness", Some(config.arc_sharpness)).unwrap_or(1.0);
        let d = arc_path(ctx, origin, destination, great, sharpness);
        let style = Style {
            fill: Some("none".to_string()),
            stroke: Some(datum_str(&datum, "strokeColor").unwrap_or(&config.stroke_color).to_string()),
            stroke_width: datum_f64(&datum, "strokeWidth", Some(config.stroke_width)),
            stroke_linecap: Some("round".to_string()),
            dash_progress: Some(1.0),
            ..Style::default()
        };
        let hidden = Style {
            dash_progress: Some(0.0),
            ..style.clone()
        };
        let shape = Shape::Path { d };
        let binding = Binding::new(key, ARC_CLASS, datum, VisualState::new(shape.clone(), style))
            .entering_from(VisualState::new(shape, hidden));
        bindings.push(binding);
    }
    let report = layer.elements.reconcile(bindings, ctx.now, &config.timing());
    OverlayOutcome { report, omitted }
}

#[cfg(test)]
mod tests {
    use super::{ArcConfig, anchor, flatten_options, quadratic_path, render};
    use crate::context::{RegionIndex, RenderContext};
    use crate::layer::{Layer, LayerId};
    use crate::path::PathGenerator;
    use crate::symbology::Fills;
    use formats::region::{Region, RegionGeometry};
    use foundation::math::{GeoPoint, Projection, ProjectionKind, Vec2, Viewport};
    use foundation::time::Time;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};
    use std::collections::BTreeMap;

    fn square(id: &str, lon: f64, lat: f64) -> Region {
        Region {
            id: id.into(),
            properties: Map::new(),
            geometry: RegionGeometry::Polygon(vec![vec![
                GeoPoint::new(lon, lat),
                GeoPoint::new(lon + 4.0, lat),
                GeoPoint::new(lon + 4.0, lat + 4.0),
                GeoPoint::new(lon, lat + 4.0),
                GeoPoint::new(lon, lat),
            ]]),
        }
    }

    struct Fixture {
        projection: Projection,
        regions: RegionIndex,
        fills: Fills,
        filters: BTreeMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            let projection = Projection::world(ProjectionKind::Equirectangular, Viewport::new(960.0, 540.0), [0.0; 3]);
            let regions = RegionIndex::build(
                vec![square("AAA", 0.0, 0.0), square("BBB", 20.0, 10.0)],
                &PathGenerator::new(&projection),
            );
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

    #[test]
    fn nested_options_are_flattened() {
        let arc = json!({"origin": "AAA", "strokeWidth": 3, "options": {"strokeWidth": 1, "strokeColor": "#000"}});
        assert_eq!(
            flatten_options(&arc),
            json!({"origin": "AAA", "strokeWidth": 3, "strokeColor": "#000"})
        );
    }

    #[test]
    fn control_point_bends_left_of_chord() {
        let d = quadratic_path(Vec2::new(0.0, 100.0), Vec2::new(200.0, 100.0), 1.0);
        assert_eq!(d, "M0,100Q100,10 200,100");
        let flat = quadratic_path(Vec2::new(0.0, 100.0), Vec2::new(200.0, 100.0), 0.0);
        assert_eq!(flat, "M0,100Q100,100 200,100");
    }

    #[test]
    fn unresolvable_endpoint_omits_only_that_arc() {
        let fx = Fixture::new();
        let mut layer = Layer::new(LayerId(1), "arc");
        let data = json!([
            {"origin": "AAA", "destination": "BBB"},
            {"origin": "AAA", "destination": "ZZZ"},
            {"origin": {"latitude": 10, "longitude": 10}, "destination": "JPN"}
        ]);
        let out = render(&fx.ctx(), &mut layer, data.as_array().unwrap(), &ArcConfig::default());
        assert_eq!(out.omitted.len(), 1);
        assert!(out.omitted[0].contains("ZZZ"));
        assert_eq!(out.report.entered.len(), 2);
        assert_eq!(layer.elements.live_keys().len(), 2);
    }

    #[test]
    fn arcs_draw_in_after_delay() {
        let fx = Fixture::new();
        let mut layer = Layer::new(LayerId(1), "arc");
        let data = json!([{"origin": "AAA", "destination": "BBB", "strokeColor": "#123456"}]);
        let out = render(&fx.ctx(), &mut layer, data.as_array().unwrap(), &ArcConfig::default());
        let key = out.report.entered[0].clone();
        let progress = |layer: &Layer| layer.elements.get(&key).unwrap().state.style.dash_progress;
        assert_eq!(progress(&layer), Some(0.0));
        layer.elements.advance(Time(0.05));
        assert_eq!(progress(&layer), Some(0.0));
        layer.elements.advance(Time(0.75));
        assert_eq!(progress(&layer), Some(1.0));
        let el = layer.elements.get(&key).unwrap();
        assert_eq!(el.state.style.stroke.as_deref(), Some("#123456"));
        assert_eq!(el.state.style.fill.as_deref(), Some("none"));
    }

    #[test]
    fn great_arcs_follow_the_sphere() {
        let fx = Fixture::new();
        let mut layer = Layer::new(LayerId(1), "arc");
        let config = ArcConfig {
            great_arc: true,
            ..ArcConfig::default()
        };
        let data = json!([{"origin": "USA", "destination": "JPN"}]);
        let out = render(&fx.ctx(), &mut layer, data.as_array().unwrap(), &config);
        let el = layer.elements.get(&out.report.entered[0]).unwrap();
        match &el.state.shape {
            scene::element::Shape::Path { d } => {
                assert!(d.starts_with('M'));
                assert!(!d.contains('Q'));
                assert!(d.matches('L').count() > 10);
            }
            other => panic!("expected path, got {other:?}"),
        }
        assert!(anchor("JPN").is_some());
        assert!(anchor("FRA").is_none());
    }
}
