use std::fmt;
use std::sync::Arc;

use foundation::math::{GeoPoint, Vec2};
use scene::element::{Shape, VisualState};
use scene::hover::Highlight;
use scene::reconcile::{Binding, ExitEffect, ReconcileTiming};
use scene::style::Style;
use scene::transition::TransitionSpec;
use serde_json::Value;

use crate::context::{OverlayOutcome, RenderContext, datum_f64, datum_str};
use crate::layer::Layer;
use crate::popup::PopupTemplate;
use crate::subunits::highlight_for;

pub const BUBBLE_CLASS: &str = "datamaps-bubble";

/// Geographic center used for `centered: "USA"`.
pub const USA_CENTER: GeoPoint = GeoPoint {
    lon_deg: -98.58333,
    lat_deg: 39.83333,
};

const RADIUS_MS: f64 = 400.0;
const EXIT_MS: f64 = 250.0;

/// Key function binding bubble data to circles.
#[derive(Clone)]
pub struct KeyFn(Arc<dyn Fn(&Value) -> String + Send + Sync>);

impl fmt::Debug for KeyFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyFn(..)")
    }
}

impl KeyFn {
    pub fn new(f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Whole-value identity: the serialized datum.
    pub fn identity() -> Self {
        Self::new(|v| v.to_string())
    }

    /// Keys by one field, e.g. `id`.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move |v| match v.get(&name) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => v.to_string(),
        })
    }

    pub fn key(&self, datum: &Value) -> String {
        (self.0)(datum)
    }
}

#[derive(Debug, Clone)]
pub struct BubblesConfig {
    pub border_width: f64,
    pub border_opacity: f64,
    pub border_color: String,
    pub popup_on_hover: bool,
    pub radius: Option<f64>,
    pub popup_template: PopupTemplate,
    pub fill_opacity: f64,
    pub fill_key: Option<String>,
    pub filter_key: Option<String>,
    pub animate: bool,
    pub highlight_on_hover: bool,
    pub highlight_fill_color: String,
    pub highlight_border_color: String,
    pub highlight_border_width: f64,
    pub highlight_border_opacity: f64,
    pub highlight_fill_opacity: f64,
    pub exit_delay_ms: f64,
    pub key: KeyFn,
}

impl Default for BubblesConfig {
    fn default() -> Self {
        Self {
            border_width: 2.0,
            border_opacity: 1.0,
            border_color: "#FFFFFF".to_string(),
            popup_on_hover: true,
            radius: None,
            popup_template: PopupTemplate::bubble_default(),
            fill_opacity: 0.75,
            fill_key: None,
            filter_key: None,
            animate: true,
            highlight_on_hover: true,
            highlight_fill_color: "#FC8D59".to_string(),
            highlight_border_color: "rgba(250, 15, 160, 0.2)".to_string(),
            highlight_border_width: 2.0,
            highlight_border_opacity: 1.0,
            highlight_fill_opacity: 0.85,
            exit_delay_ms: 100.0,
            key: KeyFn::identity(),
        }
    }
}

impl BubblesConfig {
    pub fn highlight(&self, datum: &Value) -> Highlight {
        highlight_for(
            datum,
            &self.highlight_fill_color,
            &self.highlight_border_color,
            self.highlight_border_width,
            self.highlight_border_opacity,
            Some(self.highlight_fill_opacity),
        )
    }

    fn timing(&self) -> ReconcileTiming {
        ReconcileTiming {
            enter: TransitionSpec::from_ms(0.0, RADIUS_MS),
            update: TransitionSpec::from_ms(0.0, RADIUS_MS),
            exit: TransitionSpec::from_ms(self.exit_delay_ms, EXIT_MS),
            exit_effect: ExitEffect::Shrink,
        }
    }
}

/// Screen position from `latitude`/`longitude`, else from `centered`
/// (a region id, or `USA` for its geographic center).
fn bubble_position(ctx: &RenderContext<'_>, datum: &Value) -> Option<Vec2> {
    if let (Some(lat), Some(lng)) = (datum_f64(datum, "latitude", None), datum_f64(datum, "longitude", None)) {
        return ctx.projection.project(GeoPoint::from_lat_lng(lat, lng));
    }
    match datum_str(datum, "centered")? {
        "USA" => ctx.projection.project(USA_CENTER),
        id => ctx.regions.centroid(id),
    }
}

/// Reconciles circles against `data`. Bubbles without a resolvable position
/// are omitted.
pub fn render(ctx: &RenderContext<'_>, layer: &mut Layer, data: &[Value], config: &BubblesConfig) -> OverlayOutcome {
    let mut omitted = Vec::new();
    let mut bindings = Vec::with_capacity(data.len());
    for datum in data {
        let key = config.key.key(datum);
        let Some(center) = bubble_position(ctx, datum) else {
            tracing::warn!(key = %key, "bubble position unresolved; omitting");
            omitted.push(key);
            continue;
        };
        let radius = datum_f64(datum, "radius", config.radius).unwrap_or(0.0);
        let fill_key = datum_str(datum, "fillKey").or(config.fill_key.as_deref());
        let fill = fill_key
            .and_then(|k| ctx.fills.get(k))
            .unwrap_or(ctx.fills.default_fill())
            .to_string();
        let filter_key = datum_str(datum, "filterKey").or(config.filter_key.as_deref());
        let style = Style {
            fill: Some(fill),
            stroke: Some(datum_str(datum, "borderColor").unwrap_or(&config.border_color).to_string()),
            stroke_width: datum_f64(datum, "borderWidth", Some(config.border_width)),
            stroke_opacity: datum_f64(datum, "borderOpacity", Some(config.border_opacity)),
            fill_opacity: datum_f64(datum, "fillOpacity", Some(config.fill_opacity)),
            filter: filter_key.and_then(|k| ctx.filters.get(k)).cloned(),
            ..Style::default()
        };
        let shape = |r: f64| Shape::Circle {
            cx: center.x,
            cy: center.y,
            r,
        };
        let target = VisualState::new(shape(radius), style.clone());
        let mut binding = Binding::new(key, BUBBLE_CLASS, datum.clone(), target);
        if config.animate {
            binding = binding.entering_from(VisualState::new(shape(0.0), style));
        }
        bindings.push(binding);
    }
    let report = layer.elements.reconcile(bindings, ctx.now, &config.timing());
    OverlayOutcome { report, omitted }
}
