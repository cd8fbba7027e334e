use std::collections::BTreeMap;

use scene::element::{Shape, VisualState};
use scene::hover::Highlight;
use scene::reconcile::{Binding, ReconcileReport, ReconcileTiming};
use scene::style::Style;
use serde_json::{Map, Value};

use crate::context::{RenderContext, datum_f64, datum_str};
use crate::layer::Layer;
use crate::popup::PopupTemplate;
use crate::symbology::{FillSpec, Fills};

pub const SUBUNITS_CLASS: &str = "datamaps-subunits";

/// Region border, hover and popup settings.
#[derive(Debug, Clone)]
pub struct GeographyConfig {
    pub data_url: Option<String>,
    pub hide_antarctica: bool,
    pub hide_hawaii_and_alaska: bool,
    pub exclude: Vec<String>,
    pub border_width: f64,
    pub border_opacity: f64,
    pub border_color: String,
    pub popup_template: PopupTemplate,
    pub popup_on_hover: bool,
    pub highlight_on_hover: bool,
    pub highlight_fill_color: String,
    pub highlight_border_color: String,
    pub highlight_border_width: f64,
    pub highlight_border_opacity: f64,
    pub highlight_fill_opacity: Option<f64>,
}

impl Default for GeographyConfig {
    fn default() -> Self {
        Self {
            data_url: None,
            hide_antarctica: true,
            hide_hawaii_and_alaska: false,
            exclude: Vec::new(),
            border_width: 1.0,
            border_opacity: 1.0,
            border_color: "#FDFDFD".to_string(),
            popup_template: PopupTemplate::geography_default(),
            popup_on_hover: true,
            highlight_on_hover: true,
            highlight_fill_color: "#FC8D59".to_string(),
            highlight_border_color: "rgba(250, 15, 160, 0.2)".to_string(),
            highlight_border_width: 2.0,
            highlight_border_opacity: 1.0,
            highlight_fill_opacity: None,
        }
    }
}

impl GeographyConfig {
    pub fn region_style(&self, fill: String) -> Style {
        Style {
            fill: Some(fill),
            stroke: Some(self.border_color.clone()),
            stroke_width: Some(self.border_width),
            stroke_opacity: Some(self.border_opacity),
            ..Style::default()
        }
    }

    pub fn highlight(&self, datum: &Value) -> Highlight {
        highlight_for(
            datum,
            &self.highlight_fill_color,
            &self.highlight_border_color,
            self.highlight_border_width,
            self.highlight_border_opacity,
            self.highlight_fill_opacity,
        )
    }
}

/// Highlight for one element: datum overrides (`highlightFillColor`, ...)
/// win over the overlay defaults.
pub fn highlight_for(
    datum: &Value,
    fill_color: &str,
    border_color: &str,
    border_width: f64,
    border_opacity: f64,
    fill_opacity: Option<f64>,
) -> Highlight {
    Highlight {
        fill: Some(datum_str(datum, "highlightFillColor").unwrap_or(fill_color).to_string()),
        stroke: Some(
            datum_str(datum, "highlightBorderColor")
                .unwrap_or(border_color)
                .to_string(),
        ),
        stroke_width: datum_f64(datum, "highlightBorderWidth", Some(border_width)),
        stroke_opacity: datum_f64(datum, "highlightBorderOpacity", Some(border_opacity)),
        fill_opacity: datum_f64(datum, "highlightFillOpacity", fill_opacity),
    }
}

pub fn region_class(id: &str) -> String {
    format!("datamaps-subunit {id}")
}

/// Fill for a stored choropleth datum.
pub fn region_fill(fills: &Fills, datum: Option<&Value>) -> String {
    fills.resolve(&datum.map(FillSpec::from_datum).unwrap_or(FillSpec::Default))
}

/// Draws one path per indexed region, filled from `colors` when set and
/// otherwise from `data`.
pub fn render(
    ctx: &RenderContext<'_>,
    layer: &mut Layer,
    data: &Map<String, Value>,
    colors: &BTreeMap<String, String>,
    config: &GeographyConfig,
) -> ReconcileReport {
    let bindings = ctx
        .regions
        .iter()
        .map(|region| {
            let datum = data.get(&region.id);
            let fill = match colors.get(&region.id) {
                Some(color) => color.clone(),
                None => region_fill(ctx.fills, datum),
            };
            let target = VisualState::new(
                Shape::Path {
                    d: ctx.path.region(region),
                },
                config.region_style(fill),
            );
            Binding::new(
                region.id.clone(),
                region_class(&region.id),
                datum.cloned().unwrap_or(Value::Null),
                target,
            )
        })
        .collect();
    layer.elements.reconcile(bindings, ctx.now, &ReconcileTiming::INSTANT)
}
