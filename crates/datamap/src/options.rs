//! Serde view of the map options.
//!
//! Every overlay section is partial: fields left out keep the instance
//! default. `*Options::merged_over` applies a section onto a resolved
//! config, keeping closures (popup templates, bubble keys) by reference.

use std::collections::BTreeMap;

use formats::dataset::DataType;
use layers::arcs::ArcConfig;
use layers::bubbles::{BubblesConfig, KeyFn};
use layers::labels::LabelsConfig;
use layers::popup::PopupTemplate;
use layers::subunits::GeographyConfig;
use layers::symbology::{DEFAULT_FILL, DEFAULT_FILL_KEY};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_WIDTH: f64 = 960.0;
pub const DEFAULT_ASPECT_RATIO: f64 = 0.5625;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectionConfig {
    /// `[λ, φ]` or `[λ, φ, γ]` in degrees; applied to orthographic views.
    pub rotation: Vec<f64>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            rotation: vec![97.0, 0.0],
        }
    }
}

impl ProjectionConfig {
    pub fn rotation3(&self) -> [f64; 3] {
        let at = |i: usize| self.rotation.get(i).copied().unwrap_or(0.0);
        [at(0), at(1), at(2)]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapOptions {
    /// Topology object collection to draw (`world`, `usa`, ...).
    pub scope: String,
    pub projection: String,
    pub projection_config: ProjectionConfig,
    pub responsive: bool,
    pub aspect_ratio: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub fills: BTreeMap<String, String>,
    /// SVG filter references by key, e.g. `{"glow": "url(#glow)"}`.
    pub filters: BTreeMap<String, String>,
    pub geography_config: GeographyOptions,
    pub bubbles_config: BubblesOptions,
    pub arc_config: ArcOptions,
    pub labels_config: LabelsOptions,
    /// Initial choropleth data keyed by region id.
    pub data: Map<String, Value>,
    /// Remote choropleth data, fetched by the host after the first draw.
    pub data_url: Option<String>,
    pub data_type: DataType,
}

impl Default for MapOptions {
    fn default() -> Self {
        let mut fills = BTreeMap::new();
        fills.insert(DEFAULT_FILL_KEY.to_string(), DEFAULT_FILL.to_string());
        Self {
            scope: "world".to_string(),
            projection: "equirectangular".to_string(),
            projection_config: ProjectionConfig::default(),
            responsive: false,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            width: None,
            height: None,
            fills,
            filters: BTreeMap::new(),
            geography_config: GeographyOptions::default(),
            bubbles_config: BubblesOptions::default(),
            arc_config: ArcOptions::default(),
            labels_config: LabelsOptions::default(),
            data: Map::new(),
            data_url: None,
            data_type: DataType::Json,
        }
    }
}

impl MapOptions {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_json_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn resolved_width(&self) -> f64 {
        self.width.filter(|w| w.is_finite() && *w > 0.0).unwrap_or(DEFAULT_WIDTH)
    }

    pub fn resolved_height(&self) -> f64 {
        self.height
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or_else(|| self.resolved_width() * self.aspect_ratio)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeographyOptions {
    pub data_url: Option<String>,
    /// Inline topology, used instead of fetching `dataUrl`.
    pub data_json: Option<Value>,
    pub hide_antarctica: Option<bool>,
    pub hide_hawaii_and_alaska: Option<bool>,
    pub exclude: Option<Vec<String>>,
    pub border_width: Option<f64>,
    pub border_opacity: Option<f64>,
    pub border_color: Option<String>,
    pub popup_on_hover: Option<bool>,
    pub highlight_on_hover: Option<bool>,
    pub highlight_fill_color: Option<String>,
    pub highlight_border_color: Option<String>,
    pub highlight_border_width: Option<f64>,
    pub highlight_border_opacity: Option<f64>,
    pub highlight_fill_opacity: Option<f64>,
    #[serde(skip)]
    pub popup_template: Option<PopupTemplate>,
}

fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

impl GeographyOptions {
    pub fn merged_over(&self, base: &GeographyConfig) -> GeographyConfig {
        let mut out = base.clone();
        if self.data_url.is_some() {
            out.data_url = self.data_url.clone();
        }
        set(&mut out.hide_antarctica, &self.hide_antarctica);
        set(&mut out.hide_hawaii_and_alaska, &self.hide_hawaii_and_alaska);
        set(&mut out.exclude, &self.exclude);
        set(&mut out.border_width, &self.border_width);
        set(&mut out.border_opacity, &self.border_opacity);
        set(&mut out.border_color, &self.border_color);
        set(&mut out.popup_on_hover, &self.popup_on_hover);
        set(&mut out.highlight_on_hover, &self.highlight_on_hover);
        set(&mut out.highlight_fill_color, &self.highlight_fill_color);
        set(&mut out.highlight_border_color, &self.highlight_border_color);
        set(&mut out.highlight_border_width, &self.highlight_border_width);
        set(&mut out.highlight_border_opacity, &self.highlight_border_opacity);
        if self.highlight_fill_opacity.is_some() {
            out.highlight_fill_opacity = self.highlight_fill_opacity;
        }
        set(&mut out.popup_template, &self.popup_template);
        out
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BubblesOptions {
    pub border_width: Option<f64>,
    pub border_opacity: Option<f64>,
    pub border_color: Option<String>,
    pub popup_on_hover: Option<bool>,
    pub radius: Option<f64>,
    pub fill_opacity: Option<f64>,
    pub fill_key: Option<String>,
    pub filter_key: Option<String>,
    pub animate: Option<bool>,
    pub highlight_on_hover: Option<bool>,
    pub highlight_fill_color: Option<String>,
    pub highlight_border_color: Option<String>,
    pub highlight_border_width: Option<f64>,
    pub highlight_border_opacity: Option<f64>,
    pub highlight_fill_opacity: Option<f64>,
    pub exit_delay: Option<f64>,
    /// Field whose value keys each bubble; the whole datum when unset.
    pub key_field: Option<String>,
    #[serde(skip)]
    pub popup_template: Option<PopupTemplate>,
    #[serde(skip)]
    pub key: Option<KeyFn>,
}

impl BubblesOptions {
    pub fn merged_over(&self, base: &BubblesConfig) -> BubblesConfig {
        let mut out = base.clone();
        set(&mut out.border_width, &self.border_width);
        set(&mut out.border_opacity, &self.border_opacity);
        set(&mut out.border_color, &self.border_color);
        set(&mut out.popup_on_hover, &self.popup_on_hover);
        if self.radius.is_some() {
            out.radius = self.radius;
        }
        set(&mut out.fill_opacity, &self.fill_opacity);
        if self.fill_key.is_some() {
            out.fill_key = self.fill_key.clone();
        }
        if self.filter_key.is_some() {
            out.filter_key = self.filter_key.clone();
        }
        set(&mut out.animate, &self.animate);
        set(&mut out.highlight_on_hover, &self.highlight_on_hover);
        set(&mut out.highlight_fill_color, &self.highlight_fill_color);
        set(&mut out.highlight_border_color, &self.highlight_border_color);
        set(&mut out.highlight_border_width, &self.highlight_border_width);
        set(&mut out.highlight_border_opacity, &self.highlight_border_opacity);
        set(&mut out.highlight_fill_opacity, &self.highlight_fill_opacity);
        set(&mut out.exit_delay_ms, &self.exit_delay);
        if let Some(field) = &self.key_field {
            out.key = KeyFn::field(field.clone());
        }
        set(&mut out.key, &self.key);
        set(&mut out.popup_template, &self.popup_template);
        out
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArcOptions {
    pub stroke_color: Option<String>,
    pub stroke_width: Option<f64>,
    pub arc_sharpness: Option<f64>,
    pub animation_speed: Option<f64>,
    pub great_arc: Option<bool>,
    pub popup_on_hover: Option<bool>,
    #[serde(skip)]
    pub popup_template: Option<PopupTemplate>,
}

impl ArcOptions {
    pub fn merged_over(&self, base: &ArcConfig) -> ArcConfig {
        let mut out = base.clone();
        set(&mut out.stroke_color, &self.stroke_color);
        set(&mut out.stroke_width, &self.stroke_width);
        set(&mut out.arc_sharpness, &self.arc_sharpness);
        set(&mut out.animation_speed_ms, &self.animation_speed);
        set(&mut out.great_arc, &self.great_arc);
        set(&mut out.popup_on_hover, &self.popup_on_hover);
        set(&mut out.popup_template, &self.popup_template);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelsOptions {
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub label_color: Option<String>,
    pub line_width: Option<f64>,
    pub custom_label_text: Option<BTreeMap<String, String>>,
    pub avoid_overlap: Option<bool>,
}

impl LabelsOptions {
    pub fn merged_over(&self, base: &LabelsConfig) -> LabelsConfig {
        let mut out = base.clone();
        if self.font_size.is_some() {
            out.font_size = self.font_size;
        }
        if self.font_family.is_some() {
            out.font_family = self.font_family.clone();
        }
        if self.label_color.is_some() {
            out.label_color = self.label_color.clone();
        }
        if self.line_width.is_some() {
            out.line_width = self.line_width;
        }
        set(&mut out.custom_label_text, &self.custom_label_text);
        set(&mut out.avoid_overlap, &self.avoid_overlap);
        out
    }
}

/// Options for `update_choropleth`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Clears stored data and returns every region to `defaultFill` first.
    pub reset: bool,
}
