use std::collections::BTreeMap;

use scene::element::{Shape, VisualState};
use scene::reconcile::{Binding, ReconcileTiming};
use scene::style::Style;
use serde::Deserialize;
use serde_json::Value;

use crate::context::{OverlayError, OverlayOutcome, RenderContext};
use crate::layer::Layer;
use crate::symbology::DEFAULT_FILL_KEY;

pub const LEGEND_CLASS: &str = "datamaps-legend";

const MARGIN_PX: f64 = 10.0;
const ROW_PX: f64 = 18.0;
const SWATCH_PX: f64 = 12.0;
const FONT_PX: f64 = 12.0;

/// Legend input: `{ legendTitle, defaultFillName, labels: {fillKey: text} }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegendData {
    pub legend_title: Option<String>,
    pub default_fill_name: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl LegendData {
    /// Accepts an object or `null` (no title, generated labels).
    pub fn from_value(data: &Value) -> Result<Self, OverlayError> {
        if data.is_null() {
            return Ok(Self::default());
        }
        if !data.is_object() {
            return Err(OverlayError {
                overlay: "legend".to_string(),
                reason: "legend data must be an object".to_string(),
            });
        }
        serde_json::from_value(data.clone()).map_err(|e| OverlayError {
            overlay: "legend".to_string(),
            reason: e.to_string(),
        })
    }

    /// Label text for a fill; `None` skips the entry.
    pub fn label_for(&self, fill_key: &str) -> Option<String> {
        if fill_key == DEFAULT_FILL_KEY {
            return self.default_fill_name.clone();
        }
        Some(
            self.labels
                .get(fill_key)
                .filter(|s| !s.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("{fill_key}: ")),
        )
    }
}

fn text(x: f64, y: f64, content: String) -> VisualState {
    VisualState::new(
        Shape::Text { x, y, text: content },
        Style {
            fill: Some("#000".to_string()),
            font_size: Some(FONT_PX),
            ..Style::default()
        },
    )
}

/// Lays out a swatch and a label per fill, bottom-left, with an optional
/// title row on top.
pub fn render(ctx: &RenderContext<'_>, layer: &mut Layer, data: &LegendData) -> OverlayOutcome {
    let entries: Vec<(&str, &str, String)> = ctx
        .fills
        .iter()
        .filter_map(|(key, color)| data.label_for(key).map(|label| (key, color, label)))
        .collect();
    let rows = entries.len() + usize::from(data.legend_title.is_some());
    let mut y = ctx.viewport.height - MARGIN_PX - rows as f64 * ROW_PX;

    let mut bindings = Vec::with_capacity(entries.len() * 2 + 1);
    if let Some(title) = &data.legend_title {
        y += ROW_PX;
        bindings.push(Binding::new(
            "legend:title",
            LEGEND_CLASS,
            Value::Null,
            text(MARGIN_PX, y, title.clone()),
        ));
    }
    for (key, color, label) in entries {
        y += ROW_PX;
        bindings.push(Binding::new(
            format!("legend:swatch:{key}"),
            LEGEND_CLASS,
            Value::String(key.to_string()),
            VisualState::new(
                Shape::Rect {
                    x: MARGIN_PX,
                    y: y - SWATCH_PX,
                    width: SWATCH_PX,
                    height: SWATCH_PX,
                },
                Style::default().with_fill(color),
            ),
        ));
        bindings.push(Binding::new(
            format!("legend:label:{key}"),
            LEGEND_CLASS,
            Value::String(key.to_string()),
            text(MARGIN_PX + SWATCH_PX + 6.0, y, label),
        ));
    }
    layer
        .elements
        .reconcile(bindings, ctx.now, &ReconcileTiming::INSTANT)
        .into()
}
