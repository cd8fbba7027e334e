use std::fmt;
use std::sync::Arc;

use formats::region::Region;
use serde_json::Value;

/// What the pointer is over.
#[derive(Debug, Clone, Copy)]
pub enum HoverSubject<'a> {
    Geography(&'a Region),
    Bubble(&'a Value),
    Arc(&'a Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError(pub String);

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "popup template failed: {}", self.0)
    }
}

impl std::error::Error for TemplateError {}

type TemplateFn = dyn Fn(&HoverSubject<'_>, &Value) -> Result<String, TemplateError> + Send + Sync;

/// Caller-supplied popup markup. Cloning shares the closure.
#[derive(Clone)]
pub struct PopupTemplate(Arc<TemplateFn>);

impl fmt::Debug for PopupTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PopupTemplate(..)")
    }
}

impl PopupTemplate {
    pub fn new(
        f: impl Fn(&HoverSubject<'_>, &Value) -> Result<String, TemplateError> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    /// Renders the template; failures degrade to empty content.
    pub fn render(&self, subject: &HoverSubject<'_>, data: &Value) -> String {
        match (self.0)(subject, data) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(error = %e, "popup template failed; showing empty popup");
                String::new()
            }
        }
    }

    pub fn ptr_eq(&self, other: &PopupTemplate) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn geography_default() -> Self {
        Self::new(|subject, _| match subject {
            HoverSubject::Geography(region) => Ok(format!(
                "<div class=\"hoverinfo\"><strong>{}</strong></div>",
                region.name()
            )),
            _ => Err(TemplateError("not a geography".into())),
        })
    }

    pub fn bubble_default() -> Self {
        Self::new(|_, data| {
            let name = data
                .get("name")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .ok_or_else(|| TemplateError("bubble has no name".into()))?;
            Ok(format!("<div class=\"hoverinfo\"><strong>{name}</strong></div>"))
        })
    }

    pub fn arc_default() -> Self {
        Self::new(|_, data| {
            let (Some(origin), Some(destination)) = (data.get("origin"), data.get("destination")) else {
                return Ok(String::new());
            };
            let has_coords = |v: &Value| v.get("latitude").is_some() && v.get("longitude").is_some();
            if has_coords(origin) && has_coords(destination) {
                return Ok(format!(
                    "<div class=\"hoverinfo\"><strong>Arc</strong><br>Origin: {origin}<br>Destination: {destination}</div>"
                ));
            }
            match (origin.as_str(), destination.as_str()) {
                (Some(o), Some(d)) => Ok(format!(
                    "<div class=\"hoverinfo\"><strong>Arc</strong><br>{o} -> {d}</div>"
                )),
                _ => Ok(String::new()),
            }
        })
    }
}

/// Hover popup placement and content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Popup {
    pub visible: bool,
    pub left: f64,
    pub top: f64,
    pub html: String,
}

/// Vertical distance between pointer and popup.
pub const POPUP_OFFSET_Y: f64 = 30.0;

impl Popup {
    pub fn show(&mut self, html: String) {
        self.visible = true;
        self.html = html;
    }

    /// Follows the pointer at `(x, y)` in container coordinates.
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.left = x;
        self.top = y + POPUP_OFFSET_Y;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{HoverSubject, Popup, PopupTemplate, TemplateError};
    use formats::region::{Region, RegionGeometry};
    use serde_json::{Map, json};

    #[test]
    fn failing_template_degrades_to_empty() {
        let t = PopupTemplate::new(|_, _| Err(TemplateError("boom".into())));
        let data = json!({});
        assert_eq!(t.render(&HoverSubject::Bubble(&data), &data), "");
    }

    #[test]
    fn default_templates() {
        let mut props = Map::new();
        props.insert("name".into(), json!("Norway"));
        let region = Region {
            id: "NOR".into(),
            properties: props,
            geometry: RegionGeometry::Empty,
        };
        let empty = json!({});
        assert_eq!(
            PopupTemplate::geography_default().render(&HoverSubject::Geography(&region), &empty),
            "<div class=\"hoverinfo\"><strong>Norway</strong></div>"
        );

        let arc = json!({"origin": "USA", "destination": "JPN"});
        assert_eq!(
            PopupTemplate::arc_default().render(&HoverSubject::Arc(&arc), &arc),
            "<div class=\"hoverinfo\"><strong>Arc</strong><br>USA -> JPN</div>"
        );
        let partial = json!({"origin": "USA"});
        assert_eq!(PopupTemplate::arc_default().render(&HoverSubject::Arc(&partial), &partial), "");

        let bubble = json!({"name": "Tsar Bomba"});
        assert!(PopupTemplate::bubble_default()
            .render(&HoverSubject::Bubble(&bubble), &bubble)
            .contains("Tsar Bomba"));
    }

    #[test]
    fn popup_tracks_pointer() {
        let mut p = Popup::default();
        p.show("<b>x</b>".into());
        p.move_to(10.0, 20.0);
        assert!(p.visible);
        assert_eq!((p.left, p.top), (10.0, 50.0));
        p.hide();
        assert!(!p.visible);
    }
}
