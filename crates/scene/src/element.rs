use serde_json::Value;

use crate::style::{Style, lerp_f64};
use crate::transition::Transition;

/// Geometry of a retained element, in viewport pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Path { d: String },
    Circle { cx: f64, cy: f64, r: f64 },
    Text { x: f64, y: f64, text: String },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    Rect { x: f64, y: f64, width: f64, height: f64 },
}

impl Shape {
    /// Numeric attributes interpolate; path data and text switch at the end.
    pub fn lerp(&self, to: &Shape, t: f64) -> Shape {
        if t >= 1.0 {
            return to.clone();
        }
        match (self, to) {
            (
                Shape::Circle { cx, cy, r },
                Shape::Circle {
                    cx: cx2,
                    cy: cy2,
                    r: r2,
                },
            ) => Shape::Circle {
                cx: lerp_f64(*cx, *cx2, t),
                cy: lerp_f64(*cy, *cy2, t),
                r: lerp_f64(*r, *r2, t),
            },
            (Shape::Text { x, y, text }, Shape::Text { x: x2, y: y2, .. }) => Shape::Text {
                x: lerp_f64(*x, *x2, t),
                y: lerp_f64(*y, *y2, t),
                text: text.clone(),
            },
            (
                Shape::Line { x1, y1, x2, y2 },
                Shape::Line {
                    x1: bx1,
                    y1: by1,
                    x2: bx2,
                    y2: by2,
                },
            ) => Shape::Line {
                x1: lerp_f64(*x1, *bx1, t),
                y1: lerp_f64(*y1, *by1, t),
                x2: lerp_f64(*x2, *bx2, t),
                y2: lerp_f64(*y2, *by2, t),
            },
            (
                Shape::Rect {
                    x,
                    y,
                    width,
                    height,
                },
                Shape::Rect {
                    x: x2,
                    y: y2,
                    width: w2,
                    height: h2,
                },
            ) => Shape::Rect {
                x: lerp_f64(*x, *x2, t),
                y: lerp_f64(*y, *y2, t),
                width: lerp_f64(*width, *w2, t),
                height: lerp_f64(*height, *h2, t),
            },
            _ => self.clone(),
        }
    }
}

/// Everything that is drawn for one element at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualState {
    pub shape: Shape,
    pub style: Style,
}

impl VisualState {
    pub fn new(shape: Shape, style: Style) -> Self {
        Self { shape, style }
    }

    pub fn lerp(&self, to: &VisualState, t: f64) -> VisualState {
        VisualState {
            shape: self.shape.lerp(&to.shape, t),
            style: self.style.lerp(&to.style, t),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Entering,
    Updating,
    Exiting,
}

/// Retained node bound to one datum by key.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualElement {
    pub key: String,
    pub class: String,
    /// Currently displayed state.
    pub state: VisualState,
    pub datum: Value,
    pub lifecycle: Lifecycle,
    pub transition: Option<Transition>,
}

impl VisualElement {
    pub fn new(key: impl Into<String>, class: impl Into<String>, state: VisualState, datum: Value) -> Self {
        Self {
            key: key.into(),
            class: class.into(),
            state,
            datum,
            lifecycle: Lifecycle::Entering,
            transition: None,
        }
    }

    /// Final state once any in-flight transition completes.
    pub fn target(&self) -> &VisualState {
        self.transition.as_ref().map(|t| &t.to).unwrap_or(&self.state)
    }

    pub fn is_live(&self) -> bool {
        self.lifecycle != Lifecycle::Exiting
    }
}

/// Merges `patch` over `base`: present fields overwrite, absent fields keep
/// their prior value. Non-object patches replace the base outright.
pub fn merge_datum(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (k, v) in patch {
                base.insert(k, v);
            }
        }
        (base, patch) => *base = patch,
    }
}
