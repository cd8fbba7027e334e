use foundation::math::Vec2;

use crate::element::{Shape, VisualElement};
use crate::reconcile::ElementSet;

/// Screen-space picking over one element set.
///
/// Ordering contract:
/// - The topmost (last drawn) element under the point wins.
/// - Exiting elements are never picked.
/// - Paths and text are not pickable here; regions are hit-tested against
///   their geometry by the map.
pub fn pick_point(set: &ElementSet, p: Vec2) -> Option<&VisualElement> {
    if !p.is_finite() {
        return None;
    }
    let hits: Vec<&VisualElement> = set.iter().filter(|e| e.is_live() && covers(&e.state.shape, p)).collect();
    hits.last().copied()
}

fn covers(shape: &Shape, p: Vec2) -> bool {
    match shape {
        Shape::Circle { cx, cy, r } => {
            let dx = p.x - cx;
            let dy = p.y - cy;
            *r > 0.0 && dx * dx + dy * dy <= r * r
        }
        Shape::Rect {
            x,
            y,
            width,
            height,
        } => p.x >= *x && p.x <= x + width && p.y >= *y && p.y <= y + height,
        Shape::Path { .. } | Shape::Text { .. } | Shape::Line { .. } => false,
    }
}
