use crate::math::Vec2;

/// Axis-aligned bounding box in two dimensions.
///
/// Used both for lon/lat extents of decoded regions and for screen-space
/// extents while fitting projections. An empty box has `min > max`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn empty() -> Self {
        Aabb2 {
            min: [f64::INFINITY, f64::INFINITY],
            max: [f64::NEG_INFINITY, f64::NEG_INFINITY],
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.min[0] <= self.max[0] && self.min[1] <= self.max[1])
    }

    pub fn extend(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.min[0] = self.min[0].min(x);
        self.min[1] = self.min[1].min(y);
        self.max[0] = self.max[0].max(x);
        self.max[1] = self.max[1].max(y);
    }

    pub fn union(&mut self, other: &Aabb2) {
        if other.is_empty() {
            return;
        }
        self.extend(other.min[0], other.min[1]);
        self.extend(other.max[0], other.max[1]);
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        )
    }

    /// Half-open containment (`min <= p < max`).
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min[0] && p.x < self.max[0] && p.y >= self.min[1] && p.y < self.max[1]
    }
}
