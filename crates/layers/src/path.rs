//! Projected SVG path data.
//!
//! Coordinates are written with at most two decimals. A ring whose points
//! are all visible closes with `Z`. Under a horizon clip the visible runs
//! are joined by arcs along the globe outline and the ring still closes;
//! other clipped rings split into open runs.

use std::fmt::Write as _;

use formats::region::{Region, ring_moments};
use foundation::math::{GeoPoint, Projection, SphereOutline, Vec2, format_fixed};

/// Path generator bound to one projection snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PathGenerator<'a> {
    projection: &'a Projection,
}

fn push_point(d: &mut String, cmd: char, p: Vec2) {
    let _ = write!(d, "{cmd}{},{}", format_fixed(p.x, 2), format_fixed(p.y, 2));
}

fn push_run(d: &mut String, run: &[Vec2], close: bool) {
    for (i, p) in run.iter().enumerate() {
        push_point(d, if i == 0 { 'M' } else { 'L' }, *p);
    }
    if close {
        d.push('Z');
    }
}

fn angle_on(outline: &SphereOutline, p: Vec2) -> f64 {
    (p.y - outline.center.y).atan2(p.x - outline.center.x)
}

fn snap_to(outline: &SphereOutline, p: Vec2) -> Vec2 {
    let offset = p - outline.center;
    let len = offset.length();
    if len <= f64::EPSILON {
        return p;
    }
    outline.center + offset.scale(outline.radius / len)
}

/// Twice the signed screen area; positive is clockwise on screen.
fn winding(runs: &[Vec<Vec2>]) -> f64 {
    let pts: Vec<Vec2> = runs.iter().flatten().copied().collect();
    let n = pts.len();
    (0..n)
        .map(|i| {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum()
}

fn push_arc(d: &mut String, outline: &SphereOutline, from: Vec2, to: Vec2, clockwise: bool) {
    let tau = std::f64::consts::TAU;
    let (a, b) = (angle_on(outline, from), angle_on(outline, to));
    let sweep = if clockwise { b - a } else { a - b };
    let large = sweep.rem_euclid(tau) > std::f64::consts::PI;
    let r = format_fixed(outline.radius, 2);
    let _ = write!(
        d,
        "A{r},{r} 0 {},{} {},{}",
        u8::from(large),
        u8::from(clockwise),
        format_fixed(to.x, 2),
        format_fixed(to.y, 2)
    );
}

/// Visible runs in ring order, each closed back to the next along the
/// outline in the ring's own winding direction.
fn push_rejoined(d: &mut String, runs: &[Vec<Vec2>], outline: &SphereOutline) {
    let Some(first) = runs.first().and_then(|r| r.first()) else {
        return;
    };
    let clockwise = winding(runs) > 0.0;
    push_point(d, 'M', *first);
    for (i, run) in runs.iter().enumerate() {
        for p in run.iter().skip(1) {
            push_point(d, 'L', *p);
        }
        let next = runs[(i + 1) % runs.len()].first();
        if let (Some(exit), Some(entry)) = (run.last(), next) {
            push_arc(d, outline, *exit, *entry, clockwise);
        }
    }
    d.push('Z');
}

impl<'a> PathGenerator<'a> {
    pub fn new(projection: &'a Projection) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> &'a Projection {
        self.projection
    }

    /// Screen point where the segment from a visible to a hidden point
    /// crosses the horizon, found by bisection and snapped to the outline.
    fn horizon_crossing(&self, visible: GeoPoint, hidden: GeoPoint, outline: &SphereOutline) -> Option<Vec2> {
        let dlon = (hidden.lon_deg - visible.lon_deg + 180.0).rem_euclid(360.0) - 180.0;
        let dlat = hidden.lat_deg - visible.lat_deg;
        let at = |t: f64| GeoPoint::new(visible.lon_deg + dlon * t, visible.lat_deg + dlat * t);
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..32 {
            let mid = (lo + hi) * 0.5;
            if self.projection.project(at(mid)).is_some() {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        self.projection.project(at(lo)).map(|p| snap_to(outline, p))
    }

    /// Projects a closed ring. Returns visible runs and whether the ring
    /// survived unclipped. Under a horizon clip every run starts and ends
    /// on the globe outline.
    pub fn ring_runs(&self, ring: &[GeoPoint]) -> (Vec<Vec<Vec2>>, bool) {
        let open = match (ring.first(), ring.last()) {
            (Some(a), Some(b)) if ring.len() > 1 && a == b => &ring[..ring.len() - 1],
            _ => ring,
        };
        let projected: Vec<Option<Vec2>> = open.iter().map(|p| self.projection.project(*p)).collect();
        if projected.is_empty() {
            return (Vec::new(), false);
        }
        if projected.iter().all(|p| p.is_some()) {
            return (vec![projected.into_iter().flatten().collect()], true);
        }

        // Walk circularly starting after a clipped point so no run wraps.
        let outline = self.projection.sphere_outline();
        let n = projected.len();
        let start = projected.iter().position(|p| p.is_none()).unwrap_or(0);
        let mut runs = Vec::new();
        let mut current: Vec<Vec2> = Vec::new();
        for k in 1..=n {
            let (i, prev) = ((start + k) % n, (start + k - 1) % n);
            match projected[i] {
                Some(p) => {
                    if projected[prev].is_none()
                        && let Some(o) = &outline
                        && let Some(entry) = self.horizon_crossing(open[i], open[prev], o)
                    {
                        current.push(entry);
                    }
                    current.push(p);
                }
                None => {
                    if projected[prev].is_some()
                        && let Some(o) = &outline
                        && let Some(exit) = self.horizon_crossing(open[prev], open[i], o)
                    {
                        current.push(exit);
                    }
                    if current.len() > 1 {
                        runs.push(std::mem::take(&mut current));
                    } else {
                        current.clear();
                    }
                }
            }
        }
        if current.len() > 1 {
            runs.push(current);
        }
        (runs, false)
    }

    pub fn rings(&self, rings: &[Vec<GeoPoint>]) -> String {
        let mut d = String::new();
        let outline = self.projection.sphere_outline();
        for ring in rings {
            let (runs, closed) = self.ring_runs(ring);
            match &outline {
                Some(o) if !closed => push_rejoined(&mut d, &runs, o),
                _ => {
                    for run in runs {
                        push_run(&mut d, &run, closed);
                    }
                }
            }
        }
        d
    }

    /// Path data for every ring of `region`; empty for empty geometry.
    pub fn region(&self, region: &Region) -> String {
        let mut d = String::new();
        for polygon in region.polygons() {
            d.push_str(&self.rings(polygon));
        }
        d
    }

    /// Open polyline, split where points are clipped.
    pub fn line(&self, points: &[GeoPoint]) -> String {
        let mut d = String::new();
        let mut run: Vec<Vec2> = Vec::new();
        for p in points {
            match self.projection.project(*p) {
                Some(s) => run.push(s),
                None => {
                    if run.len() > 1 {
                        push_run(&mut d, &run, false);
                    }
                    run.clear();
                }
            }
        }
        if run.len() > 1 {
            push_run(&mut d, &run, false);
        }
        d
    }

    /// Screen-space centroid: area-weighted over unclipped rings (holes
    /// subtract), else the mean of visible vertices.
    pub fn centroid(&self, region: &Region) -> Option<Vec2> {
        let mut area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        let mut sum = Vec2::new(0.0, 0.0);
        let mut count = 0usize;

        for polygon in region.polygons() {
            for (i, ring) in polygon.iter().enumerate() {
                let (runs, closed) = self.ring_runs(ring);
                for run in &runs {
                    for p in run {
                        sum = sum + *p;
                        count += 1;
                    }
                }
                if !closed {
                    continue;
                }
                let Some(run) = runs.first() else {
                    continue;
                };
                let pts = run.iter().chain(run.first()).map(|p| (p.x, p.y));
                let (a, mx, my) = ring_moments(pts);
                if a.abs() <= f64::EPSILON {
                    continue;
                }
                let weight = if i == 0 { a.abs() } else { -a.abs() };
                area += weight;
                cx += weight * (mx / a);
                cy += weight * (my / a);
            }
        }

        if area.abs() > 1e-9 {
            return Some(Vec2::new(cx / area, cy / area));
        }
        if count == 0 {
            return None;
        }
        Some(sum.scale(1.0 / count as f64))
    }

    /// Globe outline for clipped azimuthal projections, as a circle path.
    pub fn sphere_outline(&self) -> Option<String> {
        let o = self.projection.sphere_outline()?;
        let (cx, cy, r) = (o.center.x, o.center.y, o.radius);
        let f = |v: f64| format_fixed(v, 2);
        Some(format!(
            "M{},{}A{},{} 0 1,1 {},{}A{},{} 0 1,1 {},{}Z",
            f(cx),
            f(cy - r),
            f(r),
            f(r),
            f(cx),
            f(cy + r),
            f(r),
            f(r),
            f(cx),
            f(cy - r)
        ))
    }
}
