use foundation::math::GeoPoint;
use foundation::time::Time;
use scene::element::{Shape, VisualState};
use scene::reconcile::{Binding, ReconcileReport, ReconcileTiming};
use scene::style::Style;
use serde_json::Value;

use crate::layer::Layer;
use crate::path::PathGenerator;

const EPS: f64 = 1e-6;

/// Latitude/longitude grid: minor lines every 10 degrees within ±80,
/// major meridians every 90 degrees and the equator spanning the full
/// globe, sampled every 2.5 degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Graticule {
    pub minor_step: f64,
    pub major_step: [f64; 2],
    pub minor_extent_lat: f64,
    pub precision: f64,
}

impl Default for Graticule {
    fn default() -> Self {
        Self {
            minor_step: 10.0,
            major_step: [90.0, 360.0],
            minor_extent_lat: 80.0,
            precision: 2.5,
        }
    }
}

fn range(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut i = 0;
    loop {
        let v = start + step * i as f64;
        if v >= stop {
            break;
        }
        out.push(v);
        i += 1;
    }
    out
}

impl Graticule {
    fn meridian(&self, lon: f64, lat0: f64, lat1: f64) -> Vec<GeoPoint> {
        let mut pts: Vec<GeoPoint> = range(lat0, lat1 - EPS, self.precision)
            .into_iter()
            .map(|lat| GeoPoint::new(lon, lat))
            .collect();
        pts.push(GeoPoint::new(lon, lat1));
        pts
    }

    fn parallel(&self, lat: f64, lon0: f64, lon1: f64) -> Vec<GeoPoint> {
        let mut pts: Vec<GeoPoint> = range(lon0, lon1 - EPS, self.precision)
            .into_iter()
            .map(|lon| GeoPoint::new(lon, lat))
            .collect();
        pts.push(GeoPoint::new(lon1, lat));
        pts
    }

    /// Every grid line as a polyline.
    pub fn lines(&self) -> Vec<Vec<GeoPoint>> {
        let [major_x, major_y] = self.major_step;
        let (x0, x1) = (-180.0, 180.0);
        let (y0, y1) = (-self.minor_extent_lat - EPS, self.minor_extent_lat + EPS);
        let (big_y0, big_y1) = (-90.0 + EPS, 90.0 - EPS);
        let dx = self.minor_step;
        let dy = self.minor_step;

        let mut out = Vec::new();
        for x in range((x0 / major_x).ceil() * major_x, x1, major_x) {
            out.push(self.meridian(x, big_y0, big_y1));
        }
        for y in range((big_y0 / major_y).ceil() * major_y, big_y1, major_y) {
            out.push(self.parallel(y, x0, x1));
        }
        for x in range((x0 / dx).ceil() * dx, x1, dx) {
            if (x % major_x).abs() > EPS {
                out.push(self.meridian(x, y0, y1));
            }
        }
        for y in range((y0 / dy).ceil() * dy, y1, dy) {
            if (y % major_y).abs() > EPS {
                out.push(self.parallel(y, x0, x1));
            }
        }
        out
    }
}

/// Grid line style.
pub fn graticule_style() -> Style {
    Style {
        fill: Some("none".into()),
        stroke: Some("#777".into()),
        stroke_width: Some(0.5),
        stroke_opacity: Some(0.5),
        ..Style::default()
    }
}

/// Renders the grid as one path element.
pub fn render(path: &PathGenerator<'_>, layer: &mut Layer, graticule: &Graticule, now: Time) -> ReconcileReport {
    let mut d = String::new();
    for line in graticule.lines() {
        d.push_str(&path.line(&line));
    }
    let binding = Binding::new(
        "graticule",
        "datamaps-graticule",
        Value::Null,
        VisualState::new(Shape::Path { d }, graticule_style()),
    );
    layer
        .elements
        .reconcile(vec![binding], now, &ReconcileTiming::INSTANT)
}
