use super::Vec3;

/// Geographic position in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }

    /// Latitude-first constructor, matching the order callers usually
    /// write coordinates in.
    pub fn from_lat_lng(lat_deg: f64, lng_deg: f64) -> Self {
        Self::new(lng_deg, lat_deg)
    }

    pub fn is_finite(&self) -> bool {
        self.lon_deg.is_finite() && self.lat_deg.is_finite()
    }

    pub fn to_unit_vector(self) -> Vec3 {
        let lon = self.lon_deg.to_radians();
        let lat = self.lat_deg.to_radians();
        let cos_lat = lat.cos();
        Vec3::new(cos_lat * lon.cos(), cos_lat * lon.sin(), lat.sin())
    }

    pub fn from_unit_vector(v: Vec3) -> Self {
        let lat = v.z.clamp(-1.0, 1.0).asin();
        let lon = v.y.atan2(v.x);
        Self::new(lon.to_degrees(), lat.to_degrees())
    }
}

/// Wraps a longitude in degrees into `[-180, 180]`.
pub fn normalize_lon_deg(lon: f64) -> f64 {
    let mut l = (lon + 180.0) % 360.0;
    if l < 0.0 {
        l += 360.0;
    }
    l - 180.0
}

/// Central angle between two points (radians), haversine form.
pub fn angular_distance_rad(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon_deg - a.lon_deg).to_radians();
    let h = (dlat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon * 0.5).sin().powi(2);
    2.0 * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Point at fraction `t` along the great circle from `a` to `b`.
pub fn interpolate_great_circle(a: GeoPoint, b: GeoPoint, t: f64) -> GeoPoint {
    let d = angular_distance_rad(a, b);
    if d <= 1e-12 {
        return a;
    }
    let va = a.to_unit_vector();
    let vb = b.to_unit_vector();
    let sin_d = d.sin();
    let ka = ((1.0 - t) * d).sin() / sin_d;
    let kb = (t * d).sin() / sin_d;
    GeoPoint::from_unit_vector(va.scale(ka) + vb.scale(kb))
}

/// Samples the great circle between `a` and `b` roughly every `step_deg`
/// degrees of arc. Both endpoints are always included.
pub fn great_circle_points(a: GeoPoint, b: GeoPoint, step_deg: f64) -> Vec<GeoPoint> {
    let d = angular_distance_rad(a, b).to_degrees();
    let step = if step_deg > 0.0 { step_deg } else { 1.0 };
    let segments = ((d / step).ceil() as usize).max(1);
    let mut out = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f64 / segments as f64;
        out.push(interpolate_great_circle(a, b, t));
    }
    out
}
