//! Cartographic projections onto viewport pixel space.
//!
//! A `Projection` is a pure value: raw spherical projection, three-axis
//! rotation, then scale/translate into pixels with y pointing down. All
//! angles at the public surface are degrees.

use core::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};
use core::fmt;
use core::str::FromStr;

use super::{GeoPoint, Vec2};
use crate::bounds::Aabb2;

const EPSILON: f64 = 1e-6;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Equirectangular,
    Mercator,
    Orthographic,
    /// Composite conic equal-area with Alaska and Hawaii insets.
    AlbersUsa,
    /// Conic equal-area fitted to an arbitrary region.
    ConicEqualArea,
}

impl ProjectionKind {
    pub fn name(self) -> &'static str {
        match self {
            ProjectionKind::Equirectangular => "equirectangular",
            ProjectionKind::Mercator => "mercator",
            ProjectionKind::Orthographic => "orthographic",
            ProjectionKind::AlbersUsa => "albersUsa",
            ProjectionKind::ConicEqualArea => "conicEqualArea",
        }
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    UnknownKind(String),
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionError::UnknownKind(name) => write!(f, "unknown projection: {name}"),
        }
    }
}

impl std::error::Error for ProjectionError {}

impl FromStr for ProjectionKind {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equirectangular" => Ok(ProjectionKind::Equirectangular),
            "mercator" => Ok(ProjectionKind::Mercator),
            "orthographic" => Ok(ProjectionKind::Orthographic),
            "albersusa" | "albers-usa" | "albers_usa" => Ok(ProjectionKind::AlbersUsa),
            "conicequalarea" | "conic-equal-area" | "conic_equal_area" | "albers" => {
                Ok(ProjectionKind::ConicEqualArea)
            }
            _ => Err(ProjectionError::UnknownKind(s.to_string())),
        }
    }
}

/// Output surface size in pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

/// User-facing projection parameters. Angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionParams {
    pub scale: f64,
    pub translate: [f64; 2],
    /// Geographic point mapped to `translate` (before rotation is applied).
    pub center: [f64; 2],
    /// `[lambda, phi, gamma]`.
    pub rotation: [f64; 3],
    /// Small-circle clip radius around the rotated origin.
    pub clip_angle: Option<f64>,
    /// Standard parallels for the conic family.
    pub parallels: [f64; 2],
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            scale: 150.0,
            translate: [480.0, 250.0],
            center: [0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            clip_angle: None,
            parallels: [29.5, 45.5],
        }
    }
}

/// Circle bounding the visible hemisphere of a clipped azimuthal projection.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SphereOutline {
    pub center: Vec2,
    pub radius: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Raw {
    Equirectangular,
    Mercator,
    Orthographic,
    Conic { n: f64, c: f64, rho0: f64 },
    Cylindrical { cos_phi0: f64 },
}

impl Raw {
    fn conic(parallels: [f64; 2]) -> Raw {
        let phi0 = parallels[0].to_radians();
        let phi1 = parallels[1].to_radians();
        let sin0 = phi0.sin();
        let n = (sin0 + phi1.sin()) * 0.5;
        if n.abs() < EPSILON {
            return Raw::Cylindrical {
                cos_phi0: phi0.cos(),
            };
        }
        let c = 1.0 + sin0 * (2.0 * n - sin0);
        Raw::Conic {
            n,
            c,
            rho0: c.sqrt() / n,
        }
    }

    fn forward(&self, lambda: f64, phi: f64) -> Option<(f64, f64)> {
        let out = match *self {
            Raw::Equirectangular => (lambda, phi),
            Raw::Mercator => (lambda, (FRAC_PI_4 + phi * 0.5).tan().ln()),
            Raw::Orthographic => (phi.cos() * lambda.sin(), phi.sin()),
            Raw::Conic { n, c, rho0 } => {
                let rho = (c - 2.0 * n * phi.sin()).max(0.0).sqrt() / n;
                let a = lambda * n;
                (rho * a.sin(), rho0 - rho * a.cos())
            }
            Raw::Cylindrical { cos_phi0 } => (lambda, phi.sin() / cos_phi0),
        };
        (out.0.is_finite() && out.1.is_finite()).then_some(out)
    }

    fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let out = match *self {
            Raw::Equirectangular => (x, y),
            Raw::Mercator => (x, 2.0 * y.exp().atan() - FRAC_PI_2),
            Raw::Orthographic => {
                let rho = x.hypot(y);
                if rho > 1.0 + EPSILON {
                    return None;
                }
                let c = rho.min(1.0).asin();
                let (sin_c, cos_c) = c.sin_cos();
                let phi = if rho > 0.0 {
                    (y * sin_c / rho).clamp(-1.0, 1.0).asin()
                } else {
                    0.0
                };
                ((x * sin_c).atan2(rho * cos_c), phi)
            }
            Raw::Conic { n, c, rho0 } => {
                let rho0_y = rho0 - y;
                let mut l = x.atan2(rho0_y.abs()) * sign(rho0_y);
                // Past a quarter turn of the cone the angle wraps.
                if rho0_y * n < 0.0 {
                    l -= PI * sign(x) * sign(rho0_y);
                }
                let s = (c - (x * x + rho0_y * rho0_y) * n * n) / (2.0 * n);
                (l / n, s.clamp(-1.0, 1.0).asin())
            }
            Raw::Cylindrical { cos_phi0 } => (x, (y * cos_phi0).clamp(-1.0, 1.0).asin()),
        };
        (out.0.is_finite() && out.1.is_finite()).then_some(out)
    }
}

/// Sign with `sign(0) == 0`, unlike `f64::signum`.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn wrap_pi(lambda: f64) -> f64 {
    if lambda > PI {
        lambda - TAU
    } else if lambda < -PI {
        lambda + TAU
    } else {
        lambda
    }
}

/// Spherical rotation: longitude shift followed by a phi/gamma tilt.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Rotation {
    d_lambda: f64,
    d_phi: f64,
    d_gamma: f64,
}

impl Rotation {
    fn from_degrees(r: [f64; 3]) -> Self {
        Self {
            d_lambda: (r[0] % 360.0).to_radians(),
            d_phi: (r[1] % 360.0).to_radians(),
            d_gamma: (r[2] % 360.0).to_radians(),
        }
    }

    fn has_tilt(&self) -> bool {
        self.d_phi != 0.0 || self.d_gamma != 0.0
    }

    fn forward(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let lambda = wrap_pi(lambda + self.d_lambda);
        if !self.has_tilt() {
            return (lambda, phi);
        }
        let (sin_dp, cos_dp) = self.d_phi.sin_cos();
        let (sin_dg, cos_dg) = self.d_gamma.sin_cos();
        let cos_phi = phi.cos();
        let x = lambda.cos() * cos_phi;
        let y = lambda.sin() * cos_phi;
        let z = phi.sin();
        let k = z * cos_dp + x * sin_dp;
        (
            (y * cos_dg - k * sin_dg).atan2(x * cos_dp - z * sin_dp),
            (k * cos_dg + y * sin_dg).clamp(-1.0, 1.0).asin(),
        )
    }

    fn invert(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let (lambda, phi) = if self.has_tilt() {
            let (sin_dp, cos_dp) = self.d_phi.sin_cos();
            let (sin_dg, cos_dg) = self.d_gamma.sin_cos();
            let cos_phi = phi.cos();
            let x = lambda.cos() * cos_phi;
            let y = lambda.sin() * cos_phi;
            let z = phi.sin();
            let k = z * cos_dg - y * sin_dg;
            (
                (y * cos_dg + z * sin_dg).atan2(x * cos_dp + k * sin_dp),
                (k * cos_dp - x * sin_dp).clamp(-1.0, 1.0).asin(),
            )
        } else {
            (lambda, phi)
        };
        (wrap_pi(lambda - self.d_lambda), phi)
    }
}

/// Single raw projection with rotation, clipping and pixel transform.
#[derive(Debug, Clone, PartialEq)]
struct Simple {
    raw: Raw,
    rotation: Rotation,
    scale: f64,
    dx: f64,
    dy: f64,
    clip_cos: Option<f64>,
}

impl Simple {
    fn new(raw: Raw, params: &ProjectionParams) -> Self {
        let k = params.scale;
        let center = raw
            .forward(
                (params.center[0] % 360.0).to_radians(),
                (params.center[1] % 360.0).to_radians(),
            )
            .unwrap_or((0.0, 0.0));
        Self {
            raw,
            rotation: Rotation::from_degrees(params.rotation),
            scale: k,
            dx: params.translate[0] - center.0 * k,
            dy: params.translate[1] + center.1 * k,
            clip_cos: params.clip_angle.map(|a| a.to_radians().cos()),
        }
    }

    fn project(&self, p: GeoPoint) -> Option<Vec2> {
        let (lambda, phi) = self
            .rotation
            .forward(p.lon_deg.to_radians(), p.lat_deg.to_radians());
        if let Some(cr) = self.clip_cos {
            if lambda.cos() * phi.cos() <= cr {
                return None;
            }
        }
        let (x, y) = self.raw.forward(lambda, phi)?;
        Some(Vec2::new(x * self.scale + self.dx, self.dy - y * self.scale))
    }

    fn invert(&self, p: Vec2) -> Option<GeoPoint> {
        let x = (p.x - self.dx) / self.scale;
        let y = (self.dy - p.y) / self.scale;
        let (lambda, phi) = self.raw.invert(x, y)?;
        let (lambda, phi) = self.rotation.invert(lambda, phi);
        Some(GeoPoint::new(lambda.to_degrees(), phi.to_degrees()))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Inset {
    projection: Simple,
    extent: Aabb2,
}

impl Inset {
    fn project(&self, p: GeoPoint) -> Option<Vec2> {
        let s = self.projection.project(p)?;
        let inside = s.x >= self.extent.min[0]
            && s.x <= self.extent.max[0]
            && s.y >= self.extent.min[1]
            && s.y <= self.extent.max[1];
        inside.then_some(s)
    }
}

/// Lower 48 plus scaled/translated Alaska and Hawaii insets.
#[derive(Debug, Clone, PartialEq)]
struct AlbersUsa {
    scale: f64,
    translate: [f64; 2],
    lower48: Inset,
    alaska: Inset,
    hawaii: Inset,
}

impl AlbersUsa {
    fn new(scale: f64, translate: [f64; 2]) -> Self {
        let k = scale;
        let [x, y] = translate;
        let part = |parallels: [f64; 2], rot: f64, center: [f64; 2], s: f64, t: [f64; 2]| {
            let params = ProjectionParams {
                scale: s,
                translate: t,
                center,
                rotation: [rot, 0.0, 0.0],
                clip_angle: None,
                parallels,
            };
            Simple::new(Raw::conic(parallels), &params)
        };
        let extent = |x0: f64, y0: f64, x1: f64, y1: f64| {
            Aabb2::new([x + x0 * k, y + y0 * k], [x + x1 * k, y + y1 * k])
        };
        Self {
            scale,
            translate,
            lower48: Inset {
                projection: part([29.5, 45.5], 96.0, [-0.6, 38.7], k, [x, y]),
                extent: extent(-0.455, -0.238, 0.455, 0.238),
            },
            alaska: Inset {
                projection: part(
                    [55.0, 65.0],
                    154.0,
                    [-2.0, 58.5],
                    0.35 * k,
                    [x - 0.307 * k, y + 0.201 * k],
                ),
                extent: extent(-0.425, 0.120, -0.214, 0.234),
            },
            hawaii: Inset {
                projection: part(
                    [8.0, 18.0],
                    157.0,
                    [-3.0, 19.9],
                    k,
                    [x - 0.205 * k, y + 0.212 * k],
                ),
                extent: extent(-0.214, 0.166, -0.115, 0.234),
            },
        }
    }

    fn project(&self, p: GeoPoint) -> Option<Vec2> {
        self.lower48
            .project(p)
            .or_else(|| self.alaska.project(p))
            .or_else(|| self.hawaii.project(p))
    }

    fn invert(&self, p: Vec2) -> Option<GeoPoint> {
        let x = (p.x - self.translate[0]) / self.scale;
        let y = (p.y - self.translate[1]) / self.scale;
        let inset = if (0.120..0.234).contains(&y) && (-0.425..-0.214).contains(&x) {
            &self.alaska
        } else if (0.166..0.234).contains(&y) && (-0.214..-0.115).contains(&x) {
            &self.hawaii
        } else {
            &self.lower48
        };
        inset.projection.invert(p)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Inner {
    Simple(Simple),
    AlbersUsa(AlbersUsa),
}

/// Immutable projection value. Rebuild through [`Projection::new`] to change
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    kind: ProjectionKind,
    params: ProjectionParams,
    inner: Inner,
}

impl Projection {
    pub fn new(kind: ProjectionKind, params: ProjectionParams) -> Self {
        let inner = match kind {
            ProjectionKind::Equirectangular => Inner::Simple(Simple::new(Raw::Equirectangular, &params)),
            ProjectionKind::Mercator => Inner::Simple(Simple::new(Raw::Mercator, &params)),
            ProjectionKind::Orthographic => Inner::Simple(Simple::new(Raw::Orthographic, &params)),
            ProjectionKind::ConicEqualArea => {
                Inner::Simple(Simple::new(Raw::conic(params.parallels), &params))
            }
            ProjectionKind::AlbersUsa => {
                Inner::AlbersUsa(AlbersUsa::new(params.scale, params.translate))
            }
        };
        Self {
            kind,
            params,
            inner,
        }
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn params(&self) -> &ProjectionParams {
        &self.params
    }

    pub fn scale(&self) -> f64 {
        self.params.scale
    }

    /// Forward projection. `None` when the point is clipped (far side of a
    /// clipped azimuthal view, outside every Albers USA inset) or not finite.
    pub fn project(&self, p: GeoPoint) -> Option<Vec2> {
        if !p.is_finite() {
            return None;
        }
        match &self.inner {
            Inner::Simple(s) => s.project(p),
            Inner::AlbersUsa(a) => a.project(p),
        }
    }

    pub fn invert(&self, p: Vec2) -> Option<GeoPoint> {
        if !p.is_finite() {
            return None;
        }
        match &self.inner {
            Inner::Simple(s) => s.invert(p),
            Inner::AlbersUsa(a) => a.invert(p),
        }
    }

    /// Outline of the visible globe for clipped projections.
    pub fn sphere_outline(&self) -> Option<SphereOutline> {
        let clip = self.params.clip_angle?;
        let Inner::Simple(s) = &self.inner else {
            return None;
        };
        if self.kind != ProjectionKind::Orthographic {
            return None;
        }
        let radius = s.scale * clip.to_radians().sin().abs();
        Some(SphereOutline {
            center: Vec2::new(s.dx, s.dy),
            radius,
        })
    }

    /// Derives a projection from a scope name and viewport.
    ///
    /// `world` honours the requested kind. `usa` always uses Albers USA and
    /// every other scope a conic equal-area fitted to `bbox`.
    pub fn for_scope(
        scope: &str,
        requested: ProjectionKind,
        viewport: Viewport,
        rotation: [f64; 3],
        bbox: Option<Aabb2>,
    ) -> Projection {
        match scope {
            "usa" => Projection::albers_usa(viewport),
            "world" => match requested {
                ProjectionKind::AlbersUsa => Projection::albers_usa(viewport),
                ProjectionKind::ConicEqualArea => {
                    Projection::fit_conic(bbox.unwrap_or_else(Aabb2::empty), viewport)
                }
                kind => Projection::world(kind, viewport, rotation),
            },
            _ => Projection::fit_conic(bbox.unwrap_or_else(Aabb2::empty), viewport),
        }
    }

    pub fn albers_usa(viewport: Viewport) -> Projection {
        Projection::new(
            ProjectionKind::AlbersUsa,
            ProjectionParams {
                scale: viewport.width,
                translate: [viewport.width / 2.0, viewport.height / 2.0],
                ..ProjectionParams::default()
            },
        )
    }

    pub fn world(kind: ProjectionKind, viewport: Viewport, rotation: [f64; 3]) -> Projection {
        let w = viewport.width;
        let h = viewport.height;
        let params = match kind {
            ProjectionKind::Orthographic => ProjectionParams {
                scale: 250.0,
                translate: [w / 2.0, h / 1.8],
                clip_angle: Some(90.0),
                rotation,
                ..ProjectionParams::default()
            },
            ProjectionKind::Mercator => ProjectionParams {
                scale: (w + 1.0) / 2.0 / PI,
                translate: [w / 2.0, h / 1.45],
                ..ProjectionParams::default()
            },
            _ => ProjectionParams {
                scale: (w + 1.0) / 2.0 / PI,
                translate: [w / 2.0, h / 1.8],
                ..ProjectionParams::default()
            },
        };
        Projection::new(kind, params)
    }

    /// Conic equal-area tuned to `bbox` (lon/lat degrees) and scaled to fill
    /// the viewport with a 5% margin. Empty boxes fall back to the world view.
    pub fn fit_conic(bbox: Aabb2, viewport: Viewport) -> Projection {
        if bbox.is_empty() {
            return Projection::world(ProjectionKind::Equirectangular, viewport, [0.0; 3]);
        }
        let span = bbox.height();
        let mid = bbox.center();
        let mut params = ProjectionParams {
            scale: 1.0,
            translate: [0.0, 0.0],
            center: [0.0, mid.y],
            rotation: [-mid.x, 0.0, 0.0],
            clip_angle: None,
            parallels: [bbox.min[1] + span / 6.0, bbox.max[1] - span / 6.0],
        };
        let unit = Projection::new(ProjectionKind::ConicEqualArea, params.clone());

        const SAMPLES: usize = 16;
        let mut extent = Aabb2::empty();
        for i in 0..=SAMPLES {
            let t = i as f64 / SAMPLES as f64;
            let lon = bbox.min[0] + bbox.width() * t;
            let lat = bbox.min[1] + span * t;
            for p in [
                GeoPoint::new(lon, bbox.min[1]),
                GeoPoint::new(lon, bbox.max[1]),
                GeoPoint::new(bbox.min[0], lat),
                GeoPoint::new(bbox.max[0], lat),
            ] {
                if let Some(s) = unit.project(p) {
                    extent.extend(s.x, s.y);
                }
            }
        }

        let mut k = f64::INFINITY;
        if extent.width() > EPSILON {
            k = k.min(viewport.width / extent.width());
        }
        if extent.height() > EPSILON {
            k = k.min(viewport.height / extent.height());
        }
        if !k.is_finite() {
            k = viewport.width;
        }
        k *= 0.95;

        let ext_mid = if extent.is_empty() {
            Vec2::new(0.0, 0.0)
        } else {
            extent.center()
        };
        let vc = viewport.center();
        params.scale = k;
        params.translate = [vc.x - k * ext_mid.x, vc.y - k * ext_mid.y];
        Projection::new(ProjectionKind::ConicEqualArea, params)
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, Projection, ProjectionKind, ProjectionParams, Viewport};
    use crate::bounds::Aabb2;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn round_trip(p: &Projection, g: GeoPoint) {
        let s = p.project(g).expect("visible");
        let back = p.invert(s).expect("invertible");
        assert_close(back.lon_deg, g.lon_deg, 1e-9);
        assert_close(back.lat_deg, g.lat_deg, 1e-9);
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!("mercator".parse::<ProjectionKind>().unwrap(), ProjectionKind::Mercator);
        assert_eq!("albersUsa".parse::<ProjectionKind>().unwrap(), ProjectionKind::AlbersUsa);
        assert!("winkel3".parse::<ProjectionKind>().is_err());
    }

    #[test]
    fn world_equirectangular_maps_origin_to_translate() {
        let vp = Viewport::new(960.0, 540.0);
        let p = Projection::world(ProjectionKind::Equirectangular, vp, [0.0; 3]);
        let s = p.project(GeoPoint::new(0.0, 0.0)).unwrap();
        assert_close(s.x, 480.0, 1e-9);
        assert_close(s.y, 300.0, 1e-9);

        // 180 degrees east lands half a world-width to the right.
        let e = p.project(GeoPoint::new(180.0, 0.0)).unwrap();
        assert_close(e.x - s.x, (961.0) / 2.0, 1e-9);
    }

    #[test]
    fn round_trips_for_every_kind() {
        let vp = Viewport::new(960.0, 540.0);
        let pts = [
            GeoPoint::new(12.5, 41.9),
            GeoPoint::new(-70.6, -33.4),
            GeoPoint::new(139.7, 35.7),
        ];
        for kind in [ProjectionKind::Equirectangular, ProjectionKind::Mercator] {
            let p = Projection::world(kind, vp, [0.0; 3]);
            for g in pts {
                round_trip(&p, g);
            }
        }
        let tilted = Projection::new(
            ProjectionKind::Equirectangular,
            ProjectionParams {
                rotation: [30.0, 20.0, 10.0],
                ..ProjectionParams::default()
            },
        );
        for g in pts {
            round_trip(&tilted, g);
        }
        let conic = Projection::new(ProjectionKind::ConicEqualArea, ProjectionParams::default());
        for g in pts {
            round_trip(&conic, g);
        }
    }

    #[test]
    fn conic_inverts_past_a_quarter_turn() {
        let southern = Projection::new(
            ProjectionKind::ConicEqualArea,
            ProjectionParams {
                parallels: [-45.0, -30.0],
                ..ProjectionParams::default()
            },
        );
        let northern = Projection::new(ProjectionKind::ConicEqualArea, ProjectionParams::default());
        for g in [
            GeoPoint::new(170.0, -40.0),
            GeoPoint::new(-170.0, -60.0),
            GeoPoint::new(20.0, -35.0),
        ] {
            round_trip(&southern, g);
        }
        round_trip(&northern, GeoPoint::new(175.0, 50.0));
    }

    #[test]
    fn orthographic_clips_far_hemisphere() {
        let vp = Viewport::new(960.0, 540.0);
        let p = Projection::world(ProjectionKind::Orthographic, vp, [97.0, 0.0, 0.0]);
        // Rotation [97, 0] faces longitude -97.
        let near = GeoPoint::new(-97.0, 10.0);
        assert!(p.project(near).is_some());
        round_trip(&p, near);
        assert!(p.project(GeoPoint::new(83.0, 0.0)).is_none());

        let outline = p.sphere_outline().unwrap();
        assert_close(outline.radius, 250.0, 1e-9);
        assert_close(outline.center.x, 480.0, 1e-9);
        assert_close(outline.center.y, 300.0, 1e-9);
    }

    #[test]
    fn albers_usa_routes_insets() {
        let vp = Viewport::new(960.0, 600.0);
        let p = Projection::albers_usa(vp);

        let kansas = GeoPoint::new(-98.6, 39.8);
        let s = p.project(kansas).unwrap();
        assert!(s.x > 300.0 && s.x < 600.0);
        assert!(s.y > 150.0 && s.y < 450.0);
        round_trip(&p, kansas);

        let honolulu = GeoPoint::new(-157.8, 21.3);
        let h = p.project(honolulu).unwrap();
        // Hawaii sits in the lower-left inset.
        assert!(h.x < 480.0 && h.y > 300.0);
        round_trip(&p, honolulu);

        assert!(p.project(GeoPoint::new(2.35, 48.85)).is_none());
    }

    #[test]
    fn fitted_conic_fills_viewport() {
        let vp = Viewport::new(800.0, 450.0);
        let bbox = Aabb2::new([5.9, 47.3], [15.0, 55.1]);
        let p = Projection::for_scope("deu", ProjectionKind::Mercator, vp, [0.0; 3], Some(bbox));
        assert_eq!(p.kind(), ProjectionKind::ConicEqualArea);

        let c = p.project(GeoPoint::new(10.45, 51.2)).unwrap();
        assert_close(c.x, 400.0, 40.0);
        assert_close(c.y, 225.0, 40.0);
        for corner in [GeoPoint::new(5.9, 47.3), GeoPoint::new(15.0, 55.1)] {
            let s = p.project(corner).unwrap();
            assert!(s.x >= 0.0 && s.x <= 800.0, "{s:?}");
            assert!(s.y >= 0.0 && s.y <= 450.0, "{s:?}");
        }
    }

    #[test]
    fn regional_scopes_ignore_requested_kind() {
        let vp = Viewport::new(960.0, 540.0);
        let usa = Projection::for_scope("usa", ProjectionKind::Orthographic, vp, [0.0; 3], None);
        assert_eq!(usa.kind(), ProjectionKind::AlbersUsa);
        let empty = Projection::for_scope("xyz", ProjectionKind::Mercator, vp, [0.0; 3], None);
        assert_eq!(empty.kind(), ProjectionKind::Equirectangular);
        assert!(empty.project(GeoPoint::new(0.0, 0.0)).is_some());
    }
}
