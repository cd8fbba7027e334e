use foundation::color::lerp_css;

/// Presentation attributes of a visual element. `None` means "not set" and
/// is omitted from serialized output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Style {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub stroke_opacity: Option<f64>,
    pub fill_opacity: Option<f64>,
    pub opacity: Option<f64>,
    pub filter: Option<String>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub stroke_linecap: Option<String>,
    /// Drawn fraction of a stroked path, `1.0` when fully drawn.
    pub dash_progress: Option<f64>,
}

impl Style {
    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    pub fn with_stroke(mut self, stroke: impl Into<String>, width: f64) -> Self {
        self.stroke = Some(stroke.into());
        self.stroke_width = Some(width);
        self
    }

    pub fn lerp(&self, to: &Style, t: f64) -> Style {
        Style {
            fill: lerp_color(&self.fill, &to.fill, t),
            stroke: lerp_color(&self.stroke, &to.stroke, t),
            stroke_width: lerp_num(self.stroke_width, to.stroke_width, t),
            stroke_opacity: lerp_num(self.stroke_opacity, to.stroke_opacity, t),
            fill_opacity: lerp_num(self.fill_opacity, to.fill_opacity, t),
            opacity: lerp_num(self.opacity, to.opacity, t),
            filter: switch_at_end(&self.filter, &to.filter, t),
            font_size: lerp_num(self.font_size, to.font_size, t),
            font_family: switch_at_end(&self.font_family, &to.font_family, t),
            stroke_linecap: switch_at_end(&self.stroke_linecap, &to.stroke_linecap, t),
            dash_progress: lerp_num(self.dash_progress, to.dash_progress, t),
        }
    }
}

pub fn lerp_f64(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_num(a: Option<f64>, b: Option<f64>, t: f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if t >= 1.0 { b } else { lerp_f64(a, b, t) }),
        _ => switch_at_end(&a, &b, t),
    }
}

fn lerp_color(a: &Option<String>, b: &Option<String>, t: f64) -> Option<String> {
    if t >= 1.0 {
        return b.clone();
    }
    match (a, b) {
        (Some(a), Some(b)) if a == b => Some(b.clone()),
        (Some(a), Some(b)) => lerp_css(a, b, t).or_else(|| Some(a.clone())),
        _ => a.clone(),
    }
}

fn switch_at_end<T: Clone>(a: &Option<T>, b: &Option<T>, t: f64) -> Option<T> {
    if t >= 1.0 { b.clone() } else { a.clone() }
}
