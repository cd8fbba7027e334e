use core::fmt;
use core::str::FromStr;

/// sRGB color with straight alpha.
///
/// Only the CSS forms the map engine emits or commonly receives are
/// understood: `#rgb`, `#rrggbb`, `rgb(r, g, b)` and `rgba(r, g, b, a)`.
/// Named colors are passed through as opaque strings by callers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorParseError(pub String);

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized color: {}", self.0)
    }
}

impl std::error::Error for ColorParseError {}

impl Rgba {
    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn lerp(self, other: Rgba, t: f64) -> Rgba {
        Rgba {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// `#rrggbb` when opaque, `rgba(...)` otherwise.
    pub fn to_css(&self) -> String {
        let r = channel(self.r);
        let g = channel(self.g);
        let b = channel(self.b);
        let a = self.a.clamp(0.0, 1.0);
        if a >= 1.0 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            let a = (a * 1000.0).round() / 1000.0;
            format!("rgba({r}, {g}, {b}, {a})")
        }
    }
}

fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn hex_digit(c: u8) -> Option<f64> {
    (c as char).to_digit(16).map(|d| d as f64)
}

fn parse_hex(s: &str) -> Option<Rgba> {
    let bytes = s.as_bytes();
    match bytes.len() {
        3 => {
            let r = hex_digit(bytes[0])?;
            let g = hex_digit(bytes[1])?;
            let b = hex_digit(bytes[2])?;
            Some(Rgba::rgb(r * 17.0, g * 17.0, b * 17.0))
        }
        6 => {
            let pair = |i: usize| -> Option<f64> {
                Some(hex_digit(bytes[i])? * 16.0 + hex_digit(bytes[i + 1])?)
            };
            Some(Rgba::rgb(pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}

fn parse_func(body: &str, with_alpha: bool) -> Option<Rgba> {
    let parts: Vec<f64> = body
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match (with_alpha, parts.as_slice()) {
        (false, [r, g, b]) => Some(Rgba::rgb(*r, *g, *b)),
        (true, [r, g, b, a]) => Some(Rgba {
            r: *r,
            g: *g,
            b: *b,
            a: *a,
        }),
        _ => None,
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_lowercase();
        let parsed = if let Some(hex) = t.strip_prefix('#') {
            parse_hex(hex)
        } else if let Some(body) = t.strip_prefix("rgba(").and_then(|r| r.strip_suffix(')')) {
            parse_func(body, true)
        } else if let Some(body) = t.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
            parse_func(body, false)
        } else {
            None
        };
        parsed.ok_or_else(|| ColorParseError(s.to_string()))
    }
}

/// Interpolates two CSS color strings. Returns `None` when either side is not
/// a color this module understands.
pub fn lerp_css(from: &str, to: &str, t: f64) -> Option<String> {
    let a: Rgba = from.parse().ok()?;
    let b: Rgba = to.parse().ok()?;
    Some(a.lerp(b, t).to_css())
}

#[cfg(test)]
mod tests {
    use super::{Rgba, lerp_css};

    #[test]
    fn parses_hex_forms() {
        assert_eq!("#fff".parse::<Rgba>().unwrap(), Rgba::rgb(255.0, 255.0, 255.0));
        assert_eq!("#ABDDA4".parse::<Rgba>().unwrap(), Rgba::rgb(171.0, 221.0, 164.0));
        assert!("#abcd".parse::<Rgba>().is_err());
        assert!("blue".parse::<Rgba>().is_err());
    }

    #[test]
    fn parses_functional_forms() {
        let c: Rgba = "rgba(250, 15, 160, 0.2)".parse().unwrap();
        assert_eq!(c.a, 0.2);
        assert_eq!(c.to_css(), "rgba(250, 15, 160, 0.2)");
        assert_eq!("rgb(0,0,0)".parse::<Rgba>().unwrap().to_css(), "#000000");
    }

    #[test]
    fn interpolates_midpoint() {
        assert_eq!(lerp_css("#000000", "#ffffff", 0.5).as_deref(), Some("#808080"));
        assert_eq!(lerp_css("#000", "tomato", 0.5), None);
    }
}
