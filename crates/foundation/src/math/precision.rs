//! Precision policies.
//!
//! Fixed-point formatting used for emitted path coordinates.

/// Canonicalize a floating-point value before formatting.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        // Handles +0.0 and -0.0.
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Formats `v` with at most `decimals` fractional digits, trimming trailing
/// zeros so equal geometry always serializes to the same text.
pub fn format_fixed(v: f64, decimals: usize) -> String {
    let v = canonical_f64(v);
    let mut s = format!("{v:.decimals$}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}
