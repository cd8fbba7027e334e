/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Time(pub f64); // seconds

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn from_ms(ms: f64) -> Self {
        Time(ms / 1000.0)
    }

    pub fn after(self, seconds: f64) -> Self {
        Time(self.0 + seconds)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeSpan {
    pub start: Time,
    pub end: Time,
}

impl TimeSpan {
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    pub fn instant(t: Time) -> Self {
        Self { start: t, end: t }
    }

    pub fn duration(&self) -> f64 {
        (self.end.0 - self.start.0).max(0.0)
    }

    /// Linear progress of `t` through the span, clamped to `[0, 1]`.
    /// Zero-length spans jump straight to 1 once `t` reaches them.
    pub fn progress(&self, t: Time) -> f64 {
        if t.0 < self.start.0 {
            return 0.0;
        }
        let d = self.duration();
        if d <= 0.0 {
            return 1.0;
        }
        ((t.0 - self.start.0) / d).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{Time, TimeSpan};

    #[test]
    fn progress_clamps_and_handles_instants() {
        let span = TimeSpan::new(Time(1.0), Time(3.0));
        assert_eq!(span.progress(Time(0.0)), 0.0);
        assert_eq!(span.progress(Time(2.0)), 0.5);
        assert_eq!(span.progress(Time(9.0)), 1.0);

        let instant = TimeSpan::instant(Time(1.0));
        assert_eq!(instant.progress(Time(0.5)), 0.0);
        assert_eq!(instant.progress(Time(1.0)), 1.0);
    }

    #[test]
    fn ms_conversion() {
        assert_eq!(Time::from_ms(250.0), Time(0.25));
        assert_eq!(Time(1.0).after(0.5), Time(1.5));
    }
}
