use foundation::time::{Time, TimeSpan};

use crate::element::VisualState;

/// `delay` then `duration`, both in seconds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransitionSpec {
    pub delay_s: f64,
    pub duration_s: f64,
}

impl TransitionSpec {
    pub const INSTANT: TransitionSpec = TransitionSpec {
        delay_s: 0.0,
        duration_s: 0.0,
    };

    pub fn new(delay_s: f64, duration_s: f64) -> Self {
        Self {
            delay_s: delay_s.max(0.0),
            duration_s: duration_s.max(0.0),
        }
    }

    pub fn from_ms(delay_ms: f64, duration_ms: f64) -> Self {
        Self::new(delay_ms / 1000.0, duration_ms / 1000.0)
    }

    pub fn is_instant(&self) -> bool {
        self.delay_s <= 0.0 && self.duration_s <= 0.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Ease {
    Linear,
    CubicInOut,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::CubicInOut => {
                if t <= 0.5 {
                    let u = 2.0 * t;
                    u * u * u / 2.0
                } else {
                    let u = 2.0 - 2.0 * t;
                    1.0 - u * u * u / 2.0
                }
            }
        }
    }
}

/// What happens to the element once the transition completes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OnEnd {
    Keep,
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: VisualState,
    pub to: VisualState,
    pub span: TimeSpan,
    pub ease: Ease,
    pub on_end: OnEnd,
}

impl Transition {
    pub fn new(from: VisualState, to: VisualState, now: Time, spec: TransitionSpec, on_end: OnEnd) -> Self {
        let start = now.after(spec.delay_s);
        Self {
            from,
            to,
            span: TimeSpan::new(start, start.after(spec.duration_s)),
            ease: Ease::CubicInOut,
            on_end,
        }
    }

    pub fn sample(&self, now: Time) -> VisualState {
        let p = self.span.progress(now);
        if p >= 1.0 {
            return self.to.clone();
        }
        self.from.lerp(&self.to, self.ease.apply(p))
    }

    pub fn is_done(&self, now: Time) -> bool {
        now.0 >= self.span.end.0
    }
}
