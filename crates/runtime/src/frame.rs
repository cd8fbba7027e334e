use foundation::time::Time;

/// Animation frame metadata.
///
/// Transitions are stepped only from frames, never from wall-clock reads, so
/// a recorded frame sequence replays to identical element state.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Time since the previous frame (seconds).
    pub dt_s: f64,
    /// Engine time at the start of the frame (seconds).
    pub time: Time,
}

impl Frame {
    /// Fixed-step frame `index` of a `dt_s` clock.
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time(index as f64 * dt_s),
        }
    }

    /// First frame at an arbitrary host timestamp.
    pub fn at(time: Time) -> Self {
        Self {
            index: 0,
            dt_s: 0.0,
            time,
        }
    }

    pub fn next(self) -> Self {
        self.advance(self.dt_s)
    }

    /// Next frame after a variable step, as delivered by animation-frame
    /// callbacks. Negative steps are treated as zero.
    pub fn advance(self, dt_s: f64) -> Self {
        let dt_s = dt_s.max(0.0);
        Self {
            index: self.index + 1,
            dt_s,
            time: self.time.after(dt_s),
        }
    }

    /// Next frame at host timestamp `ms` (e.g. `requestAnimationFrame`).
    pub fn advance_to_ms(self, ms: f64) -> Self {
        let t = Time::from_ms(ms);
        self.advance(t.0 - self.time.0)
    }
}
