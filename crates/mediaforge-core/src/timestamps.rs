// crates/mediaforge-core/src/timestamps.rs
//
// Timestamp repair for muxed packets and synthesized frame clocks.
// All values are in whatever timebase the caller works in; nothing here
// rescales.

/// Corrected (pts, dts) pair ready for the muxer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stamps {
    pub pts: i64,
    pub dts: i64,
}

/// Per-output-stream guard that keeps DTS strictly increasing and PTS >= DTS.
///
/// Hardware encoders and some demuxers hand back duplicate or missing
/// timestamps; muxers reject those outright.
#[derive(Clone, Debug, Default)]
pub struct TimestampGuard {
    last_dts: Option<i64>,
}

impl TimestampGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_dts(&self) -> Option<i64> {
        self.last_dts
    }

    /// Repair one packet's timestamps.
    ///
    /// * missing DTS takes the PTS; missing both continue from the last DTS
    /// * DTS <= last → last + 1
    /// * PTS < DTS (or missing) → DTS
    ///
    /// ```
    /// use mediaforge_core::timestamps::{Stamps, TimestampGuard};
    /// let mut g = TimestampGuard::new();
    /// assert_eq!(g.fix(Some(10), Some(10)), Stamps { pts: 10, dts: 10 });
    /// assert_eq!(g.fix(Some(12), Some(10)), Stamps { pts: 12, dts: 11 });
    /// assert_eq!(g.fix(Some(5),  Some(12)), Stamps { pts: 12, dts: 12 });
    /// ```
    pub fn fix(&mut self, pts: Option<i64>, dts: Option<i64>) -> Stamps {
        let mut dts = match (dts, pts, self.last_dts) {
            (Some(d), _, _)          => d,
            (None, Some(p), _)       => p,
            (None, None, Some(last)) => last + 1,
            (None, None, None)       => 0,
        };
        if let Some(last) = self.last_dts {
            if dts <= last {
                dts = last + 1;
            }
        }
        let pts = pts.map_or(dts, |p| p.max(dts));
        self.last_dts = Some(dts);
        Stamps { pts, dts }
    }
}

/// Hands out a strictly increasing presentation timestamp per frame, taking
/// the decoder's value when it is usable and synthesizing one otherwise.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    last: Option<i64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&mut self, pts: Option<i64>) -> i64 {
        let next = match (pts, self.last) {
            (Some(p), Some(last)) if p > last => p,
            (Some(p), None)                   => p,
            (_, Some(last))                   => last + 1,
            (None, None)                      => 0,
        };
        self.last = Some(next);
        next
    }
}

/// Fraction of the input consumed, given a packet time and the container
/// duration in the same unit. `None` if the duration is unknown.
///
/// ```
/// use mediaforge_core::timestamps::progress_fraction;
/// assert_eq!(progress_fraction(5_000_000, 10_000_000), Some(0.5));
/// assert_eq!(progress_fraction(-3, 10), Some(0.0));
/// assert_eq!(progress_fraction(5, 0), None);
/// ```
pub fn progress_fraction(position: i64, duration: i64) -> Option<f32> {
    if duration <= 0 {
        return None;
    }
    Some((position as f64 / duration as f64).clamp(0.0, 1.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrected_stream_is_strictly_increasing() {
        let raw = [
            (Some(0), Some(0)),
            (Some(3), Some(1)),
            (Some(2), Some(1)),
            (None, None),
            (Some(1), Some(-5)),
            (Some(9), None),
            (Some(9), Some(9)),
        ];
        let mut g = TimestampGuard::new();
        let mut prev: Option<i64> = None;
        for (pts, dts) in raw {
            let s = g.fix(pts, dts);
            assert!(s.pts >= s.dts, "{s:?}");
            if let Some(p) = prev {
                assert!(s.dts > p, "{s:?} after {p}");
            }
            prev = Some(s.dts);
        }
        assert_eq!(g.last_dts(), Some(10));
    }

    #[test]
    fn untouched_when_already_valid() {
        let mut g = TimestampGuard::new();
        for i in 0..5 {
            assert_eq!(g.fix(Some(i * 2 + 1), Some(i * 2)), Stamps { pts: i * 2 + 1, dts: i * 2 });
        }
    }

    #[test]
    fn frame_clock_synthesizes_missing_and_backwards() {
        let mut c = FrameClock::new();
        assert_eq!(c.stamp(None), 0);
        assert_eq!(c.stamp(Some(100)), 100);
        assert_eq!(c.stamp(Some(100)), 101);
        assert_eq!(c.stamp(None), 102);
        assert_eq!(c.stamp(Some(50)), 103);
        assert_eq!(c.stamp(Some(200)), 200);
    }

    #[test]
    fn progress_clamps_above_one() {
        assert_eq!(progress_fraction(20, 10), Some(1.0));
    }
}
