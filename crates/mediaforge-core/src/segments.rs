// crates/mediaforge-core/src/segments.rs
//
// Cut-point list and the segments derived from it.
//
// Cut points are kept sorted and at least CUT_TOLERANCE apart. N cut points
// always yield N+1 contiguous segments over [0, duration); a cut beyond the
// end of the file produces an empty trailing segment, which export skips.

use serde::{Deserialize, Serialize};

use crate::helpers::time::format_clock;

/// Minimum spacing between two cut points, in seconds.
pub const CUT_TOLERANCE: f64 = 0.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CutPoint {
    pub time: f64,
    /// Free-form label; empty unless the user gave one.
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start:          f64,
    pub end:            f64,
    pub name:           String,
    pub export_enabled: bool,
}

impl Segment {
    pub fn new(start: f64, end: f64, name: impl Into<String>) -> Self {
        Self { start, end, name: name.into(), export_enabled: true }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.duration() <= 0.0
    }

    /// Enabled and non-empty.
    pub fn is_exportable(&self) -> bool {
        self.export_enabled && !self.is_empty()
    }
}

// ── CutList ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CutList {
    points: Vec<CutPoint>,
}

impl CutList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cut at `time` seconds. Returns false, leaving the list as is,
    /// for negative or non-finite times and for times within
    /// [`CUT_TOLERANCE`] of an existing cut.
    pub fn add(&mut self, time: f64) -> bool {
        self.add_named(time, String::new())
    }

    pub fn add_named(&mut self, time: f64, name: impl Into<String>) -> bool {
        if !time.is_finite() || time < 0.0 {
            return false;
        }
        let idx = self.points.partition_point(|p| p.time < time);
        let near = |i: usize| self.points.get(i).is_some_and(|p| (p.time - time).abs() < CUT_TOLERANCE);
        if near(idx) || (idx > 0 && near(idx - 1)) {
            return false;
        }
        self.points.insert(idx, CutPoint { time, name: name.into() });
        true
    }

    /// Remove the cut at `index`; out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<CutPoint> {
        (index < self.points.len()).then(|| self.points.remove(index))
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[CutPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Contiguous segments tiling `[0, duration)`.
    ///
    /// ```
    /// use mediaforge_core::segments::CutList;
    /// let mut cuts = CutList::new();
    /// cuts.add(30.0);
    /// let segs = cuts.segments(90.0);
    /// assert_eq!(segs.len(), 2);
    /// assert_eq!(segs[0].name, "Segment 1: 00:00:00 - 00:00:30");
    /// assert_eq!(segs[1].name, "Segment 2: 00:00:30 - 00:01:30");
    /// ```
    pub fn segments(&self, duration: f64) -> Vec<Segment> {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        if self.points.is_empty() {
            return vec![Segment::new(0.0, duration, "Full Video")];
        }

        let bounds: Vec<f64> = std::iter::once(0.0)
            .chain(self.points.iter().map(|p| p.time.min(duration)))
            .chain(std::iter::once(duration))
            .collect();

        bounds
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let name = format!("Segment {}: {} - {}", i + 1, format_clock(w[0]), format_clock(w[1]));
                Segment::new(w[0], w[1], name)
            })
            .collect()
    }
}

/// File stem for an exported segment: `base_HH-MM-SS_to_HH-MM-SS`.
///
/// ```
/// use mediaforge_core::segments::segment_file_stem;
/// assert_eq!(segment_file_stem("holiday", 0.0, 75.5), "holiday_00-00-00_to_00-01-15");
/// ```
pub fn segment_file_stem(base: &str, start: f64, end: f64) -> String {
    let start = format_clock(start).replace(':', "-");
    let end   = format_clock(end).replace(':', "-");
    format!("{base}_{start}_to_{end}")
}
