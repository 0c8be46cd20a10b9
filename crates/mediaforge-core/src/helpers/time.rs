// crates/mediaforge-core/src/helpers/time.rs
//
// Shared time-formatting utilities used by the segment planner (segment names,
// export file stems) and the CLI (probe / progress output).

/// Format seconds as `HH:MM:SS`, truncating any fractional part.
///
/// Used for segment names and, with `:` swapped for `-`, segment file stems.
/// Negative and non-finite inputs render as `00:00:00`.
///
/// ```
/// use mediaforge_core::helpers::time::format_clock;
/// assert_eq!(format_clock(0.0),    "00:00:00");
/// assert_eq!(format_clock(61.9),   "00:01:01");
/// assert_eq!(format_clock(3725.0), "01:02:05");
/// ```
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Parse `SS`, `MM:SS` or `HH:MM:SS` (seconds may carry a fraction) into
/// seconds. Returns `None` for anything else, including negative values.
///
/// ```
/// use mediaforge_core::helpers::time::parse_clock;
/// assert_eq!(parse_clock("90"),        Some(90.0));
/// assert_eq!(parse_clock("1:30.5"),    Some(90.5));
/// assert_eq!(parse_clock("01:00:00"),  Some(3600.0));
/// assert_eq!(parse_clock("1:2:3:4"),   None);
/// ```
pub fn parse_clock(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let (last, whole) = parts.split_last()?;
    let secs: f64 = last.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let mut total = 0.0;
    for p in whole {
        let v: u32 = p.parse().ok()?;
        total = (total + f64::from(v)) * 60.0;
    }
    Some(total + secs)
}

/// Format a duration in seconds as a compact human-readable string.
///
/// | Range         | Format       | Example   |
/// |---------------|--------------|-----------|
/// | ≥ 3600 s      | `H:MM:SS`    | `1:04:35` |
/// | ≥ 60 s        | `M:SS`       | `3:07`    |
/// | < 60 s        | `S.Xs`       | `4.2s`    |
///
/// ```
/// use mediaforge_core::helpers::time::format_duration;
/// assert_eq!(format_duration(4.2),    "4.2s");
/// assert_eq!(format_duration(187.0),  "3:07");
/// assert_eq!(format_duration(3875.0), "1:04:35");
/// ```
pub fn format_duration(secs: f64) -> String {
    let secs = secs.max(0.0);
    let whole = secs as u64;
    if secs >= 3600.0 {
        format!("{}:{:02}:{:02}", whole / 3600, (whole % 3600) / 60, whole % 60)
    } else if secs >= 60.0 {
        format!("{}:{:02}", whole / 60, whole % 60)
    } else {
        format!("{secs:.1}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_truncates_fraction() {
        assert_eq!(format_clock(59.999), "00:00:59");
    }

    #[test]
    fn clock_rejects_garbage() {
        assert_eq!(format_clock(-3.0), "00:00:00");
        assert_eq!(format_clock(f64::NAN), "00:00:00");
    }

    #[test]
    fn clock_past_a_day_keeps_counting_hours() {
        assert_eq!(format_clock(90_000.0), "25:00:00");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_clock(""), None);
        assert_eq!(parse_clock("-5"), None);
        assert_eq!(parse_clock("a:10"), None);
        assert_eq!(parse_clock("inf"), None);
        assert_eq!(parse_clock(" 2:00 "), Some(120.0));
    }

    #[test]
    fn duration_negative_clamps() {
        assert_eq!(format_duration(-1.0), "0.0s");
    }
}
