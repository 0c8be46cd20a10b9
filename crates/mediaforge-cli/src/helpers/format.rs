// crates/mediaforge-cli/src/helpers/format.rs
//
// Terminal string utilities that don't belong in mediaforge-core.
//
// Time and duration formatting lives in mediaforge_core::helpers::time; use
// those for anything involving seconds. This module only deals with laying
// text out in a fixed-width terminal line.

/// Shortens `text` to at most `max_chars` characters, ending in "…" when
/// anything was cut. Counts chars, not bytes, so it never splits a codepoint.
pub fn fit_label(text: &str, max_chars: usize) -> String {
    const ELLIPSIS: &str = "…";
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    // Reserve one slot for the ellipsis character itself.
    let keep = max_chars - 1;
    text.chars().take(keep).collect::<String>() + ELLIPSIS
}

/// `[#####-----]` style bar, `width` cells wide. Out-of-range and NaN
/// fractions are clamped.
pub fn progress_bar(fraction: f32, width: usize) -> String {
    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    let filled = ((fraction * width as f32).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// Bits per second as `"850 kb/s"` / `"12.4 Mb/s"`; `"n/a"` when unknown.
pub fn bit_rate(bps: i64) -> String {
    match bps {
        b if b <= 0         => "n/a".to_string(),
        b if b < 1_000_000  => format!("{} kb/s", b / 1000),
        b                   => format!("{:.1} Mb/s", b as f64 / 1_000_000.0),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(progress_bar(0.0, 4),  "[----]");
        assert_eq!(progress_bar(0.5, 4),  "[##--]");
        assert_eq!(progress_bar(1.0, 4),  "[####]");
    }

    #[test]
    fn bar_clamps_garbage() {
        assert_eq!(progress_bar(f32::NAN, 3), "[---]");
        assert_eq!(progress_bar(7.0, 3),      "[###]");
        assert_eq!(progress_bar(-1.0, 3),     "[---]");
    }

    #[test]
    fn bit_rate_units() {
        assert_eq!(bit_rate(0),          "n/a");
        assert_eq!(bit_rate(850_000),    "850 kb/s");
        assert_eq!(bit_rate(12_400_000), "12.4 Mb/s");
    }
}
