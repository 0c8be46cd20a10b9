// crates/mediaforge-core/src/bitrate.rs
//
// Target bitrate and GOP size for the HEVC encoder.
//
// Piecewise-linear in pixel count between fixed reference resolutions,
// proportional outside them, scaled by frame rate and capped relative to the
// source so a re-encode never grows a file it was meant to shrink.

/// (pixels, bits/s) reference points at 30 fps, ascending.
const REFERENCE: [(f64, f64); 4] = [
    (1280.0 * 720.0,   2_000_000.0),
    (1920.0 * 1080.0,  4_000_000.0),
    (2560.0 * 1440.0,  7_500_000.0),
    (3840.0 * 2160.0, 15_000_000.0),
];

/// Fraction of a known source bitrate the target may not exceed.
pub const SOURCE_CAP: f64 = 0.7;

const FALLBACK_FPS: f64 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoShape {
    pub width:  u32,
    pub height: u32,
    /// Frames per second; `None` or non-positive when the container does not say.
    pub fps:    Option<f64>,
    /// Source bitrate in bits/s; 0 when unknown.
    pub source_bitrate: i64,
}

/// Bits per second for a 30 fps stream of `pixels` pixels.
fn base_for_pixels(pixels: f64) -> f64 {
    let (first_px, first_rate) = REFERENCE[0];
    if pixels <= first_px {
        return first_rate * pixels / first_px;
    }
    for pair in REFERENCE.windows(2) {
        let (p0, r0) = pair[0];
        let (p1, r1) = pair[1];
        if pixels <= p1 {
            return r0 + (r1 - r0) * (pixels - p0) / (p1 - p0);
        }
    }
    let (last_px, last_rate) = REFERENCE[REFERENCE.len() - 1];
    last_rate * pixels / last_px
}

fn usable_fps(fps: Option<f64>) -> Option<f64> {
    fps.filter(|f| f.is_finite() && *f > 0.0)
}

/// Target encoder bitrate in bits/s. Always at least 1.
///
/// ```
/// use mediaforge_core::bitrate::{target_bitrate, VideoShape};
/// let shape = VideoShape { width: 1920, height: 1080, fps: Some(30.0), source_bitrate: 0 };
/// assert_eq!(target_bitrate(&shape), 4_000_000);
/// ```
pub fn target_bitrate(shape: &VideoShape) -> i64 {
    let pixels = f64::from(shape.width) * f64::from(shape.height);
    let factor = usable_fps(shape.fps).map_or(1.0, |f| (f / FALLBACK_FPS).clamp(0.5, 2.5));
    let mut rate = base_for_pixels(pixels) * factor;
    if shape.source_bitrate > 0 {
        rate = rate.min(shape.source_bitrate as f64 * SOURCE_CAP);
    }
    (rate.round() as i64).max(1)
}

/// Two seconds of frames, at least 1.
pub fn gop_size(fps: Option<f64>) -> u32 {
    let fps = usable_fps(fps).unwrap_or(FALLBACK_FPS);
    ((fps * 2.0).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(width: u32, height: u32) -> VideoShape {
        VideoShape { width, height, fps: Some(30.0), source_bitrate: 0 }
    }

    #[test]
    fn reference_points_hit_exactly() {
        assert_eq!(target_bitrate(&shape(1280, 720)),  2_000_000);
        assert_eq!(target_bitrate(&shape(2560, 1440)), 7_500_000);
        assert_eq!(target_bitrate(&shape(3840, 2160)), 15_000_000);
    }

    #[test]
    fn monotone_in_pixel_count() {
        let sizes = [(320, 240), (640, 360), (1280, 720), (1600, 900), (1920, 1080),
                     (2560, 1440), (3000, 2000), (3840, 2160), (7680, 4320)];
        let rates: Vec<i64> = sizes.iter().map(|&(w, h)| target_bitrate(&shape(w, h))).collect();
        assert!(rates.windows(2).all(|w| w[0] < w[1]), "{rates:?}");
    }

    #[test]
    fn extrapolates_proportionally() {
        assert_eq!(target_bitrate(&shape(640, 360)), 500_000);
        assert_eq!(target_bitrate(&shape(7680, 4320)), 60_000_000);
    }

    #[test]
    fn fps_scales_within_bounds() {
        let mut s = shape(1920, 1080);
        s.fps = Some(60.0);
        assert_eq!(target_bitrate(&s), 8_000_000);
        s.fps = Some(240.0);
        assert_eq!(target_bitrate(&s), 10_000_000);
        s.fps = Some(5.0);
        assert_eq!(target_bitrate(&s), 2_000_000);
        s.fps = None;
        assert_eq!(target_bitrate(&s), 4_000_000);
    }

    #[test]
    fn never_above_seventy_percent_of_source() {
        let mut s = shape(1920, 1080);
        s.source_bitrate = 3_000_000;
        assert_eq!(target_bitrate(&s), 2_100_000);
        s.source_bitrate = 50_000_000;
        assert_eq!(target_bitrate(&s), 4_000_000);
    }

    #[test]
    fn gop_is_two_seconds() {
        assert_eq!(gop_size(Some(29.97)), 60);
        assert_eq!(gop_size(Some(25.0)), 50);
        assert_eq!(gop_size(None), 60);
        assert_eq!(gop_size(Some(0.1)), 1);
        assert_eq!(gop_size(Some(f64::NAN)), 60);
    }
}
