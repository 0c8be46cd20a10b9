// crates/mediaforge-core/src/cascade.rs
//
// Ordered codec candidate lists and the "first one that opens wins" driver.
//
// Candidates are plain names; mediaforge-media turns each into an FFmpeg
// decoder/encoder open attempt. Nothing here links FFmpeg.

use std::fmt;

use tracing::debug;

use crate::job::EncoderPreference;
use crate::transcode::DecodeMode;

const H264_HW_DECODERS: [&str; 2] = ["h264_cuvid", "h264_qsv"];
const HEVC_HW_DECODERS: [&str; 2] = ["hevc_cuvid", "hevc_qsv"];

/// Hardware HEVC encoders by priority: NVIDIA, Intel, AMD.
pub const HW_ENCODERS: [&str; 3] = ["hevc_nvenc", "hevc_qsv", "hevc_amf"];
pub const SOFTWARE_ENCODER: &str = "libx265";

const HW_SUFFIXES: [&str; 8] = [
    "_cuvid", "_nvenc", "_qsv", "_amf", "_vaapi", "_videotoolbox", "_v4l2m2m", "_mf",
];

/// Input video codec as far as decoder selection cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceCodec {
    H264,
    Hevc,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecoderCandidate {
    Hardware(&'static str),
    /// FFmpeg's default decoder for the stream's codec id.
    Native,
}

impl DecoderCandidate {
    pub fn is_hardware(&self) -> bool {
        matches!(self, DecoderCandidate::Hardware(_))
    }
}

impl fmt::Display for DecoderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderCandidate::Hardware(name) => f.write_str(name),
            DecoderCandidate::Native         => f.write_str("native"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderCandidate {
    pub name:     String,
    pub hardware: bool,
}

impl EncoderCandidate {
    fn named(name: &str) -> Self {
        Self { name: name.to_string(), hardware: is_hardware_name(name) }
    }
}

impl fmt::Display for EncoderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// True for FFmpeg codec names that wrap a GPU / fixed-function block.
///
/// ```
/// use mediaforge_core::cascade::is_hardware_name;
/// assert!(is_hardware_name("hevc_nvenc"));
/// assert!(!is_hardware_name("libx265"));
/// ```
pub fn is_hardware_name(name: &str) -> bool {
    HW_SUFFIXES.iter().any(|s| name.ends_with(s))
}

pub fn decoder_candidates(codec: SourceCodec, mode: DecodeMode) -> Vec<DecoderCandidate> {
    let hw: &[&'static str] = match (mode, codec) {
        (DecodeMode::Software, _)   => &[],
        (_, SourceCodec::H264)      => &H264_HW_DECODERS,
        (_, SourceCodec::Hevc)      => &HEVC_HW_DECODERS,
        (_, SourceCodec::Other)     => &[],
    };
    hw.iter()
        .map(|&n| DecoderCandidate::Hardware(n))
        .chain(std::iter::once(DecoderCandidate::Native))
        .collect()
}

/// Explicit preference first (if allowed in this mode), then the default
/// order. In Software mode hardware names are dropped, including a hardware
/// preference.
pub fn encoder_candidates(pref: &EncoderPreference, mode: DecodeMode) -> Vec<EncoderCandidate> {
    let mut out: Vec<EncoderCandidate> = Vec::with_capacity(5);
    let mut push = |name: &str| {
        if mode == DecodeMode::Software && is_hardware_name(name) {
            return;
        }
        if !out.iter().any(|c| c.name == name) {
            out.push(EncoderCandidate::named(name));
        }
    };

    if let EncoderPreference::Named(name) = pref {
        push(name);
    }
    for name in HW_ENCODERS {
        push(name);
    }
    push(SOFTWARE_ENCODER);
    out
}

/// Try each candidate in order and return the first that opens, with the
/// value `attempt` produced. On total failure returns every miss as
/// `"name: reason"`.
pub fn first_success<C, T, E>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: impl FnMut(&C) -> Result<T, E>,
) -> Result<(C, T), Vec<String>>
where
    C: fmt::Display,
    E: fmt::Display,
{
    let mut misses = Vec::new();
    for candidate in candidates {
        match attempt(&candidate) {
            Ok(value) => return Ok((candidate, value)),
            Err(e) => {
                debug!("cascade: {candidate} unavailable: {e}");
                misses.push(format!("{candidate}: {e}"));
            }
        }
    }
    Err(misses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(c: &[EncoderCandidate]) -> Vec<&str> {
        c.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn auto_decoders_try_hardware_then_native() {
        assert_eq!(
            decoder_candidates(SourceCodec::H264, DecodeMode::Auto),
            [DecoderCandidate::Hardware("h264_cuvid"), DecoderCandidate::Hardware("h264_qsv"), DecoderCandidate::Native]
        );
        assert_eq!(decoder_candidates(SourceCodec::Hevc, DecodeMode::Auto)[0], DecoderCandidate::Hardware("hevc_cuvid"));
        assert_eq!(decoder_candidates(SourceCodec::Other, DecodeMode::Auto), [DecoderCandidate::Native]);
    }

    #[test]
    fn software_mode_forces_native_decoder() {
        assert_eq!(decoder_candidates(SourceCodec::H264, DecodeMode::Software), [DecoderCandidate::Native]);
    }

    #[test]
    fn auto_encoder_order() {
        let c = encoder_candidates(&EncoderPreference::Auto, DecodeMode::Auto);
        assert_eq!(names(&c), ["hevc_nvenc", "hevc_qsv", "hevc_amf", "libx265"]);
        assert!(c[0].hardware);
        assert!(!c[3].hardware);
    }

    #[test]
    fn preference_goes_first_without_duplicates() {
        let pref = EncoderPreference::Named("hevc_amf".into());
        let c = encoder_candidates(&pref, DecodeMode::Auto);
        assert_eq!(names(&c), ["hevc_amf", "hevc_nvenc", "hevc_qsv", "libx265"]);

        let pref = EncoderPreference::Named("hevc_vaapi".into());
        assert_eq!(encoder_candidates(&pref, DecodeMode::Auto)[0].name, "hevc_vaapi");
    }

    #[test]
    fn software_mode_drops_hardware_encoders() {
        let hw = EncoderPreference::Named("hevc_nvenc".into());
        assert_eq!(names(&encoder_candidates(&hw, DecodeMode::Software)), ["libx265"]);

        let sw = EncoderPreference::Named("libkvazaar".into());
        assert_eq!(names(&encoder_candidates(&sw, DecodeMode::Software)), ["libkvazaar", "libx265"]);
    }

    #[test]
    fn first_success_stops_at_first_open() {
        let mut tried = Vec::new();
        let result = first_success(["a", "b", "c"], |c| {
            tried.push(*c);
            if *c == "b" { Ok(2) } else { Err("nope") }
        });
        assert_eq!(result, Ok(("b", 2)));
        assert_eq!(tried, ["a", "b"]);
    }

    #[test]
    fn first_success_reports_every_miss() {
        let result: Result<(&str, ()), _> = first_success(["x", "y"], |_| Err("missing"));
        assert_eq!(result.unwrap_err(), ["x: missing", "y: missing"]);
    }
}
