// crates/mediaforge-media/src/helpers/seek.rs
//
// Seek helper shared by every stream-copy path. A failed seek is a soft
// failure: the demuxer keeps reading from wherever it is and the caller's
// end-time check still bounds the copy.

use ffmpeg_the_third as ffmpeg;
use tracing::warn;

/// Seek `ictx` to the keyframe at or before `target_secs`.
///
/// Returns `true` if the seek succeeded or was skipped because the target is
/// the start of the file, `false` if ffmpeg refused it.
///
/// The seek is backward (`..=seek_ts`) so a segment that starts mid-GOP still
/// gets the keyframe its first frames depend on; stream copy cannot start on
/// anything else.
pub fn seek_to_secs(
    ictx:        &mut ffmpeg::format::context::Input,
    target_secs: f64,
    label:       &str,
) -> bool {
    if target_secs <= 0.0 || !target_secs.is_finite() {
        return true;
    }

    let seek_ts = (target_secs * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
    match ictx.seek(seek_ts, ..=seek_ts) {
        Ok(()) => true,
        Err(e) => {
            warn!("seek soft-fail in {label} at {target_secs:.3}s: {e}, copying from current position");
            false
        }
    }
}
