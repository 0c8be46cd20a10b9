// crates/mediaforge-media/src/probe.rs
//
// In-process FFmpeg probing: duration, first video codec, container summary.
// Header reads only; nothing here decodes frames.

use std::path::Path;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec;
use ffmpeg::format::input;
use ffmpeg::media::Type;
use tracing::{debug, warn};

use mediaforge_core::cascade::SourceCodec;
use mediaforge_core::media_types::MediaInfo;

use crate::error::{MediaError, Result};

/// Container duration in seconds, falling back to the best video (or audio)
/// stream's own duration. Errors when neither is known.
pub fn probe_duration(path: &Path) -> Result<f64> {
    let ctx = input(path).map_err(|e| MediaError::open(path, e))?;
    let dur = ctx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
    if dur > 0.0 {
        debug!("duration {dur:.2}s <- {}", path.display());
        return Ok(dur);
    }

    if let Some(stream) = ctx.streams().best(Type::Video).or_else(|| ctx.streams().best(Type::Audio)) {
        let d = stream.duration() as f64 * f64::from(stream.time_base());
        if d > 0.0 {
            return Ok(d);
        }
    }
    Err(MediaError::InvalidInput(format!("duration unknown for '{}'", path.display())))
}

/// Codec id of the first video stream, or `None` if there is no video.
pub fn video_codec_id(path: &Path) -> Result<Option<codec::Id>> {
    let ctx = input(path).map_err(|e| MediaError::open(path, e))?;
    let id = ctx
        .streams()
        .find(|s| s.parameters().medium() == Type::Video)
        .map(|s| s.parameters().id());
    Ok(id)
}

/// True only when the file opens and its first video stream is HEVC.
pub fn is_hevc(path: &Path) -> bool {
    match video_codec_id(path) {
        Ok(id) => id == Some(codec::Id::HEVC),
        Err(e) => {
            warn!("codec check failed: {e}");
            false
        }
    }
}

pub fn source_codec(id: codec::Id) -> SourceCodec {
    match id {
        codec::Id::H264 => SourceCodec::H264,
        codec::Id::HEVC => SourceCodec::Hevc,
        _               => SourceCodec::Other,
    }
}

/// Stream frame rate, if the container reports a sane one.
pub(crate) fn stream_fps(stream: &ffmpeg::format::stream::Stream<'_>) -> Option<f64> {
    let r = stream.avg_frame_rate();
    if r.numerator() > 0 && r.denominator() > 0 {
        Some(f64::from(r))
    } else {
        None
    }
}

/// Bitrate of one stream from its codec parameters; 0 when unknown.
pub(crate) fn stream_bit_rate(stream: &ffmpeg::format::stream::Stream<'_>) -> i64 {
    unsafe { (*stream.parameters().as_ptr()).bit_rate }
}

/// Summary for the `probe` command.
pub fn probe_info(path: &Path) -> Result<MediaInfo> {
    let ctx = input(path).map_err(|e| MediaError::open(path, e))?;
    let mut info = MediaInfo {
        duration: (ctx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)).max(0.0),
        format:   ctx.format().name().to_string(),
        bit_rate: ctx.bit_rate(),
        ..MediaInfo::default()
    };

    if let Some(stream) = ctx.streams().find(|s| s.parameters().medium() == Type::Video) {
        let params = stream.parameters();
        info.video_codec = Some(params.id().name().to_string());
        info.fps = stream_fps(&stream);
        if let Ok(video) = codec::context::Context::from_parameters(params).and_then(|c| c.decoder().video()) {
            info.width  = video.width();
            info.height = video.height();
        }
    }

    if let Some(stream) = ctx.streams().find(|s| s.parameters().medium() == Type::Audio) {
        let params = stream.parameters();
        info.audio_codec = Some(params.id().name().to_string());
        if let Ok(audio) = codec::context::Context::from_parameters(params).and_then(|c| c.decoder().audio()) {
            info.sample_rate = audio.rate();
            info.channels    = audio.ch_layout().channels() as u16;
        }
    }

    if info.duration <= 0.0 {
        info.duration = probe_duration(path).unwrap_or(0.0);
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_ids_map_to_cascade_families() {
        assert_eq!(source_codec(codec::Id::H264), SourceCodec::H264);
        assert_eq!(source_codec(codec::Id::HEVC), SourceCodec::Hevc);
        assert_eq!(source_codec(codec::Id::VP9),  SourceCodec::Other);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        ffmpeg::init().unwrap();
        let err = probe_duration(Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert!(matches!(err, MediaError::Open { .. }));
        assert!(!is_hevc(Path::new("/definitely/not/here.mp4")));
    }
}
