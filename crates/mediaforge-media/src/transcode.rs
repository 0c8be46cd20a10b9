// crates/mediaforge-media/src/transcode.rs
//
// FFmpeg implementation of the scheduler's Transcoder: one blocking call per
// job attempt, run on a scheduler worker thread.
//
// Stream layout in the output:
//   Stream 0: HEVC video (first encoder in the cascade that opens)
//   Stream 1: AAC audio (only if the input has audio)
// Other input streams (subtitles, data) are dropped.
//
// Failure classes:
//   Setup     anything before the first packet is read (opening input and
//             output, picking codecs, writing the header). Never retried.
//   Pipeline  anything after. Tagged with whether a hardware codec was in
//             use so the scheduler can decide on the software retry.
//
// Timestamps:
//   Video frames keep their decoder PTS rescaled into the encoder timebase;
//   missing or non-increasing values are synthesized by FrameClock. Every
//   packet then passes through the stream's TimestampGuard on its way to the
//   muxer (helpers::mux::write_packet).

use std::path::Path;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::format::context::{Input, Output};
use ffmpeg::format::{self, input, Pixel};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::{decoder, encoder, rescale, Packet, Rational, Rescale};
use tracing::{debug, info, warn};

use mediaforge_core::bitrate::{gop_size, target_bitrate, VideoShape};
use mediaforge_core::cascade::{self, DecoderCandidate, EncoderCandidate};
use mediaforge_core::naming::container_for_path;
use mediaforge_core::timestamps::{progress_fraction, FrameClock, TimestampGuard};
use mediaforge_core::{Attempt, PipelineHooks, TranscodeError, TranscodeRequest, Transcoder};

use crate::audio::AudioStage;
use crate::error::{FfmpegResultExt, MediaError, Result};
use crate::helpers::mux::{parameters_from_encoder, StreamContext};
use crate::probe::{is_hevc, source_codec, stream_bit_rate, stream_fps};

// ── Transcoder ────────────────────────────────────────────────────────────────

/// HEVC re-encoder backed by the linked FFmpeg libraries.
/// `ffmpeg::init()` must have been called once before use.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegTranscoder;

impl Transcoder for FfmpegTranscoder {
    fn target_name(&self) -> &str {
        "H.265"
    }

    fn is_target_codec(&self, input: &Path) -> bool {
        is_hevc(input)
    }

    fn transcode(&self, req: &TranscodeRequest, hooks: &PipelineHooks<'_>) -> std::result::Result<Attempt, TranscodeError> {
        let mut pipeline = Pipeline::open(req).map_err(|e| TranscodeError::Setup(e.to_string()))?;
        let hardware = pipeline.video.hardware();
        pipeline.run(hooks).map_err(|f| TranscodeError::Pipeline {
            stage:   f.stage,
            message: f.error.to_string(),
            hardware,
        })?;
        Ok(pipeline.attempt())
    }
}

// ── Stage-tagged failures ─────────────────────────────────────────────────────

struct Failure {
    stage: &'static str,
    error: MediaError,
}

trait StageExt<T> {
    fn stage(self, stage: &'static str) -> std::result::Result<T, Failure>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: &'static str) -> std::result::Result<T, Failure> {
        self.map_err(|error| Failure { stage, error })
    }
}

// ── Video stage ───────────────────────────────────────────────────────────────

struct VideoStage {
    ctx:          StreamContext<decoder::Video, encoder::video::Video>,
    decoder_name: String,
    encoder_name: String,
    decoder_hw:   bool,
    encoder_hw:   bool,
    /// Format and size the encoder was opened with.
    target:       (Pixel, u32, u32),
    /// Built on the first frame that does not already match `target`;
    /// rebuilt if the decoded format or size changes mid-stream.
    scaler:       Option<(ScaleCtx, (Pixel, u32, u32))>,
    clock:        FrameClock,
}

/// Encoder-side pixel format. QSV and AMF want NV12; everything else here
/// takes planar 4:2:0.
fn encoder_pixel_format(name: &str) -> Pixel {
    if name.ends_with("_qsv") || name.ends_with("_amf") {
        Pixel::NV12
    } else {
        Pixel::YUV420P
    }
}

fn open_video_decoder(
    stream:    &format::stream::Stream<'_>,
    candidate: &DecoderCandidate,
) -> Result<decoder::Video> {
    let ctx = codec::context::Context::from_parameters(stream.parameters()).ctx("video decoder parameters")?;
    match candidate {
        DecoderCandidate::Native => ctx.decoder().video().ctx("open native decoder"),
        DecoderCandidate::Hardware(name) => {
            let codec = decoder::find_by_name(name)
                .ok_or_else(|| MediaError::InvalidInput(format!("{name} not built in")))?;
            ctx.decoder()
                .open_as(codec)
                .and_then(|opened| opened.video())
                .ctx(format!("open {name}"))
        }
    }
}

struct EncoderSetup<'a> {
    width:         u32,
    height:        u32,
    aspect:        Rational,
    frame_rate:    Option<Rational>,
    in_tb:         Rational,
    shape:         &'a VideoShape,
    global_header: bool,
}

fn open_video_encoder(candidate: &EncoderCandidate, s: &EncoderSetup<'_>) -> Result<(encoder::video::Video, Rational, Pixel)> {
    let codec = encoder::find_by_name(&candidate.name)
        .ok_or_else(|| MediaError::InvalidInput(format!("{} not built in", candidate.name)))?;

    let mut enc = codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .ctx("create video encoder context")?;

    let pixel = encoder_pixel_format(&candidate.name);
    enc.set_width(s.width);
    enc.set_height(s.height);
    enc.set_aspect_ratio(s.aspect);
    enc.set_format(pixel);

    let enc_tb = match s.frame_rate {
        Some(rate) => {
            enc.set_frame_rate(Some(rate));
            rate.invert()
        }
        None => s.in_tb,
    };
    enc.set_time_base(enc_tb);
    enc.set_bit_rate(target_bitrate(s.shape) as usize);
    enc.set_gop(gop_size(s.shape.fps));
    if s.global_header {
        enc.set_flags(codec::Flags::GLOBAL_HEADER);
    }

    let opened = enc
        .open_as_with(codec, ffmpeg::Dictionary::new())
        .ctx(format!("open {}", candidate.name))?;
    Ok((opened, enc_tb, pixel))
}

impl VideoStage {
    fn open(ictx: &Input, octx: &mut Output, req: &TranscodeRequest, global_header: bool) -> Result<Self> {
        let stream = ictx
            .streams()
            .find(|s| s.parameters().medium() == MediaType::Video)
            .ok_or_else(|| MediaError::no_stream(&req.input, "video"))?;
        let in_index = stream.index();
        let in_tb    = stream.time_base();
        let codec_id = stream.parameters().id();

        // ── Decoder cascade ───────────────────────────────────────────────────
        let candidates = cascade::decoder_candidates(source_codec(codec_id), req.mode);
        let (dec_choice, decoder) = cascade::first_success(candidates, |c| open_video_decoder(&stream, c))
            .map_err(|tried| MediaError::NoCodec { kind: "video decoder", tried })?;
        let decoder_name = match &dec_choice {
            DecoderCandidate::Hardware(name) => name.to_string(),
            DecoderCandidate::Native         => codec_id.name().to_string(),
        };

        // ── Encoder cascade ───────────────────────────────────────────────────
        let fps = stream_fps(&stream);
        let source_bitrate = match stream_bit_rate(&stream) {
            0 => ictx.bit_rate(),
            n => n,
        };
        let shape = VideoShape { width: decoder.width(), height: decoder.height(), fps, source_bitrate };
        let frame_rate = {
            let r = stream.avg_frame_rate();
            (r.numerator() > 0 && r.denominator() > 0).then_some(r)
        };
        let setup = EncoderSetup {
            width:  decoder.width(),
            height: decoder.height(),
            aspect: decoder.aspect_ratio(),
            frame_rate,
            in_tb,
            shape:  &shape,
            global_header,
        };

        let candidates = cascade::encoder_candidates(&req.encoder, req.mode);
        let (enc_choice, (encoder, enc_tb, pixel)) = cascade::first_success(candidates, |c| open_video_encoder(c, &setup))
            .map_err(|tried| MediaError::NoCodec { kind: "HEVC encoder", tried })?;

        let mut ost = octx.add_stream(encoder::find(CodecId::None)).ctx("add video stream")?;
        ost.set_time_base(enc_tb);
        let out_index = ost.index();
        parameters_from_encoder(octx, out_index, encoder.as_ptr() as *mut _, "avcodec_parameters_from_context (video)")?;

        info!(
            "video: {decoder_name} -> {} ({}x{}, {} kb/s, gop {})",
            enc_choice.name,
            shape.width,
            shape.height,
            target_bitrate(&shape) / 1000,
            gop_size(fps),
        );

        Ok(Self {
            ctx: StreamContext {
                decoder,
                encoder,
                in_index,
                out_index,
                in_tb,
                enc_tb,
                out_tb: enc_tb,
                guard: TimestampGuard::new(),
            },
            decoder_hw:   dec_choice.is_hardware(),
            encoder_hw:   enc_choice.hardware,
            decoder_name,
            encoder_name: enc_choice.name,
            target:       (pixel, shape.width, shape.height),
            scaler:       None,
            clock:        FrameClock::new(),
        })
    }

    fn hardware(&self) -> bool {
        self.decoder_hw || self.encoder_hw
    }

    fn push_packet(&mut self, packet: &Packet, octx: &mut Output) -> std::result::Result<(), Failure> {
        self.ctx.decoder.send_packet(packet).ctx("send video packet to decoder").stage("decode")?;
        self.drain_decoder(octx)
    }

    fn finish_decoding(&mut self, octx: &mut Output) -> std::result::Result<(), Failure> {
        self.ctx.decoder.send_eof().ctx("send EOF to video decoder").stage("decode")?;
        self.drain_decoder(octx)
    }

    fn drain_decoder(&mut self, octx: &mut Output) -> std::result::Result<(), Failure> {
        let mut decoded = VideoFrame::empty();
        while self.ctx.decoder.receive_frame(&mut decoded).is_ok() {
            self.encode_frame(&mut decoded, octx)?;
        }
        Ok(())
    }

    fn encode_frame(&mut self, decoded: &mut VideoFrame, octx: &mut Output) -> std::result::Result<(), Failure> {
        let source_pts = decoded
            .timestamp()
            .or_else(|| decoded.pts())
            .map(|pts| pts.rescale(self.ctx.in_tb, self.ctx.enc_tb));
        let pts = self.clock.stamp(source_pts);

        let key = (decoded.format(), decoded.width(), decoded.height());
        let frame = if key == self.target {
            decoded.set_pts(Some(pts));
            decoded.set_kind(ffmpeg::picture::Type::None);
            &*decoded
        } else {
            if self.scaler.as_ref().map(|(_, k)| *k) != Some(key) {
                let (pixel, width, height) = self.target;
                let sc = ScaleCtx::get(key.0, key.1, key.2, pixel, width, height, ScaleFlags::BILINEAR)
                    .ctx("create swscale context")
                    .stage("convert")?;
                debug!("video: converting {:?} {}x{} -> {:?}", key.0, key.1, key.2, pixel);
                self.scaler = Some((sc, key));
            }
            let mut converted = VideoFrame::empty();
            if let Some((sc, _)) = self.scaler.as_mut() {
                sc.run(decoded, &mut converted).ctx("scale video frame").stage("convert")?;
            }
            converted.set_pts(Some(pts));
            *decoded = converted;
            &*decoded
        };

        self.ctx.encoder.send_frame(frame).ctx("send video frame to encoder").stage("encode")?;
        self.ctx.drain_encoder(octx).stage("mux")
    }
}

/// Called after the output context (and its file) was dropped.
fn remove_created_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed {} after failed setup", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {e}", path.display()),
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

struct Pipeline {
    ictx:     Input,
    octx:     Output,
    video:    VideoStage,
    audio:    Option<AudioStage>,
    /// Container duration in AV_TIME_BASE units; ≤ 0 when unknown.
    duration: i64,
}

impl Pipeline {
    fn open(req: &TranscodeRequest) -> Result<Self> {
        let ictx = input(&req.input).map_err(|e| MediaError::open(&req.input, e))?;
        let container = container_for_path(&req.output);
        let octx = format::output_as(&req.output, container)
            .map_err(|e| MediaError::open(&req.output, e))?;

        // From here on the output file is ours; a failed setup removes it.
        match Self::open_streams(ictx, octx, req) {
            Ok(pipeline) => {
                debug!(container, output = %req.output.display(), "output opened");
                Ok(pipeline)
            }
            Err(e) => {
                remove_created_output(&req.output);
                Err(e)
            }
        }
    }

    fn open_streams(ictx: Input, mut octx: Output, req: &TranscodeRequest) -> Result<Self> {
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let mut video = VideoStage::open(&ictx, &mut octx, req, global_header)?;
        let mut audio = AudioStage::open(&ictx, &mut octx, &req.input, global_header)?;

        octx.write_header().ctx("write output header")?;
        video.ctx.sync_out_tb(&octx);
        if let Some(a) = audio.as_mut() {
            a.ctx.sync_out_tb(&octx);
        }
        Ok(Self { duration: ictx.duration(), ictx, octx, video, audio })
    }

    fn run(&mut self, hooks: &PipelineHooks<'_>) -> std::result::Result<(), Failure> {
        let Self { ictx, octx, video, audio, duration } = self;

        for result in ictx.packets() {
            hooks.wait_while_paused();

            let (stream, packet) = result.ctx("read packet").stage("demux")?;
            let index = stream.index();

            if let Some(ts) = packet.pts().or_else(|| packet.dts()) {
                let micros = ts.rescale(stream.time_base(), rescale::TIME_BASE);
                if let Some(fraction) = progress_fraction(micros, *duration) {
                    hooks.report_progress(fraction);
                }
            }

            if index == video.ctx.in_index {
                video.push_packet(&packet, octx)?;
            } else if let Some(a) = audio.as_mut().filter(|a| a.ctx.in_index == index) {
                a.push_packet(&packet, octx).stage("audio")?;
            }
        }

        video.finish_decoding(octx)?;
        if let Some(a) = audio.as_mut() {
            a.finish_decoding(octx).stage("audio")?;
        }
        video.ctx.flush_encoder(octx).stage("encode")?;
        if let Some(a) = audio.as_mut() {
            a.ctx.flush_encoder(octx).stage("audio")?;
        }
        octx.write_trailer().ctx("write trailer").stage("mux")?;
        hooks.report_progress(1.0);
        Ok(())
    }

    fn attempt(&self) -> Attempt {
        Attempt {
            decoder:  self.video.decoder_name.clone(),
            encoder:  self.video.encoder_name.clone(),
            hardware: self.video.hardware(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_core::{DecodeMode, EncoderPreference};
    use std::path::PathBuf;

    #[test]
    fn pixel_format_by_encoder_family() {
        assert_eq!(encoder_pixel_format("hevc_qsv"),   Pixel::NV12);
        assert_eq!(encoder_pixel_format("hevc_amf"),   Pixel::NV12);
        assert_eq!(encoder_pixel_format("hevc_nvenc"), Pixel::YUV420P);
        assert_eq!(encoder_pixel_format("libx265"),    Pixel::YUV420P);
    }

    #[test]
    fn missing_input_is_a_setup_error() {
        ffmpeg::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.mp4"), b"keep").unwrap();
        let req = TranscodeRequest {
            input:   PathBuf::from("/definitely/not/here.mp4"),
            output:  dir.path().join("out.mp4"),
            encoder: EncoderPreference::Auto,
            mode:    DecodeMode::Auto,
        };
        let progress = |_: f32| {};
        let paused   = || false;
        let hooks    = PipelineHooks { progress: &progress, paused: &paused };

        let err = FfmpegTranscoder.transcode(&req, &hooks).unwrap_err();
        assert!(matches!(err, TranscodeError::Setup(_)));
        assert!(!err.is_retryable());
        assert!(!err.may_have_written_output());
        assert_eq!(std::fs::read(&req.output).unwrap(), b"keep");
        assert!(!FfmpegTranscoder.is_target_codec(&req.input));
    }
}
