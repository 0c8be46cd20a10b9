// crates/mediaforge-media/src/audio.rs
//
// Audio half of the transcode pipeline: native decoder → swresample →
// planar FIFO → AAC encoder.
//
// AAC wants exactly `frame_size` samples per input frame (1024 in practice).
// Decoded audio arrives in arbitrary chunk sizes, so everything is pushed into
// a float-planar FIFO and popped back out in encoder-sized frames. Output PTS
// is the running sample count in the encoder's 1/rate timebase, which keeps
// audio gap-free no matter what the source timestamps look like.

use std::path::Path;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::context::{Input, Output};
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::{Packet, Rational};
use tracing::{debug, info};

use mediaforge_core::timestamps::TimestampGuard;

use crate::error::{FfmpegResultExt, MediaError, Result};
use crate::helpers::mux::{parameters_from_encoder, StreamContext};

/// AAC target bitrate, bits/s.
pub const AUDIO_BIT_RATE: usize = 128_000;

const TARGET_FORMAT: Sample = Sample::F32(SampleType::Planar);

/// Output layouts the AAC encoder is given, by source channel count.
/// Anything other than mono, 5.1 or 7.1 is folded down to stereo.
pub(crate) fn target_layout(channels: u32) -> (ChannelLayout<'static>, ChannelLayoutMask) {
    match channels {
        1 => (ChannelLayout::MONO,     ChannelLayoutMask::MONO),
        6 => (ChannelLayout::_5POINT1, ChannelLayoutMask::_5POINT1),
        8 => (ChannelLayout::_7POINT1, ChannelLayoutMask::_7POINT1),
        _ => (ChannelLayout::STEREO,   ChannelLayoutMask::STEREO),
    }
}

// ── Audio FIFO ────────────────────────────────────────────────────────────────

/// Float-planar sample buffer, one Vec per channel.
pub(crate) struct AudioFifo {
    planes: Vec<Vec<f32>>,
}

impl AudioFifo {
    pub fn new(channels: usize) -> Self {
        Self { planes: vec![Vec::new(); channels.max(1)] }
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Samples buffered per channel.
    pub fn len(&self) -> usize {
        self.planes[0].len()
    }

    pub fn push_planes(&mut self, planes: &[&[f32]]) {
        for (dst, src) in self.planes.iter_mut().zip(planes) {
            dst.extend_from_slice(src);
        }
    }

    /// Append one FLTP frame with the FIFO's channel count.
    pub fn push_frame(&mut self, frame: &AudioFrame) {
        let n = frame.samples();
        if n == 0 {
            return;
        }
        let channels = self.channels().min(frame.planes());
        for ch in 0..channels {
            let bytes = frame.data(ch);
            let samples = unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const f32, n) };
            self.planes[ch].extend_from_slice(samples);
        }
    }

    /// Remove up to `n` samples per channel from the front; the returned
    /// planes are exactly `n` long, zero-padded when the FIFO ran short.
    pub fn pop_planes(&mut self, n: usize) -> Vec<Vec<f32>> {
        let available = self.len().min(n);
        self.planes
            .iter_mut()
            .map(|plane| {
                let mut out: Vec<f32> = plane.drain(..available).collect();
                out.resize(n, 0.0);
                out
            })
            .collect()
    }
}

/// Pull the resampler's delayed samples into `fifo` until it runs dry.
pub(crate) fn drain_resampler(
    rs:         &mut resampling::Context,
    fifo:       &mut AudioFifo,
    frame_size: usize,
    rate:       u32,
    mask:       ChannelLayoutMask,
) -> Result<()> {
    loop {
        let mut tail = AudioFrame::new(TARGET_FORMAT, frame_size, mask);
        tail.set_rate(rate);
        rs.flush(&mut tail).ctx("flush audio resampler")?;
        if tail.samples() == 0 {
            return Ok(());
        }
        debug!(samples = tail.samples(), "audio: resampler tail");
        fifo.push_frame(&tail);
    }
}

// ── Audio stage ───────────────────────────────────────────────────────────────

pub(crate) struct AudioStage {
    pub ctx:        StreamContext<ffmpeg::decoder::Audio, ffmpeg::encoder::Audio>,
    resampler:      Option<resampling::Context>,
    fifo:           AudioFifo,
    frame_size:     usize,
    rate:           u32,
    layout:         ChannelLayout<'static>,
    mask:           ChannelLayoutMask,
    /// Next output frame's PTS in samples.
    next_pts:       i64,
}

impl AudioStage {
    /// Set up decoding and AAC encoding for the first audio stream, adding an
    /// output stream to `octx`. `Ok(None)` when the input has no audio.
    pub fn open(ictx: &Input, octx: &mut Output, path: &Path, global_header: bool) -> Result<Option<Self>> {
        let Some(stream) = ictx.streams().find(|s| s.parameters().medium() == MediaType::Audio) else {
            info!("no audio stream in {}, output will be video only", path.display());
            return Ok(None);
        };
        let in_index = stream.index();
        let in_tb    = stream.time_base();

        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .ctx("audio decoder parameters")?
            .decoder()
            .audio()
            .ctx("open audio decoder")?;

        let rate = decoder.rate();
        if rate == 0 {
            return Err(MediaError::InvalidInput(format!("audio stream in '{}' has no sample rate", path.display())));
        }
        let (layout, mask) = target_layout(decoder.ch_layout().channels());
        let enc_tb = Rational::new(1, rate as i32);

        let aac = encoder::find(CodecId::AAC)
            .ok_or_else(|| MediaError::NoCodec { kind: "audio encoder", tried: vec!["aac: not built in".into()] })?;
        let mut enc = codec::context::Context::new_with_codec(aac)
            .encoder()
            .audio()
            .ctx("create audio encoder context")?;
        enc.set_rate(rate as i32);
        enc.set_ch_layout(layout.clone());
        enc.set_format(TARGET_FORMAT);
        enc.set_bit_rate(AUDIO_BIT_RATE);
        enc.set_time_base(enc_tb);
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let encoder = enc.open_as_with(aac, ffmpeg::Dictionary::new()).ctx("open AAC encoder")?;
        let frame_size = match encoder.frame_size() as usize {
            0 => 1024,
            n => n,
        };

        let mut ost = octx.add_stream(encoder::find(CodecId::None)).ctx("add audio stream")?;
        ost.set_time_base(enc_tb);
        let out_index = ost.index();
        parameters_from_encoder(octx, out_index, encoder.as_ptr() as *mut _, "avcodec_parameters_from_context (audio)")?;

        debug!(rate, channels = layout.channels(), frame_size, "audio: aac");
        Ok(Some(Self {
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
            resampler: None,
            fifo: AudioFifo::new(layout.channels() as usize),
            frame_size,
            rate,
            layout,
            mask,
            next_pts: 0,
        }))
    }

    pub fn push_packet(&mut self, packet: &Packet, octx: &mut Output) -> Result<()> {
        self.ctx.decoder.send_packet(packet).ctx("send audio packet to decoder")?;
        self.drain_decoder(octx)
    }

    /// EOF the decoder and push its tail through, collect the samples the
    /// resampler still holds, then encode whatever the FIFO holds,
    /// zero-padding the last frame.
    pub fn finish_decoding(&mut self, octx: &mut Output) -> Result<()> {
        self.ctx.decoder.send_eof().ctx("send EOF to audio decoder")?;
        self.drain_decoder(octx)?;
        if let Some(rs) = self.resampler.as_mut() {
            drain_resampler(rs, &mut self.fifo, self.frame_size, self.rate, self.mask)?;
        }
        self.drain_fifo(octx, true)
    }

    fn drain_decoder(&mut self, octx: &mut Output) -> Result<()> {
        let mut raw = AudioFrame::empty();
        while self.ctx.decoder.receive_frame(&mut raw).is_ok() {
            self.buffer(&raw)?;
            self.drain_fifo(octx, false)?;
        }
        Ok(())
    }

    fn buffer(&mut self, raw: &AudioFrame) -> Result<()> {
        let needs_resample = raw.format() != TARGET_FORMAT
            || raw.rate() != self.rate
            || raw.ch_layout().channels() != self.layout.channels();
        if !needs_resample {
            self.fifo.push_frame(raw);
            return Ok(());
        }

        if self.resampler.is_none() {
            // Mono sources must be declared as MONO or swr misreads the layout.
            let src_layout = if raw.ch_layout().channels() >= 2 { raw.ch_layout() } else { ChannelLayout::MONO };
            let rs = resampling::Context::get2(
                raw.format(), src_layout,         raw.rate(),
                TARGET_FORMAT, self.layout.clone(), self.rate,
            )
            .ctx("create audio resampler")?;
            self.resampler = Some(rs);
        }
        if let Some(rs) = self.resampler.as_mut() {
            let mut resampled = AudioFrame::empty();
            rs.run(raw, &mut resampled).ctx("resample audio")?;
            self.fifo.push_frame(&resampled);
        }
        Ok(())
    }

    fn drain_fifo(&mut self, octx: &mut Output, flush: bool) -> Result<()> {
        while self.fifo.len() >= self.frame_size || (flush && self.fifo.len() > 0) {
            let planes = self.fifo.pop_planes(self.frame_size);
            let mut frame = AudioFrame::new(TARGET_FORMAT, self.frame_size, self.mask);
            frame.set_rate(self.rate);
            frame.set_pts(Some(self.next_pts));
            for (ch, plane) in planes.iter().enumerate() {
                let bytes = frame.data_mut(ch);
                let dst = unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut f32, self.frame_size) };
                dst.copy_from_slice(plane);
            }
            self.next_pts += self.frame_size as i64;

            self.ctx.encoder.send_frame(&frame).ctx("send audio frame to encoder")?;
            self.ctx.drain_encoder(octx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_follow_channel_count() {
        assert_eq!(target_layout(1).0.channels(), 1);
        assert_eq!(target_layout(2).0.channels(), 2);
        assert_eq!(target_layout(6).0.channels(), 6);
        assert_eq!(target_layout(8).0.channels(), 8);
        assert_eq!(target_layout(4).0.channels(), 2);
    }

    #[test]
    fn fifo_rechunks_and_pads() {
        let mut fifo = AudioFifo::new(2);
        fifo.push_planes(&[&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0]]);
        fifo.push_planes(&[&[4.0], &[-4.0]]);
        assert_eq!(fifo.len(), 4);

        let first = fifo.pop_planes(3);
        assert_eq!(first, vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]]);
        assert_eq!(fifo.len(), 1);

        let tail = fifo.pop_planes(3);
        assert_eq!(tail, vec![vec![4.0, 0.0, 0.0], vec![-4.0, 0.0, 0.0]]);
        assert_eq!(fifo.len(), 0);
    }

    #[test]
    fn resampler_tail_reaches_the_fifo() {
        ffmpeg::init().unwrap();
        let packed = Sample::I16(SampleType::Packed);
        let (layout, mask) = target_layout(2);
        let mut rs = resampling::Context::get2(packed, layout.clone(), 48_000, TARGET_FORMAT, layout, 44_100).unwrap();

        let mut input = AudioFrame::new(packed, 1024, mask);
        input.set_rate(48_000);
        input.data_mut(0).fill(0);
        let mut converted = AudioFrame::empty();
        rs.run(&input, &mut converted).unwrap();

        let mut fifo = AudioFifo::new(2);
        fifo.push_frame(&converted);
        let before = fifo.len();

        drain_resampler(&mut rs, &mut fifo, 1024, 44_100, mask).unwrap();
        assert!(fifo.len() > before);

        // Dry afterwards.
        let after = fifo.len();
        drain_resampler(&mut rs, &mut fifo, 1024, 44_100, mask).unwrap();
        assert_eq!(fifo.len(), after);
    }

    #[test]
    fn fifo_never_has_zero_planes() {
        let fifo = AudioFifo::new(0);
        assert_eq!(fifo.channels(), 1);
        assert_eq!(fifo.len(), 0);
    }
}
