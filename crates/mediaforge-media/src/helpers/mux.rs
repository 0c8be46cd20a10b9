// crates/mediaforge-media/src/helpers/mux.rs
//
// Per-stream bookkeeping shared by the video and audio halves of the
// transcode pipeline, plus the single place packets reach the muxer.
//
// Every packet written by the pipeline goes through `write_packet`, which
// rescales encoder → stream timebase and then runs the TimestampGuard so the
// muxer never sees a non-increasing DTS or a PTS behind its DTS.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::context::Output;
use ffmpeg::{Packet, Rational};

use mediaforge_core::timestamps::TimestampGuard;

use crate::error::{FfmpegResultExt, MediaError, Result};

/// Decoder/encoder pair for one elementary stream plus its timebases.
pub(crate) struct StreamContext<D, E> {
    pub decoder:   D,
    pub encoder:   E,
    pub in_index:  usize,
    pub out_index: usize,
    pub in_tb:     Rational,
    pub enc_tb:    Rational,
    /// Muxer-assigned; only final after `write_header`.
    pub out_tb:    Rational,
    pub guard:     TimestampGuard,
}

impl<D, E> StreamContext<D, E> {
    /// Re-read the output timebase after the header has been written.
    pub fn sync_out_tb(&mut self, octx: &Output) {
        if let Some(stream) = octx.stream(self.out_index) {
            self.out_tb = stream.time_base();
        }
    }
}

/// Opened encoders that can hand back packets. Implemented for the two
/// concrete encoder types so the drain loop is written once.
pub(crate) trait PacketSource {
    fn next_packet(&mut self, packet: &mut Packet) -> bool;
    fn finish(&mut self) -> Result<()>;
}

impl PacketSource for ffmpeg::encoder::video::Video {
    fn next_packet(&mut self, packet: &mut Packet) -> bool {
        self.receive_packet(packet).is_ok()
    }
    fn finish(&mut self) -> Result<()> {
        self.send_eof().ctx("send EOF to video encoder")
    }
}

impl PacketSource for ffmpeg::encoder::Audio {
    fn next_packet(&mut self, packet: &mut Packet) -> bool {
        self.receive_packet(packet).is_ok()
    }
    fn finish(&mut self) -> Result<()> {
        self.send_eof().ctx("send EOF to audio encoder")
    }
}

/// Rescale, repair and interleave one encoded packet.
pub(crate) fn write_packet(
    packet:    &mut Packet,
    out_index: usize,
    enc_tb:    Rational,
    out_tb:    Rational,
    guard:     &mut TimestampGuard,
    octx:      &mut Output,
) -> Result<()> {
    packet.set_stream(out_index);
    packet.rescale_ts(enc_tb, out_tb);
    let stamps = guard.fix(packet.pts(), packet.dts());
    packet.set_pts(Some(stamps.pts));
    packet.set_dts(Some(stamps.dts));
    packet.set_position(-1);
    packet.write_interleaved(octx).ctx("write packet")
}

impl<D, E: PacketSource> StreamContext<D, E> {
    /// Pull every packet the encoder has ready and mux it.
    pub fn drain_encoder(&mut self, octx: &mut Output) -> Result<()> {
        let mut pkt = Packet::empty();
        while self.encoder.next_packet(&mut pkt) {
            write_packet(&mut pkt, self.out_index, self.enc_tb, self.out_tb, &mut self.guard, octx)?;
        }
        Ok(())
    }

    /// EOF the encoder and mux whatever it still holds.
    pub fn flush_encoder(&mut self, octx: &mut Output) -> Result<()> {
        self.encoder.finish()?;
        self.drain_encoder(octx)
    }
}

/// Zero the codec tag of output stream `index` so the muxer picks its own
/// fourcc when stream-copying between containers.
pub(crate) fn clear_codec_tag(octx: &mut Output, index: usize) {
    unsafe {
        let stream = *(*octx.as_mut_ptr()).streams.add(index);
        (*(*stream).codecpar).codec_tag = 0;
    }
}

/// Copy an opened encoder's parameters into output stream `index`.
///
/// `Stream::set_parameters` wants `AsPtr<AVCodecParameters>`, which the opened
/// encoder types do not implement, so this goes through FFI.
pub(crate) fn parameters_from_encoder(
    octx:    &mut Output,
    index:   usize,
    encoder: *mut ffmpeg::ffi::AVCodecContext,
    context: &'static str,
) -> Result<()> {
    let ret = unsafe {
        let stream = *(*octx.as_mut_ptr()).streams.add(index);
        let ret = ffmpeg::ffi::avcodec_parameters_from_context((*stream).codecpar, encoder);
        if ret >= 0 {
            (*(*stream).codecpar).codec_tag = 0;
        }
        ret
    };
    if ret < 0 {
        return Err(MediaError::Ffi { context, code: ret });
    }
    Ok(())
}
