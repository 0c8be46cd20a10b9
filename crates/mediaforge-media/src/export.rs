// crates/mediaforge-media/src/export.rs
//
// Lossless segment export: stream copy, no re-encode.
//
// Each segment is cut by seeking to the keyframe at or before its start and
// copying packets until every stream has passed its end. Timestamps are
// shifted so each exported file starts at zero. Merging exports the selected
// segments into a temp dir first, then concatenates the parts back to back,
// offsetting each part by the end of the one before it.
//
// Progress goes out over a crossbeam channel; a dropped receiver just means
// nobody is listening, so send errors are ignored.

use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::Id as CodecId;
use ffmpeg::encoder;
use ffmpeg::format::{self, context::Output};
use ffmpeg::media::Type;
use ffmpeg::{rescale, Rational, Rescale};
use tracing::{debug, info, warn};

use mediaforge_core::media_types::ExportProgress;
use mediaforge_core::naming::container_for_path;
use mediaforge_core::segments::{segment_file_stem, Segment};
use mediaforge_core::timestamps::TimestampGuard;

use crate::error::{FfmpegResultExt, MediaError, Result};
use crate::helpers::mux::{clear_codec_tag, write_packet};
use crate::helpers::seek::seek_to_secs;

fn send(progress: &Sender<ExportProgress>, current: usize, total: usize, message: impl Into<String>) {
    let _ = progress.send(ExportProgress::new(current, total, message));
}

/// `.ext` of the input, `.mkv` when it has none.
fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy()),
        _ => ".mkv".to_string(),
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove partial output {}: {e}", path.display()),
    }
}

fn is_copyable(medium: Type) -> bool {
    matches!(medium, Type::Video | Type::Audio | Type::Subtitle)
}

/// Add one stream-copy output stream per copyable input stream. Returns the
/// input-index → output-index map.
fn mirror_streams(ictx: &format::context::Input, octx: &mut Output) -> Result<Vec<Option<usize>>> {
    let mut map = Vec::with_capacity(ictx.nb_streams() as usize);
    for stream in ictx.streams() {
        if !is_copyable(stream.parameters().medium()) {
            debug!(index = stream.index(), "skipping non-audio/video stream");
            map.push(None);
            continue;
        }
        let mut ost = octx.add_stream(encoder::find(CodecId::None)).ctx("add output stream")?;
        ost.set_parameters(stream.parameters());
        ost.set_time_base(stream.time_base());
        let out_index = ost.index();
        clear_codec_tag(octx, out_index);
        map.push(Some(out_index));
    }
    Ok(map)
}

fn output_time_bases(octx: &Output) -> Vec<Rational> {
    octx.streams().map(|s| s.time_base()).collect()
}

// ── Single segment ────────────────────────────────────────────────────────────

/// Stream-copy `[start, end]` seconds of `input` into `output`.
pub fn copy_range(input: &Path, output: &Path, start: f64, end: f64) -> Result<()> {
    if !(start.is_finite() && end.is_finite()) || end <= start {
        return Err(MediaError::InvalidInput(format!("empty range {start:.3}..{end:.3}")));
    }

    let mut ictx = format::input(input).map_err(|e| MediaError::open(input, e))?;
    let mut octx = format::output_as(output, container_for_path(output))
        .ctx(format!("create output '{}'", output.display()))?;

    let map = mirror_streams(&ictx, &mut octx)?;
    if map.iter().all(Option::is_none) {
        return Err(MediaError::no_stream(input, "audio or video"));
    }
    octx.write_header().ctx("write header")?;
    let out_tbs    = output_time_bases(&octx);
    let mut guards = vec![TimestampGuard::new(); out_tbs.len()];

    seek_to_secs(&mut ictx, start, "segment export");

    let end_us = (end * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
    let mut finished = vec![false; map.len()];
    // First DTS written, in AV_TIME_BASE units; everything is shifted by it.
    let mut origin_us: Option<i64> = None;
    let mut written = 0usize;

    for result in ictx.packets() {
        let (stream, mut packet) = result.ctx("read packet")?;
        let index = stream.index();
        let Some(out_index) = map.get(index).copied().flatten() else { continue };
        if finished[index] {
            continue;
        }
        let in_tb = stream.time_base();

        if let Some(ts) = packet.pts().or_else(|| packet.dts()) {
            if ts.rescale(in_tb, rescale::TIME_BASE) > end_us {
                finished[index] = true;
                let all_done = map.iter().zip(&finished).all(|(m, done)| m.is_none() || *done);
                if all_done {
                    break;
                }
                continue;
            }
        }

        if origin_us.is_none() {
            origin_us = packet.dts().or_else(|| packet.pts()).map(|t| t.rescale(in_tb, rescale::TIME_BASE));
        }
        let shift = origin_us.unwrap_or(0).rescale(rescale::TIME_BASE, in_tb);
        packet.set_pts(packet.pts().map(|p| p - shift));
        packet.set_dts(packet.dts().map(|d| d - shift));

        write_packet(&mut packet, out_index, in_tb, out_tbs[out_index], &mut guards[out_index], &mut octx)?;
        written += 1;
    }

    octx.write_trailer().ctx("write trailer")?;
    if written == 0 {
        warn!("no packets in {start:.3}..{end:.3} of {}", input.display());
    }
    debug!(written, "copied {start:.3}..{end:.3} -> {}", output.display());
    Ok(())
}

// ── Batch export ──────────────────────────────────────────────────────────────

/// Export every enabled, non-empty segment of `input` as its own file in
/// `out_dir`, named `<stem>_HH-MM-SS_to_HH-MM-SS<ext>`.
///
/// Stops at the first failure; files already written stay, the failed one
/// is removed.
pub fn export_segments(
    input:    &Path,
    out_dir:  &Path,
    segments: &[Segment],
    progress: &Sender<ExportProgress>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_string());
    let ext = extension_of(input);

    let selected: Vec<&Segment> = segments.iter().filter(|s| s.is_exportable()).collect();
    let total = selected.len();
    let mut written = Vec::with_capacity(total);

    for (i, segment) in selected.into_iter().enumerate() {
        send(progress, i + 1, total, format!("Exporting {}...", segment.name));
        let path = out_dir.join(format!("{}{ext}", segment_file_stem(&stem, segment.start, segment.end)));
        if let Err(e) = copy_range(input, &path, segment.start, segment.end) {
            remove_partial(&path);
            return Err(e);
        }
        info!("exported {} -> {}", segment.name, path.display());
        written.push(path);
    }

    send(progress, total, total, "Export completed!");
    Ok(written)
}

// ── Merge ─────────────────────────────────────────────────────────────────────

/// Export the enabled segments and join them, in list order, into `output`.
///
/// Progress runs over `total + 1` steps: one per extracted segment plus the
/// merge itself. On failure the partial output is removed; the temp dir is
/// always cleaned up.
pub fn export_segments_merged(
    input:    &Path,
    output:   &Path,
    segments: &[Segment],
    progress: &Sender<ExportProgress>,
) -> Result<()> {
    let selected: Vec<&Segment> = segments.iter().filter(|s| s.is_exportable()).collect();
    let total = selected.len();
    if total == 0 {
        return Err(MediaError::InvalidInput("no segments selected for export".into()));
    }

    send(progress, 0, total + 1, "Preparing merge export...");
    let temp = tempfile::Builder::new().prefix("mediaforge_merge").tempdir()?;
    let ext  = extension_of(input);

    let mut parts = Vec::with_capacity(total);
    for (i, segment) in selected.into_iter().enumerate() {
        send(progress, i + 1, total + 1, format!("Extracting segment {} of {total}...", i + 1));
        let part = temp.path().join(format!("segment_{i}{ext}"));
        copy_range(input, &part, segment.start, segment.end)?;
        parts.push(part);
    }

    send(progress, total, total + 1, "Merging segments...");
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = concat_parts(&parts, output) {
        remove_partial(output);
        return Err(e);
    }

    info!("merged {total} segment(s) -> {}", output.display());
    send(progress, total + 1, total + 1, "Merge completed!");
    Ok(())
}

/// Join stream-copied parts that share one stream layout.
fn concat_parts(parts: &[PathBuf], output: &Path) -> Result<()> {
    let first = parts
        .first()
        .ok_or_else(|| MediaError::InvalidInput("nothing to merge".into()))?;

    let mut octx = format::output_as(output, container_for_path(output))
        .ctx(format!("create output '{}'", output.display()))?;
    let stream_count = {
        let layout = format::input(first).map_err(|e| MediaError::open(first, e))?;
        mirror_streams(&layout, &mut octx)?;
        layout.nb_streams() as usize
    };
    octx.write_header().ctx("write header")?;
    let out_tbs    = output_time_bases(&octx);
    let mut guards = vec![TimestampGuard::new(); out_tbs.len()];

    // Where the next part starts, in AV_TIME_BASE units.
    let mut offset_us: i64 = 0;
    for part in parts {
        let mut ictx = format::input(part).map_err(|e| MediaError::open(part, e))?;
        if ictx.nb_streams() as usize != stream_count {
            return Err(MediaError::InvalidInput(format!(
                "'{}' has {} streams, expected {stream_count}",
                part.display(),
                ictx.nb_streams(),
            )));
        }

        let mut part_end_us = offset_us;
        for result in ictx.packets() {
            let (stream, mut packet) = result.ctx("read packet")?;
            let index = stream.index();
            if index >= out_tbs.len() {
                continue;
            }
            let in_tb = stream.time_base();

            if let Some(ts) = packet.pts().or_else(|| packet.dts()) {
                let end = (ts + packet.duration().max(0)).rescale(in_tb, rescale::TIME_BASE) + offset_us;
                part_end_us = part_end_us.max(end);
            }
            let shift = offset_us.rescale(rescale::TIME_BASE, in_tb);
            packet.set_pts(packet.pts().map(|p| p + shift));
            packet.set_dts(packet.dts().map(|d| d + shift));

            write_packet(&mut packet, index, in_tb, out_tbs[index], &mut guards[index], &mut octx)?;
        }
        debug!("appended {} ending at {:.3}s", part.display(), part_end_us as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE));
        offset_us = part_end_us;
    }

    octx.write_trailer().ctx("write trailer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_falls_back_to_mkv() {
        assert_eq!(extension_of(Path::new("/v/a.mp4")), ".mp4");
        assert_eq!(extension_of(Path::new("/v/a")), ".mkv");
    }

    #[test]
    fn nothing_selected_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("parts");
        let (tx, rx) = crossbeam_channel::unbounded();

        let mut seg = Segment::new(0.0, 10.0, "Full Video");
        seg.export_enabled = false;
        let empty = Segment::new(10.0, 10.0, "Segment 2: 00:00:10 - 00:00:10");

        let written = export_segments(Path::new("/v/a.mp4"), &out, &[seg, empty], &tx).unwrap();
        assert!(written.is_empty());
        assert!(out.is_dir());

        let events: Vec<ExportProgress> = rx.try_iter().collect();
        assert_eq!(events, vec![ExportProgress::new(0, 0, "Export completed!")]);
    }

    #[test]
    fn missing_input_fails_without_leaving_files() {
        ffmpeg::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let segs = [Segment::new(0.0, 5.0, "Full Video")];
        let err = export_segments(Path::new("/definitely/not/here.mp4"), dir.path(), &segs, &tx).unwrap_err();
        assert!(matches!(err, MediaError::Open { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(rx.try_recv().unwrap().message, "Exporting Full Video...");
    }

    #[test]
    fn merge_needs_a_selection() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let err = export_segments_merged(Path::new("/v/a.mp4"), Path::new("/v/out.mp4"), &[], &tx).unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn merge_removes_output_when_extraction_fails() {
        ffmpeg::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.mp4");
        let (tx, rx) = crossbeam_channel::unbounded();

        let segs = [Segment::new(0.0, 5.0, "Segment 1"), Segment::new(5.0, 9.0, "Segment 2")];
        let err = export_segments_merged(Path::new("/definitely/not/here.mp4"), &output, &segs, &tx).unwrap_err();
        assert!(matches!(err, MediaError::Open { .. }));
        assert!(!output.exists());

        let messages: Vec<String> = rx.try_iter().map(|p| p.message).collect();
        assert_eq!(messages, vec!["Preparing merge export...", "Extracting segment 1 of 2..."]);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = copy_range(Path::new("/v/a.mp4"), Path::new("/v/b.mp4"), 5.0, 5.0).unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
