// crates/mediaforge-cli/src/commands/split.rs
//
// `mediaforge split`: build a cut list, derive segments over the probed
// duration, then stream-copy them out (or merge them into one file).
// Export runs on this thread; a small printer thread drains the progress
// channel so messages appear as they are sent.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::warn;

use mediaforge_core::helpers::time::{format_clock, format_duration};
use mediaforge_core::segments::{CutList, Segment};
use mediaforge_media::{export_segments, export_segments_merged, probe_duration, ExportProgress};

use crate::config::SplitConfig;

/// Cut list from the configured times. Rejected points are reported and
/// dropped; the list itself enforces ordering and spacing.
fn build_cuts(times: &[f64], duration: f64) -> CutList {
    let mut cuts = CutList::new();
    for &t in times {
        if t >= duration {
            warn!("cut at {} is past the end ({}), segment will be empty", format_clock(t), format_clock(duration));
        }
        if !cuts.add(t) {
            warn!("ignoring cut at {}: too close to another cut", format_clock(t));
        }
    }
    cuts
}

fn apply_skips(segments: &mut [Segment], skip: &[usize]) {
    for &n in skip {
        match segments.get_mut(n.wrapping_sub(1)) {
            Some(seg) => seg.export_enabled = false,
            None => warn!("--skip {n}: there are only {} segments", segments.len()),
        }
    }
}

pub fn run(cfg: SplitConfig) -> Result<ExitCode> {
    let duration = probe_duration(&cfg.file).with_context(|| format!("probe '{}'", cfg.file.display()))?;
    let cuts = build_cuts(&cfg.cuts, duration);
    let mut segments = cuts.segments(duration);
    apply_skips(&mut segments, &cfg.skip);

    println!("{} ({})", cfg.file.display(), format_duration(duration));
    for seg in &segments {
        let mark = if seg.is_exportable() { "+" } else { "-" };
        println!("  {mark} {}", seg.name);
    }

    let (tx, rx) = crossbeam_channel::unbounded::<ExportProgress>();
    let printer = std::thread::spawn(move || {
        for p in rx {
            println!("[{}/{}] {}", p.current, p.total, p.message);
        }
    });

    let result = match &cfg.merge {
        Some(output) => export_segments_merged(&cfg.file, output, &segments, &tx).map(|()| vec![output.clone()]),
        None => export_segments(&cfg.file, &cfg.out_dir, &segments, &tx),
    };
    drop(tx);
    if printer.join().is_err() {
        warn!("progress printer panicked");
    }

    let written = result.context("export failed")?;
    for path in &written {
        println!("  {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_cuts_are_dropped() {
        let cuts = build_cuts(&[30.0, 30.05, 60.0], 90.0);
        let times: Vec<f64> = cuts.points().iter().map(|p| p.time).collect();
        assert_eq!(times, vec![30.0, 60.0]);
    }

    #[test]
    fn skips_disable_by_position() {
        let mut segs = build_cuts(&[10.0, 20.0], 30.0).segments(30.0);
        apply_skips(&mut segs, &[2, 9]);
        let enabled: Vec<bool> = segs.iter().map(|s| s.export_enabled).collect();
        assert_eq!(enabled, vec![true, false, true]);
    }
}
