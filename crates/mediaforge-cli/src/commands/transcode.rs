// crates/mediaforge-cli/src/commands/transcode.rs
//
// `mediaforge transcode`: queue every input on the scheduler, unpause it, and
// poll job snapshots until the batch is done. A line is printed whenever a
// job's status or message changes, or its progress crosses another 10%.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use mediaforge_core::helpers::time::format_duration;
use mediaforge_core::naming::{transcode_output_path, unique_path_with};
use mediaforge_core::{JobId, JobSnapshot, JobStatus, Scheduler, SchedulerConfig};
use mediaforge_media::FfmpegTranscoder;

use crate::config::TranscodeConfig;
use crate::helpers::format::{fit_label, progress_bar};

const POLL: Duration = Duration::from_millis(250);
const NAME_WIDTH: usize = 32;

/// Output path per input, unique on disk and within the batch.
fn plan_outputs(cfg: &TranscodeConfig) -> Vec<(PathBuf, PathBuf)> {
    let mut reserved: HashSet<PathBuf> = HashSet::new();
    let mut planned = Vec::with_capacity(cfg.files.len());
    for input in &cfg.files {
        let mut output = transcode_output_path(input, cfg.out_dir.as_deref());
        if reserved.contains(&output) {
            output = unique_path_with(&output, |p| p.exists() || reserved.contains(p));
        }
        reserved.insert(output.clone());
        planned.push((input.clone(), output));
    }
    planned
}

/// What was last printed for a job.
#[derive(PartialEq)]
struct Shown {
    status:  JobStatus,
    message: String,
    decile:  u32,
}

impl Shown {
    fn of(job: &JobSnapshot) -> Self {
        Self {
            status:  job.status,
            message: job.message.clone(),
            decile:  (job.progress * 10.0).floor() as u32,
        }
    }
}

fn render(job: &JobSnapshot) -> String {
    format!(
        "#{:<3} {:<width$} {} {:>3}%  {}",
        job.id,
        fit_label(&job.filename, NAME_WIDTH),
        progress_bar(job.progress, 20),
        (job.progress * 100.0).round() as u32,
        job.message,
        width = NAME_WIDTH,
    )
}

pub fn run(cfg: TranscodeConfig) -> Result<ExitCode> {
    let planned: Vec<(PathBuf, PathBuf)> = plan_outputs(&cfg)
        .into_iter()
        .filter(|(input, _)| {
            let ok = input.is_file();
            if !ok {
                warn!("skipping {}: not a file", input.display());
            }
            ok
        })
        .collect();
    if planned.is_empty() {
        bail!("none of the given inputs exist");
    }
    if let Some(dir) = &cfg.out_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("create output directory '{}'", dir.display()))?;
    }

    let scheduler = Scheduler::new(FfmpegTranscoder, SchedulerConfig { workers: cfg.workers, start_paused: true });
    for (input, output) in planned {
        let id = scheduler.submit(input.clone(), output.clone(), cfg.encoder.clone());
        info!("queued #{id}: {} -> {}", input.display(), output.display());
    }

    let started = std::time::Instant::now();
    scheduler.set_paused(false);

    let mut shown: HashMap<JobId, Shown> = HashMap::new();
    loop {
        let finished = scheduler.all_finished();
        for job in scheduler.list_jobs() {
            let now = Shown::of(&job);
            if shown.get(&job.id) == Some(&now) {
                continue;
            }
            if cfg.json {
                println!("{}", serde_json::to_string(&job)?);
            } else {
                println!("{}", render(&job));
            }
            shown.insert(job.id, now);
        }
        if finished {
            break;
        }
        std::thread::sleep(POLL);
    }
    scheduler.stop();

    let jobs = scheduler.list_jobs();
    let count = |s: JobStatus| jobs.iter().filter(|j| j.status == s).count();
    let failed = count(JobStatus::Failed);
    if !cfg.json {
        println!(
            "\n{} completed, {} skipped, {} failed in {}",
            count(JobStatus::Completed),
            count(JobStatus::Skipped),
            failed,
            format_duration(started.elapsed().as_secs_f64()),
        );
        for job in jobs.iter().filter(|j| j.status == JobStatus::Completed) {
            println!("  {}", job.output.display());
        }
    }

    Ok(if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_core::EncoderPreference;

    fn config(files: &[&str], out_dir: Option<PathBuf>) -> TranscodeConfig {
        TranscodeConfig {
            files:   files.iter().map(PathBuf::from).collect(),
            out_dir,
            encoder: EncoderPreference::Auto,
            workers: 1,
            json:    false,
        }
    }

    #[test]
    fn same_stem_in_one_batch_gets_distinct_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&["/a/clip.mp4", "/b/clip.mp4", "/c/other.mp4"], Some(dir.path().to_path_buf()));

        let outputs: Vec<PathBuf> = plan_outputs(&cfg).into_iter().map(|(_, o)| o).collect();
        assert_eq!(outputs[0], dir.path().join("clip_h265.mp4"));
        assert_eq!(outputs[1], dir.path().join("clip_h265_1.mp4"));
        assert_eq!(outputs[2], dir.path().join("other_h265.mp4"));
    }

    #[test]
    fn existing_files_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip_h265.mp4"), b"x").unwrap();
        let cfg = config(&["/a/clip.mp4"], Some(dir.path().to_path_buf()));
        assert_eq!(plan_outputs(&cfg)[0].1, dir.path().join("clip_h265_1.mp4"));
    }

    #[test]
    fn progress_lines_change_by_decile() {
        let mut job = JobSnapshot {
            id:       1,
            filename: "clip.mp4".into(),
            input:    "/a/clip.mp4".into(),
            output:   "/a/clip_h265.mp4".into(),
            encoder:  "auto".into(),
            progress: 0.41,
            status:   JobStatus::Running,
            message:  "Transcoding...".into(),
        };
        let before = Shown::of(&job);
        job.progress = 0.49;
        assert!(Shown::of(&job) == before);
        job.progress = 0.5;
        assert!(Shown::of(&job) != before);

        let line = render(&job);
        assert!(line.starts_with("#1 "));
        assert!(line.contains(" 50%"));
        assert!(line.ends_with("Transcoding..."));
    }
}
