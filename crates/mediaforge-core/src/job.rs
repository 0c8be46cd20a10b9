// crates/mediaforge-core/src/job.rs
//
// The shared Job record.
//
// A Job is created by Scheduler::submit and handed to exactly one worker.
// The worker is the only writer of status / progress / message; the front end
// reads them concurrently through `snapshot()`. Fields are independently
// atomic, so a reader may briefly observe "old status, new progress".

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub type JobId = u64;

// ── Status ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Skipped)
    }

    fn to_u8(self) -> u8 {
        match self {
            JobStatus::Pending   => 0,
            JobStatus::Running   => 1,
            JobStatus::Completed => 2,
            JobStatus::Failed    => 3,
            JobStatus::Skipped   => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => JobStatus::Running,
            2 => JobStatus::Completed,
            3 => JobStatus::Failed,
            4 => JobStatus::Skipped,
            _ => JobStatus::Pending,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending   => "pending",
            JobStatus::Running   => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed    => "failed",
            JobStatus::Skipped   => "skipped",
        };
        f.write_str(s)
    }
}

// ── Encoder preference ────────────────────────────────────────────────────────

/// Which encoder the user asked for.
///
/// `Auto` runs the full hardware → software cascade. `Named` is tried first
/// and the cascade continues if it fails to open.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderPreference {
    #[default]
    Auto,
    Named(String),
}

impl EncoderPreference {
    /// Choices offered to the user, in display order: (id, label).
    pub const CHOICES: [(&'static str, &'static str); 5] = [
        ("auto",       "Auto"),
        ("hevc_nvenc", "NVIDIA (hevc_nvenc)"),
        ("hevc_qsv",   "Intel (hevc_qsv)"),
        ("hevc_amf",   "AMD (hevc_amf)"),
        ("libx265",    "CPU (libx265)"),
    ];

    /// `"auto"` (any case) and the empty string mean Auto; anything else is
    /// taken as an encoder name.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            EncoderPreference::Auto
        } else {
            EncoderPreference::Named(s.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EncoderPreference::Auto        => "auto",
            EncoderPreference::Named(name) => name,
        }
    }
}

impl fmt::Display for EncoderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Job ───────────────────────────────────────────────────────────────────────

pub struct Job {
    id:       JobId,
    input:    PathBuf,
    output:   PathBuf,
    encoder:  EncoderPreference,
    /// f32 bit pattern; see `progress()`.
    progress: AtomicU32,
    status:   AtomicU8,
    message:  Mutex<String>,
}

impl Job {
    pub(crate) fn new(id: JobId, input: PathBuf, output: PathBuf, encoder: EncoderPreference) -> Self {
        Self {
            id,
            input,
            output,
            encoder,
            progress: AtomicU32::new(0f32.to_bits()),
            status:   AtomicU8::new(JobStatus::Pending.to_u8()),
            message:  Mutex::new("Pending".to_string()),
        }
    }

    pub fn id(&self) -> JobId { self.id }
    pub fn input(&self) -> &Path { &self.input }
    pub fn output(&self) -> &Path { &self.output }
    pub fn encoder(&self) -> &EncoderPreference { &self.encoder }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn message(&self) -> String {
        self.message.lock().clone()
    }

    /// Input file name for display; falls back to the full path.
    pub fn filename(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id:       self.id,
            filename: self.filename(),
            input:    self.input.clone(),
            output:   self.output.clone(),
            encoder:  self.encoder.to_string(),
            progress: self.progress(),
            status:   self.status(),
            message:  self.message(),
        }
    }

    // ── Worker-side mutation ─────────────────────────────────────────────────

    /// Raise progress to `value` (clamped to [0,1]). Never lowers it, also
    /// across the software retry.
    pub(crate) fn publish_progress(&self, value: f32) {
        if self.status().is_terminal() || !value.is_finite() {
            return;
        }
        let value = value.clamp(0.0, 1.0);
        let _ = self.progress.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            (value > f32::from_bits(bits)).then_some(value.to_bits())
        });
    }

    pub(crate) fn set_running(&self, message: &str) {
        if self.status().is_terminal() {
            return;
        }
        *self.message.lock() = message.to_string();
        self.status.store(JobStatus::Running.to_u8(), Ordering::Release);
    }

    /// Move to a terminal status. Returns false (and changes nothing) if the
    /// job already finished.
    pub(crate) fn finish(&self, status: JobStatus, message: &str) -> bool {
        debug_assert!(status.is_terminal());
        if self.status().is_terminal() {
            return false;
        }
        if matches!(status, JobStatus::Completed | JobStatus::Skipped) {
            self.progress.store(1f32.to_bits(), Ordering::Relaxed);
        }
        // Message first so a reader that sees the terminal status also sees
        // the final message.
        *self.message.lock() = message.to_string();
        self.status.store(status.to_u8(), Ordering::Release);
        true
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("status", &self.status())
            .field("progress", &self.progress())
            .finish()
    }
}

/// Read-only copy of a Job handed to the front end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id:       JobId,
    pub filename: String,
    pub input:    PathBuf,
    pub output:   PathBuf,
    pub encoder:  String,
    pub progress: f32,
    pub status:   JobStatus,
    pub message:  String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(7, PathBuf::from("/videos/clip.mov"), PathBuf::from("/out/clip_h265.mov"), EncoderPreference::Auto)
    }

    #[test]
    fn new_job_is_pending() {
        let j = job();
        assert_eq!(j.status(), JobStatus::Pending);
        assert_eq!(j.progress(), 0.0);
        assert_eq!(j.message(), "Pending");
        assert_eq!(j.filename(), "clip.mov");
    }

    #[test]
    fn progress_never_decreases() {
        let j = job();
        j.set_running("Transcoding...");
        j.publish_progress(0.4);
        j.publish_progress(0.2);
        assert_eq!(j.progress(), 0.4);
        j.publish_progress(7.0);
        assert_eq!(j.progress(), 1.0);
        j.publish_progress(f32::NAN);
        assert_eq!(j.progress(), 1.0);
    }

    #[test]
    fn terminal_status_is_final() {
        let j = job();
        j.set_running("Transcoding...");
        assert!(j.finish(JobStatus::Failed, "Failed"));
        assert!(!j.finish(JobStatus::Completed, "Completed"));
        j.set_running("again");
        j.publish_progress(0.9);
        assert_eq!(j.status(), JobStatus::Failed);
        assert_eq!(j.message(), "Failed");
        assert_eq!(j.progress(), 0.0);
    }

    #[test]
    fn completion_forces_full_progress() {
        let j = job();
        j.set_running("Transcoding...");
        j.publish_progress(0.3);
        j.finish(JobStatus::Completed, "Completed");
        assert_eq!(j.progress(), 1.0);
    }

    #[test]
    fn encoder_preference_parsing() {
        assert_eq!(EncoderPreference::parse("AUTO"), EncoderPreference::Auto);
        assert_eq!(EncoderPreference::parse(" "), EncoderPreference::Auto);
        assert_eq!(
            EncoderPreference::parse("hevc_qsv"),
            EncoderPreference::Named("hevc_qsv".into())
        );
        assert_eq!(EncoderPreference::parse("libx265").as_str(), "libx265");
    }

    #[test]
    fn snapshot_serializes() {
        let j = job();
        let json = serde_json::to_value(j.snapshot()).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["encoder"], "auto");
    }
}
