// crates/mediaforge-core/src/transcode.rs
//
// The seam between the scheduler and the codec runtime.
//
// mediaforge-core never links FFmpeg. The scheduler only sees the Transcoder
// trait below; mediaforge-media implements it with an FFmpeg pipeline and the
// scheduler tests implement it with a scripted fake.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::job::EncoderPreference;

/// Interval between pause polls inside a running pipeline.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

// ── Request / outcome ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Hardware decoders and encoders may be tried first.
    #[default]
    Auto,
    /// Native decoder and software encoders only. Used for the retry.
    Software,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub input:   PathBuf,
    pub output:  PathBuf,
    pub encoder: EncoderPreference,
    pub mode:    DecodeMode,
}

/// What a successful run actually used.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attempt {
    pub decoder:  String,
    pub encoder:  String,
    /// True if either codec ran on hardware.
    pub hardware: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    /// Input could not be opened, no usable stream, no encoder opened,
    /// output could not be created. Retrying in software will not help.
    /// Nothing is left at the output path: an implementation removes any file
    /// it created itself before returning this.
    #[error("setup failed: {0}")]
    Setup(String),

    /// Failure after the pipeline started moving packets.
    #[error("{stage} failed: {message}")]
    Pipeline {
        stage:    &'static str,
        message:  String,
        /// A hardware decoder or encoder was in use when it failed.
        hardware: bool,
    },
}

impl TranscodeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TranscodeError::Pipeline { hardware: true, .. })
    }

    /// True if the output path may now hold a partial file written by this
    /// attempt. A file that was there before a setup failure is not ours.
    pub fn may_have_written_output(&self) -> bool {
        matches!(self, TranscodeError::Pipeline { .. })
    }
}

// ── Hooks ─────────────────────────────────────────────────────────────────────

/// Callbacks a pipeline uses to talk back to the scheduler while it runs.
pub struct PipelineHooks<'a> {
    pub progress: &'a (dyn Fn(f32) + Sync),
    pub paused:   &'a (dyn Fn() -> bool + Sync),
}

impl<'a> PipelineHooks<'a> {
    pub fn report_progress(&self, fraction: f32) {
        (self.progress)(fraction);
    }

    /// Block the calling thread while the scheduler is paused.
    pub fn wait_while_paused(&self) {
        while (self.paused)() {
            thread::sleep(PAUSE_POLL);
        }
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

pub trait Transcoder: Send + Sync + 'static {
    /// Human name of the target codec, used in the skip message.
    fn target_name(&self) -> &str;

    /// True if the input's first video stream already uses the target codec.
    /// Unreadable inputs return false; the transcode attempt reports the error.
    fn is_target_codec(&self, input: &std::path::Path) -> bool;

    fn transcode(&self, req: &TranscodeRequest, hooks: &PipelineHooks<'_>) -> Result<Attempt, TranscodeError>;
}
