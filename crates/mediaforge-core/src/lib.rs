// crates/mediaforge-core/src/lib.rs
//
// Shared types and pure logic for MediaForge. No ffmpeg, no I/O beyond the
// file-system checks naming and the scheduler's cleanup need.

pub mod bitrate;
pub mod cascade;
pub mod helpers;
pub mod job;
pub mod media_types;
pub mod naming;
pub mod scheduler;
pub mod segments;
pub mod timestamps;
pub mod transcode;

pub use job::{EncoderPreference, JobId, JobSnapshot, JobStatus};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use transcode::{Attempt, DecodeMode, PipelineHooks, TranscodeError, TranscodeRequest, Transcoder};
