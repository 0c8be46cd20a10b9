// crates/mediaforge-media/src/lib.rs
//
// Everything that touches FFmpeg. mediaforge-core stays ffmpeg-free; this
// crate plugs into it through the `Transcoder` trait and reports export
// progress over crossbeam channels.
//
// Callers must run `ffmpeg_the_third::init()` once before using anything here.

pub mod audio;
pub mod error;
pub mod export;
pub mod helpers;
pub mod probe;
pub mod transcode;

pub use error::{MediaError, Result};
pub use export::{copy_range, export_segments, export_segments_merged};
pub use probe::{is_hevc, probe_duration, probe_info};
pub use transcode::FfmpegTranscoder;
pub use mediaforge_core::media_types::{ExportProgress, MediaInfo};
