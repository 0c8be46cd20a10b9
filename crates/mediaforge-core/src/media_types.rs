// crates/mediaforge-core/src/media_types.rs
//
// Types that flow across the channel between mediaforge-media and a front end.
// No ffmpeg, just plain data.

use serde::{Deserialize, Serialize};

/// One step of a segment export, sent over a crossbeam channel.
///
/// `current` counts exported segments so far (1-based while working,
/// equal to `total` on the final message).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportProgress {
    pub current: usize,
    pub total:   usize,
    pub message: String,
}

impl ExportProgress {
    pub fn new(current: usize, total: usize, message: impl Into<String>) -> Self {
        Self { current, total, message: message.into() }
    }

    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.current as f32 / self.total as f32).clamp(0.0, 1.0)
    }
}

/// Container facts shown by the `probe` command.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration:    f64,
    pub format:      String,
    pub video_codec: Option<String>,
    pub width:       u32,
    pub height:      u32,
    pub fps:         Option<f64>,
    pub bit_rate:    i64,
    pub audio_codec: Option<String>,
    pub sample_rate: u32,
    pub channels:    u16,
}
