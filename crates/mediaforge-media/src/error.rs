// crates/mediaforge-media/src/error.rs
//
// Error type for the FFmpeg side. Converted to the scheduler's TranscodeError
// at the pipeline boundary (see transcode.rs).

use std::path::{Path, PathBuf};

use ffmpeg_the_third as ffmpeg;

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("could not open '{}': {source}", path.display())]
    Open {
        path:   PathBuf,
        #[source]
        source: ffmpeg::Error,
    },

    #[error("no {kind} stream in '{}'", path.display())]
    NoStream { path: PathBuf, kind: &'static str },

    #[error("no usable {kind}: {}", tried.join("; "))]
    NoCodec { kind: &'static str, tried: Vec<String> },

    /// An FFmpeg call failed; `context` says which.
    #[error("{context}: {source}")]
    Ffmpeg {
        context: String,
        #[source]
        source:  ffmpeg::Error,
    },

    /// Raw libav call returned a negative code.
    #[error("{context} failed ({code})")]
    Ffi { context: &'static str, code: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl MediaError {
    pub fn open(path: &Path, source: ffmpeg::Error) -> Self {
        Self::Open { path: path.to_path_buf(), source }
    }

    pub fn no_stream(path: &Path, kind: &'static str) -> Self {
        Self::NoStream { path: path.to_path_buf(), kind }
    }
}

/// `.ctx("send video packet")?` on any ffmpeg result.
pub(crate) trait FfmpegResultExt<T> {
    fn ctx(self, context: impl Into<String>) -> Result<T>;
}

impl<T> FfmpegResultExt<T> for std::result::Result<T, ffmpeg::Error> {
    fn ctx(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| MediaError::Ffmpeg { context: context.into(), source })
    }
}
