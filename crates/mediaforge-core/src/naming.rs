// crates/mediaforge-core/src/naming.rs
//
// Output path rules shared by the CLI and the export code.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Suffix appended to the stem of every transcoded file.
pub const TRANSCODE_SUFFIX: &str = "_h265";

const MAX_UNIQUE_ATTEMPTS: u32 = 1000;

fn stem_and_ext(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

/// `<out_dir>/<stem>_h265<ext>`, made unique on disk. Without an output
/// directory the file lands next to the input.
pub fn transcode_output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let (stem, ext) = stem_and_ext(input);
    let dir = match out_dir {
        Some(d) => d.to_path_buf(),
        None    => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    unique_path(&dir.join(format!("{stem}{TRANSCODE_SUFFIX}{ext}")))
}

/// `path` if nothing exists there, otherwise the first free `<stem>_N<ext>`.
pub fn unique_path(path: &Path) -> PathBuf {
    unique_path_with(path, |p| p.exists())
}

/// [`unique_path`] against an arbitrary existence check.
pub fn unique_path_with(path: &Path, exists: impl Fn(&Path) -> bool) -> PathBuf {
    if !exists(path) {
        return path.to_path_buf();
    }
    let (stem, ext) = stem_and_ext(path);
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    for n in 1..=MAX_UNIQUE_ATTEMPTS {
        let candidate = dir.join(format!("{stem}_{n}{ext}"));
        if !exists(&candidate) {
            return candidate;
        }
    }
    warn!("no free name for {} after {MAX_UNIQUE_ATTEMPTS} attempts; reusing it", path.display());
    path.to_path_buf()
}

/// FFmpeg muxer name for an output path, chosen by extension.
/// Unknown or missing extensions fall back to Matroska.
///
/// ```
/// use std::path::Path;
/// use mediaforge_core::naming::container_for_path;
/// assert_eq!(container_for_path(Path::new("a.MP4")), "mp4");
/// assert_eq!(container_for_path(Path::new("a.m2ts")), "mpegts");
/// assert_eq!(container_for_path(Path::new("a.xyz")), "matroska");
/// ```
pub fn container_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v"          => "mp4",
        "mov" | "qt"           => "mov",
        "mkv"                  => "matroska",
        "webm"                 => "webm",
        "ts" | "m2ts" | "mts"  => "mpegts",
        "avi"                  => "avi",
        "flv"                  => "flv",
        "mpg" | "mpeg"         => "mpeg",
        "3gp"                  => "3gp",
        _                      => "matroska",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;

    #[test]
    fn output_goes_to_out_dir_with_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let out = transcode_output_path(Path::new("/videos/trip.mov"), Some(dir.path()));
        assert_eq!(out, dir.path().join("trip_h265.mov"));
    }

    #[test]
    fn output_defaults_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        assert_eq!(transcode_output_path(&input, None), dir.path().join("clip_h265.mp4"));
    }

    #[test]
    fn existing_files_get_a_counter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clip_h265.mp4"), b"").unwrap();
        fs::write(dir.path().join("clip_h265_1.mp4"), b"").unwrap();
        let out = transcode_output_path(Path::new("clip.mp4"), Some(dir.path()));
        assert_eq!(out, dir.path().join("clip_h265_2.mp4"));
    }

    #[test]
    fn extensionless_input() {
        let taken: HashSet<PathBuf> = [PathBuf::from("d/raw")].into();
        assert_eq!(unique_path_with(Path::new("d/raw"), |p| taken.contains(p)), PathBuf::from("d/raw_1"));
    }

    #[test]
    fn gives_up_after_limit() {
        assert_eq!(unique_path_with(Path::new("x.mp4"), |_| true), PathBuf::from("x.mp4"));
    }
}
