// crates/mediaforge-cli/src/config.rs
//
// Command line and environment. clap parses; the `*Config` structs below are
// what the commands actually consume, already validated and defaulted.
//
// Environment (flags win over env):
//   MEDIAFORGE_WORKERS      worker threads for `transcode`
//   MEDIAFORGE_OUTPUT_DIR   output directory for `transcode` and `split`
//   MEDIAFORGE_ENCODER      encoder preference for `transcode`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use mediaforge_core::helpers::time::parse_clock;
use mediaforge_core::scheduler::DEFAULT_WORKERS;
use mediaforge_core::EncoderPreference;

/// Upper bound on worker threads; each one holds a full decode/encode chain.
pub const MAX_WORKERS: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "mediaforge")]
#[command(author, version, about = "Batch H.265 transcoder and lossless video splitter")]
pub struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Re-encode files to H.265 on a pool of worker threads
    Transcode {
        /// Input files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write outputs here instead of next to each input
        #[arg(short, long, env = "MEDIAFORGE_OUTPUT_DIR")]
        out_dir: Option<PathBuf>,

        /// auto, hevc_nvenc, hevc_qsv, hevc_amf, libx265 or any other HEVC encoder name
        #[arg(short, long, env = "MEDIAFORGE_ENCODER", default_value = "auto")]
        encoder: String,

        /// Jobs run concurrently
        #[arg(short, long, env = "MEDIAFORGE_WORKERS", default_value_t = DEFAULT_WORKERS)]
        workers: usize,

        /// Print job snapshots as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },

    /// Cut a file at the given times and export the pieces without re-encoding
    Split {
        /// File to split
        file: PathBuf,

        /// Cut point as SS, MM:SS or HH:MM:SS (repeatable)
        #[arg(short, long = "cut", value_name = "TIME")]
        cuts: Vec<String>,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long, env = "MEDIAFORGE_OUTPUT_DIR")]
        out_dir: Option<PathBuf>,

        /// Join the exported segments into one file with this name
        #[arg(short, long, value_name = "NAME")]
        merge: Option<String>,

        /// Leave segment N (1-based) out of the export (repeatable)
        #[arg(long = "skip", value_name = "N")]
        skip: Vec<usize>,
    },

    /// Show container, codec and stream facts for a file
    Probe {
        /// File to probe
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// ── Validated configs ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeConfig {
    pub files:   Vec<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub encoder: EncoderPreference,
    pub workers: usize,
    pub json:    bool,
}

impl TranscodeConfig {
    pub fn new(files: Vec<PathBuf>, out_dir: Option<PathBuf>, encoder: &str, workers: usize, json: bool) -> Result<Self> {
        if files.is_empty() {
            bail!("no input files given");
        }
        if !(1..=MAX_WORKERS).contains(&workers) {
            bail!("--workers must be between 1 and {MAX_WORKERS}, got {workers}");
        }
        let encoder = EncoderPreference::parse(encoder);
        let known = EncoderPreference::CHOICES.iter().any(|(id, _)| *id == encoder.as_str());
        if !known {
            warn!("encoder '{encoder}' is not one of the usual choices, trying it first anyway");
        }
        Ok(Self { files, out_dir, encoder, workers, json })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    pub file:    PathBuf,
    /// Cut times in seconds, in the order given.
    pub cuts:    Vec<f64>,
    pub out_dir: PathBuf,
    /// Full path of the merged output, when merging.
    pub merge:   Option<PathBuf>,
    /// 1-based segment numbers to leave out.
    pub skip:    Vec<usize>,
}

impl SplitConfig {
    pub fn new(
        file:    PathBuf,
        cuts:    &[String],
        out_dir: Option<PathBuf>,
        merge:   Option<&str>,
        skip:    Vec<usize>,
    ) -> Result<Self> {
        let cuts = cuts
            .iter()
            .map(|c| parse_clock(c).with_context(|| format!("invalid cut time '{c}' (use SS, MM:SS or HH:MM:SS)")))
            .collect::<Result<Vec<f64>>>()?;
        if skip.contains(&0) {
            bail!("--skip takes 1-based segment numbers");
        }

        let out_dir = out_dir.unwrap_or_else(|| file.parent().map(Path::to_path_buf).unwrap_or_default());
        let merge = match merge.map(str::trim) {
            Some("") => bail!("--merge needs a file name"),
            Some(name) => Some(out_dir.join(merged_file_name(name, &file))),
            None => None,
        };
        Ok(Self { file, cuts, out_dir, merge, skip })
    }
}

/// `<name><input ext>`, unless `name` already carries that extension.
fn merged_file_name(name: &str, input: &Path) -> String {
    let Some(ext) = input.extension().map(|e| e.to_string_lossy().into_owned()) else {
        return name.to_string();
    };
    let has_ext = Path::new(name)
        .extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(&ext));
    if has_ext { name.to_string() } else { format!("{name}.{ext}") }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mediaforge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn transcode_flags_parse() {
        let cli = parse(&["-v", "transcode", "a.mp4", "b.mkv", "-e", "libx265", "-w", "2", "-o", "/out"]);
        assert!(cli.verbose);
        let Commands::Transcode { files, out_dir, encoder, workers, json } = cli.command else {
            panic!("expected transcode");
        };
        assert_eq!(files, vec![PathBuf::from("a.mp4"), PathBuf::from("b.mkv")]);
        assert_eq!(out_dir, Some(PathBuf::from("/out")));
        assert_eq!(encoder, "libx265");
        assert_eq!(workers, 2);
        assert!(!json);
    }

    #[test]
    fn transcode_requires_files() {
        assert!(Cli::try_parse_from(["mediaforge", "transcode"]).is_err());
    }

    #[test]
    fn split_collects_repeated_cuts() {
        let cli = parse(&["split", "in.mp4", "--cut", "30", "-c", "1:15", "--merge", "best", "--skip", "2"]);
        let Commands::Split { file, cuts, merge, skip, .. } = cli.command else {
            panic!("expected split");
        };
        assert_eq!(file, PathBuf::from("in.mp4"));
        assert_eq!(cuts, vec!["30".to_string(), "1:15".to_string()]);
        assert_eq!(merge.as_deref(), Some("best"));
        assert_eq!(skip, vec![2]);
    }

    #[test]
    fn transcode_config_validates() {
        let files = vec![PathBuf::from("a.mp4")];
        let cfg = TranscodeConfig::new(files.clone(), None, "AUTO", 3, false).unwrap();
        assert_eq!(cfg.encoder, EncoderPreference::Auto);

        let cfg = TranscodeConfig::new(files.clone(), None, "hevc_qsv", 1, true).unwrap();
        assert_eq!(cfg.encoder, EncoderPreference::Named("hevc_qsv".into()));

        assert!(TranscodeConfig::new(files.clone(), None, "auto", 0, false).is_err());
        assert!(TranscodeConfig::new(files.clone(), None, "auto", MAX_WORKERS + 1, false).is_err());
        let cfg = TranscodeConfig::new(files.clone(), None, "hevc_vaapi", 3, false).unwrap();
        assert_eq!(cfg.encoder, EncoderPreference::Named("hevc_vaapi".into()));
        let cfg = TranscodeConfig::new(files, None, "", 3, false).unwrap();
        assert_eq!(cfg.encoder, EncoderPreference::Auto);
        assert!(TranscodeConfig::new(Vec::new(), None, "auto", 3, false).is_err());
    }

    #[test]
    fn split_config_parses_times_and_merge_name() {
        let cuts = vec!["90".to_string(), "00:02:00".to_string()];
        let cfg = SplitConfig::new(PathBuf::from("/v/trip.mp4"), &cuts, None, Some("highlights"), vec![1]).unwrap();
        assert_eq!(cfg.cuts, vec![90.0, 120.0]);
        assert_eq!(cfg.out_dir, PathBuf::from("/v"));
        assert_eq!(cfg.merge, Some(PathBuf::from("/v/highlights.mp4")));

        let cfg = SplitConfig::new(PathBuf::from("/v/trip.mp4"), &[], Some("/o".into()), Some("x.MP4"), vec![]).unwrap();
        assert_eq!(cfg.merge, Some(PathBuf::from("/o/x.MP4")));
    }

    #[test]
    fn split_config_rejects_bad_input() {
        let file = PathBuf::from("/v/trip.mp4");
        assert!(SplitConfig::new(file.clone(), &["1:xx".to_string()], None, None, vec![]).is_err());
        assert!(SplitConfig::new(file.clone(), &[], None, Some("  "), vec![]).is_err());
        assert!(SplitConfig::new(file, &[], None, None, vec![0]).is_err());
    }
}
