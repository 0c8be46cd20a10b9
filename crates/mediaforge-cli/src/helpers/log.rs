// crates/mediaforge-cli/src/helpers/log.rs
//
// Logging setup for the binary. Library crates only emit `tracing` events;
// this is the one place a subscriber gets installed.
//
// Filter precedence: RUST_LOG if set, else `--verbose` (debug for our
// crates), else info. Logs go to stderr so stdout stays clean for `--json`.

use ffmpeg_the_third as ffmpeg;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "mediaforge=info,mediaforge_core=info,mediaforge_media=info";
const VERBOSE_FILTER: &str = "mediaforge=debug,mediaforge_core=debug,mediaforge_media=debug";

pub fn filter_directives(verbose: bool, rust_log: Option<String>) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }.to_string())
}

/// Install the fmt subscriber and quieten FFmpeg's own logger, which would
/// otherwise print per-packet warnings straight to stderr.
pub fn init(verbose: bool) {
    let directives = filter_directives(verbose, std::env::var("RUST_LOG").ok());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();

    ffmpeg::util::log::set_level(if verbose {
        ffmpeg::util::log::Level::Warning
    } else {
        ffmpeg::util::log::Level::Error
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_wins() {
        assert_eq!(filter_directives(true, Some("trace".into())), "trace");
    }

    #[test]
    fn verbose_raises_to_debug() {
        assert_eq!(filter_directives(true, None), VERBOSE_FILTER);
        assert_eq!(filter_directives(false, None), DEFAULT_FILTER);
        assert_eq!(filter_directives(false, Some("  ".into())), DEFAULT_FILTER);
    }
}
