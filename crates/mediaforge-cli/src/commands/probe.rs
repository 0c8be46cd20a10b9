// crates/mediaforge-cli/src/commands/probe.rs

use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Result};

use mediaforge_core::helpers::time::format_clock;
use mediaforge_media::{probe_info, MediaInfo};

use crate::helpers::format::bit_rate;

fn describe(file: &Path, info: &MediaInfo) -> Vec<String> {
    let mut lines = vec![
        format!("File: {}", file.display()),
        format!("Container: {}", info.format),
        format!("Duration: {}", format_clock(info.duration)),
        format!("Bitrate: {}", bit_rate(info.bit_rate)),
    ];
    match &info.video_codec {
        Some(codec) => {
            let fps = info.fps.map(|f| format!(", {f:.3} fps")).unwrap_or_default();
            lines.push(format!("Video: {codec} {}x{}{fps}", info.width, info.height));
        }
        None => lines.push("Video: none".to_string()),
    }
    match &info.audio_codec {
        Some(codec) => lines.push(format!("Audio: {codec} {} Hz, {} ch", info.sample_rate, info.channels)),
        None => lines.push("Audio: none".to_string()),
    }
    lines
}

pub fn run(file: &Path, json: bool) -> Result<ExitCode> {
    if !file.exists() {
        bail!("file does not exist: {}", file.display());
    }
    let info = probe_info(file)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        for line in describe(file, &info) {
            println!("{line}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
