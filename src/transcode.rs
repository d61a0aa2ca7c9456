//! Transcoding via HandBrakeCLI
//!
//! Fixed delivery preset: x264 at quality 19, high profile level 4.1,
//! primary audio passed through with an AAC stereo secondary track, and a
//! forced-subtitle scan. Progress is parsed from the stderr stream.

use crate::error::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::error;

/// HandBrake command name, resolved through PATH
pub const HANDBRAKE_COMMAND: &str = "HandBrakeCLI";

/// Progress report emitted while encoding
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProgress {
    /// Percent complete, 0.0 to 100.0
    pub percent: f64,
    /// Current frames per second, when reported
    pub fps: Option<f64>,
    /// Estimated time remaining as "NNhNNmNNs", when reported
    pub eta: Option<String>,
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.?\d*)\s*%").unwrap())
}

fn fps_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+\.?\d*)\s*fps").unwrap())
}

fn eta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ETA\s+(\d+h\d+m\d+s)").unwrap())
}

/// Parse a HandBrake progress line.
///
/// Lines look like `Encoding: task 1 of 1, 45.67 %` or
/// `Encoding: task 1 of 1, 45.67 % (30.5 fps, avg 29.8 fps, ETA 00h05m12s)`.
pub fn parse_progress_line(line: &str) -> Option<EncodeProgress> {
    if !line.contains("Encoding:") {
        return None;
    }
    let percent = percent_re()
        .captures(line)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()?;

    let fps = fps_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    let eta = eta_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    Some(EncodeProgress { percent, fps, eta })
}

/// Build the HandBrakeCLI argument list for the delivery preset.
pub fn encode_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--input".to_string(),
        input.display().to_string(),
        "--output".to_string(),
        output.display().to_string(),
    ];
    args.extend(
        [
            // Video: x264, quality 19, high profile, level 4.1
            "-e",
            "x264",
            "-q",
            "19",
            "--encoder-profile",
            "high",
            "--encoder-level",
            "4.1",
            // Audio: pass the primary track through, add an AAC stereo fallback
            "-a",
            "1,1",
            "-E",
            "copy,av_aac",
            "--audio-fallback",
            "av_aac",
            "--mixdown",
            "none,stereo",
            // Subtitles: scan for forced tracks
            "--subtitle",
            "scan",
            "--subtitle-forced",
            // Chapter markers, MKV container
            "--markers",
            "-f",
            "av_mkv",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

fn error_details(stderr_lines: &[String], max_lines: usize) -> String {
    let keywords = ["error", "fail", "invalid", "cannot", "unable"];
    let error_lines: Vec<&String> = stderr_lines
        .iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            keywords.iter().any(|kw| lower.contains(kw))
        })
        .take(max_lines)
        .collect();

    if error_lines.is_empty() {
        let start = stderr_lines.len().saturating_sub(max_lines);
        stderr_lines[start..].join("\n")
    } else {
        error_lines
            .into_iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Transcode `input` to `output`, reporting progress along the way.
pub async fn encode_file(
    input: &Path,
    output: &Path,
    progress: impl Fn(EncodeProgress),
) -> Result<()> {
    let metadata = tokio::fs::metadata(input)
        .await
        .map_err(|e| Error::Encode(format!("input file not accessible: {}: {e}", input.display())))?;
    if !metadata.is_file() {
        return Err(Error::Encode(format!(
            "input path is not a file: {}",
            input.display()
        )));
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut child = Command::new(HANDBRAKE_COMMAND)
        .args(encode_args(input, output))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Encode(format!("failed to launch {HANDBRAKE_COMMAND}: {e}")))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Internal("transcoder stderr not captured".to_string()))?;

    let mut stderr_lines: Vec<String> = Vec::new();
    let mut lines = BufReader::new(stderr).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(report) = parse_progress_line(&line) {
            progress(report);
        }
        stderr_lines.push(line);
    }

    let status = child.wait().await?;
    if !status.success() {
        let details = error_details(&stderr_lines, 10);
        error!(%details, "HandBrake encoding failed");
        return Err(Error::Encode(format!(
            "transcoder exited with {status}: {details}"
        )));
    }

    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(Error::Encode(format!(
            "output file is empty: {}",
            output.display()
        ))),
        Err(_) => Err(Error::Encode(format!(
            "output file was not created: {}",
            output.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn bare_percent_line_parses() {
        let report = parse_progress_line("Encoding: task 1 of 1, 45.67 %").unwrap();
        assert_eq!(report.percent, 45.67);
        assert_eq!(report.fps, None);
        assert_eq!(report.eta, None);
    }

    #[test]
    fn full_progress_line_parses() {
        let line = "Encoding: task 1 of 1, 45.67 % (30.5 fps, avg 29.8 fps, ETA 00h05m12s)";
        let report = parse_progress_line(line).unwrap();
        assert_eq!(report.percent, 45.67);
        assert_eq!(report.fps, Some(30.5));
        assert_eq!(report.eta.as_deref(), Some("00h05m12s"));
    }

    #[test]
    fn non_progress_lines_are_ignored() {
        assert!(parse_progress_line("Muxing: this may take awhile...").is_none());
        assert!(parse_progress_line("Encoding: warming up").is_none());
    }

    #[test]
    fn preset_carries_the_delivery_settings() {
        let args = encode_args(&PathBuf::from("/in.mkv"), &PathBuf::from("/out.mkv"));
        let joined = args.join(" ");
        assert!(joined.contains("-q 19"));
        assert!(joined.contains("--encoder-profile high"));
        assert!(joined.contains("--encoder-level 4.1"));
        assert!(joined.contains("copy,av_aac"));
        assert!(joined.contains("--subtitle scan"));
    }

    #[test]
    fn error_details_prefer_error_lines() {
        let lines = vec![
            "scanning title".to_string(),
            "ERROR: bad stream".to_string(),
            "done".to_string(),
        ];
        assert_eq!(error_details(&lines, 10), "ERROR: bad stream");
    }
}
