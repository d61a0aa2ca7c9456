//! Title enumeration and ripping via MakeMKV

use crate::disc::{makemkv_source, MAKEMKV_COMMAND};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{error, warn};

/// Minimum duration for a title to count as the main feature
pub const MIN_FEATURE_SECONDS: u64 = 60 * 60;

/// Information about one title on a disc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleInfo {
    pub index: u32,
    pub duration_seconds: u64,
    pub size_bytes: u64,
    pub filename: String,
    pub chapters: u32,
}

/// Parse a duration of the form "H:MM:SS" or "MM:SS" to seconds.
pub fn parse_duration(duration: &str) -> u64 {
    let parts: Vec<&str> = duration.split(':').collect();
    let nums: Vec<u64> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    if nums.len() != parts.len() {
        return 0;
    }
    match nums.as_slice() {
        [h, m, s] => h * 3600 + m * 60 + s,
        [m, s] => m * 60 + s,
        _ => 0,
    }
}

/// Parse a size like "4.7 GB", "700 MB" or a plain byte count.
pub fn parse_size(size: &str) -> u64 {
    let size = size.trim();
    let split = size
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(size.len());
    let (number, unit) = size.split_at(split);
    let Ok(value) = number.parse::<f64>() else {
        return 0;
    };
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "GB" => 1024 * 1024 * 1024,
        "MB" => 1024 * 1024,
        "KB" => 1024,
        "B" | "" => 1,
        _ => return 0,
    };
    (value * multiplier as f64) as u64
}

/// Parse MakeMKV `TINFO:` records into per-title information.
///
/// Record format: `TINFO:title_index,attribute_id,code,value`. Attribute ids:
/// 8 = chapter count, 9 = duration, 10 = size in bytes, 11 = formatted size
/// (fallback when 10 is absent), 27 = output filename.
pub fn parse_title_list(output: &str) -> Vec<TitleInfo> {
    let mut titles: BTreeMap<u32, TitleInfo> = BTreeMap::new();

    for line in output.lines() {
        let Some(rest) = line.strip_prefix("TINFO:") else {
            continue;
        };
        let parts: Vec<&str> = rest.splitn(4, ',').collect();
        if parts.len() < 4 {
            continue;
        }
        let (Ok(index), Ok(attr_id)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) else {
            continue;
        };
        let value = parts[3].trim().trim_matches('"');

        let entry = titles.entry(index).or_insert_with(|| TitleInfo {
            index,
            duration_seconds: 0,
            size_bytes: 0,
            filename: String::new(),
            chapters: 0,
        });

        match attr_id {
            8 => entry.chapters = value.parse().unwrap_or(0),
            9 => entry.duration_seconds = parse_duration(value),
            10 => entry.size_bytes = parse_size(value),
            11 => {
                if entry.size_bytes == 0 {
                    entry.size_bytes = parse_size(value);
                }
            }
            27 => entry.filename = value.to_string(),
            _ => {}
        }
    }

    titles.into_values().collect()
}

/// Pick the main title: the longest title of at least an hour, falling back
/// to the globally longest when nothing qualifies.
pub fn select_main_title(titles: &[TitleInfo]) -> Option<&TitleInfo> {
    titles
        .iter()
        .filter(|t| t.duration_seconds >= MIN_FEATURE_SECONDS)
        .max_by_key(|t| t.duration_seconds)
        .or_else(|| titles.iter().max_by_key(|t| t.duration_seconds))
}

/// Extract human-readable diagnostics from `MSG:` records, skipping routine noise.
fn extract_messages(output: &str) -> Vec<String> {
    let mut messages = Vec::new();
    for line in output.lines() {
        let Some(rest) = line.strip_prefix("MSG:") else {
            continue;
        };
        let parts: Vec<&str> = rest.splitn(4, ',').collect();
        if parts.len() < 4 {
            continue;
        }
        let msg = parts[3]
            .trim()
            .trim_start_matches('"')
            .split("\",\"")
            .next()
            .unwrap_or("")
            .trim_end_matches('"')
            .to_string();
        let lower = msg.to_lowercase();
        if ["started", "opened in os access mode", "operation successfully"]
            .iter()
            .any(|skip| lower.contains(skip))
        {
            continue;
        }
        if !msg.is_empty() {
            messages.push(msg);
        }
    }
    messages
}

/// Enumerate the titles on the disc in a drive.
pub async fn disc_titles(drive_id: &str) -> Result<Vec<TitleInfo>> {
    let output = Command::new(MAKEMKV_COMMAND)
        .arg("info")
        .arg(makemkv_source(drive_id))
        .arg("-r")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let titles = parse_title_list(&stdout);

    if titles.is_empty() {
        let messages = extract_messages(&stdout);
        if !messages.is_empty() {
            warn!(drive_id, ?messages, "MakeMKV diagnostics while reading disc");
        }
        return Err(Error::DiscRead {
            drive_id: drive_id.to_string(),
            details: if messages.is_empty() {
                "no titles found on disc".to_string()
            } else {
                messages.join("; ")
            },
        });
    }

    Ok(titles)
}

/// Rip one title into `output_dir`, reporting fractional progress in [0, 1].
///
/// Returns the path of the single container file MakeMKV produced.
pub async fn rip_title(
    drive_id: &str,
    title_index: u32,
    output_dir: &Path,
    progress: impl Fn(f64),
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;

    let mut child = Command::new(MAKEMKV_COMMAND)
        .arg("mkv")
        .arg(makemkv_source(drive_id))
        .arg(title_index.to_string())
        .arg(output_dir)
        .arg("-r")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("ripper stdout not captured".to_string()))?;

    // Robot mode interleaves PRGV progress records with MSG diagnostics.
    let mut messages: Vec<String> = Vec::new();
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(rest) = line.strip_prefix("PRGV:") {
            let parts: Vec<&str> = rest.trim().split(',').collect();
            if parts.len() >= 3 {
                if let (Ok(current), Ok(max)) = (parts[0].parse::<u64>(), parts[2].parse::<u64>()) {
                    if max > 0 {
                        progress(current as f64 / max as f64);
                    }
                }
            }
        } else if line.starts_with("MSG:") {
            messages.extend(extract_messages(&line));
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        let details = last_messages(&messages, 5);
        error!(drive_id, title_index, %details, "MakeMKV rip failed");
        return Err(Error::Rip {
            drive_id: drive_id.to_string(),
            title_index,
            details: format!("MakeMKV exited with {status}: {details}"),
        });
    }

    // Exactly one artifact is expected; take the first container file found.
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "mkv") {
            return Ok(path);
        }
    }

    let details = last_messages(&messages, 10);
    error!(drive_id, title_index, %details, "Rip produced no output file");
    Err(Error::Rip {
        drive_id: drive_id.to_string(),
        title_index,
        details: if messages.is_empty() {
            "no output file produced".to_string()
        } else {
            details
        },
    })
}

fn last_messages(messages: &[String], count: usize) -> String {
    if messages.is_empty() {
        return "no details".to_string();
    }
    let start = messages.len().saturating_sub(count);
    messages[start..].join("; ")
}
