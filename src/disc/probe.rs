//! Disc presence probing
//!
//! Asks MakeMKV for drive records and reduces them to `(has_disc, label)`.
//! An empty label is a valid value distinct from "no disc"; probe failures
//! and timeouts report "no disc" so edge detection stays quiet.

use crate::disc::{makemkv_source, MAKEMKV_COMMAND};
use crate::error::Result;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

/// Upper bound on a single probe invocation
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// What a drive reported when probed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveStatus {
    pub has_disc: bool,
    pub disc_label: String,
}

impl DriveStatus {
    fn empty() -> Self {
        Self {
            has_disc: false,
            disc_label: String::new(),
        }
    }
}

/// Parse MakeMKV `DRV:` records into a drive status.
///
/// Record format: `DRV:index,flags,count,disc_type,"media_type","label","device"`.
/// Flag bit 1 (value 2) means a disc is present; bit 8 (value 256) means the
/// tray is empty.
pub fn parse_drive_records(output: &str) -> DriveStatus {
    for line in output.lines() {
        let Some(rest) = line.strip_prefix("DRV:") else {
            continue;
        };
        let parts: Vec<&str> = rest.splitn(7, ',').collect();
        if parts.len() < 7 {
            continue;
        }
        let Ok(flags) = parts[1].parse::<u32>() else {
            continue;
        };
        if flags & 256 != 0 {
            return DriveStatus::empty();
        }
        if flags & 2 != 0 {
            return DriveStatus {
                has_disc: true,
                disc_label: parts[5].trim_matches('"').to_string(),
            };
        }
    }
    DriveStatus::empty()
}

/// Probe a drive, bounded by [`PROBE_TIMEOUT`].
pub async fn probe_drive(drive_id: &str) -> DriveStatus {
    match tokio::time::timeout(PROBE_TIMEOUT, run_probe(drive_id)).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            warn!(drive_id, error = %e, "Drive probe failed");
            DriveStatus::empty()
        }
        Err(_) => {
            warn!(drive_id, "Drive probe timed out");
            DriveStatus::empty()
        }
    }
}

async fn run_probe(drive_id: &str) -> Result<DriveStatus> {
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
    Ok(parse_drive_records(&stdout))
}

/// Eject the disc from a drive. Best effort; failures are logged only.
pub async fn eject_drive(drive_id: &str) -> bool {
    match Command::new("drutil")
        .args(["eject", "-drive", drive_id])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
    {
        Ok(output) => {
            if !output.status.success() {
                warn!(drive_id, "Eject command exited non-zero");
            }
            output.status.success()
        }
        Err(e) => {
            warn!(drive_id, error = %e, "Failed to run eject command");
            false
        }
    }
}
