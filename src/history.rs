//! Pass history for audit trails
//!
//! Each cleanup pass run from the command line can be saved as a JSON file:
//!   ~/.local/share/trashkeeper/history/pass_YYYYMMDD_HHMMSS_mmm.json (Linux)

use crate::policy::{PassReport, Reason};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One file handed to the eraser
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErasureRecord {
    pub path: String,
    pub size_bytes: u64,
    /// "aged" or "quota"
    pub reason: String,
}

/// Saved summary of one pass
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PassLog {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub started: DateTime<Utc>,
    pub dry_run: bool,
    pub records: Vec<ErasureRecord>,
    pub total_bytes: u64,
    pub dirs_removed: usize,
    pub failed_locations: Vec<String>,
}

impl PassLog {
    pub fn from_report(report: &PassReport, dry_run: bool) -> Self {
        let records = report
            .submitted()
            .map(|s| ErasureRecord {
                path: s.path.display().to_string(),
                size_bytes: s.size,
                reason: match s.reason {
                    Reason::Aged => "aged",
                    Reason::Quota => "quota",
                }
                .to_string(),
            })
            .collect();
        Self {
            started: report.started,
            dry_run,
            records,
            total_bytes: report.bytes_submitted(),
            dirs_removed: report.dirs_removed(),
            failed_locations: report
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.location.display(), f.error))
                .collect(),
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        self.save_to(&history_dir()?)
    }

    /// Write the log into `dir`, returning the file path
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create history directory: {}", dir.display()))?;

        let json = serde_json::to_string_pretty(self).context("Failed to serialize pass log")?;
        let stem = format!("pass_{}", self.started.format("%Y%m%d_%H%M%S_%3f"));

        // Never overwrite a log started in the same millisecond
        for attempt in 0u32.. {
            let log_path = if attempt == 0 {
                dir.join(format!("{stem}.json"))
            } else {
                dir.join(format!("{stem}_{attempt}.json"))
            };
            match OpenOptions::new().write(true).create_new(true).open(&log_path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes()).with_context(|| {
                        format!("Failed to write pass log to {}", log_path.display())
                    })?;
                    return Ok(log_path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to create pass log {}", log_path.display())
                    })
                }
            }
        }
        anyhow::bail!("No free pass log name in {}", dir.display())
    }

    pub fn summary(&self) -> String {
        let quota = self.records.iter().filter(|r| r.reason == "quota").count();
        format!(
            "{} files ({} aged, {} quota), {}, {} dirs removed{}",
            self.records.len(),
            self.records.len() - quota,
            quota,
            bytesize::to_string(self.total_bytes, true),
            self.dirs_removed,
            if self.dry_run { " [dry run]" } else { "" }
        )
    }
}

pub fn history_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "trashkeeper")
        .map(|dirs| dirs.data_dir().join("history"))
        .context("No data directory available on this platform")
}

/// Log files in `dir`, newest first
pub fn list_logs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read history directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();

    // Filenames embed the timestamp
    logs.sort();
    logs.reverse();

    Ok(logs)
}

pub fn load_log(path: &Path) -> Result<PassLog> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse log file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{FailedLocation, LocationReport, Submitted};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn report() -> PassReport {
        PassReport {
            started: Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
            locations: vec![LocationReport {
                location: PathBuf::from("/media/hdd/.Trash"),
                scanned: true,
                submitted: vec![
                    Submitted {
                        path: PathBuf::from("/media/hdd/.Trash/old.ts"),
                        size: 1000,
                        reason: Reason::Aged,
                    },
                    Submitted {
                        path: PathBuf::from("/media/hdd/.Trash/young.ts"),
                        size: 500,
                        reason: Reason::Quota,
                    },
                ],
                dirs_removed: 2,
                ..LocationReport::default()
            }],
            failed: vec![FailedLocation {
                location: PathBuf::from("/media/usb/.Trash"),
                error: "statvfs failed".to_string(),
            }],
        }
    }

    #[test]
    fn test_from_report() {
        let log = PassLog::from_report(&report(), false);

        assert_eq!(log.records.len(), 2);
        assert_eq!(log.records[0].reason, "aged");
        assert_eq!(log.records[1].reason, "quota");
        assert_eq!(log.total_bytes, 1500);
        assert_eq!(log.dirs_removed, 2);
        assert_eq!(log.failed_locations.len(), 1);
    }

    #[test]
    fn test_summary() {
        let summary = PassLog::from_report(&report(), true).summary();
        assert!(summary.starts_with("2 files (1 aged, 1 quota)"));
        assert!(summary.contains("2 dirs removed"));
        assert!(summary.ends_with("[dry run]"));
    }

    #[test]
    fn test_save_list_and_load() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("history");

        let log = PassLog::from_report(&report(), false);
        let saved = log.save_to(&dir).unwrap();
        assert_eq!(saved.file_name().unwrap(), "pass_20260301_123000_000.json");

        let mut later = log.clone();
        later.started = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        later.save_to(&dir).unwrap();

        let logs = list_logs(&dir).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].ends_with("pass_20260302_080000_000.json"));

        let loaded = load_log(&saved).unwrap();
        assert_eq!(loaded.records, log.records);
        assert_eq!(loaded.started, log.started);
    }

    #[test]
    fn test_same_start_time_keeps_both_logs() {
        let temp = TempDir::new().unwrap();
        let log = PassLog::from_report(&report(), false);

        let first = log.save_to(temp.path()).unwrap();
        let second = log.save_to(temp.path()).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "pass_20260301_123000_000_1.json");
        let logs = list_logs(temp.path()).unwrap();
        assert_eq!(logs, vec![second, first]);
    }

    #[test]
    fn test_list_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(list_logs(&temp.path().join("none")).unwrap().is_empty());
    }
}
