//! Trash reclamation policy
//!
//! A pass over one trash folder deletes two kinds of files:
//!
//! - **aged** files, whose change time is older than the retention limit,
//!   are always deleted;
//! - younger files become **candidates** and are deleted oldest-first only
//!   while the volume is still short of its reserved free space.
//!
//! The walk is bottom-up. Each directory level is handled completely (files,
//! then empty subdirectories, then that level's candidates) before its parent.

use crate::eraser::Eraser;
use crate::error::{Result, TrashError};
use crate::space::SpaceProbe;
use crate::utils;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Age rule applied before the quota rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionLimit {
    /// Retention of zero days: every file is fair game, only the quota applies
    Disabled,
    /// Files changed strictly before this instant are deleted unconditionally
    OlderThan(SystemTime),
}

impl RetentionLimit {
    pub fn from_days(days: u64, now: SystemTime) -> Self {
        if days == 0 {
            return RetentionLimit::Disabled;
        }
        let window = Duration::from_secs(days.saturating_mul(24 * 3600));
        RetentionLimit::OlderThan(now.checked_sub(window).unwrap_or(UNIX_EPOCH))
    }

    pub fn is_expired(&self, changed: SystemTime) -> bool {
        match self {
            RetentionLimit::Disabled => true,
            RetentionLimit::OlderThan(limit) => changed < *limit,
        }
    }
}

/// A file kept back from the age rule, deletable for quota.
///
/// Ordering is by change time first, so sorting yields oldest-first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    pub changed: SystemTime,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Aged,
    Quota,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitted {
    pub path: PathBuf,
    pub size: u64,
    pub reason: Reason,
}

/// Outcome for one trash folder
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationReport {
    pub location: PathBuf,
    /// False when the folder did not exist
    pub scanned: bool,
    pub trash_bytes: u64,
    pub free_bytes: u64,
    /// Shortfall against the reserve at the start; negative means none
    pub initial_bytes_to_remove: i64,
    /// Shortfall left after the pass
    pub bytes_to_remove: i64,
    /// Bytes of candidates that survived the pass
    pub remaining_bytes: u64,
    pub submitted: Vec<Submitted>,
    pub dirs_removed: usize,
    pub preserved: usize,
    pub vanished: usize,
    pub errors: usize,
}

impl LocationReport {
    fn missing(location: &Path) -> Self {
        Self {
            location: location.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn submitted_count(&self, reason: Reason) -> usize {
        self.submitted.iter().filter(|s| s.reason == reason).count()
    }

    pub fn submitted_bytes(&self) -> u64 {
        self.submitted.iter().map(|s| s.size).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedLocation {
    pub location: PathBuf,
    pub error: String,
}

/// Outcome of a whole pass over all trash folders
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started: DateTime<Utc>,
    pub locations: Vec<LocationReport>,
    pub failed: Vec<FailedLocation>,
}

impl PassReport {
    pub fn files_submitted(&self) -> usize {
        self.locations.iter().map(|l| l.submitted.len()).sum()
    }

    pub fn bytes_submitted(&self) -> u64 {
        self.locations.iter().map(LocationReport::submitted_bytes).sum()
    }

    pub fn dirs_removed(&self) -> usize {
        self.locations.iter().map(|l| l.dirs_removed).sum()
    }

    pub fn submitted(&self) -> impl Iterator<Item = &Submitted> {
        self.locations.iter().flat_map(|l| l.submitted.iter())
    }
}

/// Quota bookkeeping threaded through one location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaState {
    pub bytes_to_remove: i64,
    pub size: u64,
}

impl QuotaState {
    pub fn new(reserve_bytes: u64, free_bytes: u64) -> Self {
        Self {
            bytes_to_remove: to_i64(reserve_bytes).saturating_sub(to_i64(free_bytes)),
            size: 0,
        }
    }

    pub fn satisfied(&self) -> bool {
        self.bytes_to_remove <= 0
    }
}

fn to_i64(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// Pick candidates oldest-first until the shortfall is covered.
///
/// Sorts `candidates` in place and updates `state` for every pick.
pub fn select_for_quota(candidates: &mut [Candidate], state: &mut QuotaState) -> Vec<Candidate> {
    candidates.sort();
    let mut picked = Vec::new();
    for candidate in candidates.iter() {
        if state.satisfied() {
            break;
        }
        state.bytes_to_remove = state.bytes_to_remove.saturating_sub(to_i64(candidate.size));
        state.size = state.size.saturating_sub(candidate.size);
        picked.push(candidate.clone());
    }
    picked
}

/// The moment a file last changed; inode change time where available
#[cfg(unix)]
pub fn change_time(meta: &fs::Metadata) -> SystemTime {
    use std::os::unix::fs::MetadataExt;

    match (u64::try_from(meta.ctime()), u32::try_from(meta.ctime_nsec())) {
        (Ok(secs), Ok(nanos)) => UNIX_EPOCH + Duration::new(secs, nanos),
        _ => UNIX_EPOCH,
    }
}

#[cfg(not(unix))]
pub fn change_time(meta: &fs::Metadata) -> SystemTime {
    meta.modified().unwrap_or(UNIX_EPOCH)
}

struct Level {
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

fn read_level(dir: &Path) -> Result<Level> {
    let mut level = Level {
        dirs: Vec::new(),
        files: Vec::new(),
    };
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(io) => TrashError::classify(io, "read_dir", &path),
                None => TrashError::Io {
                    op: "read_dir",
                    path,
                    source: std::io::Error::new(std::io::ErrorKind::Other, "walk error"),
                },
            }
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            level.dirs.push(entry.into_path());
        } else if file_type.is_symlink() && fs::metadata(entry.path()).is_ok_and(|m| m.is_dir()) {
            // Directory links are neither entered nor erased
            tracing::debug!(path = %entry.path().display(), "skipping directory link");
        } else {
            level.files.push(entry.into_path());
        }
    }
    Ok(level)
}

/// Deletion rules for one pass
#[derive(Debug, Clone)]
pub struct ReclaimPolicy {
    pub limit: RetentionLimit,
    pub reserve_bytes: u64,
    /// File name that is never deleted (per-directory settings)
    pub preserved_name: Option<OsString>,
}

impl ReclaimPolicy {
    pub fn new(limit: RetentionLimit, reserve_bytes: u64) -> Self {
        Self {
            limit,
            reserve_bytes,
            preserved_name: None,
        }
    }

    pub fn preserving(mut self, name: impl Into<OsString>) -> Self {
        self.preserved_name = Some(name.into());
        self
    }

    fn is_preserved(&self, path: &Path) -> bool {
        match (&self.preserved_name, path.file_name()) {
            (Some(keep), Some(name)) => keep.as_os_str() == name,
            _ => false,
        }
    }

    /// Run over every location. Failures are logged and recorded per location.
    pub fn run<I>(&self, locations: I, space: &dyn SpaceProbe, eraser: &dyn Eraser) -> PassReport
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut report = PassReport {
            started: Utc::now(),
            locations: Vec::new(),
            failed: Vec::new(),
        };
        for location in locations {
            match self.reclaim_location(&location, space, eraser) {
                Ok(location_report) => report.locations.push(location_report),
                Err(e) => {
                    tracing::warn!(location = %location.display(), "skipping trash folder: {e}");
                    report.failed.push(FailedLocation {
                        location,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Reclaim space from a single trash folder.
    ///
    /// A folder that does not exist yields an empty report. Only a failed
    /// free-space query is returned as an error.
    pub fn reclaim_location(
        &self,
        location: &Path,
        space: &dyn SpaceProbe,
        eraser: &dyn Eraser,
    ) -> Result<LocationReport> {
        if !location.is_dir() {
            tracing::debug!(location = %location.display(), "no trash folder");
            return Ok(LocationReport::missing(location));
        }

        tracing::info!(location = %location.display(), "looking in trashcan");
        let trash_bytes = utils::dir_size(location);
        let free_bytes = space.free_bytes(location)?;
        let mut state = QuotaState::new(self.reserve_bytes, free_bytes);
        tracing::info!(
            location = %location.display(),
            size = %bytesize::to_string(trash_bytes, true),
            free = %bytesize::to_string(free_bytes, true),
            bytes_to_remove = state.bytes_to_remove,
            "trash size"
        );

        let mut report = LocationReport {
            location: location.to_path_buf(),
            scanned: true,
            trash_bytes,
            free_bytes,
            initial_bytes_to_remove: state.bytes_to_remove,
            ..LocationReport::default()
        };

        self.reclaim_level(location, &mut state, eraser, &mut report);

        report.bytes_to_remove = state.bytes_to_remove;
        report.remaining_bytes = state.size;
        tracing::info!(
            location = %location.display(),
            size = %bytesize::to_string(state.size, true),
            "trash size now"
        );
        Ok(report)
    }

    fn reclaim_level(
        &self,
        dir: &Path,
        state: &mut QuotaState,
        eraser: &dyn Eraser,
        report: &mut LocationReport,
    ) {
        let level = match read_level(dir) {
            Ok(level) => level,
            Err(e) if e.is_not_found() => {
                report.vanished += 1;
                return;
            }
            Err(e) => {
                tracing::warn!("{e}");
                report.errors += 1;
                return;
            }
        };

        for sub in &level.dirs {
            self.reclaim_level(sub, state, eraser, report);
        }

        let mut candidates = Vec::new();
        for path in level.files {
            if self.is_preserved(&path) {
                report.preserved += 1;
                continue;
            }
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    match TrashError::classify(e, "stat", &path) {
                        err if err.is_not_found() => {
                            tracing::debug!(path = %path.display(), "vanished during scan");
                            report.vanished += 1;
                        }
                        err => {
                            tracing::warn!("{err}");
                            report.errors += 1;
                        }
                    }
                    continue;
                }
            };
            let size = meta.len();
            let changed = change_time(&meta);

            if self.limit.is_expired(changed) {
                eraser.erase(&path);
                state.bytes_to_remove = state.bytes_to_remove.saturating_sub(to_i64(size));
                report.submitted.push(Submitted {
                    path,
                    size,
                    reason: Reason::Aged,
                });
            } else {
                state.size = state.size.saturating_add(size);
                candidates.push(Candidate {
                    changed,
                    path,
                    size,
                });
            }
        }

        for sub in &level.dirs {
            match fs::remove_dir(sub) {
                Ok(()) => {
                    tracing::debug!(dir = %sub.display(), "removed empty directory");
                    report.dirs_removed += 1;
                }
                // Not empty, or not ours to remove
                Err(e) => {
                    tracing::debug!(dir = %sub.display(), "unable to delete directory: {e}");
                }
            }
        }

        for candidate in select_for_quota(&mut candidates, state) {
            eraser.erase(&candidate.path);
            report.submitted.push(Submitted {
                path: candidate.path,
                size: candidate.size,
                reason: Reason::Quota,
            });
        }
    }
}
