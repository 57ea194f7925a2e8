//! Trashcan service
//!
//! Owns the collaborators a cleanup pass needs and decides when a pass may
//! run: the feature must be enabled, no pass may be in flight, and nothing
//! may be recording. Passes run on a background thread.

use crate::config::Config;
use crate::eraser::Eraser;
use crate::error::{Result, TrashError};
use crate::locations;
use crate::mounts::MountTable;
use crate::policy::{PassReport, ReclaimPolicy, RetentionLimit};
use crate::space::SpaceProbe;
use crate::utils;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Lifecycle events of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent {
    Start,
    End,
}

pub trait RecordingState: Send + Sync {
    fn active_recordings(&self) -> usize;
}

/// Counts recordings in progress
#[derive(Debug, Default)]
pub struct RecordingCounter(AtomicUsize);

impl RecordingCounter {
    pub fn begin(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn end(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

impl RecordingState for RecordingCounter {
    fn active_recordings(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Single-slot guard: at most one cleanup pass at a time
#[derive(Debug, Clone, Default)]
pub struct CleanupGuard {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of a pass; releases the guard on drop
#[derive(Debug)]
pub struct CleanupTicket {
    busy: Arc<AtomicBool>,
}

impl CleanupGuard {
    pub fn try_acquire(&self) -> Option<CleanupTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CleanupTicket {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for CleanupTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// What happened to a cleanup request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Scheduled,
    AlreadyRunning,
    Disabled,
    RecordingInProgress,
    SpawnFailed,
}

/// Everything outside this crate that a pass touches
#[derive(Clone)]
pub struct Collaborators {
    pub mounts: Arc<dyn MountTable>,
    pub space: Arc<dyn SpaceProbe>,
    pub eraser: Arc<dyn Eraser>,
    pub recordings: Arc<dyn RecordingState>,
}

pub struct Trashcan {
    config: Config,
    parts: Collaborators,
    guard: CleanupGuard,
    pending: Mutex<Option<JoinHandle<PassReport>>>,
}

impl Trashcan {
    pub fn new(config: Config, parts: Collaborators) -> Self {
        Self {
            config,
            parts,
            guard: CleanupGuard::default(),
            pending: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Hook for recording notifications. A finished recording is a good
    /// moment to clean up.
    pub fn on_record_event(&self, event: RecordEvent) -> Option<Schedule> {
        match event {
            RecordEvent::End => Some(self.clean_if_idle()),
            RecordEvent::Start => None,
        }
    }

    /// Clean with the configured limits unless something is recording.
    pub fn clean_if_idle(&self) -> Schedule {
        let active = self.parts.recordings.active_recordings();
        if active > 0 {
            tracing::info!(recordings = active, "recording(s) in progress, not cleaning");
            return Schedule::RecordingInProgress;
        }
        let limit = RetentionLimit::from_days(self.config.retention_days, SystemTime::now());
        self.clean(limit, self.config.reserve_bytes())
    }

    /// Start a pass on a background thread if allowed.
    pub fn clean(&self, limit: RetentionLimit, reserve_bytes: u64) -> Schedule {
        if self.guard.is_busy() {
            tracing::info!("cleanup already running");
            return Schedule::AlreadyRunning;
        }
        if !self.config.enabled {
            tracing::info!("trash cleanup disabled, skipping check");
            return Schedule::Disabled;
        }
        let Some(ticket) = self.guard.try_acquire() else {
            tracing::info!("cleanup already running");
            return Schedule::AlreadyRunning;
        };

        // A finished earlier pass may still hold its handle
        self.reap();

        let config = self.config.clone();
        let parts = self.parts.clone();
        let spawned = thread::Builder::new()
            .name("trash-cleanup".to_string())
            .spawn(move || {
                let _ticket = ticket;
                execute(&config, &parts, limit, reserve_bytes)
            });

        match spawned {
            Ok(handle) => {
                if let Ok(mut pending) = self.pending.lock() {
                    *pending = Some(handle);
                }
                Schedule::Scheduled
            }
            Err(e) => {
                // The ticket went down with the closure, so the guard is free again
                tracing::error!("failed to start cleanup thread: {e}");
                Schedule::SpawnFailed
            }
        }
    }

    /// Run a pass on the calling thread, bypassing the recording check.
    pub fn run_pass(&self, limit: RetentionLimit, reserve_bytes: u64) -> Option<PassReport> {
        let _ticket = self.guard.try_acquire()?;
        Some(execute(&self.config, &self.parts, limit, reserve_bytes))
    }

    pub fn locations(&self) -> BTreeSet<PathBuf> {
        resolve_locations(&self.config, self.parts.mounts.as_ref())
    }

    /// Wait for the most recently scheduled pass, if any.
    pub fn wait(&self) -> Option<PassReport> {
        let handle = self.pending.lock().ok()?.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                tracing::error!("cleanup thread panicked");
                None
            }
        }
    }

    /// Stop accepting work and wait for an in-flight pass.
    pub fn shutdown(self) -> Option<PassReport> {
        self.wait()
    }

    fn reap(&self) {
        let finished = match self.pending.lock() {
            Ok(mut pending) if pending.as_ref().is_some_and(JoinHandle::is_finished) => {
                pending.take()
            }
            _ => None,
        };
        if let Some(handle) = finished {
            let _ = handle.join();
        }
    }
}

impl Drop for Trashcan {
    fn drop(&mut self) {
        self.wait();
    }
}

fn resolve_locations(config: &Config, mounts: &dyn MountTable) -> BTreeSet<PathBuf> {
    let entries = mounts.entries().unwrap_or_else(|e| {
        tracing::warn!("{e}; only the default path will be cleaned");
        Vec::new()
    });
    locations::trash_locations(&config.default_path, &entries, config.clean_network)
}

fn execute(
    config: &Config,
    parts: &Collaborators,
    limit: RetentionLimit,
    reserve_bytes: u64,
) -> PassReport {
    tracing::info!("probing trash folders");
    let trash_folders = resolve_locations(config, parts.mounts.as_ref());

    let mut policy = ReclaimPolicy::new(limit, reserve_bytes);
    if let Some(name) = config.preserved_name() {
        policy = policy.preserving(name);
    }

    let report = policy.run(trash_folders, parts.space.as_ref(), parts.eraser.as_ref());
    tracing::info!(
        files = report.files_submitted(),
        bytes = report.bytes_submitted(),
        dirs = report.dirs_removed(),
        failed = report.failed.len(),
        "cleanup pass finished"
    );
    report
}

/// Result of emptying one trash folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmptyReport {
    pub files: usize,
    pub bytes: u64,
    pub dirs_removed: usize,
}

/// Erase everything in `trash`, pruning directories that end up empty.
///
/// A missing folder is nothing to do.
pub fn empty_trash(trash: &Path, eraser: &dyn Eraser) -> Result<EmptyReport> {
    let mut report = EmptyReport::default();
    if !trash.is_dir() {
        tracing::info!(trash = %trash.display(), "no trash");
        return Ok(report);
    }

    for entry in WalkDir::new(trash)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(trash).to_path_buf();
                match e.into_io_error() {
                    Some(io) => match TrashError::classify(io, "read_dir", &path) {
                        err if err.is_not_found() => {}
                        err => tracing::warn!("{err}"),
                    },
                    None => tracing::warn!(path = %path.display(), "walk error"),
                }
                continue;
            }
        };

        if entry.file_type().is_dir() {
            match fs::remove_dir(entry.path()) {
                Ok(()) => report.dirs_removed += 1,
                Err(e) => {
                    tracing::debug!(dir = %entry.path().display(), "unable to delete directory: {e}")
                }
            }
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            eraser.erase(entry.path());
            report.files += 1;
            report.bytes += size;
        }
    }
    Ok(report)
}

/// Bytes held by a trash folder
pub fn trash_size(trash: &Path) -> u64 {
    utils::dir_size(trash)
}

/// Short usage label, e.g. `Trashcan: 12 MB`
pub fn format_trash_usage(bytes: u64) -> String {
    let amount = if bytes < 10_000_000 {
        format!("{} KB", bytes >> 10)
    } else if bytes < 10_000_000_000 {
        format!("{} MB", bytes >> 20)
    } else {
        format!("{} GB", bytes >> 30)
    };
    format!("Trashcan: {amount}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eraser::CollectingEraser;
    use crate::mounts::MountEntry;
    use crate::space::FixedSpace;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        root: PathBuf,
        eraser: Arc<CollectingEraser>,
        recordings: Arc<RecordingCounter>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let root = fs::canonicalize(temp.path()).unwrap();
            Self {
                _temp: temp,
                root,
                eraser: Arc::new(CollectingEraser::new()),
                recordings: Arc::new(RecordingCounter::default()),
            }
        }

        fn mount(&self) -> PathBuf {
            self.root.join("hdd")
        }

        fn trashcan(&self, config: Config, free: u64) -> Trashcan {
            let mounts = vec![MountEntry {
                device: "/dev/sda1".to_string(),
                mount_point: self.mount(),
                fs_type: "ext4".to_string(),
            }];
            let parts = Collaborators {
                mounts: Arc::new(mounts),
                space: Arc::new(FixedSpace(free)),
                eraser: self.eraser.clone(),
                recordings: self.recordings.clone(),
            };
            Trashcan::new(config, parts)
        }

        fn config(&self) -> Config {
            Config {
                retention_days: 0,
                default_path: self.mount().join("movie"),
                ..Config::default()
            }
        }

        fn put(&self, relative: &str) -> PathBuf {
            let path = self.mount().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"data").unwrap();
            path
        }
    }

    #[test]
    fn test_clean_if_idle_schedules_pass() {
        let fx = Fixture::new();
        let root_file = fx.put(".Trash/a.ts");
        let movie_file = fx.put("movie/.Trash/b.ts");
        let outside = fx.put("movie/keep.ts");

        let trashcan = fx.trashcan(fx.config(), 0);
        assert_eq!(trashcan.clean_if_idle(), Schedule::Scheduled);
        let report = trashcan.wait().unwrap();

        assert_eq!(report.files_submitted(), 2);
        let submitted = fx.eraser.submitted();
        assert!(submitted.contains(&root_file));
        assert!(submitted.contains(&movie_file));
        assert!(!submitted.contains(&outside));
    }

    #[test]
    fn test_recording_blocks_cleanup() {
        let fx = Fixture::new();
        fx.put(".Trash/a.ts");
        let trashcan = fx.trashcan(fx.config(), 0);

        fx.recordings.begin();
        assert_eq!(trashcan.clean_if_idle(), Schedule::RecordingInProgress);
        assert!(trashcan.wait().is_none());

        fx.recordings.end();
        assert_eq!(
            trashcan.on_record_event(RecordEvent::End),
            Some(Schedule::Scheduled)
        );
        assert!(trashcan.wait().is_some());
    }

    #[test]
    fn test_record_start_does_nothing() {
        let fx = Fixture::new();
        let trashcan = fx.trashcan(fx.config(), 0);
        assert_eq!(trashcan.on_record_event(RecordEvent::Start), None);
    }

    #[test]
    fn test_disabled_feature() {
        let fx = Fixture::new();
        fx.put(".Trash/a.ts");
        let config = Config {
            enabled: false,
            ..fx.config()
        };
        let trashcan = fx.trashcan(config, 0);

        assert_eq!(trashcan.clean_if_idle(), Schedule::Disabled);
        assert!(fx.eraser.submitted().is_empty());
    }

    #[test]
    fn test_single_flight() {
        let fx = Fixture::new();
        let trashcan = fx.trashcan(fx.config(), 0);

        let held = trashcan.guard.try_acquire().unwrap();
        assert_eq!(
            trashcan.clean(RetentionLimit::Disabled, 0),
            Schedule::AlreadyRunning
        );
        assert!(trashcan.run_pass(RetentionLimit::Disabled, 0).is_none());

        drop(held);
        assert_eq!(
            trashcan.clean(RetentionLimit::Disabled, 0),
            Schedule::Scheduled
        );
        trashcan.wait();
        assert!(!trashcan.guard.is_busy());
    }

    #[test]
    fn test_guard_released_after_pass() {
        let guard = CleanupGuard::default();
        {
            let _ticket = guard.try_acquire().unwrap();
            assert!(guard.is_busy());
            assert!(guard.try_acquire().is_none());
        }
        assert!(!guard.is_busy());
    }

    #[test]
    fn test_run_pass_inline() {
        let fx = Fixture::new();
        fx.put(".Trash/a.ts");
        let trashcan = fx.trashcan(fx.config(), 0);

        let report = trashcan.run_pass(RetentionLimit::Disabled, 0).unwrap();
        assert_eq!(report.files_submitted(), 1);
    }

    #[test]
    fn test_locations_include_default_and_mount() {
        let fx = Fixture::new();
        let trashcan = fx.trashcan(fx.config(), 0);
        let locations = trashcan.locations();

        assert!(locations.contains(&fx.mount().join(".Trash")));
        assert!(locations.contains(&fx.mount().join("movie").join(".Trash")));
        assert_eq!(locations.len(), 2);
    }

    #[test]
    fn test_shutdown_waits_for_pass() {
        let fx = Fixture::new();
        fx.put(".Trash/a.ts");
        let trashcan = fx.trashcan(fx.config(), 0);
        trashcan.clean(RetentionLimit::Disabled, 0);

        let report = trashcan.shutdown().unwrap();
        assert_eq!(report.files_submitted(), 1);
    }

    #[test]
    fn test_recording_counter_never_underflows() {
        let counter = RecordingCounter::default();
        counter.end();
        assert_eq!(counter.active_recordings(), 0);
        counter.begin();
        counter.begin();
        counter.end();
        assert_eq!(counter.active_recordings(), 1);
    }

    #[test]
    fn test_empty_trash() {
        let fx = Fixture::new();
        fx.put(".Trash/a.ts");
        fx.put(".Trash/show/b.ts");
        let eraser = CollectingEraser::new();

        let report = empty_trash(&fx.mount().join(".Trash"), &eraser).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.bytes, 8);
        assert_eq!(eraser.submitted().len(), 2);
    }

    #[test]
    fn test_empty_trash_prunes_dirs() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.mount().join(".Trash/a/b")).unwrap();

        let report = empty_trash(&fx.mount().join(".Trash"), &CollectingEraser::new()).unwrap();
        assert_eq!(report.dirs_removed, 2);
        assert!(fx.mount().join(".Trash").is_dir());
    }

    #[test]
    fn test_empty_missing_trash() {
        let fx = Fixture::new();
        let report = empty_trash(&fx.root.join("none"), &CollectingEraser::new()).unwrap();
        assert_eq!(report, EmptyReport::default());
    }

    #[test]
    fn test_trash_size() {
        let fx = Fixture::new();
        fx.put(".Trash/a.ts");
        fx.put(".Trash/x/b.ts");
        assert_eq!(trash_size(&fx.mount().join(".Trash")), 8);
    }

    #[test]
    fn test_format_trash_usage() {
        assert_eq!(format_trash_usage(0), "Trashcan: 0 KB");
        assert_eq!(format_trash_usage(5 * 1024), "Trashcan: 5 KB");
        assert_eq!(format_trash_usage(9_999_999), "Trashcan: 9765 KB");
        assert_eq!(format_trash_usage(10_000_000), "Trashcan: 9 MB");
        assert_eq!(format_trash_usage(9_999_999_999), "Trashcan: 9536 MB");
        assert_eq!(format_trash_usage(10_000_000_000), "Trashcan: 9 GB");
    }
}
