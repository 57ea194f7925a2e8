//! Asynchronous single-file erasure
//!
//! The reclamation pass never waits for a deletion: it hands each path to an
//! [`Eraser`] and moves on.

use crate::error::TrashError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

pub trait Eraser: Send + Sync {
    /// Queue `path` for deletion. Fire-and-forget.
    fn erase(&self, path: &Path);
}

/// Totals reported by [`BackgroundEraser::finish`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EraseSummary {
    pub erased: u64,
    pub vanished: u64,
    pub failed: u64,
}

/// Deletes files on a dedicated worker thread, in submission order
pub struct BackgroundEraser {
    sender: Option<Sender<PathBuf>>,
    worker: Option<JoinHandle<EraseSummary>>,
}

impl BackgroundEraser {
    pub fn spawn() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<PathBuf>();
        let worker = thread::Builder::new()
            .name("trash-eraser".to_string())
            .spawn(move || {
                let mut summary = EraseSummary::default();
                for path in receiver {
                    match fs::remove_file(&path) {
                        Ok(()) => {
                            tracing::trace!(path = %path.display(), "erased");
                            summary.erased += 1;
                        }
                        Err(e) => match TrashError::classify(e, "erase", &path) {
                            // Someone else emptied it first
                            err if err.is_not_found() => summary.vanished += 1,
                            err => {
                                tracing::warn!("{err}");
                                summary.failed += 1;
                            }
                        },
                    }
                }
                summary
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Close the queue and wait for pending deletions.
    pub fn finish(mut self) -> EraseSummary {
        self.shutdown()
    }

    fn shutdown(&mut self) -> EraseSummary {
        self.sender.take();
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                tracing::error!("eraser worker panicked");
                EraseSummary::default()
            }
            None => EraseSummary::default(),
        }
    }
}

impl Eraser for BackgroundEraser {
    fn erase(&self, path: &Path) {
        if let Some(ref sender) = self.sender {
            if sender.send(path.to_path_buf()).is_err() {
                tracing::warn!(path = %path.display(), "eraser stopped, dropping request");
            }
        }
    }
}

impl Drop for BackgroundEraser {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Deletes on the calling thread before returning
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateEraser;

impl Eraser for ImmediateEraser {
    fn erase(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            match TrashError::classify(e, "erase", path) {
                err if err.is_not_found() => {}
                err => tracing::warn!("{err}"),
            }
        }
    }
}

/// Records erase requests without touching the filesystem (dry runs)
#[derive(Debug, Default)]
pub struct CollectingEraser {
    submitted: Mutex<Vec<PathBuf>>,
}

impl CollectingEraser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<PathBuf> {
        self.submitted
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }
}

impl Eraser for CollectingEraser {
    fn erase(&self, path: &Path) {
        if let Ok(mut paths) = self.submitted.lock() {
            paths.push(path.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_background_eraser_removes_files() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.ts");
        let b = temp.path().join("b.ts");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let eraser = BackgroundEraser::spawn().unwrap();
        eraser.erase(&a);
        eraser.erase(&b);
        let summary = eraser.finish();

        assert_eq!(summary.erased, 2);
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_background_eraser_counts_vanished() {
        let temp = TempDir::new().unwrap();
        let eraser = BackgroundEraser::spawn().unwrap();
        eraser.erase(&temp.path().join("never-existed"));
        let summary = eraser.finish();

        assert_eq!(summary.erased, 0);
        assert_eq!(summary.vanished, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_background_eraser_drop_flushes_queue() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("rec.ts");
        fs::write(&file, "x").unwrap();
        {
            let eraser = BackgroundEraser::spawn().unwrap();
            eraser.erase(&file);
        }
        assert!(!file.exists());
    }

    #[test]
    fn test_immediate_eraser() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("rec.ts");
        fs::write(&file, "x").unwrap();

        ImmediateEraser.erase(&file);
        assert!(!file.exists());
        // Already gone: no panic, nothing to do
        ImmediateEraser.erase(&file);
    }

    #[test]
    fn test_collecting_eraser_keeps_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("keep.ts");
        fs::write(&file, "x").unwrap();

        let eraser = CollectingEraser::new();
        eraser.erase(&file);

        assert_eq!(eraser.submitted(), vec![file.clone()]);
        assert!(file.exists());
    }
}
