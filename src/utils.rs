//! Shared filesystem helpers

use std::path::Path;

/// Total size of regular files under `path`, walked in parallel.
///
/// Symlinks are not followed and unreadable entries are skipped. A missing
/// path counts as zero.
pub fn dir_size(path: &Path) -> u64 {
    use jwalk::WalkDir;
    use std::sync::atomic::{AtomicU64, Ordering};

    let total = AtomicU64::new(0);

    WalkDir::new(path)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::RayonDefaultPool {
            busy_timeout: std::time::Duration::from_secs(1),
        })
        .process_read_dir(|_depth, _path, _state, children| {
            children.retain(|entry| match entry {
                Ok(e) => !e.file_type().is_symlink(),
                Err(_) => true,
            });
        })
        .into_iter()
        .for_each(|entry| {
            if let Ok(e) = entry {
                if e.file_type().is_file() {
                    if let Ok(meta) = e.metadata() {
                        total.fetch_add(meta.len(), Ordering::Relaxed);
                    }
                }
            }
        });

    total.load(Ordering::Relaxed)
}
