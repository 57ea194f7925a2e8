//! Where trash folders live
//!
//! Every volume may carry a hidden `.Trash` directory in its root and in its
//! `movie` subdirectory. The default media path always gets probed as well.

use crate::mounts::{self, MountEntry, AUTOFS_ROOT};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const TRASH_DIR_NAME: &str = ".Trash";
pub const MOVIE_DIR_NAME: &str = "movie";

/// All trash roots worth scanning for the given mount table.
///
/// The autofs placeholder is always skipped; network mounts only when
/// `include_network` is set.
pub fn trash_locations(
    default_path: &Path,
    mounts: &[MountEntry],
    include_network: bool,
) -> BTreeSet<PathBuf> {
    let mut roots = BTreeSet::new();
    roots.insert(default_path.to_path_buf());

    for entry in mounts {
        if entry.is_autofs_placeholder() {
            continue;
        }
        if !include_network && entry.is_network() {
            continue;
        }
        roots.insert(entry.mount_point.clone());
        roots.insert(entry.mount_point.join(MOVIE_DIR_NAME));
    }

    roots
        .into_iter()
        .map(|root| root.join(TRASH_DIR_NAME))
        .collect()
}

/// Resolve symlinks like `realpath(3)`, tolerating a missing tail.
///
/// The longest existing ancestor is canonicalized and the remaining
/// components are appended unchanged.
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    let mut tail = Vec::new();
    let mut current = path;
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            tail.push(name.to_os_string());
        }
        if let Ok(base) = fs::canonicalize(parent) {
            return tail.iter().rev().fold(base, |acc, name| acc.join(name));
        }
        current = parent;
    }
    path.to_path_buf()
}

fn existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}

/// The trash folder responsible for `path`, with symlinks resolved.
///
/// Paths inside a `movie` directory map to `<mount>/movie/.Trash`; paths under
/// the default media path map to `<default_path>/.Trash`; anything else to
/// `<mount>/.Trash`. Returns `None` for the autofs placeholder or when the
/// mount point cannot be determined.
pub fn trash_folder(path: &Path, default_path: &Path) -> Option<PathBuf> {
    let resolved = resolve_path(path);
    if resolved == Path::new(AUTOFS_ROOT) {
        return None;
    }

    let mount = match existing_ancestor(&resolved).map(mounts::find_mount_point) {
        Some(Ok(mount)) => mount,
        Some(Err(e)) => {
            tracing::debug!(path = %path.display(), "cannot find mount point: {e}");
            return None;
        }
        None => return None,
    };

    let text = path.to_string_lossy();
    let base = if text.contains("/movie") {
        mount.join(MOVIE_DIR_NAME)
    } else if text.contains(default_path.to_string_lossy().as_ref()) {
        mount.join(default_path)
    } else {
        mount
    };
    Some(resolve_path(&base.join(TRASH_DIR_NAME)))
}

pub fn is_trash_folder(path: &Path, default_path: &Path) -> bool {
    let resolved = resolve_path(path);
    trash_folder(&resolved, default_path)
        .map(|trash| trash == resolved)
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_writable_dir(dir: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};

    dir.is_dir() && access(dir, AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable_dir(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|meta| meta.is_dir() && !meta.permissions().readonly())
        .unwrap_or(false)
}

/// Create the trash folder for `path` if its parent is writable.
pub fn create_trash_folder(path: &Path, default_path: &Path) -> Option<PathBuf> {
    let trash = trash_folder(path, default_path)?;
    tracing::debug!(path = %path.display(), trash = %trash.display(), "trash folder");

    if !trash.parent().is_some_and(is_writable_dir) {
        return None;
    }

    if !trash.is_dir() {
        if let Err(e) = fs::create_dir(&trash) {
            tracing::debug!(trash = %trash.display(), "failed to create trash folder: {e}");
            return None;
        }
    }
    Some(trash)
}
