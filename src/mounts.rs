//! Mount table access
//!
//! Reads `/proc/mounts` (or any file in that format) and locates the mount
//! point that contains a given path.

use crate::error::{Result, TrashError};
use std::fs;
use std::path::{Path, PathBuf};

/// Placeholder mount for the automounter; never holds a trash folder itself
pub const AUTOFS_ROOT: &str = "/media/autofs";
/// Prefix under which network shares are mounted
pub const NETWORK_ROOT: &str = "/media/net";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

impl MountEntry {
    pub fn is_autofs_placeholder(&self) -> bool {
        self.mount_point == Path::new(AUTOFS_ROOT)
    }

    /// Network shares and anything the automounter brought in
    pub fn is_network(&self) -> bool {
        self.mount_point.starts_with(NETWORK_ROOT) || self.mount_point.starts_with(AUTOFS_ROOT)
    }
}

/// Source of the currently mounted filesystems
pub trait MountTable: Send + Sync {
    fn entries(&self) -> Result<Vec<MountEntry>>;
}

/// Mount table backed by a `/proc/mounts` style file
#[derive(Debug, Clone)]
pub struct ProcMounts {
    path: PathBuf,
}

impl ProcMounts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self::new("/proc/mounts")
    }
}

impl MountTable for ProcMounts {
    fn entries(&self) -> Result<Vec<MountEntry>> {
        let content = fs::read_to_string(&self.path).map_err(|source| TrashError::MountTable {
            path: self.path.clone(),
            source,
        })?;
        Ok(parse_mounts(&content))
    }
}

impl MountTable for Vec<MountEntry> {
    fn entries(&self) -> Result<Vec<MountEntry>> {
        Ok(self.clone())
    }
}

/// Parse mount table text. Malformed lines are skipped.
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?;
            let mount_point = parts.next()?;
            let fs_type = parts.next().unwrap_or("");
            Some(MountEntry {
                device: unescape(device),
                mount_point: PathBuf::from(unescape(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decode the kernel's `\ooo` escapes (space is written as `\040`).
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Walk up from `path` until crossing onto another device.
///
/// The path must exist; callers resolve symlinks first.
#[cfg(unix)]
pub fn find_mount_point(path: &Path) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::MetadataExt;

    let mut current = path.to_path_buf();
    let mut dev = fs::metadata(&current)?.dev();
    while let Some(parent) = current.parent() {
        let parent_dev = fs::metadata(parent)?.dev();
        if parent_dev != dev {
            break;
        }
        dev = parent_dev;
        current = parent.to_path_buf();
    }
    Ok(current)
}

#[cfg(not(unix))]
pub fn find_mount_point(path: &Path) -> std::io::Result<PathBuf> {
    fs::metadata(path)?;
    Ok(path
        .ancestors()
        .last()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
/dev/root / ext4 rw,relatime 0 0
proc /proc proc rw,relatime 0 0
/dev/sda1 /media/hdd ext4 rw,relatime 0 0
/dev/sdb1 /media/usb\\040stick vfat rw 0 0
//nas/share /media/net/nas cifs rw 0 0
autofs /media/autofs autofs rw 0 0
/dev/sdc1 /media/autofs/sdc1 ext4 rw 0 0
garbage
";

    #[test]
    fn test_parse_skips_malformed_lines() {
        let mounts = parse_mounts(SAMPLE);
        assert_eq!(mounts.len(), 7);
        assert_eq!(mounts[2].device, "/dev/sda1");
        assert_eq!(mounts[2].mount_point, PathBuf::from("/media/hdd"));
        assert_eq!(mounts[2].fs_type, "ext4");
    }

    #[test]
    fn test_parse_decodes_octal_escapes() {
        let mounts = parse_mounts(SAMPLE);
        assert_eq!(mounts[3].mount_point, PathBuf::from("/media/usb stick"));
    }

    #[test]
    fn test_unescape_leaves_plain_backslash() {
        assert_eq!(unescape("a\\b"), "a\\b");
        assert_eq!(unescape("tail\\04"), "tail\\04");
        assert_eq!(unescape("x\\011y"), "x\ty");
    }

    #[test]
    fn test_network_and_autofs_classification() {
        let mounts = parse_mounts(SAMPLE);
        assert!(!mounts[2].is_network());
        assert!(mounts[4].is_network());
        assert!(mounts[5].is_autofs_placeholder());
        assert!(mounts[5].is_network());
        assert!(mounts[6].is_network());
        assert!(!mounts[6].is_autofs_placeholder());
    }

    #[test]
    fn test_proc_mounts_missing_file() {
        let table = ProcMounts::new("/definitely/not/here/mounts");
        assert!(matches!(
            table.entries(),
            Err(TrashError::MountTable { .. })
        ));
    }

    #[test]
    fn test_find_mount_point_of_tempdir() {
        let temp = tempfile::tempdir().unwrap();
        let mount = find_mount_point(temp.path()).unwrap();
        assert!(temp.path().starts_with(&mount));
    }
}
