//! Folder identity tracking for symlink cycle detection.

use std::fs::Metadata;
use std::path::Path;

/// Identity of a folder on disk: (device, inode) on Unix.
#[cfg(unix)]
type FolderKey = (u64, u64);

/// Identity of a folder on disk: its canonical path elsewhere.
#[cfg(not(unix))]
type FolderKey = std::path::PathBuf;

/// Folders on the path from the traversal root to the folder being read.
///
/// The walker hands each folder a copy of its parent's set, so siblings that
/// link to the same folder are each followed once. A link whose target is
/// already in the set points back at an ancestor.
#[derive(Debug, Clone, Default)]
pub(crate) struct AncestorSet {
    stack: Vec<FolderKey>,
}

impl AncestorSet {
    /// Record `path` as the folder being read. Returns `false` if it is
    /// already an ancestor or its identity cannot be determined.
    pub(crate) fn enter(&mut self, path: &Path, metadata: &Metadata) -> bool {
        let Some(key) = folder_key(path, metadata) else {
            return false;
        };
        if self.stack.contains(&key) {
            return false;
        }
        self.stack.push(key);
        true
    }

    /// Check whether the folder at `path` is one of the recorded ancestors.
    pub(crate) fn contains(&self, path: &Path, metadata: &Metadata) -> bool {
        folder_key(path, metadata).is_some_and(|key| self.stack.contains(&key))
    }
}

#[cfg(unix)]
fn folder_key(_path: &Path, metadata: &Metadata) -> Option<FolderKey> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn folder_key(path: &Path, _metadata: &Metadata) -> Option<FolderKey> {
    std::fs::canonicalize(path).ok()
}
