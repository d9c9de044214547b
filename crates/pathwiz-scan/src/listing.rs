//! Lazy, extension-filtered file listing.

use std::fs;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use tracing::debug;

use pathwiz_core::{FsError, FsResult};

use crate::scanner::walk_parallelism;

/// Lists files under a folder using a sorted jwalk traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLister;

impl FileLister {
    /// Create a lister on the default thread pool.
    pub fn new() -> Self {
        Self
    }

    /// List regular files under `dir` whose name ends with `.{extension}`.
    ///
    /// `extension` is case-sensitive and may be given with or without the
    /// leading dot; `None` lists every file. With `recursive` false only the
    /// direct children of `dir` are considered. Entries come out in a stable,
    /// name-sorted depth-first order. The walk is lazy and starts over on
    /// every call.
    pub fn list(&self, dir: &Path, extension: Option<&str>, recursive: bool) -> FsResult<FileList> {
        let metadata = fs::metadata(dir).map_err(|e| FsError::io(dir, e))?;
        if !metadata.is_dir() {
            return Err(FsError::not_found(dir));
        }

        let suffix = extension
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"));

        let walker = WalkDir::new(dir)
            .parallelism(walk_parallelism())
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(1)
            .max_depth(if recursive { usize::MAX } else { 1 });

        let files = walker.into_iter().filter_map(move |entry_result| {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    debug!(error = %err, "Skipping unreadable entry");
                    return None;
                }
            };

            if !entry.file_type().is_file() {
                return None;
            }

            let matches = match &suffix {
                Some(suffix) => entry.file_name().to_string_lossy().ends_with(suffix.as_str()),
                None => true,
            };
            matches.then(|| entry.path())
        });

        Ok(FileList {
            inner: Box::new(files),
        })
    }
}

/// Lazy sequence of file paths produced by [`FileLister::list`].
pub struct FileList {
    inner: Box<dyn Iterator<Item = PathBuf>>,
}

impl Iterator for FileList {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl std::fmt::Debug for FileList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileList").finish_non_exhaustive()
    }
}
