//! Sandbox root and root-validated paths.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{FsError, FsResult};

/// Longest name accepted for a single path component.
const MAX_NAME_LEN: usize = 255;

/// Dangling links followed while checking containment before giving up.
const MAX_LINK_HOPS: u32 = 40;

/// An existing directory that bounds every relative operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPath {
    path: PathBuf,
}

impl RootPath {
    /// Canonicalize `path` and verify it is a directory.
    pub fn new(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let canonical = path.canonicalize().map_err(|e| FsError::InvalidRoot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !canonical.is_dir() {
            return Err(FsError::InvalidRoot {
                path: canonical,
                reason: "not a directory".into(),
            });
        }

        Ok(Self { path: canonical })
    }

    /// The canonical root directory.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// Resolve `path` against the root.
    ///
    /// Relative paths are joined to the root; absolute paths must already lie
    /// under it. `.` is dropped and `..` pops a component. Anything that would
    /// climb above the root is rejected with [`FsError::OutsideRoot`].
    ///
    /// Symlinks along the result are then followed (read-only) and the
    /// location they lead to must also lie inside the root, so a link that
    /// points out of the root cannot be written through.
    pub fn resolve(&self, path: impl AsRef<Path>) -> FsResult<SandboxedPath> {
        let requested = path.as_ref();
        let outside = || FsError::OutsideRoot {
            path: requested.to_path_buf(),
        };

        let relative_input = if requested.is_absolute() {
            requested.strip_prefix(&self.path).map_err(|_| outside())?
        } else {
            requested
        };

        let mut parts: Vec<&OsStr> = Vec::new();
        for component in relative_input.components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(outside());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(outside()),
            }
        }

        let relative: PathBuf = parts.iter().collect();
        let absolute = if relative.as_os_str().is_empty() {
            self.path.clone()
        } else {
            self.path.join(&relative)
        };

        if !self.contains(&absolute, 0) {
            return Err(outside());
        }

        Ok(SandboxedPath { relative, absolute })
    }

    /// Check that `path` still lies inside the root once symlinks are
    /// followed.
    ///
    /// The deepest existing ancestor is canonicalized and the missing
    /// components are appended. The first missing component may be a
    /// dangling link, whose target is checked the same way.
    fn contains(&self, path: &Path, hops: u32) -> bool {
        if hops > MAX_LINK_HOPS {
            return false;
        }

        let mut existing = path;
        let mut missing: Vec<&OsStr> = Vec::new();
        let canonical = loop {
            match existing.canonicalize() {
                Ok(canonical) => break canonical,
                Err(_) => match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name);
                        existing = parent;
                    }
                    _ => return false,
                },
            }
        };

        let Some(first) = missing.pop() else {
            return canonical.starts_with(&self.path);
        };
        let candidate = canonical.join(first);
        let rest = missing.iter().rev();

        match fs::read_link(&candidate) {
            Ok(target) => {
                let target = canonical.join(target);
                self.contains(&rest.fold(target, |acc, part| acc.join(part)), hops + 1)
            }
            Err(_) => rest
                .fold(candidate, |acc, part| acc.join(part))
                .starts_with(&self.path),
        }
    }
}

impl AsRef<Path> for RootPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// A path proven to lie inside a [`RootPath`].
///
/// Only [`RootPath::resolve`] and [`SandboxedPath::child`] construct these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxedPath {
    relative: PathBuf,
    absolute: PathBuf,
}

impl SandboxedPath {
    /// Path relative to the root (empty for the root itself).
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Absolute path on disk.
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Check if this is the root itself.
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// The parent directory, or `None` for the root.
    pub fn parent(&self) -> Option<SandboxedPath> {
        if self.is_root() {
            return None;
        }
        let relative = self.relative.parent().unwrap_or(Path::new("")).to_path_buf();
        let absolute = self.absolute.parent()?.to_path_buf();
        Some(Self { relative, absolute })
    }

    /// Join a single validated name component.
    pub fn child(&self, name: &str) -> FsResult<SandboxedPath> {
        validate_name(name)?;
        Ok(Self {
            relative: self.relative.join(name),
            absolute: self.absolute.join(name),
        })
    }
}

impl fmt::Display for SandboxedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.relative.display())
        }
    }
}

/// Validate a name meant to be a single path component.
pub fn validate_name(name: &str) -> FsResult<()> {
    let invalid = |reason: &str| FsError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is too long (max 255 bytes)"));
    }

    if name == "." || name == ".." {
        return Err(invalid("name cannot be '.' or '..'"));
    }

    for c in ['/', '\0'] {
        if name.contains(c) {
            return Err(invalid(&format!("name cannot contain {c:?}")));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if name.contains('\\') {
            return Err(invalid("name cannot contain '\\\\'"));
        }
    }

    Ok(())
}
