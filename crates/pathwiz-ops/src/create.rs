//! Folder and file creation.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use pathwiz_core::{
    CompletedStep, FsError, FsResult, Operation, PermissionSpec, SandboxedPath, StepAction,
    validate_name,
};

use crate::permissions::{read_spec, set_spec};

/// A subfolder to create below a new folder, with its own nested layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfolder {
    /// Single path component.
    pub name: String,
    /// Folders to create inside this one.
    #[serde(default)]
    pub children: Vec<Subfolder>,
}

impl Subfolder {
    /// A subfolder with no children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// A subfolder with a nested layout.
    pub fn with_children(name: impl Into<String>, children: Vec<Subfolder>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    fn validate(&self) -> FsResult<()> {
        validate_name(&self.name)?;
        self.children.iter().try_for_each(Subfolder::validate)
    }
}

impl From<&str> for Subfolder {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Subfolder {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A folder created by [`FilesystemManager::create_folder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Path relative to the root.
    pub path: PathBuf,
    /// Absolute path on disk.
    pub absolute: PathBuf,
    /// Permission bits applied to the folder and its subfolders.
    pub permissions: Option<PermissionSpec>,
    /// When the folder was created.
    pub created_at: SystemTime,
    /// Subfolders created, relative to the root, in creation order.
    pub subfolders: Vec<PathBuf>,
    /// Every step that took effect, in order.
    pub steps: Vec<CompletedStep>,
}

/// A file created by [`FilesystemManager::create_file`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the root.
    pub path: PathBuf,
    /// Absolute path on disk.
    pub absolute: PathBuf,
    /// When the file was created or truncated.
    pub created_at: SystemTime,
}

/// Creates folders and files.
///
/// Holds no state; every call acts on the path it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemManager;

impl FilesystemManager {
    /// Create a new filesystem manager.
    pub fn new() -> Self {
        Self
    }

    /// Create `target`, then each folder of `subfolders` below it.
    ///
    /// An existing folder is rejected unless `overwrite` is set, in which
    /// case it is removed together with its contents first. Existing files
    /// are never overwritten. Missing parents are created with default
    /// permissions. Subfolders are created one at a time, depth-first, and
    /// get the same `permissions` as `target`.
    ///
    /// Errors raised before anything changed on disk are returned as is.
    /// Later errors are wrapped in [`FsError::PartialFailure`] listing the
    /// steps that took effect; nothing is rolled back.
    pub async fn create_folder(
        &self,
        target: &SandboxedPath,
        overwrite: bool,
        permissions: Option<PermissionSpec>,
        subfolders: &[Subfolder],
    ) -> FsResult<FolderEntry> {
        let path = target.absolute();

        if target.is_root() {
            return Err(FsError::already_exists(path));
        }
        subfolders.iter().try_for_each(Subfolder::validate)?;

        let mut steps = Vec::new();

        match fs::symlink_metadata(path).await {
            Ok(metadata) => {
                if !overwrite || !metadata.is_dir() {
                    return Err(FsError::already_exists(path));
                }
                if let Err(err) = fs::remove_dir_all(path).await {
                    return Err(removal_failed(path, err).await);
                }
                info!(path = %target, "Removed existing folder");
                steps.push(CompletedStep::new(path, StepAction::RemovedExisting));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(FsError::io(path, err)),
        }

        if let Some(parent) = path.parent() {
            let parent_exists = fs::try_exists(parent)
                .await
                .map_err(|e| interrupted(&steps, FsError::io(parent, e)))?;
            if !parent_exists {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| interrupted(&steps, FsError::io(parent, e)))?;
                debug!(path = %parent.display(), "Created missing parents");
                steps.push(CompletedStep::new(parent, StepAction::CreatedFolder));
            }
        }

        let made = make_folder(path, permissions, StepAction::CreatedFolder, &mut steps).await;
        made.map_err(|e| interrupted(&steps, e))?;
        info!(path = %target, permissions = ?permissions.map(|p| p.to_string()), "Created folder");

        let mut created = Vec::new();
        let mut pending: Vec<(SandboxedPath, &Subfolder)> =
            subfolders.iter().rev().map(|s| (target.clone(), s)).collect();

        while let Some((parent, subfolder)) = pending.pop() {
            let child = parent
                .child(&subfolder.name)
                .map_err(|e| interrupted(&steps, e))?;
            let made = make_folder(
                child.absolute(),
                permissions,
                StepAction::CreatedSubfolder,
                &mut steps,
            )
            .await;
            made.map_err(|e| interrupted(&steps, e))?;
            debug!(path = %child, "Created subfolder");

            pending.extend(subfolder.children.iter().rev().map(|c| (child.clone(), c)));
            created.push(child.relative().to_path_buf());
        }

        Ok(FolderEntry {
            path: target.relative().to_path_buf(),
            absolute: path.to_path_buf(),
            permissions,
            created_at: SystemTime::now(),
            subfolders: created,
            steps,
        })
    }

    /// Create an empty file at `target`.
    ///
    /// The parent folder must already exist. An existing file is truncated
    /// only when `overwrite` is set; a folder at `target` is always rejected.
    pub async fn create_file(&self, target: &SandboxedPath, overwrite: bool) -> FsResult<FileEntry> {
        let path = target.absolute();

        let Some(parent) = target.parent() else {
            return Err(FsError::already_exists(path));
        };
        match fs::metadata(parent.absolute()).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(FsError::not_found(parent.absolute())),
            Err(err) => return Err(FsError::io(parent.absolute(), err)),
        }

        match fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() || !overwrite => {
                return Err(FsError::already_exists(path));
            }
            _ => {}
        }

        let mut options = fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        options.open(path).await.map_err(|e| FsError::io(path, e))?;

        info!(path = %target, overwrite, "Created file");
        Ok(FileEntry {
            path: target.relative().to_path_buf(),
            absolute: path.to_path_buf(),
            created_at: SystemTime::now(),
        })
    }
}

/// Create a single folder, applying `permissions` at creation time and
/// again afterwards if the umask narrowed them.
async fn make_folder(
    path: &Path,
    permissions: Option<PermissionSpec>,
    action: StepAction,
    steps: &mut Vec<CompletedStep>,
) -> FsResult<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        if let Some(spec) = permissions {
            builder.mode(spec.bits());
        }
    }
    builder.create(path).await.map_err(|e| FsError::io(path, e))?;
    steps.push(CompletedStep::new(path, action));

    if let Some(spec) = permissions {
        if read_spec(path).await? != spec {
            set_spec(path, spec).await.map_err(|e| FsError::io(path, e))?;
            steps.push(CompletedStep::new(path, StepAction::AppliedPermissions));
        }
    }
    Ok(())
}

/// Report a removal of an existing folder that stopped with `err`.
///
/// Removal is not atomic: some contents may already be gone even when the
/// folder itself is still there, so the failure is always partial.
async fn removal_failed(path: &Path, err: std::io::Error) -> FsError {
    let err = FsError::io(path, err);
    let action = match fs::symlink_metadata(path).await {
        Err(gone) if gone.kind() == std::io::ErrorKind::NotFound => StepAction::RemovedExisting,
        _ => StepAction::RemovalStarted,
    };
    warn!(path = %path.display(), error = %err, "Removal of existing folder stopped midway");
    FsError::partial(
        Operation::CreateFolder,
        vec![CompletedStep::new(path, action)],
        err,
    )
}

/// Wrap `err` as a partial failure if any step already took effect.
fn interrupted(steps: &[CompletedStep], err: FsError) -> FsError {
    if steps.is_empty() {
        err
    } else {
        FsError::partial(Operation::CreateFolder, steps.to_vec(), err)
    }
}
