//! Permission inspection and repair.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use pathwiz_core::{
    CompletedStep, FsError, FsResult, Operation, PermissionMismatch, PermissionSpec, Resolution,
    SandboxedPath, StepAction,
};

/// Reads, compares and fixes permission bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionsManager;

impl PermissionsManager {
    /// Create a new permissions manager.
    pub fn new() -> Self {
        Self
    }

    /// Current permission bits of `path`, following symlinks.
    pub async fn get_file_permissions(&self, path: &SandboxedPath) -> FsResult<PermissionSpec> {
        read_spec(path.absolute()).await
    }

    /// Render `bits` as a 9-character `rwx` string.
    pub fn permissions_to_rwx(bits: u32) -> FsResult<String> {
        Ok(PermissionSpec::new(bits)?.to_rwx())
    }

    /// Compare the permissions of `path` against `expected`.
    ///
    /// Returns `Ok(None)` on a match. A mismatch is returned as a report; with
    /// `resolve` the expected bits are applied first and the report is marked
    /// resolved. If applying them fails the error is a partial failure that
    /// still carries the mismatch.
    pub async fn check_permissions(
        &self,
        path: &SandboxedPath,
        expected: PermissionSpec,
        resolve: bool,
    ) -> FsResult<Option<PermissionMismatch>> {
        check_path(path.absolute(), expected, resolve).await
    }

    /// Check `path` and every folder below it, depth-first in name order.
    ///
    /// Symlinks are not followed. Stops at the first error; folders already
    /// resolved are listed as steps of the partial failure, and every report
    /// gathered so far travels with it (see [`FsError::mismatches`]).
    pub async fn check_permissions_recursive(
        &self,
        path: &SandboxedPath,
        expected: PermissionSpec,
        resolve: bool,
    ) -> FsResult<Vec<PermissionMismatch>> {
        let mut mismatches = Vec::new();
        let mut resolved_steps = Vec::new();
        let mut pending = vec![path.absolute().to_path_buf()];

        while let Some(current) = pending.pop() {
            match check_path(&current, expected, resolve).await {
                Ok(Some(report)) => {
                    if report.resolution == Resolution::Resolved {
                        resolved_steps
                            .push(CompletedStep::new(&current, StepAction::ResolvedPermissions));
                    }
                    mismatches.push(report);
                }
                Ok(None) => {}
                Err(err) => return Err(after_steps(resolved_steps, mismatches, err)),
            }

            let mut children = match subfolders(&current).await {
                Ok(children) => children,
                Err(err) => return Err(after_steps(resolved_steps, mismatches, err)),
            };
            children.sort();
            pending.extend(children.into_iter().rev());
        }

        debug!(
            path = %path,
            mismatches = mismatches.len(),
            "Recursive permission check finished"
        );
        Ok(mismatches)
    }
}

async fn check_path(
    path: &Path,
    expected: PermissionSpec,
    resolve: bool,
) -> FsResult<Option<PermissionMismatch>> {
    let observed = read_spec(path).await?;
    if observed == expected {
        debug!(path = %path.display(), mode = %observed, "Permissions match");
        return Ok(None);
    }

    let report = PermissionMismatch::new(path, expected, observed);
    if !resolve {
        info!(%report, "Permission mismatch");
        return Ok(Some(report));
    }

    match set_spec(path, expected).await {
        Ok(()) => {
            info!(%report, "Permission mismatch resolved");
            Ok(Some(report.resolved()))
        }
        Err(err) => {
            warn!(%report, error = %err, "Failed to resolve permission mismatch");
            let compared = vec![CompletedStep::new(path, StepAction::ComparedPermissions)];
            Err(
                FsError::partial(Operation::CheckPermissions, compared, FsError::io(path, err))
                    .with_mismatch(report.failed()),
            )
        }
    }
}

/// Direct child folders of `path`, not following symlinks.
async fn subfolders(path: &Path) -> FsResult<Vec<PathBuf>> {
    let metadata = fs::metadata(path).await.map_err(|e| FsError::io(path, e))?;
    if !metadata.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(path).await.map_err(|e| FsError::io(path, e))?;
    let mut folders = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| FsError::io(path, e))? {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| FsError::io(entry.path(), e))?;
        if file_type.is_dir() {
            folders.push(entry.path());
        }
    }
    Ok(folders)
}

/// Fold the progress of a recursive check into `err`.
fn after_steps(
    mut steps: Vec<CompletedStep>,
    mismatches: Vec<PermissionMismatch>,
    err: FsError,
) -> FsError {
    if steps.is_empty() && mismatches.is_empty() {
        return err;
    }
    let err = match err {
        FsError::PartialFailure {
            completed,
            mismatches: carried,
            source,
            ..
        } => {
            steps.extend(completed);
            FsError::PartialFailure {
                operation: Operation::CheckPermissions,
                completed: steps,
                mismatches: carried,
                source,
            }
        }
        other => FsError::partial(Operation::CheckPermissions, steps, other),
    };
    err.with_mismatches(mismatches)
}

pub(crate) async fn read_spec(path: &Path) -> FsResult<PermissionSpec> {
    let metadata = fs::metadata(path).await.map_err(|e| FsError::io(path, e))?;
    Ok(spec_of(&metadata))
}

#[cfg(unix)]
pub(crate) fn spec_of(metadata: &Metadata) -> PermissionSpec {
    use std::os::unix::fs::PermissionsExt;
    PermissionSpec::from_mode(metadata.permissions().mode())
}

#[cfg(not(unix))]
pub(crate) fn spec_of(metadata: &Metadata) -> PermissionSpec {
    if metadata.permissions().readonly() {
        PermissionSpec::from_mode(0o444)
    } else {
        PermissionSpec::from_mode(0o666)
    }
}

#[cfg(unix)]
pub(crate) async fn set_spec(path: &Path, spec: PermissionSpec) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(spec.bits())).await
}

// Only the owner write bit maps onto the read-only flag.
#[cfg(not(unix))]
pub(crate) async fn set_spec(path: &Path, spec: PermissionSpec) -> std::io::Result<()> {
    let mut permissions = fs::metadata(path).await?.permissions();
    permissions.set_readonly(spec.bits() & 0o200 == 0);
    fs::set_permissions(path, permissions).await
}
