//! Error types shared by every pathwiz operation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permission::PermissionMismatch;

/// Result alias used throughout the workspace.
pub type FsResult<T> = Result<T, FsError>;

/// Errors that can occur during a pathwiz operation.
#[derive(Debug, Error)]
pub enum FsError {
    /// The root path is missing or is not a directory.
    #[error("Invalid root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// A path resolved to a location outside the root.
    #[error("Path escapes the root: {path}")]
    OutsideRoot { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Target already exists and overwriting was not requested.
    #[error("Already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Permission bits outside 0..=0o777, or unparsable permission text.
    #[error("Invalid permission spec: {value}")]
    InvalidPermissionSpec { value: String },

    /// A file or folder name that is not a single valid path component.
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Permissions found on disk differ from the ones requested.
    #[error("Permission mismatch at {report}")]
    Mismatch { report: PermissionMismatch },

    /// A multi-step operation failed after some of its steps took effect.
    #[error("{operation} failed after {} completed step(s): {source}", .completed.len())]
    PartialFailure {
        operation: Operation,
        completed: Vec<CompletedStep>,
        mismatches: Vec<PermissionMismatch>,
        #[source]
        source: Box<FsError>,
    },

    /// Platform error that does not map onto a more specific kind.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Classify an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an already exists error.
    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    /// Wrap `source` as the failure that interrupted `operation` after
    /// `completed` steps had already taken effect.
    pub fn partial(operation: Operation, completed: Vec<CompletedStep>, source: FsError) -> Self {
        Self::PartialFailure {
            operation,
            completed,
            mismatches: Vec::new(),
            source: Box::new(source),
        }
    }

    /// Attach a permission mismatch to a partial failure.
    ///
    /// Other variants are returned unchanged.
    pub fn with_mismatch(mut self, report: PermissionMismatch) -> Self {
        if let Self::PartialFailure { mismatches, .. } = &mut self {
            mismatches.push(report);
        }
        self
    }

    /// Attach mismatch reports gathered before the failure.
    ///
    /// `earlier` is placed ahead of the reports already carried, so the
    /// mismatch of the failing path stays last. Other variants are returned
    /// unchanged.
    pub fn with_mismatches(mut self, earlier: Vec<PermissionMismatch>) -> Self {
        if let Self::PartialFailure { mismatches, .. } = &mut self {
            mismatches.splice(0..0, earlier);
        }
        self
    }

    /// Check if this is a partial failure.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialFailure { .. })
    }

    /// Steps that took effect before the failure (empty unless partial).
    pub fn completed_steps(&self) -> &[CompletedStep] {
        match self {
            Self::PartialFailure { completed, .. } => completed,
            _ => &[],
        }
    }

    /// The mismatch of the path the error is about, if any.
    ///
    /// For a partial failure this is the last report it carries.
    pub fn mismatch(&self) -> Option<&PermissionMismatch> {
        match self {
            Self::PartialFailure { mismatches, .. } => mismatches.last(),
            Self::Mismatch { report } => Some(report),
            _ => None,
        }
    }

    /// Every mismatch report carried by this error, in check order.
    pub fn mismatches(&self) -> &[PermissionMismatch] {
        match self {
            Self::PartialFailure { mismatches, .. } => mismatches,
            Self::Mismatch { report } => std::slice::from_ref(report),
            _ => &[],
        }
    }

    /// The innermost error, looking through partial failures.
    pub fn root_cause(&self) -> &FsError {
        match self {
            Self::PartialFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// The multi-step operation a partial failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    CreateFolder,
    CheckPermissions,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateFolder => write!(f, "Create folder"),
            Self::CheckPermissions => write!(f, "Check permissions"),
        }
    }
}

/// What a completed step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    /// An existing folder and its contents were removed.
    RemovedExisting,
    /// Removal of an existing folder began but did not finish; part of its
    /// contents may be gone.
    RemovalStarted,
    /// The target folder was created.
    CreatedFolder,
    /// Permission bits were set after creation.
    AppliedPermissions,
    /// A subfolder was created.
    CreatedSubfolder,
    /// Current permissions were read and compared.
    ComparedPermissions,
    /// Permission bits were changed to the expected value.
    ResolvedPermissions,
}

/// One entry in the progress log of a multi-step operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedStep {
    /// Path the step acted on.
    pub path: PathBuf,
    /// What the step did.
    pub action: StepAction,
}

impl CompletedStep {
    /// Create a new step record.
    pub fn new(path: impl Into<PathBuf>, action: StepAction) -> Self {
        Self {
            path: path.into(),
            action,
        }
    }

    /// Check whether this step acted on `path`.
    pub fn touches(&self, path: &Path) -> bool {
        self.path == path
    }
}
