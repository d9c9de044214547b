//! Folder, file and permission operations for pathwiz.
//!
//! Every operation takes a [`SandboxedPath`](pathwiz_core::SandboxedPath)
//! that has already been resolved against the sandbox root, performs its
//! mutations through `tokio::fs`, and reports multi-step failures as
//! [`FsError::PartialFailure`](pathwiz_core::FsError::PartialFailure) with
//! the log of steps that took effect.

mod create;
mod permissions;

pub use create::{FileEntry, FilesystemManager, FolderEntry, Subfolder};
pub use permissions::PermissionsManager;
