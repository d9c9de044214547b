//! Core types for pathwiz.
//!
//! This crate provides the data structures shared by the rest of the
//! workspace: the sandbox root, permission bitmasks and mismatch reports,
//! directory tree nodes, tree configuration, and the single error type.

mod config;
mod error;
mod node;
mod permission;
mod root;

pub use config::{OutputFormat, TreeConfig, TreeConfigBuilder};
pub use error::{CompletedStep, FsError, FsResult, Operation, StepAction};
pub use node::{NodeAnnotation, NodeKind, TreeNode, TreeOutput};
pub use permission::{CheckState, PermissionMismatch, PermissionSpec, Resolution};
pub use root::{RootPath, SandboxedPath, validate_name};
