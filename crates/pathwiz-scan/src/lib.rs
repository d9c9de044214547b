//! Directory tree generation and file listing for pathwiz.
//!
//! Everything in this crate is read-only.
//!
//! # Overview
//!
//! - **Tree generation** via [`TreeScanner`]: a sorted jwalk traversal
//!   producing a [`TreeNode`] snapshot, rendered as JSON and/or markdown
//! - **Deterministic ordering**: folders first, then by name
//! - **Best effort**: unreadable folders and dangling links become annotated
//!   nodes instead of failing the walk
//! - **File listing** via [`FileLister`]: a lazy, sorted, extension-filtered
//!   stream of file paths backed by jwalk
//!
//! # Example
//!
//! ```rust,no_run
//! use pathwiz_scan::{OutputFormat, TreeScanner};
//!
//! let scanner = TreeScanner::new();
//! let output = scanner.generate("/path/to/project".as_ref(), OutputFormat::Markdown).unwrap();
//! println!("{}", output.markdown.unwrap());
//! ```
//!
//! # Listing
//!
//! ```rust,no_run
//! use pathwiz_scan::FileLister;
//!
//! let lister = FileLister::new();
//! for path in lister.list("/path/to/project".as_ref(), Some("rs"), true).unwrap() {
//!     println!("{}", path.display());
//! }
//! ```

mod ancestry;
mod listing;
mod render;
mod scanner;

pub use listing::{FileList, FileLister};
pub use render::{INDENT, MarkdownFormatter, render_json, render_markdown};
pub use scanner::TreeScanner;

// Re-export core types for convenience
pub use pathwiz_core::{
    FsError, FsResult, NodeAnnotation, NodeKind, OutputFormat, TreeConfig, TreeNode, TreeOutput,
};
