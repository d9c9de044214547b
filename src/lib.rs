//! pathwiz - create folders, repair permissions and render directory trees.
//!
//! [`FileManager`] is the single entry point. It owns a sandbox root,
//! resolves every path against it once, and delegates to the folder/file
//! manager, the permissions manager and the tree scanner.
//!
//! # Example
//!
//! ```rust,no_run
//! use pathwiz::{FileManager, OutputFormat, PermissionSpec};
//!
//! # async fn run() -> pathwiz::FsResult<()> {
//! let manager = FileManager::new("/srv/project")?;
//! manager
//!     .create_folder("build", false, Some(PermissionSpec::new(0o755)?), &["out".into()])
//!     .await?;
//!
//! let output = manager.generate_directory_tree(".", OutputFormat::Markdown).await?;
//! println!("{}", output.markdown.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use tracing::{debug, warn};

pub use pathwiz_core::{
    CheckState, CompletedStep, FsError, FsResult, NodeAnnotation, NodeKind, Operation,
    OutputFormat, PermissionMismatch, PermissionSpec, Resolution, RootPath, SandboxedPath,
    StepAction, TreeConfig, TreeConfigBuilder, TreeNode, TreeOutput,
};
pub use pathwiz_ops::{FileEntry, FilesystemManager, FolderEntry, PermissionsManager, Subfolder};
pub use pathwiz_scan::{
    FileList, FileLister, MarkdownFormatter, TreeScanner, render_json, render_markdown,
};

/// Sandboxed entry point for every pathwiz operation.
///
/// No operation is transactional across managers, and errors from the
/// managers are passed through unchanged.
#[derive(Debug, Clone)]
pub struct FileManager {
    root: RootPath,
    folders: FilesystemManager,
    permissions: PermissionsManager,
    scanner: TreeScanner,
    lister: FileLister,
}

impl FileManager {
    /// Create a manager rooted at `root`, which must be an existing folder.
    pub fn new(root: impl AsRef<Path>) -> FsResult<Self> {
        let root = RootPath::new(root)?;
        debug!(root = %root.as_path().display(), "Opened file manager");

        Ok(Self {
            root,
            folders: FilesystemManager::new(),
            permissions: PermissionsManager::new(),
            scanner: TreeScanner::new(),
            lister: FileLister::new(),
        })
    }

    /// Use `config` for tree generation.
    pub fn with_tree_config(mut self, config: TreeConfig) -> Self {
        self.scanner.set_config(config);
        self
    }

    /// Pass every markdown tree rendering through `formatter`.
    pub fn with_markdown_formatter(
        mut self,
        formatter: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.scanner = self.scanner.with_formatter(formatter);
        self
    }

    /// The sandbox root.
    pub fn root(&self) -> &RootPath {
        &self.root
    }

    /// Tree generation settings.
    pub fn tree_config(&self) -> &TreeConfig {
        self.scanner.config()
    }

    /// Resolve `path` against the root; see [`RootPath::resolve`].
    pub fn resolve(&self, path: impl AsRef<Path>) -> FsResult<SandboxedPath> {
        self.root.resolve(path)
    }

    /// Create a folder and its subfolders.
    ///
    /// See [`FilesystemManager::create_folder`].
    pub async fn create_folder(
        &self,
        path: impl AsRef<Path>,
        overwrite: bool,
        permissions: Option<PermissionSpec>,
        subfolders: &[Subfolder],
    ) -> FsResult<FolderEntry> {
        let target = self.resolve(path)?;
        self.folders
            .create_folder(&target, overwrite, permissions, subfolders)
            .await
    }

    /// Create a folder, then verify its permissions.
    ///
    /// A failed or mismatching verification is reported as a
    /// [`FsError::PartialFailure`] listing every step the creation took,
    /// including the removal of a folder replaced with `overwrite`; the
    /// folder stays on disk.
    pub async fn create_folder_checked(
        &self,
        path: impl AsRef<Path>,
        overwrite: bool,
        permissions: PermissionSpec,
        subfolders: &[Subfolder],
    ) -> FsResult<FolderEntry> {
        let target = self.resolve(path)?;
        let entry = self
            .folders
            .create_folder(&target, overwrite, Some(permissions), subfolders)
            .await?;

        match self
            .permissions
            .check_permissions(&target, permissions, false)
            .await
        {
            Ok(None) => Ok(entry),
            Ok(Some(report)) => {
                warn!(%report, "Created folder does not carry the requested permissions");
                let err = FsError::partial(
                    Operation::CreateFolder,
                    entry.steps,
                    FsError::Mismatch {
                        report: report.clone(),
                    },
                );
                Err(err.with_mismatch(report))
            }
            Err(err) => Err(FsError::partial(Operation::CreateFolder, entry.steps, err)),
        }
    }

    /// Create an empty file `name` inside `sub_folder` (the root if `None`).
    pub async fn create_file(
        &self,
        name: &str,
        sub_folder: Option<&Path>,
        overwrite: bool,
    ) -> FsResult<FileEntry> {
        let folder = self.resolve(sub_folder.unwrap_or(Path::new("")))?;
        let target = self.resolve(folder.child(name)?.relative())?;
        self.folders.create_file(&target, overwrite).await
    }

    /// Lazily list files under `dir` ending in `.{extension}`.
    ///
    /// See [`FileLister::list`].
    pub fn get_file_list(
        &self,
        dir: impl AsRef<Path>,
        extension: Option<&str>,
        recursive: bool,
    ) -> FsResult<FileList> {
        let dir = self.resolve(dir)?;
        self.lister.list(dir.absolute(), extension, recursive)
    }

    /// Current permission bits of `path`.
    pub async fn get_file_permissions(&self, path: impl AsRef<Path>) -> FsResult<PermissionSpec> {
        let target = self.resolve(path)?;
        self.permissions.get_file_permissions(&target).await
    }

    /// Render `bits` as a 9-character `rwx` string.
    pub fn permissions_to_rwx(&self, bits: u32) -> FsResult<String> {
        PermissionsManager::permissions_to_rwx(bits)
    }

    /// Compare the permissions of `path` against `expected`, optionally
    /// fixing them.
    ///
    /// See [`PermissionsManager::check_permissions`].
    pub async fn check_permissions(
        &self,
        path: impl AsRef<Path>,
        expected: PermissionSpec,
        resolve: bool,
    ) -> FsResult<Option<PermissionMismatch>> {
        let target = self.resolve(path)?;
        self.permissions
            .check_permissions(&target, expected, resolve)
            .await
    }

    /// Check `path` and every folder below it.
    pub async fn check_permissions_recursive(
        &self,
        path: impl AsRef<Path>,
        expected: PermissionSpec,
        resolve: bool,
    ) -> FsResult<Vec<PermissionMismatch>> {
        let target = self.resolve(path)?;
        self.permissions
            .check_permissions_recursive(&target, expected, resolve)
            .await
    }

    /// Walk `dir` and render it in `format`.
    pub async fn generate_directory_tree(
        &self,
        dir: impl AsRef<Path>,
        format: OutputFormat,
    ) -> FsResult<TreeOutput> {
        let dir = self.resolve(dir)?;
        self.scanner
            .generate_async(dir.absolute().to_path_buf(), format)
            .await
    }
}
