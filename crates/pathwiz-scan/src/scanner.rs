//! Directory tree scanner backed by jwalk.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDirGeneric};
use tracing::{debug, warn};

use pathwiz_core::{
    FsError, FsResult, NodeAnnotation, OutputFormat, TreeConfig, TreeNode, TreeOutput,
};

use crate::ancestry::AncestorSet;
use crate::render::{MarkdownFormatter, render_markdown};

/// Per-folder walk state: the folder's ancestors, and a per-entry flag set on
/// links that point back at one of them.
type WalkState = (AncestorSet, bool);
type WalkEntry = jwalk::DirEntry<WalkState>;

/// Nodes found below each folder, keyed by the path the folder was read at.
type ChildrenByParent = HashMap<PathBuf, Vec<(PathBuf, TreeNode)>>;

/// Builds [`TreeNode`] snapshots of a directory subtree.
///
/// Every call walks the filesystem again; nothing is cached.
#[derive(Clone, Default)]
pub struct TreeScanner {
    config: TreeConfig,
    formatter: Option<MarkdownFormatter>,
}

impl TreeScanner {
    /// Create a scanner with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scanner with a custom configuration.
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            config,
            formatter: None,
        }
    }

    /// Pass the markdown rendering through `formatter` before returning it.
    pub fn with_formatter(
        mut self,
        formatter: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Replace the configuration, keeping any formatter.
    pub fn set_config(&mut self, config: TreeConfig) {
        self.config = config;
    }

    /// The configuration in use.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Generate the renderings selected by `format`.
    ///
    /// Blocks on filesystem I/O; see [`TreeScanner::generate_async`].
    pub fn generate(&self, path: &Path, format: OutputFormat) -> FsResult<TreeOutput> {
        let root = self.scan(path)?;

        let markdown = format.wants_markdown().then(|| {
            let text = render_markdown(&root, self.config.markdown_header);
            match &self.formatter {
                Some(formatter) => formatter(&text),
                None => text,
            }
        });
        let tree = format.wants_dict().then_some(root);

        Ok(TreeOutput { tree, markdown })
    }

    /// Generate on the blocking thread pool.
    pub async fn generate_async(&self, path: PathBuf, format: OutputFormat) -> FsResult<TreeOutput> {
        let scanner = self.clone();
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || scanner.generate(&task_path, format))
            .await
            .map_err(|e| FsError::Io {
                path,
                source: std::io::Error::other(format!("Task failed: {e}")),
            })?
    }

    /// Walk `path` and build its tree.
    ///
    /// Fails only if `path` itself cannot be found. Everything below it is
    /// best effort: unreadable folders and dangling links become annotated
    /// nodes.
    pub fn scan(&self, path: &Path) -> FsResult<TreeNode> {
        let metadata = fs::metadata(path).map_err(|e| FsError::io(path, e))?;
        let name = display_name(path);

        if !metadata.is_dir() {
            return Ok(TreeNode::new_file(name));
        }

        let (annotation, mut children_by_parent) = self.collect_entries(path);
        let mut root = TreeNode::new_folder(name);
        root.annotation = annotation;
        attach_children(&mut root, path, &mut children_by_parent);
        root.sort_children();

        debug!(
            path = %path.display(),
            folders = root.folder_count(),
            files = root.file_count(),
            "Scanned tree"
        );
        Ok(root)
    }

    /// Walk below `root` with jwalk and group the resulting nodes by parent.
    ///
    /// Also returns the annotation of the root itself if it could not be
    /// read.
    fn collect_entries(&self, root: &Path) -> (Option<NodeAnnotation>, ChildrenByParent) {
        let config = self.config.clone();
        let walker = WalkDirGeneric::<WalkState>::new(root)
            .parallelism(walk_parallelism())
            .sort(true)
            .skip_hidden(false)
            .follow_links(self.config.follow_symlinks)
            .max_depth(self.config.walk_depth())
            .process_read_dir(move |depth, path, ancestors, children| {
                // The first call only carries the root entry itself.
                if depth.is_none() {
                    return;
                }
                children.retain(|result| is_listed(&config, result));

                if let Ok(metadata) = fs::metadata(path) {
                    ancestors.enter(path, &metadata);
                }
                for entry in children.iter_mut().flatten() {
                    if entry.path_is_symlink()
                        && entry.file_type().is_dir()
                        && points_back(ancestors, &entry.path())
                    {
                        entry.read_children_path = None;
                        entry.client_state = true;
                    }
                }
            });

        let mut root_annotation = None;
        let mut children_by_parent = ChildrenByParent::new();

        for entry_result in walker {
            let (path, node) = match entry_result {
                Ok(entry) if entry.depth == 0 => {
                    if let Some(err) = &entry.read_children_error {
                        warn!(path = %root.display(), error = %err, "Folder is unreadable");
                        root_annotation = Some(unreadable(err));
                    }
                    continue;
                }
                Ok(entry) => (entry.path(), entry_node(&entry)),
                Err(err) => {
                    let Some(path) = err.path().map(Path::to_path_buf) else {
                        debug!(error = %err, "Skipping unreadable entry");
                        continue;
                    };
                    let node = error_node(&path, &err);
                    (path, node)
                }
            };

            if let Some(parent) = path.parent() {
                children_by_parent
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push((path, node));
            }
        }

        (root_annotation, children_by_parent)
    }
}

impl fmt::Debug for TreeScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeScanner")
            .field("config", &self.config)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

/// Thread pool setup shared by every jwalk traversal in this crate.
pub(crate) fn walk_parallelism() -> Parallelism {
    Parallelism::RayonDefaultPool {
        busy_timeout: Duration::from_millis(100),
    }
}

/// Check whether a walk result survives the hidden, ignore and exclusion
/// filters.
fn is_listed(config: &TreeConfig, result: &jwalk::Result<WalkEntry>) -> bool {
    let (name, is_dir) = match result {
        Ok(entry) => (entry.file_name().to_string_lossy(), entry.file_type().is_dir()),
        Err(err) => match err.path().and_then(Path::file_name) {
            Some(name) => (name.to_string_lossy(), false),
            None => return true,
        },
    };

    !(config.should_skip_hidden(&name)
        || config.should_ignore(&name)
        || (is_dir && config.is_excluded_dir(&name)))
}

/// Check whether the folder a link at `path` resolves to is an ancestor.
fn points_back(ancestors: &AncestorSet, path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| ancestors.contains(path, &metadata))
}

/// Node for an entry the walker read successfully, without its children.
fn entry_node(entry: &WalkEntry) -> TreeNode {
    let name: CompactString = entry.file_name().to_string_lossy().into();

    if !entry.file_type().is_dir() {
        return TreeNode::new_file(name);
    }

    if entry.client_state {
        debug!(path = %entry.path().display(), "Symlink points back at an ancestor");
        return TreeNode::new_folder(name).with_annotation(NodeAnnotation::LinkCycle);
    }

    match &entry.read_children_error {
        Some(err) => {
            warn!(path = %entry.path().display(), error = %err, "Folder is unreadable");
            TreeNode::new_folder(name).with_annotation(unreadable(err))
        }
        None => TreeNode::new_folder(name),
    }
}

/// Node for an entry the walker reported as an error.
fn error_node(path: &Path, err: &jwalk::Error) -> TreeNode {
    let name = display_name(path);

    if err.loop_ancestor().is_some() {
        debug!(path = %path.display(), "Symlink points back at an ancestor");
        return TreeNode::new_folder(name).with_annotation(NodeAnnotation::LinkCycle);
    }

    let is_link = fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink());
    if is_link {
        debug!(path = %path.display(), error = %err, "Unresolved symlink");
        return TreeNode::new_unresolved(name);
    }

    warn!(path = %path.display(), error = %err, "Entry is unreadable");
    TreeNode::new_file(name).with_annotation(unreadable(err))
}

fn unreadable(err: &jwalk::Error) -> NodeAnnotation {
    NodeAnnotation::Unreadable {
        message: err
            .io_error()
            .map_or_else(|| err.to_string(), ToString::to_string),
    }
}

/// Move the nodes collected below `path` into `node`, recursively.
fn attach_children(node: &mut TreeNode, path: &Path, children_by_parent: &mut ChildrenByParent) {
    let Some(children) = children_by_parent.remove(path) else {
        return;
    };
    for (child_path, mut child) in children {
        if child.is_folder() {
            attach_children(&mut child, &child_path, children_by_parent);
        }
        node.children.push(child);
    }
}

/// Name shown for the traversal root.
fn display_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| n.to_string_lossy().into())
        .unwrap_or_else(|| path.to_string_lossy().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("A")).unwrap();
        fs::create_dir(root.join("A/nested")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("A/inner.md"), "inner").unwrap();

        temp
    }

    #[test]
    fn test_children_ordered_folders_first() {
        let temp = create_test_tree();
        let tree = TreeScanner::new().scan(temp.path()).unwrap();

        assert_eq!(tree.child_names(), vec!["A", "a.txt", "b.txt"]);
        assert_eq!(tree.child("A").unwrap().child_names(), vec!["nested", "inner.md"]);
    }

    #[test]
    fn test_missing_path() {
        let temp = TempDir::new().unwrap();
        let result = TreeScanner::new().scan(&temp.path().join("missing"));
        assert!(matches!(result, Err(FsError::NotFound { .. })));
    }

    #[test]
    fn test_max_depth() {
        let temp = create_test_tree();
        let config = TreeConfig::builder().max_depth(Some(1)).build().unwrap();
        let tree = TreeScanner::with_config(config).scan(temp.path()).unwrap();

        let a = tree.child("A").unwrap();
        assert!(a.is_folder());
        assert!(a.children.is_empty());
    }

    #[test]
    fn test_generate_formats() {
        let temp = create_test_tree();
        let scanner = TreeScanner::new();

        let dict = scanner.generate(temp.path(), OutputFormat::Dict).unwrap();
        assert!(dict.tree.is_some());
        assert!(dict.markdown.is_none());

        let markdown = scanner.generate(temp.path(), OutputFormat::Markdown).unwrap();
        assert!(markdown.tree.is_none());
        assert!(markdown.markdown.is_some());

        let both = scanner.generate(temp.path(), OutputFormat::Both).unwrap();
        assert!(both.tree.is_some() && both.markdown.is_some());
    }

    #[test]
    fn test_formatter_applies_to_markdown_only() {
        let temp = create_test_tree();
        let scanner = TreeScanner::new().with_formatter(|text| format!("<pre>\n{text}\n</pre>"));

        let output = scanner.generate(temp.path(), OutputFormat::Both).unwrap();
        let markdown = output.markdown.unwrap();
        assert!(markdown.starts_with("<pre>\n"));
        assert!(markdown.ends_with("\n</pre>"));
        assert!(markdown.contains("├── A/"));
        assert_eq!(output.tree.unwrap().child_names(), vec!["A", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_set_config_keeps_formatter() {
        let temp = create_test_tree();
        let mut scanner = TreeScanner::new().with_formatter(|text| text.to_uppercase());
        scanner.set_config(TreeConfig::builder().max_depth(Some(1)).build().unwrap());

        let markdown = scanner
            .generate(temp.path(), OutputFormat::Markdown)
            .unwrap()
            .markdown
            .unwrap();
        assert!(!markdown.contains("INNER.MD"));
        assert!(markdown.contains("├── A/"));
        assert!(markdown.contains("A.TXT"));
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_link_to_ancestor_is_a_cycle() {
        let temp = create_test_tree();
        std::os::unix::fs::symlink("..", temp.path().join("A/up")).unwrap();

        let tree = TreeScanner::new().scan(temp.path()).unwrap();
        let up = tree.child("A").unwrap().child("up").unwrap();
        assert_eq!(up.annotation, Some(NodeAnnotation::LinkCycle));
        assert!(up.children.is_empty());
    }

    #[test]
    fn test_file_root() {
        let temp = create_test_tree();
        let tree = TreeScanner::new().scan(&temp.path().join("a.txt")).unwrap();
        assert!(tree.is_file());
        assert_eq!(tree.name.as_str(), "a.txt");
    }
}
