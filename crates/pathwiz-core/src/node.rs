//! Directory tree node types.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Type of tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Directory (or a symlink that resolves to one).
    Folder,
    /// Regular file, or anything else that is not a directory.
    File,
    /// Symbolic link whose target cannot be resolved.
    Unresolved,
}

impl NodeKind {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, NodeKind::Folder)
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }
}

/// Degraded-read marker attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum NodeAnnotation {
    /// The entry exists but could not be read.
    Unreadable { message: String },
    /// A symlink pointing back at a folder already on the current path.
    LinkCycle,
}

/// One entry in a directory tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Entry name (not full path).
    pub name: CompactString,

    /// Node type.
    pub kind: NodeKind,

    /// Children (folders only), folders first then by name.
    #[serde(default)]
    pub children: Vec<TreeNode>,

    /// Set when the entry could only be read partially.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<NodeAnnotation>,
}

impl TreeNode {
    fn new(name: impl Into<CompactString>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
            annotation: None,
        }
    }

    /// Create a folder node.
    pub fn new_folder(name: impl Into<CompactString>) -> Self {
        Self::new(name, NodeKind::Folder)
    }

    /// Create a file node.
    pub fn new_file(name: impl Into<CompactString>) -> Self {
        Self::new(name, NodeKind::File)
    }

    /// Create a node for a link that cannot be resolved.
    pub fn new_unresolved(name: impl Into<CompactString>) -> Self {
        Self::new(name, NodeKind::Unresolved)
    }

    /// Attach an annotation.
    pub fn with_annotation(mut self, annotation: NodeAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Check if this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if this node could not be read.
    pub fn is_unreadable(&self) -> bool {
        matches!(self.annotation, Some(NodeAnnotation::Unreadable { .. }))
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name.as_str() == name)
    }

    /// Names of the direct children, in order.
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }

    /// Count files in this subtree.
    pub fn file_count(&self) -> u64 {
        match self.kind {
            NodeKind::Folder => self.children.iter().map(TreeNode::file_count).sum(),
            NodeKind::File => 1,
            NodeKind::Unresolved => 0,
        }
    }

    /// Count folders below this node.
    pub fn folder_count(&self) -> u64 {
        self.children
            .iter()
            .filter(|c| c.is_folder())
            .map(|c| 1 + c.folder_count())
            .sum()
    }

    /// Sort children folders first, then by name, recursively.
    pub fn sort_children(&mut self) {
        self.children
            .sort_by(|a, b| (!a.is_folder(), &a.name).cmp(&(!b.is_folder(), &b.name)));
        for child in &mut self.children {
            child.sort_children();
        }
    }
}

/// Renderings produced by a tree generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeOutput {
    /// Nested tree (the dict form), when requested.
    pub tree: Option<TreeNode>,
    /// Indented markdown rendering, when requested.
    pub markdown: Option<String>,
}
