//! Text renderings of a directory tree.

use std::sync::Arc;

use pathwiz_core::{NodeAnnotation, NodeKind, TreeNode};

/// Post-processing applied to the finished markdown text, e.g. to wrap it
/// for a notebook or a chat message.
pub type MarkdownFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Width of one indentation level in the markdown rendering.
pub const INDENT: &str = "    ";

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";

/// Render the tree as indented markdown, one line per node.
///
/// Folders end with `/`. With `with_header`, the listing is wrapped in a
/// `# Project Structure: <name>` title and a code fence.
pub fn render_markdown(root: &TreeNode, with_header: bool) -> String {
    let mut lines = Vec::new();

    if with_header {
        lines.push(format!("# Project Structure: {}", root.name));
        lines.push("```".to_string());
    }

    lines.push(label(root));
    render_children(&root.children, "", &mut lines);

    if with_header {
        lines.push("```".to_string());
    }

    lines.join("\n")
}

fn render_children(children: &[TreeNode], prefix: &str, lines: &mut Vec<String>) {
    for (i, child) in children.iter().enumerate() {
        let is_last = i + 1 == children.len();
        let connector = if is_last { LAST_BRANCH } else { BRANCH };
        lines.push(format!("{prefix}{connector}{}", label(child)));

        if !child.children.is_empty() {
            let next_prefix = format!("{prefix}{}", if is_last { INDENT } else { PIPE });
            render_children(&child.children, &next_prefix, lines);
        }
    }
}

fn label(node: &TreeNode) -> String {
    let mut label = node.name.to_string();
    match node.kind {
        NodeKind::Folder => label.push('/'),
        NodeKind::File => {}
        NodeKind::Unresolved => label.push_str(" [unresolved]"),
    }
    match node.annotation {
        Some(NodeAnnotation::Unreadable { .. }) => label.push_str(" [unreadable]"),
        Some(NodeAnnotation::LinkCycle) => label.push_str(" [cycle]"),
        None => {}
    }
    label
}

/// Render the tree as pretty-printed JSON (`{name, kind, children}` per node).
pub fn render_json(root: &TreeNode) -> serde_json::Result<String> {
    serde_json::to_string_pretty(root)
}
