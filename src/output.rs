//! CLI output formatting.
//!
//! Two reports are printed after a successful import.
//!
//! ## Summary
//!
//! ```text
//! 42 media files imported in 5130ms
//!     Galleries: 3
//!     Vignettes: 37
//!     Fallback copies: 1
//!     Videos copied: 4
//!     Failed: 0
//!     Locations: 30 cached, 7 requested, 1 unresolved
//! ```
//!
//! ## Content tree
//!
//! The generated manifests directory, directories first, then files, each
//! group sorted by name:
//!
//! ```text
//! src/content/galleries/
//! ├── 2024
//! │   ├── Italy
//! │   │   └── index.md
//! │   └── Japan
//! │       └── index.md
//! └── misc
//!     └── index.md
//! ```
//!
//! An empty directory prints `<Empty>` instead.
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure; the tree is read from disk separately by [`read_content_tree`].

use crate::pipeline::ImportSummary;
use std::cmp::Ordering;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Summary
// ============================================================================

pub fn format_summary(summary: &ImportSummary) -> Vec<String> {
    let detail = |label: &str, value: String| format!("{}{}: {}", indent(1), label, value);
    vec![
        format!(
            "{} media files imported in {}ms",
            summary.files,
            summary.elapsed.as_millis()
        ),
        detail("Galleries", summary.galleries.to_string()),
        detail("Vignettes", summary.vignettes.to_string()),
        detail("Fallback copies", summary.fallbacks.to_string()),
        detail("Videos copied", summary.copied.to_string()),
        detail("Failed", summary.failed.to_string()),
        detail("Locations", summary.geocode.to_string()),
    ]
}

pub fn print_summary(summary: &ImportSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Content tree
// ============================================================================

/// One entry of a directory listing, flattened in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// 1 for direct children of the root.
    pub depth: usize,
    pub name: String,
    /// Last among its siblings.
    pub is_last: bool,
}

/// Directories before files, then by name.
fn tree_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    b.file_type()
        .is_dir()
        .cmp(&a.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Read the tree under `root` (excluding `root` itself) in display order.
pub fn read_content_tree(root: &Path) -> Result<Vec<TreeNode>, walkdir::Error> {
    let mut nodes = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by(tree_order) {
        let entry = entry?;
        nodes.push(TreeNode {
            depth: entry.depth(),
            name: entry.file_name().to_string_lossy().into_owned(),
            is_last: false,
        });
    }
    mark_last_siblings(&mut nodes);
    Ok(nodes)
}

/// Walk backwards: a node is last if no sibling at its depth follows before
/// the parent's subtree ends.
fn mark_last_siblings(nodes: &mut [TreeNode]) {
    let mut seen: Vec<bool> = Vec::new();
    for node in nodes.iter_mut().rev() {
        if seen.len() <= node.depth {
            seen.resize(node.depth + 1, false);
        }
        node.is_last = !seen[node.depth];
        seen[node.depth] = true;
        seen.truncate(node.depth + 1);
    }
}

/// Format a tree listing under a header line, `tree`-style.
pub fn format_content_tree(header: &str, nodes: &[TreeNode]) -> Vec<String> {
    if nodes.is_empty() {
        return vec!["<Empty>".to_string()];
    }

    let mut lines = vec![header.to_string()];
    // Whether the ancestor at each depth was the last of its siblings.
    let mut ancestors: Vec<bool> = Vec::new();
    for node in nodes {
        ancestors.truncate(node.depth.saturating_sub(1));
        let mut line: String = ancestors
            .iter()
            .map(|&last| if last { "    " } else { "│   " })
            .collect();
        line.push_str(if node.is_last { "└── " } else { "├── " });
        line.push_str(&node.name);
        lines.push(line);
        ancestors.push(node.is_last);
    }
    lines
}

/// Print the tree under `root`, headed by its path.
pub fn print_content_tree(root: &Path) {
    let header = format!("{}/", root.display().to_string().trim_end_matches('/'));
    match read_content_tree(root) {
        Ok(nodes) => {
            for line in format_content_tree(&header, &nodes) {
                println!("{}", line);
            }
        }
        Err(e) => log::warn!("Cannot list {}: {e}", root.display()),
    }
}
