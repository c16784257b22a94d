//! Tree printer utility for SCSS syntax tree debugging
//!
//! Renders a syntax tree in a readable indented form, used for trace logging
//! of rewritten stylesheets.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::node::{Node, NodeValue};

/// Render a syntax tree node and its children recursively
pub fn format_tree(node: &Node) -> String {
    let mut out = String::new();
    write_tree(node, 0, &mut out);
    out
}

fn write_tree(node: &Node, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let position = node
        .span
        .map(|span| format!("[{}..{}]", span.start, span.end))
        .unwrap_or_default();

    match &node.value {
        NodeValue::Leaf(text) => {
            // Truncate very long text for readability
            let display_text = if text.chars().count() > 50 {
                format!("{}...", text.chars().take(47).collect::<String>())
            } else {
                text.clone()
            };

            // Escape newlines and tabs for better display
            let display_text = display_text
                .replace('\n', "\\n")
                .replace('\t', "\\t")
                .replace('\r', "\\r");

            let _ = writeln!(out, "{}{}{} '{}'", indent, node.kind, position, display_text);
        }
        NodeValue::Single(_) | NodeValue::Sequence(_) => {
            let _ = writeln!(out, "{}{}{}", indent, node.kind, position);
            for child in node.children() {
                write_tree(child, depth + 1, out);
            }
        }
    }
}

/// Collect statistics about node types in the tree
pub fn collect_node_stats(node: &Node) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    collect_node_stats_recursive(node, &mut stats);
    stats
}

fn collect_node_stats_recursive(node: &Node, stats: &mut BTreeMap<String, usize>) {
    *stats.entry(node.kind.clone()).or_insert(0) += 1;

    for child in node.children() {
        collect_node_stats_recursive(child, stats);
    }
}
