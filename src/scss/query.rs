//! Tree queries used by the declaration rewriter and the evaluator

use super::node::Node;

/// Find the first node of a specific type in the syntax tree
/// Performs a depth-first search to locate a node with the target type
pub fn find_node_by_type<'a>(node: &'a Node, target_type: &str) -> Option<&'a Node> {
    if node.is(target_type) {
        return Some(node);
    }

    node.children()
        .iter()
        .find_map(|child| find_node_by_type(child, target_type))
}

/// All nodes of a type anywhere in the tree, in document order
pub fn select_all<'a>(node: &'a Node, target_type: &str) -> Vec<&'a Node> {
    let mut found = Vec::new();
    collect(node, target_type, &mut found);
    found
}

fn collect<'a>(node: &'a Node, target_type: &str, found: &mut Vec<&'a Node>) {
    if node.is(target_type) {
        found.push(node);
    }
    for child in node.children() {
        collect(child, target_type, found);
    }
}

/// First direct child of a type
pub fn first_child<'a>(node: &'a Node, target_type: &str) -> Option<&'a Node> {
    node.children().iter().find(|child| child.is(target_type))
}

/// Index of the first direct child of a type
pub fn first_child_index(node: &Node, target_type: &str) -> Option<usize> {
    node.children().iter().position(|child| child.is(target_type))
}
