//! Strips parser-specific data from syntax trees

use crate::scss::{Node, NodeValue};

/// Copy a tree keeping only each node's type and value
pub fn clean(node: &Node) -> Node {
    let value = match &node.value {
        NodeValue::Leaf(text) => NodeValue::Leaf(text.clone()),
        NodeValue::Single(child) => NodeValue::Single(Box::new(clean(child))),
        NodeValue::Sequence(children) => NodeValue::Sequence(children.iter().map(clean).collect()),
    };
    Node {
        kind: node.kind.clone(),
        value,
        span: None,
    }
}
