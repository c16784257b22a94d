//! SCSS syntax tree nodes
//!
//! Every node is a `{type, value}` pair where the value is either a leaf string,
//! a single child or a sequence of children. Nodes produced by the parser also
//! carry the byte span they were parsed from.

use serde::Serialize;

/// Byte range in the source text a node was parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Payload of a node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeValue {
    Leaf(String),
    Single(Box<Node>),
    Sequence(Vec<Node>),
}

/// A type-tagged syntax tree node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: NodeValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Node {
    /// Create a leaf node holding text
    pub fn leaf(kind: &str, text: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            value: NodeValue::Leaf(text.into()),
            span: None,
        }
    }

    /// Create a node wrapping exactly one child
    pub fn single(kind: &str, child: Node) -> Self {
        Self {
            kind: kind.to_string(),
            value: NodeValue::Single(Box::new(child)),
            span: None,
        }
    }

    /// Create a node holding an ordered list of children
    pub fn sequence(kind: &str, children: Vec<Node>) -> Self {
        Self {
            kind: kind.to_string(),
            value: NodeValue::Sequence(children),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// Leaf text, if this is a leaf node
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            NodeValue::Leaf(text) => Some(text),
            _ => None,
        }
    }

    /// Children of this node; empty for leaves
    pub fn children(&self) -> &[Node] {
        match &self.value {
            NodeValue::Leaf(_) => &[],
            NodeValue::Single(child) => std::slice::from_ref(child.as_ref()),
            NodeValue::Sequence(children) => children,
        }
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        match &mut self.value {
            NodeValue::Leaf(_) => &mut [],
            NodeValue::Single(child) => std::slice::from_mut(child.as_mut()),
            NodeValue::Sequence(children) => children,
        }
    }
}
