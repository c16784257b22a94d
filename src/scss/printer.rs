//! SCSS printer
//!
//! Turns a syntax tree back into source text. Leaves that the parser stored
//! without their delimiters (`$`, `@`, `#`, quotes, comment markers) get them back
//! here; container nodes print their children in order.

use super::constants::*;
use super::node::{Node, NodeValue};

/// Serialize a tree back to SCSS source
pub fn stringify(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

fn write_node(node: &Node, out: &mut String) {
    let (open, close) = delimiters(&node.kind);
    out.push_str(open);
    match &node.value {
        NodeValue::Leaf(text) => out.push_str(text),
        NodeValue::Single(child) => write_node(child, out),
        NodeValue::Sequence(children) => {
            for child in children {
                write_node(child, out);
            }
        }
    }
    out.push_str(close);
}

fn delimiters(kind: &str) -> (&'static str, &'static str) {
    match kind {
        NODE_VARIABLE => ("$", ""),
        NODE_AT_KEYWORD => ("@", ""),
        NODE_COLOR_HEX => ("#", ""),
        NODE_FLAG => ("!", ""),
        NODE_STRING_DOUBLE => ("\"", "\""),
        NODE_STRING_SINGLE => ("'", "'"),
        NODE_COMMENT_SINGLELINE => ("//", ""),
        NODE_COMMENT_MULTILINE => ("/*", "*/"),
        NODE_ARGUMENTS | NODE_PARENTHESES => ("(", ")"),
        NODE_INTERPOLATION => ("#{", "}"),
        NODE_BLOCK => ("{", "}"),
        _ => ("", ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scss::parser::ScssParser;

    fn round_trip(source: &str) -> String {
        let tree = ScssParser::new().parse(source).unwrap();
        stringify(&tree)
    }

    #[test]
    fn test_round_trip_preserves_source() {
        let sources = [
            "$x: 1 + 2;",
            "$c: rgba(1, 2, 3, 0.5);",
            "@import \"other\";\n$y: $imported-var;\n",
            "// heading\n$map: (key: 'value', other: #fafafa) !default;\n",
            ".a:hover > .b {\n  color: red;\n  /* note */\n  $local: 10px * 2;\n}\n",
            "@media screen and (max-width: 100px) { .c { margin: 0 auto } }",
            "$name: foo-#{$bar}-baz;\n@if $a == 1 { $b: 2; } @else { $b: 3; }",
        ];
        for source in sources {
            assert_eq!(round_trip(source), source);
        }
    }

    #[test]
    fn test_constructed_function_call() {
        let call = Node::sequence(
            NODE_FUNCTION,
            vec![
                Node::leaf(NODE_IDENTIFIER, "export_var"),
                Node::sequence(
                    NODE_ARGUMENTS,
                    vec![
                        Node::leaf(NODE_STRING_DOUBLE, "x"),
                        Node::leaf(NODE_PUNCTUATION, ","),
                        Node::sequence(NODE_VALUE, vec![Node::leaf(NODE_NUMBER, "1")]),
                    ],
                ),
            ],
        );
        assert_eq!(stringify(&call), "export_var(\"x\",1)");
    }
}
