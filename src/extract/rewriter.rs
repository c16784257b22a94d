//! Wraps variable declaration values in export calls
//!
//! `$name: <expr>;` becomes `$name: export_var("name",<expr>);`. Flags such as
//! `!default` live outside the value node and are left where they are.

use log::debug;
use thiserror::Error;

use super::cleaner::clean;
use crate::scss::constants::*;
use crate::scss::lexer::{tokenize, Token};
use crate::scss::query::{first_child, first_child_index};
use crate::scss::{Node, NodeValue};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewriteError {
    /// The export function name would not print as a function call
    #[error("Invalid export function name \"{name}\"")]
    InvalidFunctionName { name: String },

    /// A variable node holding children instead of a name
    #[error("Variable node without a name in declaration")]
    UnnamedVariable,
}

/// Rewrites declarations to call an export function
#[derive(Debug, Clone)]
pub struct DeclarationRewriter {
    export_function: String,
}

impl DeclarationRewriter {
    pub fn new(export_function: impl Into<String>) -> Self {
        Self {
            export_function: export_function.into(),
        }
    }

    pub fn export_function(&self) -> &str {
        &self.export_function
    }

    /// Rewrite every top-level variable declaration, in document order.
    ///
    /// Declarations nested in rules or at-rule blocks are local bindings and
    /// stay as they are, as do plain CSS declarations. Returns the same tree.
    pub fn rewrite<'t>(&self, tree: &'t mut Node) -> Result<&'t mut Node, RewriteError> {
        if !is_identifier(&self.export_function) {
            return Err(RewriteError::InvalidFunctionName {
                name: self.export_function.clone(),
            });
        }

        let mut rewritten = 0usize;
        for declaration in tree
            .children_mut()
            .iter_mut()
            .filter(|child| child.is(NODE_DECLARATION))
        {
            if self.rewrite_declaration(declaration)? {
                rewritten += 1;
            }
        }

        debug!("Rewrote {} variable declarations", rewritten);
        Ok(tree)
    }

    /// Returns whether the declaration was a variable assignment
    fn rewrite_declaration(&self, declaration: &mut Node) -> Result<bool, RewriteError> {
        let Some(variable) = first_child(declaration, NODE_PROPERTY)
            .and_then(|property| first_child(property, NODE_VARIABLE))
        else {
            return Ok(false);
        };
        let Some(name) = variable.text().map(str::to_string) else {
            return Err(RewriteError::UnnamedVariable);
        };
        let Some(index) = first_child_index(declaration, NODE_VALUE) else {
            return Ok(false);
        };

        let NodeValue::Sequence(children) = &mut declaration.value else {
            return Ok(false);
        };
        let value = &children[index];
        let call = self.export_call(&name, clean(value));
        children[index] = call;
        Ok(true)
    }

    fn export_call(&self, name: &str, value: Node) -> Node {
        Node::sequence(
            NODE_FUNCTION,
            vec![
                Node::leaf(NODE_IDENTIFIER, self.export_function.as_str()),
                Node::sequence(
                    NODE_ARGUMENTS,
                    vec![
                        Node::leaf(NODE_STRING_DOUBLE, name),
                        Node::leaf(NODE_PUNCTUATION, ","),
                        value,
                    ],
                ),
            ],
        )
    }
}

impl Default for DeclarationRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_EXPORT_FUNCTION)
    }
}

fn is_identifier(name: &str) -> bool {
    matches!(tokenize(name).as_deref(), Ok([lexeme]) if lexeme.token == Token::Ident)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scss::{stringify, ScssParser};

    fn rewrite_source(source: &str) -> String {
        let mut tree = ScssParser::new().parse(source).unwrap();
        DeclarationRewriter::default().rewrite(&mut tree).unwrap();
        stringify(&tree)
    }

    #[test]
    fn test_wraps_variable_values() {
        assert_eq!(rewrite_source("$x: 1 + 2;"), "$x: export_var(\"x\",1 + 2);");
        assert_eq!(
            rewrite_source("$base: 10px !default;"),
            "$base: export_var(\"base\",10px) !default;"
        );
    }

    #[test]
    fn test_plain_declarations_untouched() {
        let source = "$a: 1;\n.a {\n  color: red;\n}";
        assert_eq!(
            rewrite_source(source),
            "$a: export_var(\"a\",1);\n.a {\n  color: red;\n}"
        );
    }

    #[test]
    fn test_nested_declarations_stay_local() {
        let source = "$a: 1;\n.x { $a: 2; }\n@if true { $b: 3; }";
        assert_eq!(
            rewrite_source(source),
            "$a: export_var(\"a\",1);\n.x { $a: 2; }\n@if true { $b: 3; }"
        );
    }

    #[test]
    fn test_rewritten_output_reparses_with_export_calls() {
        let source = "$a: 1;\n$b: (x: 1, y: 2);\n$c: 1px 2px, 3px;";
        let output = rewrite_source(source);
        let tree = ScssParser::new().parse(&output).unwrap();

        let mut names = Vec::new();
        for declaration in tree.children().iter().filter(|child| child.is(NODE_DECLARATION)) {
            let value = first_child(declaration, NODE_VALUE).unwrap();
            let call = value.children().first().unwrap();
            assert!(call.is(NODE_FUNCTION));
            assert_eq!(call.children()[0].text(), Some("export_var"));
            let first_argument = &call.children()[1].children()[0];
            assert!(first_argument.is(NODE_STRING_DOUBLE));
            names.push(first_argument.text().unwrap().to_string());
        }
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_returns_same_tree_and_custom_name() {
        let mut tree = ScssParser::new().parse("$x: 1;").unwrap();
        let rewriter = DeclarationRewriter::new("capture");
        let returned = rewriter.rewrite(&mut tree).unwrap();
        assert_eq!(stringify(returned), "$x: capture(\"x\",1);");
    }

    #[test]
    fn test_invalid_function_name() {
        let mut tree = ScssParser::new().parse("$x: 1;").unwrap();
        let result = DeclarationRewriter::new("not valid").rewrite(&mut tree);
        assert!(matches!(result, Err(RewriteError::InvalidFunctionName { .. })));
    }

    #[test]
    fn test_unnamed_variable() {
        let mut tree = Node::sequence(
            NODE_STYLESHEET,
            vec![Node::sequence(
                NODE_DECLARATION,
                vec![
                    Node::single(NODE_PROPERTY, Node::sequence(NODE_VARIABLE, vec![])),
                    Node::leaf(NODE_PUNCTUATION, ":"),
                    Node::sequence(NODE_VALUE, vec![Node::leaf(NODE_NUMBER, "1")]),
                ],
            )],
        );
        let result = DeclarationRewriter::default().rewrite(&mut tree);
        assert_eq!(result.unwrap_err(), RewriteError::UnnamedVariable);
    }
}
