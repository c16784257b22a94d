//! Modules loaded with `@use`/`@forward`, and functions declared with `@function`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::error::{EngineError, EngineResult};
use super::evaluator::unescape;
use super::normalize_name;
use super::value::SassValue;
use crate::scss::constants::*;
use crate::scss::Node;

/// A function declared with `@function`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UserFunction {
    pub parameters: Vec<Parameter>,
    pub body: Vec<Node>,
    /// Module the function was declared in; `None` for the entry stylesheet
    pub module: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Parameter {
    /// Without the `$`
    pub name: String,
    /// Expression evaluated when the argument is missing
    pub default: Option<Vec<Node>>,
    /// `$args...` collects the remaining positional arguments
    pub rest: bool,
}

impl UserFunction {
    /// Parse the `name($a, $b: default)` signature of an `@function` rule.
    /// Returns the normalized name with the function.
    pub fn declare(params: &[Node], body: &[Node]) -> EngineResult<(String, Self)> {
        let Some(signature) = params.iter().find(|node| node.is(NODE_FUNCTION)) else {
            return Err(evaluation("Expected a function signature after @function."));
        };
        let children = signature.children();
        let name = children.first().and_then(Node::text).unwrap_or_default();
        let arguments = children.get(1).map(Node::children).unwrap_or_default();

        let parameters = split_on_commas(arguments)
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .map(|segment| parse_parameter(name, segment))
            .collect::<EngineResult<Vec<_>>>()?;

        if let Some(position) = parameters.iter().position(|parameter| parameter.rest) {
            if position + 1 != parameters.len() {
                return Err(evaluation(format!(
                    "Rest parameter of {}() must come last.",
                    name
                )));
            }
        }

        Ok((
            normalize_name(name),
            Self {
                parameters,
                body: body.to_vec(),
                module: None,
            },
        ))
    }
}

fn parse_parameter(function: &str, segment: &[Node]) -> EngineResult<Parameter> {
    let invalid = || evaluation(format!("Invalid parameter list for {}().", function));

    let (variable, rest) = segment.split_first().ok_or_else(invalid)?;
    if !variable.is(NODE_VARIABLE) {
        return Err(invalid());
    }
    let name = variable.text().ok_or_else(invalid)?.to_string();

    let rest = trim(rest);
    let is_dot = |node: &Node| node.is(NODE_PUNCTUATION) && node.text() == Some(".");
    match rest {
        [] => Ok(Parameter {
            name,
            default: None,
            rest: false,
        }),
        [a, b, c] if is_dot(a) && is_dot(b) && is_dot(c) => Ok(Parameter {
            name,
            default: None,
            rest: true,
        }),
        [colon, default @ ..] if colon.is(NODE_PUNCTUATION) && colon.text() == Some(":") => {
            let default = trim(default);
            if default.is_empty() {
                return Err(invalid());
            }
            Ok(Parameter {
                name,
                default: Some(default.to_vec()),
                rest: false,
            })
        }
        _ => Err(invalid()),
    }
}

/// Split an argument list at its top-level commas, trimming whitespace
fn split_on_commas(nodes: &[Node]) -> Vec<&[Node]> {
    nodes
        .split(|node| node.is(NODE_PUNCTUATION) && node.text() == Some(","))
        .map(trim)
        .collect()
}

fn trim(nodes: &[Node]) -> &[Node] {
    let start = nodes.iter().position(|node| !is_trivia(node)).unwrap_or(nodes.len());
    let end = nodes.iter().rposition(|node| !is_trivia(node)).map_or(start, |index| index + 1);
    &nodes[start..end]
}

fn is_trivia(node: &Node) -> bool {
    node.is(NODE_SPACE) || node.is(NODE_COMMENT_SINGLELINE) || node.is(NODE_COMMENT_MULTILINE)
}

/// `$name: value` pairs of a `with (...)` clause. Flags such as `!default` are dropped.
pub(crate) fn configured_variables(nodes: &[Node]) -> EngineResult<Vec<(String, &[Node])>> {
    let invalid = || evaluation("Expected \"$name: value\" pairs in \"with\" configuration.");

    split_on_commas(nodes)
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (variable, rest) = segment.split_first().ok_or_else(invalid)?;
            let name = variable
                .text()
                .filter(|_| variable.is(NODE_VARIABLE))
                .ok_or_else(invalid)?;
            let rest = trim(rest);
            let Some((colon, mut value)) = rest.split_first() else {
                return Err(invalid());
            };
            if !(colon.is(NODE_PUNCTUATION) && colon.text() == Some(":")) {
                return Err(invalid());
            }
            while let Some((last, init)) = value.split_last() {
                if !(last.is(NODE_FLAG) || is_trivia(last)) {
                    break;
                }
                value = init;
            }
            if trim(value).is_empty() {
                return Err(invalid());
            }
            Ok((normalize_name(name), trim(value)))
        })
        .collect()
}

/// What a namespace refers to
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Namespace {
    /// `sass:math` and the other built-in modules
    Builtin(String),
    /// A stylesheet, keyed by its resolved path
    Loaded(PathBuf),
}

/// Namespaces visible in one stylesheet
#[derive(Debug, Clone, Default)]
pub(crate) struct Namespaces {
    pub named: HashMap<String, Namespace>,
    /// Built-in modules used `as *`
    pub flat_builtins: Vec<String>,
}

impl Namespaces {
    pub fn get(&self, namespace: &str) -> Option<&Namespace> {
        self.named.get(&normalize_name(namespace))
    }
}

/// Members of an evaluated module
#[derive(Debug, Clone, Default)]
pub(crate) struct Module {
    pub variables: HashMap<String, SassValue>,
    pub functions: HashMap<String, Arc<UserFunction>>,
    pub namespaces: Namespaces,
}

/// How a `@use`/`@forward` rule exposes the module's members
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Alias {
    /// Namespace taken from the URL
    Default,
    /// `as name`
    Named(String),
    /// `as *`
    Flat,
    /// `as prefix-*`, only meaningful for `@forward`
    Prefix(String),
}

/// Parameters of a `@use` or `@forward` rule
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModuleRule<'n> {
    pub url: String,
    pub alias: Alias,
    /// Map nodes of a `with (...)` clause
    pub configuration: Option<&'n [Node]>,
}

impl<'n> ModuleRule<'n> {
    pub fn parse(keyword: &str, params: &'n [Node]) -> EngineResult<Self> {
        let nodes: Vec<&Node> = params.iter().filter(|node| !is_trivia(node)).collect();

        let url = match nodes.first() {
            Some(node) if node.is(NODE_STRING_DOUBLE) || node.is(NODE_STRING_SINGLE) => {
                unescape(node.text().unwrap_or_default())
            }
            _ => return Err(evaluation(format!("Expected a URL string after @{}.", keyword))),
        };

        let mut rule = Self {
            url,
            alias: Alias::Default,
            configuration: None,
        };
        let is_star = |node: Option<&&Node>| node.is_some_and(|node| node.is(NODE_OPERATOR) && node.text() == Some("*"));

        let mut index = 1;
        while let Some(node) = nodes.get(index) {
            match (node.kind.as_str(), node.text()) {
                (NODE_IDENTIFIER, Some("as")) => {
                    let target = nodes.get(index + 1);
                    if is_star(target) {
                        rule.alias = Alias::Flat;
                        index += 2;
                    } else if let Some(name) = target.filter(|node| node.is(NODE_IDENTIFIER)).and_then(|node| node.text()) {
                        if name.ends_with('-') && is_star(nodes.get(index + 2)) {
                            rule.alias = Alias::Prefix(name.to_string());
                            index += 3;
                        } else {
                            rule.alias = Alias::Named(name.to_string());
                            index += 2;
                        }
                    } else {
                        return Err(evaluation(format!("Expected a namespace after \"as\" in @{}.", keyword)));
                    }
                }
                (NODE_IDENTIFIER, Some("with")) => {
                    match nodes.get(index + 1) {
                        Some(map) if map.is(NODE_PARENTHESES) => rule.configuration = Some(map.children()),
                        _ => return Err(evaluation(format!("Expected a map after \"with\" in @{}.", keyword))),
                    }
                    index += 2;
                }
                // `with(` parses as a call
                (NODE_FUNCTION, _) if node.children().first().and_then(Node::text) == Some("with") => {
                    rule.configuration = node.children().get(1).map(Node::children);
                    index += 1;
                }
                // `show`/`hide` lists restrict visibility only
                (NODE_IDENTIFIER, Some("show" | "hide")) => break,
                _ => {
                    return Err(evaluation(format!(
                        "Unexpected \"{}\" in @{} rule.",
                        crate::scss::stringify(node),
                        keyword
                    )));
                }
            }
        }

        Ok(rule)
    }

    /// Namespace members are reached through; `None` when they are merged
    /// into the current scope
    pub fn namespace(&self) -> Option<String> {
        match &self.alias {
            Alias::Default => Some(default_namespace(&self.url)),
            Alias::Named(name) => Some(normalize_name(name)),
            Alias::Flat | Alias::Prefix(_) => None,
        }
    }

    /// Prefix added to merged member names
    pub fn prefix(&self) -> &str {
        match &self.alias {
            Alias::Prefix(prefix) => prefix,
            _ => "",
        }
    }
}

/// Last URL segment without a leading `_` or an extension: `"../theme/_colors.scss"` -> `colors`
pub(crate) fn default_namespace(url: &str) -> String {
    let last = url.rsplit(['/', ':']).next().unwrap_or(url);
    let stem = last.split('.').next().unwrap_or(last);
    normalize_name(stem.trim_start_matches('_'))
}

fn evaluation(message: impl Into<String>) -> EngineError {
    EngineError::Evaluation {
        message: message.into(),
    }
}
