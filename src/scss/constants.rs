//! SCSS Node Kind Constants
//!
//! This module contains the node kinds produced by the SCSS parser and consumed
//! by the printer, the declaration rewriter and the evaluator. Centralizing these
//! constants helps prevent mistakes and makes the code more maintainable.

// Basic structural nodes
/// Root node of the SCSS syntax tree
pub const NODE_STYLESHEET: &str = "stylesheet";
/// A style rule: selector followed by a block
pub const NODE_RULE: &str = "rule";
/// Raw selector text of a rule
pub const NODE_SELECTOR: &str = "selector";
/// A block of statements enclosed in curly braces
pub const NODE_BLOCK: &str = "block";
/// A single `name: value;` binding (variable or plain CSS property)
pub const NODE_DECLARATION: &str = "declaration";
/// Left hand side of a declaration
pub const NODE_PROPERTY: &str = "property";
/// Right hand side of a declaration
pub const NODE_VALUE: &str = "value";
/// Generic at-rule (e.g., `@import`, `@media`, `@if`)
pub const NODE_AT_RULE: &str = "atrule";
/// At-rule name without the `@`
pub const NODE_AT_KEYWORD: &str = "atkeyword";

// Value nodes
/// Variable name without the `$`
pub const NODE_VARIABLE: &str = "variable";
/// Bare identifier (e.g., `red`, `solid`, `and`)
pub const NODE_IDENTIFIER: &str = "identifier";
/// Number including its unit (e.g., `10`, `1.5em`, `50%`)
pub const NODE_NUMBER: &str = "number";
/// Arithmetic or comparison operator
pub const NODE_OPERATOR: &str = "operator";
/// Separator punctuation (`,`, `:`, `;` and selector delimiters)
pub const NODE_PUNCTUATION: &str = "punctuation";
/// Double quoted string, stored without its quotes
pub const NODE_STRING_DOUBLE: &str = "string_double";
/// Single quoted string, stored without its quotes
pub const NODE_STRING_SINGLE: &str = "string_single";
/// Hex color, stored without the `#`
pub const NODE_COLOR_HEX: &str = "color_hex";
/// Function call: identifier followed by arguments
pub const NODE_FUNCTION: &str = "function";
/// Parenthesized function arguments
pub const NODE_ARGUMENTS: &str = "arguments";
/// Parenthesized expression, list or map
pub const NODE_PARENTHESES: &str = "parentheses";
/// `#{...}` interpolation
pub const NODE_INTERPOLATION: &str = "interpolation";
/// `!default`, `!global`, `!important`, stored without the `!`
pub const NODE_FLAG: &str = "flag";

// Trivia
/// Whitespace run
pub const NODE_SPACE: &str = "space";
/// `// ...` comment, stored without the slashes
pub const NODE_COMMENT_SINGLELINE: &str = "comment_singleline";
/// `/* ... */` comment, stored without the delimiters
pub const NODE_COMMENT_MULTILINE: &str = "comment_multiline";

// Flags
pub const FLAG_DEFAULT: &str = "default";
pub const FLAG_GLOBAL: &str = "global";

/// Name of the hook function every variable declaration is wrapped in
pub const DEFAULT_EXPORT_FUNCTION: &str = "export_var";
