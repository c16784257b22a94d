//! SCSS parser
//!
//! Builds a lossless `{type, value}` syntax tree: every character of the input
//! ends up in exactly one leaf, so printing the tree gives back the source.
//! Only the structure the extractor and evaluator need is recognized: rules,
//! at-rules, declarations and value expressions. Selectors are kept as raw text.

use thiserror::Error;

use super::constants::*;
use super::lexer::{tokenize, Lexeme, Token};
use super::node::{Node, Span};

/// Errors produced while parsing SCSS source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unrecognized character at byte {offset}")]
    UnrecognizedCharacter { offset: usize },

    #[error("Unexpected '{found}' at byte {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        offset: usize,
        expected: &'static str,
    },

    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// SCSS parser producing [`Node`] trees
#[derive(Debug, Clone, Default)]
pub struct ScssParser;

impl ScssParser {
    /// Create a new SCSS parser
    pub fn new() -> Self {
        Self
    }

    /// Parse SCSS content into a `stylesheet` node
    pub fn parse(&self, content: &str) -> ParseResult<Node> {
        let lexemes = tokenize(content)
            .map_err(|offset| ParseError::UnrecognizedCharacter { offset })?;
        let mut state = ParserState { lexemes, pos: 0 };
        let children = state.parse_statements(false)?;
        Ok(Node::sequence(NODE_STYLESHEET, children).with_span(Span::new(0, content.len())))
    }
}

/// Where a run of value items stops
#[derive(Debug, Clone, Copy, PartialEq)]
enum Terminator {
    /// Declaration value: `;`, `}`, a flag or end of input
    Declaration,
    /// At-rule parameters: `;`, `{`, `}` or end of input
    AtRule,
    /// Parenthesized items: `)`
    CloseParen,
    /// Interpolation items: `}`
    CloseBrace,
}

struct ParserState<'s> {
    lexemes: Vec<Lexeme<'s>>,
    pos: usize,
}

impl<'s> ParserState<'s> {
    fn peek(&self) -> Option<&Lexeme<'s>> {
        self.lexemes.get(self.pos)
    }

    fn peek_token(&self) -> Option<Token> {
        self.peek().map(|lexeme| lexeme.token)
    }

    fn advance(&mut self) -> Option<Lexeme<'s>> {
        let lexeme = self.lexemes.get(self.pos).copied();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> ParseResult<Lexeme<'s>> {
        match self.advance() {
            Some(lexeme) if lexeme.token == token => Ok(lexeme),
            Some(lexeme) => Err(unexpected(&lexeme, expected)),
            None => Err(ParseError::UnexpectedEnd { expected }),
        }
    }

    /// Parse statements until end of input, or until a `}` when inside a block
    fn parse_statements(&mut self, in_block: bool) -> ParseResult<Vec<Node>> {
        let mut statements = Vec::new();

        loop {
            let Some(lexeme) = self.peek().copied() else {
                if in_block {
                    return Err(ParseError::UnexpectedEnd { expected: "'}'" });
                }
                break;
            };

            match lexeme.token {
                Token::CloseBrace if in_block => break,
                Token::CloseBrace => return Err(unexpected(&lexeme, "a statement")),
                Token::Space | Token::LineComment | Token::BlockComment => {
                    self.pos += 1;
                    statements.push(trivia(&lexeme));
                }
                Token::Semicolon => {
                    self.pos += 1;
                    statements.push(leaf(NODE_PUNCTUATION, &lexeme));
                }
                Token::AtKeyword => statements.push(self.parse_at_rule()?),
                Token::Variable => statements.push(self.parse_declaration()?),
                _ => {
                    if self.statement_opens_block() {
                        statements.push(self.parse_rule()?);
                    } else {
                        statements.push(self.parse_declaration()?);
                    }
                }
            }
        }

        Ok(statements)
    }

    /// Look ahead to decide between a rule and a declaration: a `{` before the
    /// next `;` or `}` means a rule
    fn statement_opens_block(&self) -> bool {
        let mut interpolation_depth = 0usize;
        for lexeme in &self.lexemes[self.pos..] {
            match lexeme.token {
                Token::InterpolationStart => interpolation_depth += 1,
                Token::CloseBrace if interpolation_depth > 0 => interpolation_depth -= 1,
                Token::OpenBrace => return true,
                Token::Semicolon | Token::CloseBrace => return false,
                _ => {}
            }
        }
        false
    }

    fn parse_rule(&mut self) -> ParseResult<Node> {
        let start = self.pos;
        let mut interpolation_depth = 0usize;

        loop {
            match self.peek_token() {
                Some(Token::InterpolationStart) => interpolation_depth += 1,
                Some(Token::CloseBrace) if interpolation_depth > 0 => interpolation_depth -= 1,
                Some(Token::OpenBrace) => break,
                Some(_) => {}
                None => return Err(ParseError::UnexpectedEnd { expected: "'{'" }),
            }
            self.pos += 1;
        }

        let selector = self.raw_text(start, self.pos);
        let block = self.parse_block()?;
        let span = Span::new(selector.span.map_or(0, |span| span.start), block_end(&block));
        Ok(Node::sequence(NODE_RULE, vec![selector, block]).with_span(span))
    }

    fn parse_block(&mut self) -> ParseResult<Node> {
        let open = self.expect(Token::OpenBrace, "'{'")?;
        let children = self.parse_statements(true)?;
        let close = self.expect(Token::CloseBrace, "'}'")?;
        Ok(Node::sequence(NODE_BLOCK, children).with_span(Span::new(open.span.start, close.span.end)))
    }

    fn parse_at_rule(&mut self) -> ParseResult<Node> {
        let keyword = self.expect(Token::AtKeyword, "an at-rule")?;
        let mut children = vec![Node::leaf(NODE_AT_KEYWORD, &keyword.text[1..]).with_span(keyword.span)];
        children.extend(self.parse_value_items(Terminator::AtRule)?);

        let end = match self.peek().copied() {
            Some(lexeme) if lexeme.token == Token::OpenBrace => {
                let block = self.parse_block()?;
                let end = block_end(&block);
                children.push(block);
                end
            }
            Some(lexeme) if lexeme.token == Token::Semicolon => {
                self.pos += 1;
                children.push(leaf(NODE_PUNCTUATION, &lexeme));
                lexeme.span.end
            }
            Some(lexeme) => lexeme.span.start,
            None => children.last().and_then(|node| node.span).map_or(keyword.span.end, |span| span.end),
        };

        Ok(Node::sequence(NODE_AT_RULE, children).with_span(Span::new(keyword.span.start, end)))
    }

    fn parse_declaration(&mut self) -> ParseResult<Node> {
        let start = self.peek().map_or(0, |lexeme| lexeme.span.start);
        let mut children = vec![self.parse_property()?];

        while let Some(lexeme) = self.peek().copied() {
            if lexeme.token != Token::Space {
                break;
            }
            self.pos += 1;
            children.push(trivia(&lexeme));
        }

        let colon = self.expect(Token::Colon, "':'")?;
        children.push(leaf(NODE_PUNCTUATION, &colon));

        if let Some(lexeme) = self.peek().copied() {
            if lexeme.token == Token::Space {
                self.pos += 1;
                children.push(trivia(&lexeme));
            }
        }

        let mut items = self.parse_value_items(Terminator::Declaration)?;
        let mut trailing = Vec::new();
        while items.last().is_some_and(|node| node.is(NODE_SPACE)) {
            trailing.extend(items.pop());
        }
        trailing.reverse();

        if items.is_empty() {
            return match self.peek() {
                Some(lexeme) => Err(unexpected(lexeme, "a value")),
                None => Err(ParseError::UnexpectedEnd { expected: "a value" }),
            };
        }

        let value_span = span_of(&items);
        children.push(Node::sequence(NODE_VALUE, items).with_span(value_span));
        children.extend(trailing);

        // Flags stay outside the value so wrapping the value keeps them intact
        while let Some(lexeme) = self.peek().copied() {
            match lexeme.token {
                Token::Flag => children.push(Node::leaf(NODE_FLAG, &lexeme.text[1..]).with_span(lexeme.span)),
                Token::Space => children.push(trivia(&lexeme)),
                _ => break,
            }
            self.pos += 1;
        }

        let mut end = children.last().and_then(|node| node.span).map_or(start, |span| span.end);
        match self.peek().copied() {
            Some(lexeme) if lexeme.token == Token::Semicolon => {
                self.pos += 1;
                children.push(leaf(NODE_PUNCTUATION, &lexeme));
                end = lexeme.span.end;
            }
            Some(lexeme) if lexeme.token == Token::CloseBrace => {}
            Some(lexeme) => return Err(unexpected(&lexeme, "';'")),
            None => {}
        }

        Ok(Node::sequence(NODE_DECLARATION, children).with_span(Span::new(start, end)))
    }

    fn parse_property(&mut self) -> ParseResult<Node> {
        let Some(first) = self.peek().copied() else {
            return Err(ParseError::UnexpectedEnd { expected: "a property" });
        };

        if first.token == Token::Variable {
            self.pos += 1;
            let variable = Node::leaf(NODE_VARIABLE, &first.text[1..]).with_span(first.span);
            return Ok(Node::single(NODE_PROPERTY, variable).with_span(first.span));
        }

        let mut parts = Vec::new();
        while let Some(lexeme) = self.peek().copied() {
            match lexeme.token {
                Token::Ident | Token::Operator => {
                    self.pos += 1;
                    parts.push(leaf(NODE_IDENTIFIER, &lexeme));
                }
                Token::InterpolationStart => parts.push(self.parse_interpolation()?),
                _ => break,
            }
        }

        if parts.is_empty() {
            return Err(unexpected(&first, "a property name"));
        }
        let span = span_of(&parts);
        Ok(Node::sequence(NODE_PROPERTY, parts).with_span(span))
    }

    fn parse_interpolation(&mut self) -> ParseResult<Node> {
        let open = self.expect(Token::InterpolationStart, "'#{'")?;
        let items = self.parse_value_items(Terminator::CloseBrace)?;
        let close = self.expect(Token::CloseBrace, "'}'")?;
        Ok(Node::sequence(NODE_INTERPOLATION, items).with_span(Span::new(open.span.start, close.span.end)))
    }

    fn parse_parenthesized(&mut self, kind: &str) -> ParseResult<Node> {
        let open = self.expect(Token::OpenParen, "'('")?;
        let items = self.parse_value_items(Terminator::CloseParen)?;
        let close = self.expect(Token::CloseParen, "')'")?;
        Ok(Node::sequence(kind, items).with_span(Span::new(open.span.start, close.span.end)))
    }

    /// Parse value items up to (not including) the terminator
    fn parse_value_items(&mut self, terminator: Terminator) -> ParseResult<Vec<Node>> {
        let mut items = Vec::new();

        loop {
            let Some(lexeme) = self.peek().copied() else {
                return match terminator {
                    Terminator::Declaration | Terminator::AtRule => Ok(items),
                    Terminator::CloseParen => Err(ParseError::UnexpectedEnd { expected: "')'" }),
                    Terminator::CloseBrace => Err(ParseError::UnexpectedEnd { expected: "'}'" }),
                };
            };

            let stop = match (terminator, lexeme.token) {
                (Terminator::Declaration, Token::Semicolon | Token::CloseBrace | Token::Flag) => true,
                (Terminator::AtRule, Token::Semicolon | Token::OpenBrace | Token::CloseBrace) => true,
                (Terminator::CloseParen, Token::CloseParen) => true,
                (Terminator::CloseBrace, Token::CloseBrace) => true,
                _ => false,
            };
            if stop {
                return Ok(items);
            }

            let node = match lexeme.token {
                Token::OpenParen => {
                    items.push(self.parse_parenthesized(NODE_PARENTHESES)?);
                    continue;
                }
                Token::InterpolationStart => {
                    items.push(self.parse_interpolation()?);
                    continue;
                }
                Token::Ident => {
                    self.pos += 1;
                    let name = leaf(NODE_IDENTIFIER, &lexeme);
                    if self.peek_token() == Some(Token::OpenParen) {
                        let arguments = self.parse_parenthesized(NODE_ARGUMENTS)?;
                        let span = Span::new(lexeme.span.start, block_end(&arguments));
                        items.push(Node::sequence(NODE_FUNCTION, vec![name, arguments]).with_span(span));
                    } else {
                        items.push(name);
                    }
                    continue;
                }
                Token::Space | Token::LineComment | Token::BlockComment => trivia(&lexeme),
                Token::Variable => Node::leaf(NODE_VARIABLE, &lexeme.text[1..]).with_span(lexeme.span),
                Token::Number => leaf(NODE_NUMBER, &lexeme),
                Token::StringDouble => quoted(NODE_STRING_DOUBLE, &lexeme),
                Token::StringSingle => quoted(NODE_STRING_SINGLE, &lexeme),
                Token::Hash => Node::leaf(NODE_COLOR_HEX, &lexeme.text[1..]).with_span(lexeme.span),
                Token::Flag => Node::leaf(NODE_FLAG, &lexeme.text[1..]).with_span(lexeme.span),
                Token::Operator => leaf(NODE_OPERATOR, &lexeme),
                Token::Colon | Token::Comma | Token::Delimiter => leaf(NODE_PUNCTUATION, &lexeme),
                Token::AtKeyword => Node::leaf(NODE_AT_KEYWORD, &lexeme.text[1..]).with_span(lexeme.span),
                Token::Semicolon | Token::OpenBrace | Token::CloseBrace | Token::CloseParen => {
                    return Err(unexpected(&lexeme, "a value"));
                }
            };
            self.pos += 1;
            items.push(node);
        }
    }

    /// Raw source text of a lexeme range as a single selector leaf
    fn raw_text(&self, start: usize, end: usize) -> Node {
        let lexemes = &self.lexemes[start..end];
        let text: String = lexemes.iter().map(|lexeme| lexeme.text).collect();
        let node = Node::leaf(NODE_SELECTOR, text);
        match (lexemes.first(), lexemes.last()) {
            (Some(first), Some(last)) => node.with_span(Span::new(first.span.start, last.span.end)),
            _ => node,
        }
    }
}

fn leaf(kind: &str, lexeme: &Lexeme<'_>) -> Node {
    Node::leaf(kind, lexeme.text).with_span(lexeme.span)
}

fn trivia(lexeme: &Lexeme<'_>) -> Node {
    let node = match lexeme.token {
        Token::LineComment => Node::leaf(NODE_COMMENT_SINGLELINE, &lexeme.text[2..]),
        Token::BlockComment => {
            Node::leaf(NODE_COMMENT_MULTILINE, &lexeme.text[2..lexeme.text.len() - 2])
        }
        _ => Node::leaf(NODE_SPACE, lexeme.text),
    };
    node.with_span(lexeme.span)
}

fn quoted(kind: &str, lexeme: &Lexeme<'_>) -> Node {
    Node::leaf(kind, &lexeme.text[1..lexeme.text.len() - 1]).with_span(lexeme.span)
}

fn unexpected(lexeme: &Lexeme<'_>, expected: &'static str) -> ParseError {
    ParseError::UnexpectedToken {
        found: lexeme.text.to_string(),
        offset: lexeme.span.start,
        expected,
    }
}

fn block_end(node: &Node) -> usize {
    node.span.map_or(0, |span| span.end)
}

fn span_of(nodes: &[Node]) -> Span {
    let start = nodes.first().and_then(|node| node.span).map_or(0, |span| span.start);
    let end = nodes.last().and_then(|node| node.span).map_or(start, |span| span.end);
    Span::new(start, end)
}
