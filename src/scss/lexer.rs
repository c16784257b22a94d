//! SCSS tokenizer
//!
//! Whitespace and comments are kept as tokens so the parser can preserve them
//! and the printer can reproduce the source exactly.

use logos::Logos;

use super::node::Span;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    #[regex(r"[ \t\r\n\f]+")]
    Space,

    #[regex(r"//[^\r\n]*", allow_greedy = true)]
    LineComment,

    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    // Names may contain any non-ASCII code point
    #[regex(r"\$([a-zA-Z_\-]|[^\x00-\x7F])([a-zA-Z0-9_\-]|[^\x00-\x7F])*")]
    Variable,

    #[regex(r"@([a-zA-Z_\-]|[^\x00-\x7F])([a-zA-Z0-9_\-]|[^\x00-\x7F])*")]
    AtKeyword,

    // Exponent, unit and percent sign are part of the number
    #[regex(r"([0-9]+|[0-9]*\.[0-9]+)([eE][+\-]?[0-9]+)?([a-zA-Z]+|%)?")]
    Number,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringDouble,

    #[regex(r"'([^'\\\n]|\\.)*'")]
    StringSingle,

    #[token("#{")]
    InterpolationStart,

    #[regex(r"#[a-zA-Z0-9_\-]+")]
    Hash,

    #[regex(r"-{0,2}([a-zA-Z_]|[^\x00-\x7F])([a-zA-Z0-9_\-]|[^\x00-\x7F])*")]
    Ident,

    #[regex(r"![a-zA-Z]+")]
    Flag,

    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("<")]
    #[token(">")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    Operator,

    #[token(":")]
    Colon,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,

    #[token("{")]
    OpenBrace,

    #[token("}")]
    CloseBrace,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    // Selector delimiters
    #[token(".")]
    #[token("&")]
    #[token("[")]
    #[token("]")]
    #[token("~")]
    #[token("=")]
    #[token("|")]
    #[token("^")]
    Delimiter,
}

/// A token together with its source text and position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lexeme<'s> {
    pub token: Token,
    pub text: &'s str,
    pub span: Span,
}

/// Tokenize the whole source.
///
/// Returns the byte offset of the first character no token matches.
pub fn tokenize(source: &str) -> Result<Vec<Lexeme<'_>>, usize> {
    let mut lexer = Token::lexer(source);
    let mut lexemes = Vec::new();

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        match result {
            Ok(token) => lexemes.push(Lexeme {
                token,
                text: lexer.slice(),
                span: Span::new(range.start, range.end),
            }),
            Err(()) => return Err(range.start),
        }
    }

    Ok(lexemes)
}
