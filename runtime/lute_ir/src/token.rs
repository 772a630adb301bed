//! Token kinds produced by the tokenizer.

use crate::Name;

/// Kind of a single token.
///
/// Identifiers and string-literal text carry an interned [`Name`]; the
/// integer literal carries its parsed value. Everything else is identified
/// by the variant alone — the token's span recovers the exact source bytes
/// when needed.
///
/// String literals are re-entrant: the tokenizer emits `BeginString` (or
/// `BeginMultilineString`), then alternating `StringText` and
/// `BeginStringEmbed` tokens (each embed closed by a `CloseCurly`), then
/// `EndString`, so the parser can recursively parse embedded expressions
/// without a separate interpolation grammar.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TokenKind {
    /// Unrecognized byte, or an unterminated string literal.
    Invalid,
    Eof,
    Newline,

    Ident(Name),
    IntLit(u32),
    BeginString,
    BeginMultilineString,
    /// One literal segment of a string, escapes already applied.
    StringText(Name),
    /// `${` inside a string; closed by `CloseCurly`.
    BeginStringEmbed,
    EndString,

    OpenCurly,
    CloseCurly,
    OpenParen,
    CloseParen,
    OpenSquare,
    CloseSquare,

    Colon,
    Semicolon,
    Dot,
    Comma,

    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    DoubleEqual,

    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Bang,
    Tilde,

    VerticalBar,
    DoubleVerticalBar,
    Ampersand,
    DoubleAmpersand,
}

impl TokenKind {
    /// Fixed source text for punctuation kinds, empty for the rest.
    pub fn punctuation(self) -> &'static str {
        match self {
            TokenKind::OpenCurly => "{",
            TokenKind::CloseCurly => "}",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::OpenSquare => "[",
            TokenKind::CloseSquare => "]",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Equal => "=",
            TokenKind::LessThan => "<",
            TokenKind::LessThanOrEqual => "<=",
            TokenKind::GreaterThan => ">",
            TokenKind::GreaterThanOrEqual => ">=",
            TokenKind::DoubleEqual => "==",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::Tilde => "~",
            TokenKind::VerticalBar => "|",
            TokenKind::DoubleVerticalBar => "||",
            TokenKind::Ampersand => "&",
            TokenKind::DoubleAmpersand => "&&",
            _ => "",
        }
    }
}
