//! The tokenizer.
//!
//! `read_token` classifies the next lexeme by its leading character and
//! appends a compact record to the token buffer: varint-encoded offset delta
//! and length, one kind byte, and a varint payload for identifiers, string
//! text and integer literals. A side table holds one absolute file offset
//! per 256 bytes of token data so records stay small. Replay and
//! `rewind_to` walk the same buffer, which is what makes the parser's
//! push-back recovery cheap.
//!
//! The parser flips [`Behavior`] toggles around constructs whose lexical
//! rules differ: newline significance is disabled inside parenthesized
//! contexts, and `inside_string` switches the scanner into string-segment
//! mode so interpolation needs no separate grammar.

use lute_diagnostic::LineMap;
use lute_ir::{Name, SharedInterner, Span, TokenKind};

use crate::varint;

/// Full information about a single token.
///
/// Expanded tokens are temporary; the complete stream lives compactly in the
/// tokenizer's buffer and is re-expanded on demand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExpandedToken {
    /// Byte offset of this token's record in the token buffer.
    pub token_idx: u32,
    /// Source bytes this token captured.
    pub span: Span,
    pub kind: TokenKind,
}

/// Recognizer modes the parser flips on the fly.
#[derive(Copy, Clone, Debug)]
pub struct Behavior {
    /// Surface newlines as tokens (statement termination is
    /// newline-sensitive). Disabled inside parenthesized contexts.
    pub tokenize_newline: bool,
    /// Scan string-literal segments instead of ordinary tokens.
    pub inside_string: bool,
    /// Inside a `"""` string: bare newlines are content, `"""` closes.
    pub multiline_string: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior {
            tokenize_newline: true,
            inside_string: false,
            multiline_string: false,
        }
    }
}

/// Streaming tokenizer with compact storage and rewind.
pub struct Tokenizer {
    source: String,
    /// Scan cursor (byte index into `source`).
    pos: usize,
    interner: SharedInterner,
    line_map: LineMap,
    /// Compact token records. Token indices are byte offsets into this
    /// buffer.
    token_data: Vec<u8>,
    /// One absolute file offset per 256 bytes of `token_data`.
    file_offset_table: Vec<u32>,
    /// Replay cursor: tokens at or past this offset have not been returned
    /// since the last rewind.
    next_token_idx: u32,
    pub behavior: Behavior,
}

impl Tokenizer {
    pub fn new(source: impl Into<String>, interner: SharedInterner) -> Self {
        let source = source.into();
        let line_map = LineMap::new(&source);
        Tokenizer {
            source,
            pos: 0,
            interner,
            line_map,
            token_data: Vec::new(),
            file_offset_table: Vec::new(),
            next_token_idx: 0,
            behavior: Behavior::default(),
        }
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    pub fn line_map(&self) -> &LineMap {
        &self.line_map
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Source text captured by a token.
    pub fn text(&self, token: &ExpandedToken) -> &str {
        &self.source[token.span.to_range()]
    }

    /// Human-readable description for diagnostics.
    pub fn describe(&self, token: &ExpandedToken) -> String {
        match token.kind {
            TokenKind::Eof => "end-of-file".to_string(),
            TokenKind::Newline => "end-of-line".to_string(),
            _ => format!("'{}'", self.text(token)),
        }
    }

    /// Current replay position. Compare before and after a parse attempt to
    /// check that tokens were actually consumed.
    pub fn position(&self) -> u32 {
        self.next_token_idx
    }

    /// Push previously-read tokens back into the stream.
    pub fn rewind_to(&mut self, token_idx: u32) {
        debug_assert!(token_idx <= self.next_token_idx, "rewind must move back");
        self.next_token_idx = token_idx;
    }

    /// Re-expand the stored token at `token_idx` without moving the replay
    /// cursor.
    pub fn expand_token(&self, token_idx: u32) -> ExpandedToken {
        if token_idx as usize >= self.token_data.len() {
            return self.eof_token();
        }
        self.expand_at(token_idx).0
    }

    /// Read the next token, replaying stored tokens before scanning fresh
    /// input.
    pub fn read_token(&mut self) -> ExpandedToken {
        while (self.next_token_idx as usize) < self.token_data.len() {
            let (token, len) = self.expand_at(self.next_token_idx);
            self.next_token_idx += len;
            if token.kind == TokenKind::Newline && !self.behavior.tokenize_newline {
                continue;
            }
            return token;
        }
        self.scan_token()
    }

    // Scanning

    fn scan_token(&mut self) -> ExpandedToken {
        loop {
            if self.pos >= self.source.len() {
                return self.eof_token();
            }
            let start = self.pos;
            if self.behavior.inside_string {
                return self.scan_string_segment(start);
            }

            let c = self.source.as_bytes()[self.pos];
            if c == b'_' || c.is_ascii_alphabetic() || c >= 0x80 {
                return self.scan_identifier(start);
            }
            if c.is_ascii_digit() {
                return self.scan_number(start);
            }

            self.pos += 1;
            let kind = match c {
                b'\n' => {
                    if self.behavior.tokenize_newline {
                        TokenKind::Newline
                    } else {
                        continue;
                    }
                }
                b'\r' | b'\t' | b' ' => {
                    self.eat_while(|b| b == b'\r' || b == b'\t' || b == b' ');
                    continue;
                }
                b'/' => match self.peek() {
                    Some(b'/') => {
                        self.skip_line_comment();
                        continue;
                    }
                    Some(b'*') => {
                        self.skip_block_comment();
                        continue;
                    }
                    _ => TokenKind::Slash,
                },
                b'"' => {
                    if self.source.as_bytes()[self.pos..].starts_with(b"\"\"") {
                        self.pos += 2;
                        // Consume the newline right after the opener, if any.
                        if self.peek() == Some(b'\n') {
                            self.pos += 1;
                        }
                        TokenKind::BeginMultilineString
                    } else {
                        TokenKind::BeginString
                    }
                }
                b';' => TokenKind::Semicolon,
                b':' => TokenKind::Colon,
                b'.' => TokenKind::Dot,
                b',' => TokenKind::Comma,
                b'{' => TokenKind::OpenCurly,
                b'}' => TokenKind::CloseCurly,
                b'(' => TokenKind::OpenParen,
                b')' => TokenKind::CloseParen,
                b'[' => TokenKind::OpenSquare,
                b']' => TokenKind::CloseSquare,
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => TokenKind::Asterisk,
                b'%' => TokenKind::Percent,
                b'!' => TokenKind::Bang,
                b'~' => TokenKind::Tilde,
                b'=' => {
                    if self.eat(b'=') {
                        TokenKind::DoubleEqual
                    } else {
                        TokenKind::Equal
                    }
                }
                b'<' => {
                    if self.eat(b'=') {
                        TokenKind::LessThanOrEqual
                    } else {
                        TokenKind::LessThan
                    }
                }
                b'>' => {
                    if self.eat(b'=') {
                        TokenKind::GreaterThanOrEqual
                    } else {
                        TokenKind::GreaterThan
                    }
                }
                b'|' => {
                    if self.eat(b'|') {
                        TokenKind::DoubleVerticalBar
                    } else {
                        TokenKind::VerticalBar
                    }
                }
                b'&' => {
                    if self.eat(b'&') {
                        TokenKind::DoubleAmpersand
                    } else {
                        TokenKind::Ampersand
                    }
                }
                _ => TokenKind::Invalid,
            };
            return self.finish_token(start, kind);
        }
    }

    fn scan_identifier(&mut self, start: usize) -> ExpandedToken {
        self.pos += 1;
        self.eat_while(|b| b == b'_' || b.is_ascii_alphanumeric() || b >= 0x80);
        let name = self.interner.intern(&self.source[start..self.pos]);
        self.finish_token(start, TokenKind::Ident(name))
    }

    fn scan_number(&mut self, start: usize) -> ExpandedToken {
        self.pos += 1;
        self.eat_while(|b| b.is_ascii_digit());
        let kind = match self.source[start..self.pos].parse::<u32>() {
            Ok(value) => TokenKind::IntLit(value),
            Err(_) => TokenKind::Invalid,
        };
        self.finish_token(start, kind)
    }

    /// Scan one string segment: literal text, an embed opener, the string
    /// terminator, or `Invalid` for an unterminated literal.
    fn scan_string_segment(&mut self, start: usize) -> ExpandedToken {
        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                return self.finish_token(start, TokenKind::Invalid);
            };
            match c {
                b'\\' => {
                    self.pos += 1;
                    let Some(escaped) = self.peek_char() else {
                        return self.finish_token(start, TokenKind::Invalid);
                    };
                    text.push(escaped);
                    self.pos += escaped.len_utf8();
                }
                b'"' if self.behavior.multiline_string => {
                    if self.source.as_bytes()[self.pos..].starts_with(b"\"\"\"") {
                        if !text.is_empty() {
                            return self.string_text(start, &text);
                        }
                        self.pos += 3;
                        return self.finish_token(start, TokenKind::EndString);
                    }
                    text.push('"');
                    self.pos += 1;
                }
                b'"' => {
                    if !text.is_empty() {
                        return self.string_text(start, &text);
                    }
                    self.pos += 1;
                    return self.finish_token(start, TokenKind::EndString);
                }
                b'$' if self.peek_at(1) == Some(b'{') => {
                    if !text.is_empty() {
                        return self.string_text(start, &text);
                    }
                    self.pos += 2;
                    return self.finish_token(start, TokenKind::BeginStringEmbed);
                }
                b'\n' if !self.behavior.multiline_string => {
                    // Leave the newline in place to terminate the statement.
                    return self.finish_token(start, TokenKind::Invalid);
                }
                _ => {
                    let Some(ch) = self.peek_char() else {
                        return self.finish_token(start, TokenKind::Invalid);
                    };
                    text.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn string_text(&mut self, start: usize, text: &str) -> ExpandedToken {
        let name = self.interner.intern(text);
        self.finish_token(start, TokenKind::StringText(name))
    }

    fn skip_line_comment(&mut self) {
        // Stop at the newline; it still terminates the statement.
        let rest = &self.source.as_bytes()[self.pos..];
        match memchr::memchr(b'\n', rest) {
            Some(offset) => self.pos += offset,
            None => self.pos = self.source.len(),
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 1; // the '*'
        loop {
            let rest = &self.source.as_bytes()[self.pos..];
            match memchr::memchr(b'*', rest) {
                Some(offset) => {
                    self.pos += offset + 1;
                    if self.peek() == Some(b'/') {
                        self.pos += 1;
                        return;
                    }
                }
                None => {
                    // Unclosed comment swallows the rest of the file.
                    self.pos = self.source.len();
                    return;
                }
            }
        }
    }

    // Cursor helpers

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.source.as_bytes().get(self.pos + ahead).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
    }

    // Compact encoding

    fn finish_token(&mut self, start: usize, kind: TokenKind) -> ExpandedToken {
        let token_idx = to_u32(self.token_data.len());
        let span = Span::new(to_u32(start), to_u32(self.pos));

        let table_idx = (token_idx >> 8) as usize;
        while self.file_offset_table.len() <= table_idx {
            self.file_offset_table.push(span.start);
        }
        let base = self.file_offset_table[table_idx];
        debug_assert!(base <= span.start, "file offsets must be monotonic");

        varint::encode(&mut self.token_data, span.start - base);
        varint::encode(&mut self.token_data, span.len());
        self.token_data.push(kind_tag(kind));
        match kind {
            TokenKind::Ident(name) | TokenKind::StringText(name) => {
                varint::encode(&mut self.token_data, name.raw());
            }
            TokenKind::IntLit(value) => varint::encode(&mut self.token_data, value),
            _ => {}
        }

        self.next_token_idx = to_u32(self.token_data.len());
        ExpandedToken {
            token_idx,
            span,
            kind,
        }
    }

    /// Expand the record at `token_idx`, returning the token and the
    /// record's encoded length.
    fn expand_at(&self, token_idx: u32) -> (ExpandedToken, u32) {
        let mut pos = token_idx as usize;
        let base = self.file_offset_table[(token_idx >> 8) as usize];
        let start = base + varint::decode(&self.token_data, &mut pos);
        let len = varint::decode(&self.token_data, &mut pos);
        let tag = self.token_data[pos];
        pos += 1;
        let kind = decode_kind(tag, &self.token_data, &mut pos);
        let token = ExpandedToken {
            token_idx,
            span: Span::new(start, start + len),
            kind,
        };
        (token, to_u32(pos - token_idx as usize))
    }

    fn eof_token(&self) -> ExpandedToken {
        ExpandedToken {
            token_idx: to_u32(self.token_data.len()),
            span: Span::point(to_u32(self.source.len())),
            kind: TokenKind::Eof,
        }
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| panic!("source exceeds {} bytes", u32::MAX))
}

// Tag bytes for the compact encoding. Payload-carrying kinds re-read their
// varint payload on expansion.

const TAG_INVALID: u8 = 0;
const TAG_NEWLINE: u8 = 1;
const TAG_IDENT: u8 = 2;
const TAG_INT_LIT: u8 = 3;
const TAG_BEGIN_STRING: u8 = 4;
const TAG_BEGIN_MULTILINE_STRING: u8 = 5;
const TAG_STRING_TEXT: u8 = 6;
const TAG_BEGIN_STRING_EMBED: u8 = 7;
const TAG_END_STRING: u8 = 8;
const TAG_OPEN_CURLY: u8 = 9;
const TAG_CLOSE_CURLY: u8 = 10;
const TAG_OPEN_PAREN: u8 = 11;
const TAG_CLOSE_PAREN: u8 = 12;
const TAG_OPEN_SQUARE: u8 = 13;
const TAG_CLOSE_SQUARE: u8 = 14;
const TAG_COLON: u8 = 15;
const TAG_SEMICOLON: u8 = 16;
const TAG_DOT: u8 = 17;
const TAG_COMMA: u8 = 18;
const TAG_EQUAL: u8 = 19;
const TAG_LESS_THAN: u8 = 20;
const TAG_LESS_THAN_OR_EQUAL: u8 = 21;
const TAG_GREATER_THAN: u8 = 22;
const TAG_GREATER_THAN_OR_EQUAL: u8 = 23;
const TAG_DOUBLE_EQUAL: u8 = 24;
const TAG_PLUS: u8 = 25;
const TAG_MINUS: u8 = 26;
const TAG_ASTERISK: u8 = 27;
const TAG_SLASH: u8 = 28;
const TAG_PERCENT: u8 = 29;
const TAG_BANG: u8 = 30;
const TAG_TILDE: u8 = 31;
const TAG_VERTICAL_BAR: u8 = 32;
const TAG_DOUBLE_VERTICAL_BAR: u8 = 33;
const TAG_AMPERSAND: u8 = 34;
const TAG_DOUBLE_AMPERSAND: u8 = 35;

fn kind_tag(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::Invalid => TAG_INVALID,
        TokenKind::Newline => TAG_NEWLINE,
        TokenKind::Ident(_) => TAG_IDENT,
        TokenKind::IntLit(_) => TAG_INT_LIT,
        TokenKind::BeginString => TAG_BEGIN_STRING,
        TokenKind::BeginMultilineString => TAG_BEGIN_MULTILINE_STRING,
        TokenKind::StringText(_) => TAG_STRING_TEXT,
        TokenKind::BeginStringEmbed => TAG_BEGIN_STRING_EMBED,
        TokenKind::EndString => TAG_END_STRING,
        TokenKind::OpenCurly => TAG_OPEN_CURLY,
        TokenKind::CloseCurly => TAG_CLOSE_CURLY,
        TokenKind::OpenParen => TAG_OPEN_PAREN,
        TokenKind::CloseParen => TAG_CLOSE_PAREN,
        TokenKind::OpenSquare => TAG_OPEN_SQUARE,
        TokenKind::CloseSquare => TAG_CLOSE_SQUARE,
        TokenKind::Colon => TAG_COLON,
        TokenKind::Semicolon => TAG_SEMICOLON,
        TokenKind::Dot => TAG_DOT,
        TokenKind::Comma => TAG_COMMA,
        TokenKind::Equal => TAG_EQUAL,
        TokenKind::LessThan => TAG_LESS_THAN,
        TokenKind::LessThanOrEqual => TAG_LESS_THAN_OR_EQUAL,
        TokenKind::GreaterThan => TAG_GREATER_THAN,
        TokenKind::GreaterThanOrEqual => TAG_GREATER_THAN_OR_EQUAL,
        TokenKind::DoubleEqual => TAG_DOUBLE_EQUAL,
        TokenKind::Plus => TAG_PLUS,
        TokenKind::Minus => TAG_MINUS,
        TokenKind::Asterisk => TAG_ASTERISK,
        TokenKind::Slash => TAG_SLASH,
        TokenKind::Percent => TAG_PERCENT,
        TokenKind::Bang => TAG_BANG,
        TokenKind::Tilde => TAG_TILDE,
        TokenKind::VerticalBar => TAG_VERTICAL_BAR,
        TokenKind::DoubleVerticalBar => TAG_DOUBLE_VERTICAL_BAR,
        TokenKind::Ampersand => TAG_AMPERSAND,
        TokenKind::DoubleAmpersand => TAG_DOUBLE_AMPERSAND,
        // Eof is never stored; it is synthesized at the end of the buffer.
        TokenKind::Eof => unreachable!("end-of-file tokens are not encoded"),
    }
}

fn decode_kind(tag: u8, data: &[u8], pos: &mut usize) -> TokenKind {
    match tag {
        TAG_INVALID => TokenKind::Invalid,
        TAG_NEWLINE => TokenKind::Newline,
        TAG_IDENT => TokenKind::Ident(Name::from_raw(varint::decode(data, pos))),
        TAG_INT_LIT => TokenKind::IntLit(varint::decode(data, pos)),
        TAG_BEGIN_STRING => TokenKind::BeginString,
        TAG_BEGIN_MULTILINE_STRING => TokenKind::BeginMultilineString,
        TAG_STRING_TEXT => TokenKind::StringText(Name::from_raw(varint::decode(data, pos))),
        TAG_BEGIN_STRING_EMBED => TokenKind::BeginStringEmbed,
        TAG_END_STRING => TokenKind::EndString,
        TAG_OPEN_CURLY => TokenKind::OpenCurly,
        TAG_CLOSE_CURLY => TokenKind::CloseCurly,
        TAG_OPEN_PAREN => TokenKind::OpenParen,
        TAG_CLOSE_PAREN => TokenKind::CloseParen,
        TAG_OPEN_SQUARE => TokenKind::OpenSquare,
        TAG_CLOSE_SQUARE => TokenKind::CloseSquare,
        TAG_COLON => TokenKind::Colon,
        TAG_SEMICOLON => TokenKind::Semicolon,
        TAG_DOT => TokenKind::Dot,
        TAG_COMMA => TokenKind::Comma,
        TAG_EQUAL => TokenKind::Equal,
        TAG_LESS_THAN => TokenKind::LessThan,
        TAG_LESS_THAN_OR_EQUAL => TokenKind::LessThanOrEqual,
        TAG_GREATER_THAN => TokenKind::GreaterThan,
        TAG_GREATER_THAN_OR_EQUAL => TokenKind::GreaterThanOrEqual,
        TAG_DOUBLE_EQUAL => TokenKind::DoubleEqual,
        TAG_PLUS => TokenKind::Plus,
        TAG_MINUS => TokenKind::Minus,
        TAG_ASTERISK => TokenKind::Asterisk,
        TAG_SLASH => TokenKind::Slash,
        TAG_PERCENT => TokenKind::Percent,
        TAG_BANG => TokenKind::Bang,
        TAG_TILDE => TokenKind::Tilde,
        TAG_VERTICAL_BAR => TokenKind::VerticalBar,
        TAG_DOUBLE_VERTICAL_BAR => TokenKind::DoubleVerticalBar,
        TAG_AMPERSAND => TokenKind::Ampersand,
        TAG_DOUBLE_AMPERSAND => TokenKind::DoubleAmpersand,
        _ => unreachable!("corrupt token buffer: tag {tag}"),
    }
}
