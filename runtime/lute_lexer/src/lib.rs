//! Tokenizer for the Lute scripting language.
//!
//! Tokens are scanned once, stored compactly in a byte buffer, and replayed
//! lazily on demand. The parser backtracks by rewinding to a token index;
//! replay honors the newline-significance toggle so the same stored stream
//! reads differently inside parenthesized contexts.

mod tokenizer;
mod varint;

pub use tokenizer::{Behavior, ExpandedToken, Tokenizer};
