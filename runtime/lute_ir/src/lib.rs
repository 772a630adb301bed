//! Shared data types for the Lute scripting runtime.
//!
//! This crate holds everything the tokenizer, parser and interpreter agree
//! on: interned names, source spans, token kinds, and the flat arena syntax
//! tree. It has no opinion about how those trees are produced or executed.

mod ast;
mod interner;
mod name;
mod span;
mod token;

pub use ast::{
    Ast, BinaryOp, Block, BlockId, CustomBlock, Expr, ExprId, ExprKind, ExprRange, FuncId,
    Function, PieceRange, Stmt, StmtId, StmtKind, StringPiece, UnaryOp,
};
pub use interner::{SharedInterner, StringInterner};
pub use name::Name;
pub use span::Span;
pub use token::TokenKind;

/// Host-opaque attribute payload attached to assignment/evaluate statements
/// by expression-trait keywords. `None` when no trait keyword was present.
pub type Attributes = Option<Box<dyn std::any::Any>>;
