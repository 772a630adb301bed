//! Host extension points for the parser.

use lute_ir::{Attributes, FuncId, StmtId};
use lute_lexer::ExpandedToken;

use crate::Parser;

/// Outcome of offering a leading keyword to the host.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum KeywordResult {
    /// The keyword is not usable here; the parser reports it.
    Illegal,
    /// The keyword annotated the following statement; attributes were
    /// updated and the parser reads on.
    Attribute,
    /// The hook consumed a whole custom block (statement pushed, token
    /// position past its body).
    Block,
    /// The hook failed and already reported; abandon the statement.
    Error,
}

/// Arguments to [`ParseHooks::keyword`].
pub struct KeywordParams<'p> {
    /// The keyword token, already consumed. Rewind to `token.token_idx`
    /// before returning anything other than `Block`-progress if more tokens
    /// were read speculatively.
    pub token: &'p ExpandedToken,
    /// Attributes being collected for the following statement.
    pub attributes: &'p mut Attributes,
    /// Statements of the enclosing block under construction. A `Block`
    /// result is expected to have pushed the custom statement here.
    pub stmts: &'p mut Vec<StmtId>,
}

/// Hooks a host installs to extend the grammar.
///
/// Hook methods receive the parser and may re-enter it (parse a nested
/// block through [`Parser::parse_statement_block`], parse payload
/// expressions, read and push back tokens). A hook that reads tokens and
/// then decides "not matched" must rewind to where it started.
pub trait ParseHooks {
    /// Offered every leading keyword the core grammar does not handle.
    fn keyword(&mut self, parser: &mut Parser<'_>, params: KeywordParams<'_>) -> KeywordResult {
        let _ = (parser, params);
        KeywordResult::Illegal
    }

    /// Called after each completed function definition has been added to
    /// the syntax tree.
    fn function_parsed(&mut self, parser: &mut Parser<'_>, func: FuncId) {
        let _ = (parser, func);
    }

    /// Check whether collected attributes are permitted on the given
    /// statement; report through the parser if not.
    fn validate_attributes(&mut self, parser: &mut Parser<'_>, stmt: StmtId) {
        let _ = (parser, stmt);
    }
}

/// Hook implementation for hosts with no grammar extensions.
#[derive(Default)]
pub struct NoHooks;

impl ParseHooks for NoHooks {}
