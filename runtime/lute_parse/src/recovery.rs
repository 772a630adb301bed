//! Syntax-error recovery.
//!
//! Three actions exist for an unexpected token: drop it and continue, push
//! it back and let the caller retry it as something else, or skip forward —
//! possibly over a whole nested `{}`/`()`/`[]` scope — until the parser is
//! back on track. `mute_errors` suppresses cascading reports from one root
//! cause until a token is consumed successfully.

use bitflags::bitflags;
use lute_ir::TokenKind;
use lute_lexer::ExpandedToken;

use crate::Parser;

bitflags! {
    /// Closers an *outer* scope is waiting for. While skipping garbage, a
    /// token matching one of these is pushed back instead of swallowed so
    /// the outer scope can terminate normally.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct AcceptFlags: u32 {
        const CLOSE_CURLY = 1;
        const CLOSE_PAREN = 2;
        const CLOSE_SQUARE = 4;
    }
}

/// What to do with the offending token after reporting.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ErrorTokenAction {
    /// Leave the token consumed.
    DoNothing,
    /// Push the token back for the caller to retry.
    PushBack,
    /// Consume it, or skip the whole scope it opens.
    HandleUnexpected,
}

/// Parser recovery state.
#[derive(Debug)]
pub struct RecoveryState {
    /// Errors are muted until the parser consumes a token that puts it back
    /// on track, usually in an outer scope.
    pub mute_errors: bool,
    pub outer_accept: AcceptFlags,
}

impl Default for RecoveryState {
    fn default() -> Self {
        RecoveryState {
            mute_errors: false,
            outer_accept: AcceptFlags::empty(),
        }
    }
}

fn accept_flag_for_close(kind: TokenKind) -> Option<AcceptFlags> {
    match kind {
        TokenKind::CloseCurly => Some(AcceptFlags::CLOSE_CURLY),
        TokenKind::CloseParen => Some(AcceptFlags::CLOSE_PAREN),
        TokenKind::CloseSquare => Some(AcceptFlags::CLOSE_SQUARE),
        _ => None,
    }
}

fn accept_flag_for_open(kind: TokenKind) -> AcceptFlags {
    match kind {
        TokenKind::OpenCurly => AcceptFlags::CLOSE_CURLY,
        TokenKind::OpenParen => AcceptFlags::CLOSE_PAREN,
        TokenKind::OpenSquare => AcceptFlags::CLOSE_SQUARE,
        _ => AcceptFlags::empty(),
    }
}

fn closer_for_open(kind: TokenKind) -> TokenKind {
    match kind {
        TokenKind::OpenCurly => TokenKind::CloseCurly,
        TokenKind::OpenParen => TokenKind::CloseParen,
        _ => TokenKind::CloseSquare,
    }
}

impl Parser<'_> {
    /// True if `token` can be swallowed without ending an outer scope.
    /// Tokens that close an outer scope are pushed back first.
    fn ok_to_stay_in_scope(&mut self, token: &ExpandedToken) -> bool {
        if token.kind == TokenKind::Eof {
            return false;
        }
        if let Some(flag) = accept_flag_for_close(token.kind) {
            if self.recovery.outer_accept.contains(flag) {
                self.tokenizer().rewind_to(token.token_idx);
                return false;
            }
        }
        true
    }

    /// Skip forward to the closer matching `open_kind`, recursing into any
    /// nested scopes on the way. Returns `false` if a token that terminates
    /// an outer scope (or end-of-file) cut the skip short; that token is
    /// pushed back.
    pub(crate) fn skip_any_scope(
        &mut self,
        out_close: Option<&mut ExpandedToken>,
        open_kind: TokenKind,
    ) -> bool {
        let saved = self.recovery.outer_accept;
        self.recovery.outer_accept |= accept_flag_for_open(open_kind);
        let close_kind = closer_for_open(open_kind);

        let result = loop {
            let token = self.read_token();
            if token.kind == close_kind {
                if let Some(out) = out_close {
                    *out = token;
                }
                break true;
            }
            if !self.ok_to_stay_in_scope(&token) {
                self.recovery.mute_errors = false;
                break false;
            }
            if matches!(
                token.kind,
                TokenKind::OpenCurly | TokenKind::OpenParen | TokenKind::OpenSquare
            ) {
                self.skip_any_scope(None, token.kind);
            }
        };
        self.recovery.outer_accept = saved;
        result
    }

    /// Dispose of an unexpected token. Usually it is simply consumed; if it
    /// opens a scope, the whole nested scope is skipped. Returns `false`
    /// when the token (or one found while skipping) ends an outer scope —
    /// it has been pushed back so the caller can terminate.
    pub(crate) fn handle_unexpected_token(
        &mut self,
        out_close: Option<&mut ExpandedToken>,
        unexpected: &ExpandedToken,
    ) -> bool {
        if !self.ok_to_stay_in_scope(unexpected) {
            return false;
        }
        match unexpected.kind {
            TokenKind::OpenCurly | TokenKind::OpenParen | TokenKind::OpenSquare => {
                // If the skip was cut short, the canceling token was pushed
                // back; the caller reads it next either way.
                self.skip_any_scope(out_close, unexpected.kind);
                true
            }
            _ => true,
        }
    }

    /// Report a diagnostic at `token` (unless muted) and apply the chosen
    /// recovery action. The return value follows
    /// [`handle_unexpected_token`](Self::handle_unexpected_token); the other
    /// actions always return `false`.
    pub fn error_at_token(
        &mut self,
        token: &ExpandedToken,
        action: ErrorTokenAction,
        message: &str,
    ) -> bool {
        if !self.recovery.mute_errors {
            let location = self.tokenizer().line_map().locate(token.span.start);
            self.report(&format!("{location}: error: {message}"));
        }
        self.recovery.mute_errors = true;
        match action {
            ErrorTokenAction::DoNothing => false,
            ErrorTokenAction::PushBack => {
                self.tokenizer().rewind_to(token.token_idx);
                false
            }
            ErrorTokenAction::HandleUnexpected => self.handle_unexpected_token(None, token),
        }
    }
}
