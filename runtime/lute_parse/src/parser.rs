//! Statement and expression parsing.

use rustc_hash::FxHashSet;
use tracing::trace;

use lute_diagnostic::DiagnosticSink;
use lute_ir::{
    Ast, Attributes, BinaryOp, Block, BlockId, ExprId, ExprKind, Function, Name, StmtId, StmtKind,
    StringPiece, TokenKind, UnaryOp,
};
use lute_lexer::{ExpandedToken, Tokenizer};

use crate::hooks::{KeywordParams, KeywordResult, ParseHooks};
use crate::recovery::{ErrorTokenAction, RecoveryState};
use crate::AcceptFlags;

/// No ceiling: accept operators of any precedence.
const MAX_PRECEDENCE: u32 = u32::MAX;

/// Which statement forms the current scope accepts.
#[derive(Copy, Clone, Debug)]
pub struct Filter {
    /// `fn` definitions are legal here (file scope).
    pub allow_functions: bool,
    /// Ordinary instructions are legal here.
    pub allow_instructions: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            allow_functions: true,
            allow_instructions: true,
        }
    }
}

/// How to parse (and complain about) one statement block.
#[derive(Copy, Clone, Debug)]
pub struct BlockProperties {
    /// Used in messages: "unexpected end-of-file inside while-loop".
    pub block_type: &'static str,
    /// What the block follows: "expected '{' after if-condition".
    pub after_item: &'static str,
    /// Braces may be omitted when the body is a single return or if
    /// statement.
    pub braces_optional_if_control_flow: bool,
}

impl BlockProperties {
    pub fn new(block_type: &'static str, after_item: &'static str) -> Self {
        BlockProperties {
            block_type,
            after_item,
            braces_optional_if_control_flow: false,
        }
    }

    pub fn control(block_type: &'static str, after_item: &'static str) -> Self {
        BlockProperties {
            block_type,
            after_item,
            braces_optional_if_control_flow: true,
        }
    }
}

/// Names of the fixed statement keywords, interned once at construction.
struct StatementKeywords {
    fn_: Name,
    if_: Name,
    while_: Name,
    else_: Name,
    return_: Name,
}

/// The parser. Borrows the tokenizer, the syntax-tree arena under
/// construction, and the diagnostic sink for its whole run.
pub struct Parser<'a> {
    tkr: &'a mut Tokenizer,
    ast: &'a mut Ast,
    sink: &'a mut (dyn DiagnosticSink + 'a),
    error_count: u32,
    pub(crate) recovery: RecoveryState,
    /// Identifiers treated as statement keywords: the fixed five plus any
    /// the host registers for custom blocks and expression traits.
    keywords: FxHashSet<Name>,
    kw: StatementKeywords,
    pub filter: Filter,
}

impl<'a> Parser<'a> {
    pub fn new(
        tkr: &'a mut Tokenizer,
        ast: &'a mut Ast,
        sink: &'a mut (dyn DiagnosticSink + 'a),
    ) -> Self {
        let interner = tkr.interner();
        let kw = StatementKeywords {
            fn_: interner.intern("fn"),
            if_: interner.intern("if"),
            while_: interner.intern("while"),
            else_: interner.intern("else"),
            return_: interner.intern("return"),
        };
        let mut keywords = FxHashSet::default();
        keywords.insert(kw.fn_);
        keywords.insert(kw.if_);
        keywords.insert(kw.while_);
        keywords.insert(kw.else_);
        keywords.insert(kw.return_);
        Parser {
            tkr,
            ast,
            sink,
            error_count: 0,
            recovery: RecoveryState::default(),
            keywords,
            kw,
            filter: Filter::default(),
        }
    }

    /// Register an identifier as a statement keyword. The host's
    /// [`ParseHooks::keyword`](crate::ParseHooks::keyword) is offered every
    /// registered keyword the core grammar does not own.
    pub fn register_keyword(&mut self, name: Name) {
        self.keywords.insert(name);
    }

    /// Number of errors reported so far.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn tokenizer(&mut self) -> &mut Tokenizer {
        self.tkr
    }

    pub fn ast_mut(&mut self) -> &mut Ast {
        self.ast
    }

    pub fn read_token(&mut self) -> ExpandedToken {
        self.tkr.read_token()
    }

    pub fn describe(&self, token: &ExpandedToken) -> String {
        self.tkr.describe(token)
    }

    pub(crate) fn report(&mut self, message: &str) {
        self.sink.report(message);
        self.error_count += 1;
    }

    /// Parse a whole file: function definitions and top-level statements.
    pub fn parse_file(&mut self, hooks: &mut dyn ParseHooks) -> BlockId {
        self.parse_statement_block_inner(hooks, &BlockProperties::new("file", ""), true)
    }

    // Expressions

    /// Parse an expression with no precedence ceiling.
    pub fn parse_expression(&mut self) -> Option<ExprId> {
        self.parse_expression_prec(MAX_PRECEDENCE, false)
    }

    /// Precedence climbing: parse a primary, then greedily extend it with
    /// argument lists, property lookups, and binary operators binding
    /// tighter than `outer_precedence`, recursing on the right-hand side
    /// with the operator's own precedence as the new ceiling.
    pub(crate) fn parse_expression_prec(
        &mut self,
        outer_precedence: u32,
        as_statement: bool,
    ) -> Option<ExprId> {
        let token = self.read_token();
        trace!(offset = token.span.start, "expression");
        let mut expr: ExprId;

        if token.kind == TokenKind::OpenParen {
            let saved_accept = self.recovery.outer_accept;
            self.recovery.outer_accept |= AcceptFlags::CLOSE_PAREN;
            let saved_newline = self.tkr.behavior.tokenize_newline;
            self.tkr.behavior.tokenize_newline = false;

            let inner = self.parse_expression_prec(MAX_PRECEDENCE, false);
            let closing = self.read_token();
            if closing.kind == TokenKind::CloseParen {
                self.recovery.mute_errors = false;
            } else {
                let open_at = self.tkr.line_map().locate(token.span.start);
                let desc = self.describe(&closing);
                self.error_at_token(
                    &closing,
                    ErrorTokenAction::PushBack,
                    &format!("expected ')' to match the '(' at {open_at}; got {desc}"),
                );
            }

            self.recovery.outer_accept = saved_accept;
            self.tkr.behavior.tokenize_newline = saved_newline;
            expr = inner?;
        } else {
            match token.kind {
                TokenKind::Ident(name) => {
                    expr = self
                        .ast
                        .alloc_expr(ExprKind::NameLookup(name), token.span.start);
                }
                TokenKind::IntLit(value) => {
                    expr = self
                        .ast
                        .alloc_expr(ExprKind::IntLiteral(value), token.span.start);
                }
                TokenKind::BeginString => {
                    expr = self.parse_interpolated_string(&token, false);
                }
                TokenKind::BeginMultilineString => {
                    expr = self.parse_interpolated_string(&token, true);
                }
                _ => {
                    if let Some(op) = match_unary_op(token.kind) {
                        let operand = self.parse_expression_prec(MAX_PRECEDENCE, false)?;
                        expr = self
                            .ast
                            .alloc_expr(ExprKind::UnaryOp { op, operand }, token.span.start);
                    } else {
                        self.tkr.rewind_to(token.token_idx);
                        if !as_statement {
                            // Statement errors are issued by the caller.
                            let desc = self.describe(&token);
                            self.error_at_token(
                                &token,
                                ErrorTokenAction::DoNothing,
                                &format!("expected an expression; got {desc}"),
                            );
                        }
                        return None;
                    }
                }
            }
        }
        self.recovery.mute_errors = false; // Got a valid expression.

        // Extend the expression by consuming tokens to the right.
        loop {
            let token = self.read_token();

            match token.kind {
                TokenKind::OpenParen => {
                    expr = self.parse_argument_list(expr, &token);
                    continue;
                }
                TokenKind::Dot => {
                    let name_token = self.read_token();
                    if let TokenKind::Ident(name) = name_token.kind {
                        expr = self.ast.alloc_expr(
                            ExprKind::PropertyLookup { object: expr, name },
                            name_token.span.start,
                        );
                    } else {
                        let desc = self.describe(&name_token);
                        self.error_at_token(
                            &name_token,
                            ErrorTokenAction::PushBack,
                            &format!("expected identifier after '.'; got {desc}"),
                        );
                    }
                    continue;
                }
                _ => {}
            }

            if let Some(op) = match_binary_op(token.kind) {
                let precedence = op.precedence();
                if precedence >= outer_precedence {
                    self.tkr.rewind_to(token.token_idx);
                    return Some(expr);
                }
                let Some(rhs) = self.parse_expression_prec(precedence, false) else {
                    return Some(expr); // An error occurred.
                };
                expr = self.ast.alloc_expr(
                    ExprKind::BinaryOp {
                        op,
                        left: expr,
                        right: rhs,
                    },
                    token.span.start,
                );
                continue;
            }

            // Can't extend this expression any further.
            self.tkr.rewind_to(token.token_idx);
            return Some(expr);
        }
    }

    /// Parse `(arg, arg, ...)` after a callee expression.
    fn parse_argument_list(&mut self, callee: ExprId, open_token: &ExpandedToken) -> ExprId {
        let saved_accept = self.recovery.outer_accept;
        self.recovery.outer_accept |= AcceptFlags::CLOSE_PAREN;
        let saved_newline = self.tkr.behavior.tokenize_newline;
        self.tkr.behavior.tokenize_newline = false;

        let mut args = Vec::new();
        'list: {
            let token = self.read_token();
            if token.kind == TokenKind::CloseParen {
                break 'list; // Empty argument list.
            }
            self.tkr.rewind_to(token.token_idx);
            loop {
                if let Some(arg) = self.parse_expression_prec(MAX_PRECEDENCE, false) {
                    args.push(arg);
                }
                let token = self.read_token();
                match token.kind {
                    TokenKind::CloseParen => {
                        self.recovery.mute_errors = false;
                        break 'list;
                    }
                    TokenKind::Comma => {
                        self.recovery.mute_errors = false;
                    }
                    _ => {
                        let desc = self.describe(&token);
                        if !self.error_at_token(
                            &token,
                            ErrorTokenAction::HandleUnexpected,
                            &format!("expected ',' or ')' after function argument; got {desc}"),
                        ) {
                            break 'list;
                        }
                    }
                }
            }
        }

        self.recovery.outer_accept = saved_accept;
        self.tkr.behavior.tokenize_newline = saved_newline;
        let args = self.ast.alloc_args(args);
        self.ast
            .alloc_expr(ExprKind::Call { callee, args }, open_token.span.start)
    }

    /// Parse string pieces between `BeginString`/`BeginMultilineString` and
    /// `EndString`, recursing into the expression grammar for each embed.
    fn parse_interpolated_string(&mut self, begin: &ExpandedToken, multiline: bool) -> ExprId {
        let saved_inside = self.tkr.behavior.inside_string;
        let saved_multiline = self.tkr.behavior.multiline_string;
        self.tkr.behavior.inside_string = true;
        self.tkr.behavior.multiline_string = multiline;

        let mut pieces: Vec<StringPiece> = Vec::new();
        loop {
            let token = self.read_token();
            match token.kind {
                TokenKind::StringText(literal) => {
                    pieces.push(StringPiece {
                        literal,
                        embed: None,
                    });
                }
                TokenKind::BeginStringEmbed => {
                    let saved_accept = self.recovery.outer_accept;
                    self.recovery.outer_accept |= AcceptFlags::CLOSE_CURLY;
                    let saved_newline = self.tkr.behavior.tokenize_newline;
                    self.tkr.behavior.tokenize_newline = false;
                    self.tkr.behavior.inside_string = false;

                    let embed = self.parse_expression_prec(MAX_PRECEDENCE, false);
                    let close = self.read_token();
                    if close.kind != TokenKind::CloseCurly {
                        let embed_at = self.tkr.line_map().locate(token.span.start);
                        let desc = self.describe(&close);
                        self.error_at_token(
                            &close,
                            ErrorTokenAction::HandleUnexpected,
                            &format!(
                                "expected '}}' to close embedded expression at {embed_at}; got {desc}"
                            ),
                        );
                        self.skip_any_scope(None, TokenKind::OpenCurly);
                    }

                    self.tkr.behavior.inside_string = true;
                    self.tkr.behavior.tokenize_newline = saved_newline;
                    self.recovery.outer_accept = saved_accept;
                    self.recovery.mute_errors = false; // The embed is closed.

                    if let Some(embed) = embed {
                        match pieces.last_mut() {
                            Some(last) if last.embed.is_none() => last.embed = Some(embed),
                            _ => pieces.push(StringPiece {
                                literal: Name::EMPTY,
                                embed: Some(embed),
                            }),
                        }
                    }
                }
                TokenKind::EndString => break,
                TokenKind::Invalid => {
                    self.error_at_token(
                        &token,
                        ErrorTokenAction::DoNothing,
                        "unterminated string literal",
                    );
                    break;
                }
                _ => {
                    let desc = self.describe(&token);
                    self.error_at_token(
                        &token,
                        ErrorTokenAction::PushBack,
                        &format!("unexpected {desc} inside string literal"),
                    );
                    break;
                }
            }
        }

        self.tkr.behavior.inside_string = saved_inside;
        self.tkr.behavior.multiline_string = saved_multiline;
        let pieces = self.ast.alloc_pieces(pieces);
        self.ast
            .alloc_expr(ExprKind::InterpolatedString(pieces), begin.span.start)
    }

    // Statements

    /// Parse one statement into `stmts`.
    pub fn parse_statement(&mut self, hooks: &mut dyn ParseHooks, stmts: &mut Vec<StmtId>) {
        let first = self.read_token();
        let offset = first.span.start;
        trace!(offset, "statement");
        let mut attributes: Attributes = None;

        if let TokenKind::Ident(name) = first.kind {
            if self.keywords.contains(&name) {
                if name == self.kw.fn_ && self.filter.allow_functions {
                    self.parse_function_definition(hooks);
                    return;
                }
                if name == self.kw.if_ && self.filter.allow_instructions {
                    self.parse_if(hooks, stmts, offset);
                    return;
                }
                if name == self.kw.while_ && self.filter.allow_instructions {
                    self.parse_while(hooks, stmts, offset);
                    return;
                }
                if name == self.kw.return_ && self.filter.allow_instructions {
                    let expr = self
                        .parse_expression_prec(MAX_PRECEDENCE, false)
                        .unwrap_or_else(|| self.placeholder_expr(offset));
                    let stmt = self.ast.alloc_stmt(StmtKind::Return { expr }, offset);
                    stmts.push(stmt);
                    return;
                }

                // Custom keywords: offer each one to the host until the
                // next token is no longer a registered keyword.
                let mut token = first;
                loop {
                    let result = hooks.keyword(
                        self,
                        KeywordParams {
                            token: &token,
                            attributes: &mut attributes,
                            stmts,
                        },
                    );
                    match result {
                        KeywordResult::Illegal => {
                            let text = self.tkr.text(&token).to_string();
                            self.error_at_token(
                                &token,
                                ErrorTokenAction::HandleUnexpected,
                                &format!("keyword '{text}' cannot be used here"),
                            );
                            return;
                        }
                        KeywordResult::Attribute => {
                            token = self.read_token();
                        }
                        KeywordResult::Block => {
                            let term = self.read_token();
                            match term.kind {
                                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof => {
                                    // Marks the end of the statement.
                                }
                                _ => {
                                    self.tkr.rewind_to(term.token_idx);
                                    if term.kind != TokenKind::CloseCurly {
                                        let desc = self.describe(&term);
                                        self.error_at_token(
                                            &term,
                                            ErrorTokenAction::DoNothing,
                                            &format!("expected newline or ';' after block; got {desc}"),
                                        );
                                    }
                                }
                            }
                            return;
                        }
                        KeywordResult::Error => return,
                    }
                    let TokenKind::Ident(next) = token.kind else {
                        break;
                    };
                    if !self.keywords.contains(&next) {
                        break;
                    }
                }
                self.finish_expression_statement(hooks, stmts, token, offset, attributes);
                return;
            }
        }

        self.finish_expression_statement(hooks, stmts, first, offset, attributes);
    }

    /// Parse an assignment or evaluate statement starting at `token`
    /// (which has been read but not yet interpreted).
    fn finish_expression_statement(
        &mut self,
        hooks: &mut dyn ParseHooks,
        stmts: &mut Vec<StmtId>,
        token: ExpandedToken,
        offset: u32,
        mut attributes: Attributes,
    ) {
        if !self.filter.allow_instructions {
            let desc = self.describe(&token);
            self.error_at_token(
                &token,
                ErrorTokenAction::HandleUnexpected,
                &format!("unexpected {desc}"),
            );
            return;
        }

        self.tkr.rewind_to(token.token_idx);
        let expr = self.parse_expression_prec(MAX_PRECEDENCE, true);
        let mut token = self.read_token();

        let Some(left) = expr else {
            let desc = self.describe(&token);
            let message = if attributes.is_some() {
                format!("expected an expression after attribute; got {desc}")
            } else {
                format!("unexpected {desc}")
            };
            self.error_at_token(&token, ErrorTokenAction::HandleUnexpected, &message);
            return;
        };

        let (kind, statement_type) = if token.kind == TokenKind::Equal {
            let right = self
                .parse_expression_prec(MAX_PRECEDENCE, false)
                .unwrap_or_else(|| self.placeholder_expr(offset));
            token = self.read_token();
            (
                StmtKind::Assign {
                    left,
                    right,
                    attributes: attributes.take(),
                },
                "assignment",
            )
        } else {
            (
                StmtKind::Evaluate {
                    expr: left,
                    attributes: attributes.take(),
                },
                "expression",
            )
        };
        let stmt = self.ast.alloc_stmt(kind, offset);
        hooks.validate_attributes(self, stmt);

        // End of evaluate or assignment statement.
        match token.kind {
            TokenKind::Newline | TokenKind::Semicolon => {}
            TokenKind::Eof => self.tkr.rewind_to(token.token_idx),
            _ => {
                self.tkr.rewind_to(token.token_idx);
                if token.kind != TokenKind::CloseCurly {
                    let desc = self.describe(&token);
                    self.error_at_token(
                        &token,
                        ErrorTokenAction::DoNothing,
                        &format!("unexpected {desc} after {statement_type}"),
                    );
                }
            }
        }
        stmts.push(stmt);
    }

    fn parse_if(&mut self, hooks: &mut dyn ParseHooks, stmts: &mut Vec<StmtId>, offset: u32) {
        let condition = self
            .parse_expression_prec(MAX_PRECEDENCE, false)
            .unwrap_or_else(|| self.placeholder_expr(offset));
        let true_block = self
            .parse_statement_block(hooks, &BlockProperties::control("if-statement", "if-condition"))
            .unwrap_or_else(|| self.ast.alloc_block(Block::default()));

        let saved_newline = self.tkr.behavior.tokenize_newline;
        self.tkr.behavior.tokenize_newline = false;
        let token = self.read_token();
        let false_block = if token.kind == TokenKind::Ident(self.kw.else_) {
            self.parse_statement_block(hooks, &BlockProperties::control("else-block", "'else'"))
        } else {
            self.tkr.rewind_to(token.token_idx);
            None
        };
        self.tkr.behavior.tokenize_newline = saved_newline;

        let stmt = self.ast.alloc_stmt(
            StmtKind::If {
                condition,
                true_block,
                false_block,
            },
            offset,
        );
        stmts.push(stmt);
    }

    fn parse_while(&mut self, hooks: &mut dyn ParseHooks, stmts: &mut Vec<StmtId>, offset: u32) {
        let condition = self
            .parse_expression_prec(MAX_PRECEDENCE, false)
            .unwrap_or_else(|| self.placeholder_expr(offset));
        let body = self
            .parse_statement_block(hooks, &BlockProperties::control("while-loop", "'while'"))
            .unwrap_or_else(|| self.ast.alloc_block(Block::default()));
        let stmt = self.ast.alloc_stmt(StmtKind::While { condition, body }, offset);
        stmts.push(stmt);
    }

    fn parse_function_definition(&mut self, hooks: &mut dyn ParseHooks) {
        // We got the 'fn' keyword.
        self.recovery.mute_errors = false;

        let name_token = self.read_token();
        let TokenKind::Ident(name) = name_token.kind else {
            let desc = self.describe(&name_token);
            self.error_at_token(
                &name_token,
                ErrorTokenAction::HandleUnexpected,
                &format!("expected function name after 'fn'; got {desc}"),
            );
            return;
        };

        let Some(params) = self.parse_parameter_list(name) else {
            return;
        };

        // Function bodies accept instructions but not nested functions.
        let saved_filter = self.filter;
        self.filter = Filter {
            allow_functions: false,
            allow_instructions: true,
        };
        let body = self.parse_statement_block(hooks, &BlockProperties::new("function", "parameter list"));
        self.filter = saved_filter;

        let body = body.unwrap_or_else(|| self.ast.alloc_block(Block::default()));
        let func = self.ast.alloc_function(Function {
            name,
            params,
            body,
            offset: name_token.span.start,
        });
        hooks.function_parsed(self, func);
    }

    fn parse_parameter_list(&mut self, fn_name: Name) -> Option<Vec<Name>> {
        let token = self.read_token();
        if token.kind != TokenKind::OpenParen {
            let fn_text = self.tkr.interner().lookup(fn_name);
            let desc = self.describe(&token);
            self.error_at_token(
                &token,
                ErrorTokenAction::PushBack,
                &format!("expected '(' after function name '{fn_text}'; got {desc}"),
            );
            return None;
        }

        let saved_newline = self.tkr.behavior.tokenize_newline;
        self.tkr.behavior.tokenize_newline = false;

        let mut params = Vec::new();
        let first = self.read_token();
        if first.kind == TokenKind::CloseParen {
            self.recovery.mute_errors = false;
            self.tkr.behavior.tokenize_newline = saved_newline;
            return Some(params);
        }

        let saved_accept = self.recovery.outer_accept;
        self.recovery.outer_accept |= AcceptFlags::CLOSE_PAREN;

        let mut param_token = first;
        let result = loop {
            match param_token.kind {
                TokenKind::Ident(param) => params.push(param),
                _ => {
                    let desc = self.describe(&param_token);
                    if self.error_at_token(
                        &param_token,
                        ErrorTokenAction::HandleUnexpected,
                        &format!("expected function parameter; got {desc}"),
                    ) {
                        break None;
                    }
                }
            }
            let sep = self.read_token();
            match sep.kind {
                TokenKind::CloseParen => {
                    self.recovery.mute_errors = false;
                    break Some(params);
                }
                TokenKind::Comma => {}
                _ => {
                    let desc = self.describe(&sep);
                    if self.error_at_token(
                        &sep,
                        ErrorTokenAction::HandleUnexpected,
                        &format!("expected ',' or ')' after parameter; got {desc}"),
                    ) {
                        break None;
                    }
                }
            }
            param_token = self.read_token();
        };

        self.recovery.outer_accept = saved_accept;
        self.tkr.behavior.tokenize_newline = saved_newline;
        result
    }

    // Blocks

    /// Parse `{ statements }`, or — for control-flow bodies — a single bare
    /// return/if statement.
    pub fn parse_statement_block(
        &mut self,
        hooks: &mut dyn ParseHooks,
        props: &BlockProperties,
    ) -> Option<BlockId> {
        let saved_newline = self.tkr.behavior.tokenize_newline;
        self.tkr.behavior.tokenize_newline = false;
        let token = self.read_token();
        self.tkr.behavior.tokenize_newline = true;

        let result = if token.kind == TokenKind::OpenCurly {
            Some(self.parse_statement_block_inner(hooks, props, false))
        } else if props.braces_optional_if_control_flow {
            self.tkr.rewind_to(token.token_idx);
            let mut stmts = Vec::new();
            self.parse_statement(hooks, &mut stmts);
            let legal = stmts.len() == 1
                && matches!(
                    self.ast.stmt(stmts[0]).kind,
                    StmtKind::Return { .. } | StmtKind::If { .. }
                );
            if !legal {
                self.error_at_token(
                    &token,
                    ErrorTokenAction::DoNothing,
                    &format!(
                        "body of {} must be enclosed in curly braces unless it's a return or if statement",
                        props.block_type
                    ),
                );
                self.recovery.mute_errors = false;
            }
            Some(self.ast.alloc_block(Block { stmts }))
        } else {
            let desc = self.describe(&token);
            self.error_at_token(
                &token,
                ErrorTokenAction::PushBack,
                &format!("expected '{{' after {}; got {desc}", props.after_item),
            );
            None
        };

        self.tkr.behavior.tokenize_newline = saved_newline;
        result
    }

    fn parse_statement_block_inner(
        &mut self,
        hooks: &mut dyn ParseHooks,
        props: &BlockProperties,
        file_scope: bool,
    ) -> BlockId {
        let mut stmts = Vec::new();
        loop {
            let token = self.read_token();
            match token.kind {
                TokenKind::Newline | TokenKind::Semicolon => {}
                TokenKind::CloseCurly => {
                    if !file_scope {
                        break;
                    }
                    self.error_at_token(
                        &token,
                        ErrorTokenAction::HandleUnexpected,
                        "unexpected '}' at file scope",
                    );
                }
                TokenKind::Eof => {
                    if !file_scope {
                        let message = format!("unexpected end-of-file inside {}", props.block_type);
                        self.error_at_token(&token, ErrorTokenAction::PushBack, &message);
                    }
                    break;
                }
                _ => {
                    self.tkr.rewind_to(token.token_idx);
                    let before = self.tkr.position();
                    self.parse_statement(hooks, &mut stmts);
                    if self.tkr.position() == before {
                        // A recovery path (or a hook violating its restore
                        // contract) consumed nothing; force progress.
                        let stray = self.read_token();
                        if stray.kind == TokenKind::Eof {
                            break;
                        }
                    }
                }
            }
        }
        self.ast.alloc_block(Block { stmts })
    }

    /// Stand-in expression after an error was already reported; keeps the
    /// surrounding statement well-formed.
    fn placeholder_expr(&mut self, offset: u32) -> ExprId {
        self.ast.alloc_expr(ExprKind::IntLiteral(0), offset)
    }
}

fn match_binary_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::LessThan => Some(BinaryOp::LessThan),
        TokenKind::LessThanOrEqual => Some(BinaryOp::LessThanOrEqual),
        TokenKind::GreaterThan => Some(BinaryOp::GreaterThan),
        TokenKind::GreaterThanOrEqual => Some(BinaryOp::GreaterThanOrEqual),
        TokenKind::DoubleEqual => Some(BinaryOp::DoubleEqual),
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Subtract),
        TokenKind::Asterisk => Some(BinaryOp::Multiply),
        TokenKind::Slash => Some(BinaryOp::Divide),
        TokenKind::Percent => Some(BinaryOp::Modulo),
        TokenKind::DoubleVerticalBar => Some(BinaryOp::LogicalOr),
        TokenKind::DoubleAmpersand => Some(BinaryOp::LogicalAnd),
        _ => None,
    }
}

fn match_unary_op(kind: TokenKind) -> Option<UnaryOp> {
    match kind {
        TokenKind::Minus => Some(UnaryOp::Negate),
        TokenKind::Bang => Some(UnaryOp::LogicalNot),
        TokenKind::Tilde => Some(UnaryOp::BitComplement),
        _ => None,
    }
}
