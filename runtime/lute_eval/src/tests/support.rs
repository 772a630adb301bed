//! Shared helpers: compile a source string through the real tokenizer and
//! parser, then drive the interpreter over it.

use lute_diagnostic::{CollectedDiagnostics, LineMap};
use lute_ir::{Ast, BlockId, SharedInterner};
use lute_lexer::Tokenizer;
use lute_parse::{NoHooks, Parser};

use crate::{DefaultHooks, EvalHooks, Interpreter, RuntimeError};

pub struct Script {
    pub ast: Ast,
    pub block: BlockId,
    pub interner: SharedInterner,
    pub line_map: LineMap,
    pub parse_errors: Vec<String>,
}

pub fn compile(source: &str) -> Script {
    let interner = SharedInterner::new();
    let mut tkr = Tokenizer::new(source, interner.clone());
    let mut ast = Ast::new();
    let mut sink = CollectedDiagnostics::new();
    let block = {
        let mut parser = Parser::new(&mut tkr, &mut ast, &mut sink);
        parser.parse_file(&mut NoHooks)
    };
    Script {
        ast,
        block,
        interner,
        line_map: LineMap::new(source),
        parse_errors: sink.messages().to_vec(),
    }
}

/// Run a script to completion and return its `return` value as an int.
pub fn run_int(source: &str) -> u32 {
    run_int_with(source, Box::new(DefaultHooks))
}

pub fn run_int_with(source: &str, hooks: Box<dyn EvalHooks + '_>) -> u32 {
    let script = compile(source);
    assert!(
        script.parse_errors.is_empty(),
        "parse errors: {:?}",
        script.parse_errors
    );
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(
        &script.ast,
        script.interner.clone(),
        &script.line_map,
        &mut sink,
        hooks,
    );
    interp.enter_block(script.block, "script");
    if let Err(error) = interp.finish() {
        panic!("runtime error: {error}");
    }
    let Some(instance) = interp.result() else {
        panic!("script returned no value");
    };
    let Some(value) = instance.downcast_ref::<u32>() else {
        panic!("script result is {}, not int", instance.ty.name);
    };
    *value
}

/// Run a script to completion and return its `return` value as a string.
pub fn run_string(source: &str) -> String {
    let script = compile(source);
    assert!(
        script.parse_errors.is_empty(),
        "parse errors: {:?}",
        script.parse_errors
    );
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(
        &script.ast,
        script.interner.clone(),
        &script.line_map,
        &mut sink,
        Box::new(DefaultHooks),
    );
    interp.enter_block(script.block, "script");
    if let Err(error) = interp.finish() {
        panic!("runtime error: {error}");
    }
    let Some(instance) = interp.result() else {
        panic!("script returned no value");
    };
    let Some(value) = instance.downcast_ref::<String>() else {
        panic!("script result is {}, not string", instance.ty.name);
    };
    value.clone()
}

/// Run a script expecting a runtime failure; returns the error and every
/// diagnostic the interpreter reported.
pub fn run_expect_error(source: &str) -> (RuntimeError, Vec<String>) {
    let script = compile(source);
    assert!(
        script.parse_errors.is_empty(),
        "parse errors: {:?}",
        script.parse_errors
    );
    let mut sink = CollectedDiagnostics::new();
    let error = {
        let mut interp = Interpreter::new(
            &script.ast,
            script.interner.clone(),
            &script.line_map,
            &mut sink,
            Box::new(DefaultHooks),
        );
        interp.enter_block(script.block, "script");
        match interp.finish() {
            Ok(()) => panic!("expected a runtime error"),
            Err(error) => {
                assert_eq!(interp.state().frame_count(), 0, "error must unwind all frames");
                assert!(
                    interp.state().storage.is_empty(),
                    "error must release all storage"
                );
                error
            }
        }
    };
    (error, sink.messages().to_vec())
}
