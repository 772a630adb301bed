//! Host integration: native functions, host value kinds with method
//! tables, custom blocks, and the evaluate/assign hooks.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use lute_diagnostic::{CollectedDiagnostics, LineMap};
use lute_ir::{Ast, Attributes, CustomBlock, Name, SharedInterner, StmtKind, TokenKind};
use lute_lexer::Tokenizer;
use lute_parse::{
    BlockProperties, KeywordParams, KeywordResult, ParseHooks, Parser,
};

use super::support::{compile, run_int_with};
use crate::{
    CallArgs, EvalHooks, EvalState, Instance, Interpreter, MethodTable, OpResult, TypeDesc,
    ValueHandle,
};

// A native function supplied through name resolution.

fn double_native(state: &mut EvalState, args: &CallArgs) -> OpResult {
    let value = args
        .args
        .first()
        .and_then(|handle| state.value::<u32>(*handle))
        .copied()
        .ok_or_else(|| "double expects one int argument".to_string())?;
    Ok(Instance::int(value * 2))
}

struct NativeHooks {
    double: Name,
}

impl EvalHooks for NativeHooks {
    fn resolve_name(&mut self, state: &mut EvalState, name: Name) -> Option<Instance> {
        if name == self.double {
            return Some(Instance::native(double_native));
        }
        state.ast.lookup_function(name).map(Instance::function)
    }
}

#[test]
fn native_function_through_name_resolution() {
    let interner = SharedInterner::new();
    let hooks = NativeHooks {
        double: interner.intern("double"),
    };
    // The script's interner must be the same universe as the hook's names.
    let mut tkr = Tokenizer::new("return double(21)\n", interner.clone());
    let mut ast = Ast::new();
    let mut parse_sink = CollectedDiagnostics::new();
    let block = {
        let mut parser = Parser::new(&mut tkr, &mut ast, &mut parse_sink);
        parser.parse_file(&mut lute_parse::NoHooks)
    };
    assert!(parse_sink.is_empty());

    let line_map = LineMap::new("return double(21)\n");
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(&ast, interner, &line_map, &mut sink, Box::new(hooks));
    interp.enter_block(block, "script");
    if let Err(error) = interp.finish() {
        panic!("{error}");
    }
    let value = interp
        .result()
        .and_then(|instance| instance.downcast_ref::<u32>())
        .copied();
    assert_eq!(value, Some(42));
}

// A host value kind with a property that resolves to a bound method.

static GREETER_TYPE: TypeDesc = TypeDesc {
    name: "greeter",
    clone_data: greeter_clone,
    methods: MethodTable {
        property_lookup: Some(greeter_property),
        ..MethodTable::EMPTY
    },
};

fn greeter_clone(instance: &Instance) -> Box<dyn Any> {
    match instance.downcast_ref::<String>() {
        Some(name) => Box::new(name.clone()),
        None => unreachable!("greeter payload is its name"),
    }
}

fn greeter_property(state: &mut EvalState, object: ValueHandle, name: Name) -> OpResult {
    if state.interner().with_str(name, |s| s == "greet") {
        let func = state.push_temp(Instance::native(greet_native));
        return Ok(Instance::bound_method(object, func));
    }
    Err(state
        .interner()
        .with_str(name, |s| format!("no property '{s}' on greeter")))
}

fn greet_native(state: &mut EvalState, args: &CallArgs) -> OpResult {
    let receiver = args.receiver.ok_or_else(|| "greet needs a receiver".to_string())?;
    let name = state
        .value::<String>(receiver)
        .ok_or_else(|| "greet receiver must be a greeter".to_string())?;
    Ok(Instance::string(format!("hello {name}")))
}

struct GreeterHooks {
    host: Name,
}

impl EvalHooks for GreeterHooks {
    fn resolve_name(&mut self, state: &mut EvalState, name: Name) -> Option<Instance> {
        if name == self.host {
            return Some(Instance::new(&GREETER_TYPE, String::from("world")));
        }
        state.ast.lookup_function(name).map(Instance::function)
    }
}

#[test]
fn property_lookup_yields_a_bound_method() {
    let interner = SharedInterner::new();
    let hooks = GreeterHooks {
        host: interner.intern("host"),
    };
    let source = "return host.greet()\n";
    let mut tkr = Tokenizer::new(source, interner.clone());
    let mut ast = Ast::new();
    let mut parse_sink = CollectedDiagnostics::new();
    let block = {
        let mut parser = Parser::new(&mut tkr, &mut ast, &mut parse_sink);
        parser.parse_file(&mut lute_parse::NoHooks)
    };
    assert!(parse_sink.is_empty());

    let line_map = LineMap::new(source);
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(&ast, interner, &line_map, &mut sink, Box::new(hooks));
    interp.enter_block(block, "script");
    if let Err(error) = interp.finish() {
        panic!("{error}");
    }
    let value = interp
        .result()
        .and_then(|instance| instance.downcast_ref::<String>())
        .cloned();
    assert_eq!(value.as_deref(), Some("hello world"));
}

// Custom blocks: parsed by a host parse hook, executed by a host eval hook.

struct TwiceParseHooks {
    twice: Name,
}

impl ParseHooks for TwiceParseHooks {
    fn keyword(&mut self, parser: &mut Parser<'_>, params: KeywordParams<'_>) -> KeywordResult {
        if params.token.kind != TokenKind::Ident(self.twice) {
            return KeywordResult::Illegal;
        }
        let body = parser
            .parse_statement_block(&mut *self, &BlockProperties::new("twice block", "'twice'"));
        let custom = CustomBlock {
            kind: self.twice,
            payload: Box::new(()),
            body,
        };
        let stmt = parser
            .ast_mut()
            .alloc_stmt(StmtKind::Custom(custom), params.token.span.start);
        params.stmts.push(stmt);
        KeywordResult::Block
    }
}

struct TwiceEvalHooks;

impl EvalHooks for TwiceEvalHooks {
    fn custom_block(&mut self, state: &mut EvalState, custom: &CustomBlock) -> Result<(), String> {
        let Some(body) = custom.body else {
            return Err("twice needs a block".to_string());
        };
        state.enter_block(body);
        state.enter_block(body);
        Ok(())
    }
}

#[test]
fn custom_block_body_scheduled_by_the_host_runs_twice() {
    let interner = SharedInterner::new();
    let twice = interner.intern("twice");
    let source = "x = 0\ntwice {\n  x = x + 1\n}\nreturn x\n";
    let mut tkr = Tokenizer::new(source, interner.clone());
    let mut ast = Ast::new();
    let mut parse_sink = CollectedDiagnostics::new();
    let block = {
        let mut parser = Parser::new(&mut tkr, &mut ast, &mut parse_sink);
        parser.register_keyword(twice);
        parser.parse_file(&mut TwiceParseHooks { twice })
    };
    assert!(parse_sink.is_empty(), "{:?}", parse_sink.messages());

    let line_map = LineMap::new(source);
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(
        &ast,
        interner,
        &line_map,
        &mut sink,
        Box::new(TwiceEvalHooks),
    );
    interp.enter_block(block, "script");
    if let Err(error) = interp.finish() {
        panic!("{error}");
    }
    let value = interp
        .result()
        .and_then(|instance| instance.downcast_ref::<u32>())
        .copied();
    assert_eq!(value, Some(2));
}

#[test]
fn unhandled_custom_block_is_a_runtime_error() {
    let interner = SharedInterner::new();
    let twice = interner.intern("twice");
    let source = "twice {\n}\n";
    let mut tkr = Tokenizer::new(source, interner.clone());
    let mut ast = Ast::new();
    let mut parse_sink = CollectedDiagnostics::new();
    let block = {
        let mut parser = Parser::new(&mut tkr, &mut ast, &mut parse_sink);
        parser.register_keyword(twice);
        parser.parse_file(&mut TwiceParseHooks { twice })
    };

    let line_map = LineMap::new(source);
    let mut sink = CollectedDiagnostics::new();
    // DefaultHooks rejects custom blocks.
    let mut interp = Interpreter::new(
        &ast,
        interner,
        &line_map,
        &mut sink,
        Box::new(crate::DefaultHooks),
    );
    interp.enter_block(block, "script");
    let Err(error) = interp.finish() else {
        panic!("expected a runtime error");
    };
    assert!(
        error.message.contains("custom blocks are not supported"),
        "{error}"
    );
}

// The evaluate and assign hooks.

struct RecordingHooks {
    evaluated: Rc<RefCell<Vec<u32>>>,
    claimed: Rc<RefCell<Vec<String>>>,
    blackhole: Name,
}

impl EvalHooks for RecordingHooks {
    fn on_evaluate(&mut self, state: &mut EvalState, _attributes: &Attributes) -> bool {
        if let Some(handle) = state.return_value {
            if let Some(value) = state.value::<u32>(handle) {
                self.evaluated.borrow_mut().push(*value);
            }
        }
        true
    }

    fn assign_to_local(
        &mut self,
        state: &mut EvalState,
        _attributes: &Attributes,
        name: Name,
    ) -> bool {
        if name == self.blackhole {
            let text = state.interner().lookup(name);
            self.claimed.borrow_mut().push(text);
            return true;
        }
        false
    }
}

#[test]
fn on_evaluate_sees_bare_expression_results() {
    let interner = SharedInterner::new();
    let evaluated = Rc::new(RefCell::new(Vec::new()));
    let hooks = RecordingHooks {
        evaluated: evaluated.clone(),
        claimed: Rc::new(RefCell::new(Vec::new())),
        blackhole: interner.intern("blackhole"),
    };
    let source = "1 + 1\n2 * 3\nreturn 0\n";
    let mut tkr = Tokenizer::new(source, interner.clone());
    let mut ast = Ast::new();
    let mut parse_sink = CollectedDiagnostics::new();
    let block = {
        let mut parser = Parser::new(&mut tkr, &mut ast, &mut parse_sink);
        parser.parse_file(&mut lute_parse::NoHooks)
    };
    let line_map = LineMap::new(source);
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(&ast, interner, &line_map, &mut sink, Box::new(hooks));
    interp.enter_block(block, "script");
    if let Err(error) = interp.finish() {
        panic!("{error}");
    }
    assert_eq!(*evaluated.borrow(), vec![2, 6]);
}

#[test]
fn assign_hook_can_claim_a_store() {
    let interner = SharedInterner::new();
    let claimed = Rc::new(RefCell::new(Vec::new()));
    let hooks = RecordingHooks {
        evaluated: Rc::new(RefCell::new(Vec::new())),
        claimed: claimed.clone(),
        blackhole: interner.intern("blackhole"),
    };
    let source = "blackhole = 42\nreturn 7\n";
    let mut tkr = Tokenizer::new(source, interner.clone());
    let mut ast = Ast::new();
    let mut parse_sink = CollectedDiagnostics::new();
    let block = {
        let mut parser = Parser::new(&mut tkr, &mut ast, &mut parse_sink);
        parser.parse_file(&mut lute_parse::NoHooks)
    };
    let line_map = LineMap::new(source);
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(&ast, interner, &line_map, &mut sink, Box::new(hooks));
    interp.enter_block(block, "script");
    if let Err(error) = interp.finish() {
        panic!("{error}");
    }
    assert_eq!(*claimed.borrow(), vec!["blackhole".to_string()]);
    let value = interp
        .result()
        .and_then(|instance| instance.downcast_ref::<u32>())
        .copied();
    assert_eq!(value, Some(7));
}

#[test]
fn rejecting_on_evaluate_fails_the_invocation() {
    struct Rejecting;
    impl EvalHooks for Rejecting {
        fn on_evaluate(&mut self, _state: &mut EvalState, _attributes: &Attributes) -> bool {
            false
        }
    }
    let script = compile("1 + 1\n");
    let mut sink = CollectedDiagnostics::new();
    let mut interp = Interpreter::new(
        &script.ast,
        script.interner.clone(),
        &script.line_map,
        &mut sink,
        Box::new(Rejecting),
    );
    interp.enter_block(script.block, "script");
    let Err(error) = interp.finish() else {
        panic!("expected a runtime error");
    };
    assert!(error.message.contains("rejected by host"), "{error}");
}

#[test]
fn run_int_with_accepts_custom_hooks() {
    // Plain scripts still work under a host hook set.
    struct Passthrough;
    impl EvalHooks for Passthrough {}
    assert_eq!(run_int_with("return 3 + 4\n", Box::new(Passthrough)), 7);
}
