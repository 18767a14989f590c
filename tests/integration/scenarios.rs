//! End-to-end typing of small module forests

use sema_core::frontend::core::ast::{BinOp, ModuleDecl, TemplateArg};
use sema_core::frontend::core::type_system::ClosureSpec;
use sema_core::{check_program, AstBuilder, Program, Ses, TypeError};

fn program(modules: Vec<ModuleDecl>) -> Program {
    Program { modules }
}

/// `module math { square := fn(x: i32) { x * x }; sum_squares := fn(a: i32, b: i32) { square(a) + square(b) } }`
fn math(b: &mut AstBuilder) -> ModuleDecl {
    let x1 = b.ident("x");
    let x2 = b.ident("x");
    let product = b.binary(BinOp::Mul, x1, x2);
    let spec = b.named("i32");
    let param = b.param("x", Some(spec));
    let square = b.lambda(vec![param], None, None, product);
    let square = b.value_item("square", None, square);

    let callee = b.ident("square");
    let a = b.ident("a");
    let left = b.call(callee, vec![a]);
    let callee = b.ident("square");
    let c = b.ident("b");
    let right = b.call(callee, vec![c]);
    let sum = b.binary(BinOp::Add, left, right);
    let a_spec = b.named("i32");
    let b_spec = b.named("i32");
    let params = vec![b.param("a", Some(a_spec)), b.param("b", Some(b_spec))];
    let sum_squares = b.lambda(params, None, None, sum);
    let sum_squares = b.value_item("sum_squares", None, sum_squares);
    b.module("math", &[], vec![square, sum_squares])
}

#[test]
fn test_calls_across_modules() {
    let mut b = AstBuilder::new();
    let math = math(&mut b);
    let base = b.ident("math");
    let callee = b.field(base, "sum_squares");
    let args = vec![b.int(3), b.int(4)];
    let call = b.call(callee, args);
    let r = b.value_item("r", None, call);
    let main = b.module("main", &[], vec![r]);

    let typed = check_program(&program(vec![main, math])).unwrap();
    assert_eq!(
        typed.display_def(&["math", "sum_squares"]).as_deref(),
        Some("fn(i32, i32) -> i32")
    );
    assert_eq!(typed.display_def(&["main", "r"]).as_deref(), Some("i32"));
}

#[test]
fn test_default_int_plus_u8_is_rejected() {
    let mut b = AstBuilder::new();
    let three = b.int(3);
    let x = b.value_item("x", None, three);
    let lhs = b.ident("x");
    let rhs = b.int_suffixed(2, false, 8);
    let sum = b.binary(BinOp::Add, lhs, rhs);
    let y = b.value_item("y", None, sum);
    let main = b.module("main", &[], vec![x, y]);

    let err = check_program(&program(vec![main])).unwrap_err();
    assert!(err.is_unification());
}

#[test]
fn test_template_instantiations_are_distinct() {
    let mut b = AstBuilder::new();
    let t = b.named("T");
    let value = b.extern_item("value", t, "template_value");
    let m = b.module("M", &["T"], vec![value]);

    let int32 = b.named("int32");
    let first = b.instantiate(&["M"], vec![TemplateArg::Type(int32)]);
    let first_id = first.id;
    let a = b.field(first, "value");
    let int8 = b.named("int8");
    let second = b.instantiate(&["M"], vec![TemplateArg::Type(int8)]);
    let second_id = second.id;
    let c = b.field(second, "value");
    let items = vec![b.value_item("a", None, a), b.value_item("c", None, c)];
    let main = b.module("main", &[], items);

    let typed = check_program(&program(vec![m, main])).unwrap();
    assert_eq!(typed.display_def(&["main", "a"]).as_deref(), Some("i32"));
    assert_eq!(typed.display_def(&["main", "c"]).as_deref(), Some("i8"));
    assert_ne!(typed.type_of(first_id), typed.type_of(second_id));
}

#[test]
fn test_mutually_recursive_modules() {
    let mut b = AstBuilder::new();
    let base = b.ident("odd");
    let flag = b.field(base, "seed");
    let not = b.unary(sema_core::frontend::core::ast::UnOp::Not, flag);
    let start = b.value_item("start", None, not);
    let even = b.module("even", &[], vec![start]);

    let truth = b.bool(true);
    let seed = b.value_item("seed", None, truth);
    let base = b.ident("even");
    let back = b.field(base, "start");
    let echo = b.value_item("echo", None, back);
    let odd = b.module("odd", &[], vec![seed, echo]);

    let typed = check_program(&program(vec![even, odd])).unwrap();
    assert_eq!(typed.display_def(&["even", "start"]).as_deref(), Some("bool"));
    assert_eq!(typed.display_def(&["odd", "echo"]).as_deref(), Some("bool"));
    assert_eq!(typed.reseeded.len(), 2);
}

#[test]
fn test_counter_closure() {
    // make_counter := fn() { n := 0; fn() / ST { n = n + 1; n } }
    let mut b = AstBuilder::new();
    let zero = b.int(0);
    let binding = b.let_("n", None, zero);
    let target = b.ident("n");
    let n = b.ident("n");
    let one = b.int(1);
    let next = b.binary(BinOp::Add, n, one);
    let assign = b.assign(target, next);
    let tail = b.ident("n");
    let body = b.chain(None, vec![assign], Some(tail));
    let tick = b.lambda(vec![], None, Some(Ses::St), body);
    let tick_id = tick.id;
    let outer_body = b.chain(None, vec![binding], Some(tick));
    let make = b.lambda(vec![], None, None, outer_body);
    let item = b.value_item("make_counter", None, make);
    let main = b.module("main", &[], vec![item]);

    let typed = check_program(&program(vec![main])).unwrap();
    assert_eq!(
        typed.display_def(&["main", "make_counter"]).as_deref(),
        Some("fn() -> closure fn() -> i32 / ST")
    );
    let tick = typed.typing(tick_id).unwrap();
    assert_eq!(tick.closure, ClosureSpec::Yes);
    assert!(typed.captures_of(tick_id).unwrap().contains_key("n"));
}

#[test]
fn test_first_error_stops_checking() {
    let mut b = AstBuilder::new();
    let missing = b.ident("missing");
    let first = b.value_item("first", None, missing);
    let text = b.string("a");
    let spec = b.named("i32");
    let cast = b.cast(text, spec);
    let second = b.value_item("second", None, cast);
    let main = b.module("main", &[], vec![first, second]);

    let err = check_program(&program(vec![main])).unwrap_err();
    assert!(matches!(err, TypeError::UndefinedSymbol { .. }));
}
