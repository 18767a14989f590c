//! 模板模块实例化测试

use super::check_modules;
use crate::frontend::core::ast::{AstBuilder, BinOp, ModuleDecl, NodeId, TemplateArg};
use crate::frontend::core::type_system::MismatchReason;
use crate::frontend::typecheck::TypeError;

/// `module M[T] { value: T }`
fn holder(b: &mut AstBuilder) -> ModuleDecl {
    let t = b.named("T");
    let value = b.extern_item("value", t, "holder_value");
    b.module("M", &["T"], vec![value])
}

/// `module V[n] { size := n }`
fn sized(b: &mut AstBuilder) -> ModuleDecl {
    let n = b.ident("n");
    let size = b.value_item("size", None, n);
    b.module("V", &["n"], vec![size])
}

/// `module N[T] { sub := fn(a: T, b: T) (a - b) - a }`
fn subtractor(b: &mut AstBuilder) -> ModuleDecl {
    let t = b.named("T");
    let a = b.param("a", Some(t));
    let t = b.named("T");
    let c = b.param("b", Some(t));
    let lhs = b.ident("a");
    let rhs = b.ident("b");
    let diff = b.binary(BinOp::Sub, lhs, rhs);
    let again = b.ident("a");
    let body = b.binary(BinOp::Sub, diff, again);
    let sub = b.lambda(vec![a, c], None, None, body);
    let item = b.value_item("sub", None, sub);
    b.module("N", &["T"], vec![item])
}

fn template_reason(err: TypeError) -> String {
    match err {
        TypeError::TemplateMismatch { reason, .. } => reason,
        other => panic!("expected a template mismatch, got {other:?}"),
    }
}

/// 测试两次实例化得到不同的模块类型
#[test]
fn test_distinct_instantiations() {
    let mut nodes: Vec<NodeId> = Vec::new();
    let program = check_modules(|b| {
        let m = holder(b);
        let int32 = b.named("int32");
        let inst32 = b.instantiate(&["M"], vec![TemplateArg::Type(int32)]);
        nodes.push(inst32.id);
        let a = b.field(inst32, "value");
        let int8 = b.named("int8");
        let inst8 = b.instantiate(&["M"], vec![TemplateArg::Type(int8)]);
        nodes.push(inst8.id);
        let c = b.field(inst8, "value");
        let items = vec![b.value_item("a", None, a), b.value_item("c", None, c)];
        vec![m, b.module("main", &[], items)]
    })
    .unwrap();

    assert_eq!(program.display_def(&["main", "a"]).as_deref(), Some("i32"));
    assert_eq!(program.display_def(&["main", "c"]).as_deref(), Some("i8"));
    assert_ne!(program.type_of(nodes[0]), program.type_of(nodes[1]));
    assert_eq!(program.display_type(nodes[0]).as_deref(), Some("module { value: i32 }"));
    assert_eq!(program.display_type(nodes[1]).as_deref(), Some("module { value: i8 }"));
    assert!(program.display_def(&["M"]).unwrap().starts_with("forall ^T"));
}

/// 测试模板在引用处按需推断
#[test]
fn test_template_inferred_on_demand() {
    let program = check_modules(|b| {
        let f64_spec = b.named("f64");
        let inst = b.instantiate(&["M"], vec![TemplateArg::Type(f64_spec)]);
        let field = b.field(inst, "value");
        let items = vec![b.value_item("x", None, field)];
        let main = b.module("main", &[], items);
        vec![main, holder(b)]
    })
    .unwrap();
    assert_eq!(program.display_def(&["main", "x"]).as_deref(), Some("f64"));
}

/// 测试模板中的函数随实参具体化
#[test]
fn test_template_function() {
    let program = check_modules(|b| {
        let x = b.ident("x");
        let t = b.named("T");
        let param = b.param("x", Some(t));
        let id = b.lambda(vec![param], None, None, x);
        let id_item = b.value_item("id", None, id);
        let n = b.module("N", &["T"], vec![id_item]);

        let bool_spec = b.named("bool");
        let inst = b.instantiate(&["N"], vec![TemplateArg::Type(bool_spec)]);
        let f = b.field(inst, "id");
        let callee = b.ident("f");
        let arg = b.bool(true);
        let call = b.call(callee, vec![arg]);
        let items = vec![b.value_item("f", None, f), b.value_item("r", None, call)];
        vec![n, b.module("main", &[], items)]
    })
    .unwrap();

    assert_eq!(program.display_def(&["main", "f"]).as_deref(), Some("fn(bool) -> bool"));
    assert_eq!(program.display_def(&["main", "r"]).as_deref(), Some("bool"));
}

/// 测试值模板参数
#[test]
fn test_value_parameter() {
    let program = check_modules(|b| {
        let v = sized(b);
        let three = b.int_suffixed(3, false, 32);
        let inst = b.instantiate(&["V"], vec![TemplateArg::Value(three)]);
        let size = b.field(inst, "size");
        let items = vec![b.value_item("s", None, size)];
        vec![v, b.module("main", &[], items)]
    })
    .unwrap();
    assert_eq!(program.display_def(&["main", "s"]).as_deref(), Some("u32"));
}

/// 测试值实参必须是 Tot
#[test]
fn test_value_argument_must_be_tot() {
    let err = check_modules(|b| {
        let v = sized(b);
        let one = b.int(1);
        let binding = b.let_("x", None, one);
        let target = b.ident("x");
        let two = b.int(2);
        let assign = b.assign(target, two);
        let tail = b.ident("x");
        let chain = b.chain(None, vec![binding, assign], Some(tail));
        let inst = b.instantiate(&["V"], vec![TemplateArg::Value(chain)]);
        let size = b.field(inst, "size");
        let items = vec![b.value_item("s", None, size)];
        vec![v, b.module("main", &[], items)]
    })
    .unwrap_err();
    assert!(template_reason(err).contains("must be Tot"));
}

/// 测试模板实参个数不符
#[test]
fn test_arity_mismatch() {
    let err = check_modules(|b| {
        let m = holder(b);
        let int32 = b.named("int32");
        let int8 = b.named("int8");
        let inst = b.instantiate(&["M"], vec![TemplateArg::Type(int32), TemplateArg::Type(int8)]);
        let field = b.field(inst, "value");
        let items = vec![b.value_item("a", None, field)];
        vec![m, b.module("main", &[], items)]
    })
    .unwrap_err();
    assert_eq!(template_reason(err), "expected 1 template argument(s), found 2");
}

/// 测试类型参数收到值实参
#[test]
fn test_universe_mismatch() {
    let err = check_modules(|b| {
        let m = holder(b);
        let one = b.int(1);
        let inst = b.instantiate(&["M"], vec![TemplateArg::Value(one)]);
        let field = b.field(inst, "value");
        let items = vec![b.value_item("a", None, field)];
        vec![m, b.module("main", &[], items)]
    })
    .unwrap_err();
    assert_eq!(template_reason(err), "argument for `T` must be a type, found a value");
}

/// 测试给非模板模块传实参
#[test]
fn test_arguments_to_plain_module() {
    let err = check_modules(|b| {
        let one = b.int(1);
        let x = b.value_item("x", None, one);
        let plain = b.module("P", &[], vec![x]);
        let int32 = b.named("int32");
        let inst = b.instantiate(&["P"], vec![TemplateArg::Type(int32)]);
        let field = b.field(inst, "x");
        let items = vec![b.value_item("a", None, field)];
        vec![plain, b.module("main", &[], items)]
    })
    .unwrap_err();
    assert_eq!(template_reason(err), "the module takes no template parameters");
}

/// 测试模板体内实例化自身
#[test]
fn test_instantiate_while_inferring() {
    let err = check_modules(|b| {
        let t = b.named("T");
        let value = b.extern_item("value", t, "holder_value");
        let int32 = b.named("int32");
        let inst = b.instantiate(&["M"], vec![TemplateArg::Type(int32)]);
        let field = b.field(inst, "value");
        let again = b.value_item("again", None, field);
        vec![b.module("M", &["T"], vec![value, again])]
    })
    .unwrap_err();
    assert_eq!(template_reason(err), "the module is still being inferred");
}

/// 测试不带实参引用模板时参数保持未定
#[test]
fn test_bare_template_reference_is_ambiguous() {
    let err = check_modules(|b| {
        let m = holder(b);
        let base = b.ident("M");
        let field = b.field(base, "value");
        let items = vec![b.value_item("c", None, field)];
        vec![m, b.module("main", &[], items)]
    })
    .unwrap_err();
    assert!(matches!(err, TypeError::AmbiguousType { .. }));
}

/// 测试模板实例作为类型成员路径
#[test]
fn test_instantiated_type_member() {
    let program = check_modules(|b| {
        let t = b.named("T");
        let elem = b.named("T");
        let pair = b.tuple_type(vec![t, elem]);
        let pair_item = b.type_item("Pair", pair);
        let pairs = b.module("Pairs", &["T"], vec![pair_item]);

        let u16_spec = b.named("u16");
        let inst = b.instantiate_type(&["Pairs"], vec![TemplateArg::Type(u16_spec)]);
        let spec = b.member(inst, "Pair");
        let items = vec![b.int_suffixed(1, false, 16), b.int_suffixed(2, false, 16)];
        let value = b.tuple(items);
        let items = vec![b.value_item("p", Some(spec), value)];
        vec![pairs, b.module("main", &[], items)]
    })
    .unwrap();
    assert_eq!(program.display_def(&["main", "p"]).as_deref(), Some("(u16, u16)"));
}

/// 测试模板体内的运算符约束随每次实例化重新求解
#[test]
fn test_operator_constraints_follow_instantiation() {
    let program = check_modules(|b| {
        let n = subtractor(b);
        let int32 = b.named("int32");
        let inst = b.instantiate(&["N"], vec![TemplateArg::Type(int32)]);
        let f = b.field(inst, "sub");
        let callee = b.ident("f");
        let args = vec![b.int(1), b.int(2)];
        let call = b.call(callee, args);
        let f64_spec = b.named("f64");
        let inst = b.instantiate(&["N"], vec![TemplateArg::Type(f64_spec)]);
        let g = b.field(inst, "sub");
        let items = vec![
            b.value_item("f", None, f),
            b.value_item("r", None, call),
            b.value_item("g", None, g),
        ];
        vec![n, b.module("main", &[], items)]
    })
    .unwrap();

    assert_eq!(program.display_def(&["main", "f"]).as_deref(), Some("fn(i32, i32) -> i32"));
    assert_eq!(program.display_def(&["main", "r"]).as_deref(), Some("i32"));
    assert_eq!(program.display_def(&["main", "g"]).as_deref(), Some("fn(f64, f64) -> f64"));
}

/// 测试实参不满足模板体内的运算符约束
#[test]
fn test_operator_constraint_rejects_argument() {
    let err = check_modules(|b| {
        let n = subtractor(b);
        let str_spec = b.named("str");
        let inst = b.instantiate(&["N"], vec![TemplateArg::Type(str_spec)]);
        let f = b.field(inst, "sub");
        let items = vec![b.value_item("f", None, f)];
        vec![n, b.module("main", &[], items)]
    })
    .unwrap_err();
    match err {
        TypeError::Unification { source, .. } => {
            assert!(matches!(source.reason, MismatchReason::NoOperator(_)))
        }
        other => panic!("expected a unification error, got {other:?}"),
    }
}
