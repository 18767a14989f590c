//! Error locations and messages

use sema_core::frontend::core::ast::TemplateArg;
use sema_core::util::span::FileId;
use sema_core::{check_program, AstBuilder, Program, TypeError};

#[test]
fn test_error_points_into_source_file() {
    let mut b = AstBuilder::for_file(FileId(4));
    let z = b.ident("z");
    let y = b.value_item("y", None, z);
    let main = b.module("main", &[], vec![y]);

    let err = check_program(&Program { modules: vec![main] }).unwrap_err();
    assert_eq!(err.span().file, FileId(4));
    let message = err.to_string();
    assert!(message.starts_with("#4["));
    assert!(message.contains("undefined symbol `z`"));
}

#[test]
fn test_template_error_message() {
    let mut b = AstBuilder::new();
    let t = b.named("T");
    let value = b.extern_item("value", t, "v");
    let m = b.module("M", &["T"], vec![value]);
    let one = b.int(1);
    let inst = b.instantiate(&["M"], vec![TemplateArg::Value(one)]);
    let field = b.field(inst, "value");
    let a = b.value_item("a", None, field);
    let main = b.module("main", &[], vec![a]);

    let err = check_program(&Program { modules: vec![m, main] }).unwrap_err();
    assert!(matches!(err, TypeError::TemplateMismatch { .. }));
    assert!(err
        .to_string()
        .contains("cannot instantiate template module `M`: argument for `T` must be a type, found a value"));
}

#[test]
fn test_unification_message_names_both_types() {
    let mut b = AstBuilder::new();
    let flag = b.bool(true);
    let spec = b.named("f64");
    let v = b.value_item("v", Some(spec), flag);
    let main = b.module("main", &[], vec![v]);

    let err = check_program(&Program { modules: vec![main] }).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("cannot unify `f64` with `bool`"));
}
