//! 模块推断测试

use super::{check_modules, program_of};
use crate::frontend::core::ast::{AstBuilder, BinOp, ModuleDecl, Universe};
use crate::frontend::core::type_system::{Kind, MismatchReason};
use crate::frontend::typecheck::{check_program, TypeError};

/// `module outer { module inner { v := 7 }; w := inner.v }`
fn nested(b: &mut AstBuilder) -> ModuleDecl {
    let seven = b.int(7);
    let v = b.value_item("v", None, seven);
    let inner = b.module("inner", &[], vec![v]);
    let inner_item = b.module_item(inner);
    let base = b.ident("inner");
    let field = b.field(base, "v");
    let w = b.value_item("w", None, field);
    b.module("outer", &[], vec![inner_item, w])
}

/// 测试模块之间的循环引用
#[test]
fn test_cyclic_modules() {
    let program = check_modules(|b| {
        let one = b.int(1);
        let a = b.value_item("a", None, one);
        let base = b.ident("B");
        let field = b.field(base, "b");
        let c = b.value_item("c", None, field);
        let module_a = b.module("A", &[], vec![a, c]);

        let base = b.ident("A");
        let field = b.field(base, "a");
        let two = b.int(2);
        let sum = b.binary(BinOp::Mul, field, two);
        let item_b = b.value_item("b", None, sum);
        let module_b = b.module("B", &[], vec![item_b]);
        vec![module_a, module_b]
    })
    .unwrap();

    assert_eq!(program.display_def(&["A", "c"]).as_deref(), Some("i32"));
    assert_eq!(program.display_def(&["B", "b"]).as_deref(), Some("i32"));
    assert_eq!(
        program.display_def(&["A"]).as_deref(),
        Some("module { a: i32, c: i32 }")
    );
    assert_eq!(program.reseeded.len(), 2);
    for (&placeholder, &module) in &program.reseeded {
        assert_eq!(program.store.kind(placeholder), Kind::FreeVar);
        assert_eq!(program.store.kind(module), Kind::Module);
    }
}

/// 测试模块类型记录在声明节点上
#[test]
fn test_module_type_recorded() {
    let mut b = AstBuilder::new();
    let flag = b.bool(false);
    let item = b.value_item("flag", None, flag);
    let spec = b.named("str");
    let ext = b.extern_item("name", spec, "host_name");
    let decl = b.module("config", &[], vec![item, ext]);
    let id = decl.id;
    let program = check_program(&program_of(vec![decl])).unwrap();

    assert_eq!(
        program.display_type(id).as_deref(),
        Some("module { flag: bool, name: str }")
    );
    assert_eq!(
        program.lookup(&["config", "name"]).unwrap().extern_tag.as_deref(),
        Some("host_name")
    );
}

/// 测试嵌套模块路径
#[test]
fn test_nested_module_paths() {
    let program = check_modules(|b| {
        let outer = nested(b);
        let base = b.ident("outer");
        let inner = b.field(base, "inner");
        let field = b.field(inner, "v");
        let items = vec![b.value_item("z", None, field)];
        vec![outer, b.module("main", &[], items)]
    })
    .unwrap();

    assert_eq!(program.display_def(&["outer", "w"]).as_deref(), Some("i32"));
    assert_eq!(program.display_def(&["outer", "inner", "v"]).as_deref(), Some("i32"));
    assert_eq!(program.display_def(&["main", "z"]).as_deref(), Some("i32"));
}

/// 测试模块不能当作值
#[test]
fn test_module_used_as_value() {
    let err = check_modules(|b| {
        let outer = nested(b);
        let base = b.ident("outer");
        let items = vec![b.value_item("x", None, base)];
        vec![outer, b.module("main", &[], items)]
    })
    .unwrap_err();
    assert!(matches!(
        err,
        TypeError::WrongUniverse {
            expected: Universe::Value,
            found: Universe::Module,
            ..
        }
    ));
}

/// 测试访问模块中不存在的成员
#[test]
fn test_unknown_member() {
    let err = check_modules(|b| {
        let outer = nested(b);
        let base = b.ident("outer");
        let field = b.field(base, "nope");
        let items = vec![b.value_item("z", None, field)];
        vec![outer, b.module("main", &[], items)]
    })
    .unwrap_err();
    match err {
        TypeError::Unification { source, .. } => {
            assert_eq!(source.reason, MismatchReason::NoField("nope".into()))
        }
        other => panic!("expected a unification error, got {other:?}"),
    }
}

/// `module shapes { type Point := struct { x: i32, y: i32 } }`
fn shapes(b: &mut AstBuilder) -> ModuleDecl {
    let x = b.named("i32");
    let y = b.named("i32");
    let point = b.struct_type(vec![("x", x), ("y", y)]);
    let item = b.type_item("Point", point);
    b.module("shapes", &[], vec![item])
}

/// 测试模块中的类型成员
#[test]
fn test_type_member() {
    let program = check_modules(|b| {
        let shapes = shapes(b);
        let base = b.named("shapes");
        let spec = b.member(base, "Point");
        let x = b.int(1);
        let y = b.int(2);
        let value = b.struct_lit(vec![("x", x), ("y", y)]);
        let items = vec![b.value_item("p", Some(spec), value)];
        vec![shapes, b.module("main", &[], items)]
    })
    .unwrap();
    assert_eq!(
        program.display_def(&["main", "p"]).as_deref(),
        Some("struct { x: i32, y: i32 }")
    );
    assert_eq!(
        program.display_def(&["shapes"]).as_deref(),
        Some("module { type Point: struct { x: i32, y: i32 } }")
    );
}

/// 测试类型成员不能在值位置访问
#[test]
fn test_type_member_in_value_position() {
    let err = check_modules(|b| {
        let shapes = shapes(b);
        let base = b.ident("shapes");
        let field = b.field(base, "Point");
        let items = vec![b.value_item("q", None, field)];
        vec![shapes, b.module("main", &[], items)]
    })
    .unwrap_err();
    assert!(matches!(
        err,
        TypeError::WrongUniverse {
            expected: Universe::Value,
            found: Universe::Type,
            ..
        }
    ));
}

/// 测试类型路径指向未定义的模块
#[test]
fn test_undefined_module_in_type_path() {
    let err = check_modules(|b| {
        let base = b.named("nothing");
        let spec = b.member(base, "Point");
        let one = b.int(1);
        let items = vec![b.value_item("p", Some(spec), one)];
        vec![b.module("main", &[], items)]
    })
    .unwrap_err();
    assert!(matches!(err, TypeError::UndefinedSymbol { ref name, .. } if name == "nothing"));
}

/// 测试同名模块
#[test]
fn test_duplicate_module() {
    let err = check_modules(|b| {
        let first = b.module("main", &[], vec![]);
        let second = b.module("main", &[], vec![]);
        vec![first, second]
    })
    .unwrap_err();
    assert!(matches!(err, TypeError::DoubleDefinition { ref name, .. } if name == "main"));
}

/// 测试同一模块中的重复项
#[test]
fn test_duplicate_item() {
    let err = check_modules(|b| {
        let one = b.int(1);
        let two = b.int(2);
        let items = vec![b.value_item("x", None, one), b.value_item("x", None, two)];
        vec![b.module("main", &[], items)]
    })
    .unwrap_err();
    assert!(matches!(err, TypeError::DoubleDefinition { ref name, .. } if name == "x"));
}

/// 测试内建类型名不能当作值
#[test]
fn test_builtin_type_as_value() {
    let err = check_modules(|b| {
        let base = b.ident("i32");
        let items = vec![b.value_item("x", None, base)];
        vec![b.module("main", &[], items)]
    })
    .unwrap_err();
    assert!(matches!(
        err,
        TypeError::WrongUniverse {
            expected: Universe::Value,
            found: Universe::Type,
            ..
        }
    ));
}
