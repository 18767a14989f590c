//! Typing under non-default configuration

use std::fs;

use sema_core::frontend::core::ast::BinOp;
use sema_core::util::config::InferConfig;
use sema_core::util::logger::{self, LogLevel};
use sema_core::{check_program_with_config, AstBuilder, Program, TypeError};
use tempfile::TempDir;

/// `main { x := 3; h := 0.5; get := fn(i) { [1, 2][i] } }`
fn sample() -> Program {
    let mut b = AstBuilder::new();
    let three = b.int(3);
    let x = b.value_item("x", None, three);
    let half = b.float(0.5, None);
    let h = b.value_item("h", None, half);
    let items = vec![b.int(1), b.int(2)];
    let arr = b.array_lit(items);
    let i = b.ident("i");
    let index = b.index(arr, i);
    let param = b.param("i", None);
    let get = b.lambda(vec![param], None, None, index);
    let get = b.value_item("get", None, get);
    Program {
        modules: vec![b.module("main", &[], vec![x, h, get])],
    }
}

#[test]
fn test_widths_from_config_file() {
    logger::init_with_level(LogLevel::Warn);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sema.toml");
    fs::write(
        &path,
        "default_int_width = 64\ndefault_float_width = 32\nindex_width = 32\n",
    )
    .unwrap();
    let config = InferConfig::load(&path).unwrap();

    let typed = check_program_with_config(&sample(), config).unwrap();
    assert_eq!(typed.display_def(&["main", "x"]).as_deref(), Some("i64"));
    assert_eq!(typed.display_def(&["main", "h"]).as_deref(), Some("f32"));
    assert_eq!(typed.display_def(&["main", "get"]).as_deref(), Some("fn(u32) -> i64"));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = InferConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, InferConfig::default());

    let typed = check_program_with_config(&sample(), config).unwrap();
    assert_eq!(typed.display_def(&["main", "get"]).as_deref(), Some("fn(u64) -> i32"));
}

#[test]
fn test_invalid_width_rejected() {
    assert!(InferConfig::from_toml_str("default_int_width = 12").is_err());
    assert!(InferConfig::from_toml_str("index_width = 1").is_err());
}

#[test]
fn test_hand_built_config_validated_before_typing() {
    let config = InferConfig {
        index_width: 1,
        ..InferConfig::default()
    };
    let err = check_program_with_config(&sample(), config).unwrap_err();
    match err {
        TypeError::InvalidConfig(message) => assert!(message.contains("index_width")),
        other => panic!("expected an invalid configuration error, got {other:?}"),
    }
}

#[test]
fn test_substitution_tracing() {
    logger::init_with_level(LogLevel::Trace);
    let config = InferConfig {
        trace_substitutions: true,
        ..InferConfig::default()
    };
    let mut b = AstBuilder::new();
    let x = b.ident("x");
    let one = b.int(1);
    let sum = b.binary(BinOp::Add, x, one);
    let y = b.value_item("y", None, sum);
    let five = b.int_suffixed(5, true, 32);
    let x = b.value_item("x", None, five);
    let program = Program {
        modules: vec![b.module("main", &[], vec![y, x])],
    };

    let typed = check_program_with_config(&program, config).unwrap();
    assert_eq!(typed.display_def(&["main", "y"]).as_deref(), Some("i32"));
}
