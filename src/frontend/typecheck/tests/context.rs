//! 上下文树测试

use crate::frontend::core::ast::{NodeId, Universe};
use crate::frontend::core::type_system::{Ses, TypeId};
use crate::frontend::typecheck::context::{ContextKind, ContextTree, Definition};
use crate::util::span::Span;

fn value(name: &str) -> Definition {
    Definition::new(name, TypeId::I32, Universe::Value, Span::dummy())
}

/// 测试查找沿父链向上
#[test]
fn test_lookup_walks_parents() {
    let mut tree = ContextTree::new();
    let root = tree.root();
    let module = tree.push(root, ContextKind::Module);
    let chain = tree.push(module, ContextKind::Chain);
    let x = tree.try_define(module, value("x").global()).unwrap();

    assert_eq!(tree.lookup(chain, "x"), Some(x));
    assert_eq!(tree.lookup_local(chain, "x"), None);
    assert_eq!(tree.lookup(root, "x"), None);
}

/// 测试内层定义遮蔽外层
#[test]
fn test_inner_definition_shadows() {
    let mut tree = ContextTree::new();
    let module = tree.push(tree.root(), ContextKind::Module);
    let chain = tree.push(module, ContextKind::Chain);
    let outer = tree.try_define(module, value("x")).unwrap();
    let inner = tree.try_define(chain, value("x")).unwrap();

    assert_ne!(outer, inner);
    assert_eq!(tree.lookup(chain, "x"), Some(inner));
    assert_eq!(tree.lookup(module, "x"), Some(outer));
}

/// 测试同一上下文中重复定义返回已有定义
#[test]
fn test_double_define_returns_existing() {
    let mut tree = ContextTree::new();
    let module = tree.push(tree.root(), ContextKind::Module);
    let first = tree.try_define(module, value("x")).unwrap();
    assert_eq!(tree.try_define(module, value("x")), Err(first));
}

/// 测试引用外层函数的局部定义记录为捕获
#[test]
fn test_capture_recorded() {
    let mut tree = ContextTree::new();
    let module = tree.push(tree.root(), ContextKind::Module);
    let (outer_fn, outer) = tree.push_function(module, NodeId(1));
    let x = tree.try_define(outer, value("x")).unwrap();
    let (inner_fn, inner) = tree.push_function(outer, NodeId(2));

    assert_eq!(tree.resolve(inner, "x"), Some(x));
    assert_eq!(tree.captures(inner_fn).get("x"), Some(&x));
    assert!(tree.captures(outer_fn).is_empty());
}

/// 测试捕获沿函数链传播到中间函数
#[test]
fn test_capture_propagates_through_intermediate_functions() {
    let mut tree = ContextTree::new();
    let module = tree.push(tree.root(), ContextKind::Module);
    let (outer_fn, outer) = tree.push_function(module, NodeId(1));
    let x = tree.try_define(outer, value("x")).unwrap();
    let (middle_fn, middle) = tree.push_function(outer, NodeId(2));
    let chain = tree.push(middle, ContextKind::Chain);
    let (inner_fn, inner) = tree.push_function(chain, NodeId(3));

    tree.resolve(inner, "x");
    assert!(tree.captures(inner_fn).contains_key("x"));
    assert!(tree.captures(middle_fn).contains_key("x"));
    assert!(!tree.captures(outer_fn).contains_key("x"));

    let nodes: Vec<NodeId> = tree
        .lambda_captures()
        .filter(|(_, captures)| !captures.is_empty())
        .map(|(node, _)| node)
        .collect();
    assert_eq!(nodes, vec![NodeId(2), NodeId(3)]);
}

/// 测试全局定义不构成捕获
#[test]
fn test_global_is_not_captured() {
    let mut tree = ContextTree::new();
    let module = tree.push(tree.root(), ContextKind::Module);
    tree.try_define(module, value("g").global()).unwrap();
    let (f, body) = tree.push_function(module, NodeId(1));

    assert!(tree.resolve(body, "g").is_some());
    assert!(tree.captures(f).is_empty());
}

/// 测试副作用上限不越过 lambda 边界
#[test]
fn test_ceiling_stops_at_lambda() {
    let mut tree = ContextTree::new();
    let module = tree.push(tree.root(), ContextKind::Module);
    let chain = tree.push(module, ContextKind::Chain);
    tree.context_mut(chain).ceiling = Some(Ses::Tot);
    let inner = tree.push(chain, ContextKind::Chain);
    let (_, body) = tree.push_function(inner, NodeId(1));
    let nested = tree.push(body, ContextKind::Chain);

    assert_eq!(tree.ceiling(inner), Some(Ses::Tot));
    assert_eq!(tree.ceiling(nested), None);
    assert_eq!(tree.ceiling(module), None);
}

/// 测试返回类型槽取最近的 lambda
#[test]
fn test_return_slot_nearest_lambda() {
    let mut tree = ContextTree::new();
    let module = tree.push(tree.root(), ContextKind::Module);
    let (_, body) = tree.push_function(module, NodeId(1));
    tree.context_mut(body).return_slot = Some(TypeId::BOOL);
    let chain = tree.push(body, ContextKind::Chain);

    assert_eq!(tree.return_slot(chain), Some(TypeId::BOOL));
    assert_eq!(tree.return_slot(module), None);
    assert!(tree.is_within(chain, module));
    assert!(!tree.is_within(module, chain));
}
