//! 运算符重载表
//!
//! (运算符, 操作数种类) → 结果 的固定映射。

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::frontend::core::ast::{BinOp, UnOp};
use crate::frontend::core::type_system::{Kind, TypeId, TypeStore};

use OperandClass as C;

/// 运算结果的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    /// 与操作数相同
    Same,
    /// bool
    Bool,
    /// 指针的被指类型
    Pointee,
}

/// 操作数可接受的类型类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandClass {
    Signed,
    /// 宽度大于 1 的无符号整数
    Unsigned,
    Bool,
    Float,
    String,
    Pointer,
    Unit,
}

impl OperandClass {
    /// 类型所属类别；变量及其他复合类型没有类别
    pub fn of(
        store: &TypeStore,
        tid: TypeId,
    ) -> Option<OperandClass> {
        match store.kind(tid) {
            Kind::SignedInt => Some(OperandClass::Signed),
            Kind::UnsignedInt if store.is_bool(tid) => Some(OperandClass::Bool),
            Kind::UnsignedInt => Some(OperandClass::Unsigned),
            Kind::Float => Some(OperandClass::Float),
            Kind::String => Some(OperandClass::String),
            Kind::Pointer => Some(OperandClass::Pointer),
            Kind::Unit => Some(OperandClass::Unit),
            _ => None,
        }
    }
}

/// 一条运算符规则
#[derive(Debug, Clone)]
pub struct OpRule {
    pub operands: &'static [OperandClass],
    pub result: OpResult,
    /// 两个操作数必须同类型
    pub symmetric: bool,
}

impl OpRule {
    pub fn accepts(
        &self,
        class: OperandClass,
    ) -> bool {
        self.operands.contains(&class)
    }
}

const INTEGERS: &[OperandClass] = &[C::Signed, C::Unsigned];
/// 位运算同时接受 bool（宽度为 1 的无符号整数）
const BITWISE: &[OperandClass] = &[C::Signed, C::Unsigned, C::Bool];
const ARITH: &[OperandClass] = &[C::Signed, C::Unsigned, C::Float];
const COMPARABLE: &[OperandClass] = &[C::Signed, C::Unsigned, C::Bool, C::Float];
const ADDABLE: &[OperandClass] = &[C::Signed, C::Unsigned, C::Float, C::String];
const EQUATABLE: &[OperandClass] = &[
    C::Signed,
    C::Unsigned,
    C::Bool,
    C::Float,
    C::String,
    C::Pointer,
    C::Unit,
];
const BOOLS: &[OperandClass] = &[C::Bool];
const NEGATABLE: &[OperandClass] = &[C::Signed, C::Float];
const POINTERS: &[OperandClass] = &[C::Pointer];

fn rule(
    operands: &'static [OperandClass],
    result: OpResult,
    symmetric: bool,
) -> OpRule {
    OpRule {
        operands,
        result,
        symmetric,
    }
}

static BINARY: Lazy<HashMap<BinOp, OpRule>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(BinOp::Add, rule(ADDABLE, OpResult::Same, true));
    for op in [BinOp::Sub, BinOp::Mul, BinOp::Div] {
        table.insert(op, rule(ARITH, OpResult::Same, true));
    }
    table.insert(BinOp::Mod, rule(INTEGERS, OpResult::Same, true));
    for op in [BinOp::BitAnd, BinOp::BitOr, BinOp::BitXor] {
        table.insert(op, rule(BITWISE, OpResult::Same, true));
    }
    // 移位：右操作数可以是任意整数
    for op in [BinOp::Shl, BinOp::Shr] {
        table.insert(op, rule(BITWISE, OpResult::Same, false));
    }
    for op in [BinOp::Lt, BinOp::Le, BinOp::Gt, BinOp::Ge] {
        table.insert(op, rule(COMPARABLE, OpResult::Bool, true));
    }
    for op in [BinOp::Eq, BinOp::Neq] {
        table.insert(op, rule(EQUATABLE, OpResult::Bool, true));
    }
    for op in [BinOp::And, BinOp::Or] {
        table.insert(op, rule(BOOLS, OpResult::Bool, true));
    }
    table
});

static UNARY: Lazy<HashMap<UnOp, OpRule>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(UnOp::Neg, rule(NEGATABLE, OpResult::Same, false));
    table.insert(UnOp::Not, rule(BOOLS, OpResult::Bool, false));
    table.insert(UnOp::BitNot, rule(BITWISE, OpResult::Same, false));
    table.insert(UnOp::Deref, rule(POINTERS, OpResult::Pointee, false));
    table
});

/// 二元运算符规则
pub fn binary_rule(op: BinOp) -> &'static OpRule {
    &BINARY[&op]
}

/// 一元运算符规则
pub fn unary_rule(op: UnOp) -> &'static OpRule {
    &UNARY[&op]
}
