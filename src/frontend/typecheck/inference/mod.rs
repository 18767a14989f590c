//! 推断遍历
//!
//! 遍历语法树，生成合一与延迟约束，替换立即生效。
//! - `expressions`：表达式
//! - `statements`：链表达式中的语句
//! - `type_specs`：类型标注
//! - `modules`：模块体、模块引用、重播种

mod expressions;
mod modules;
mod statements;
mod type_specs;

use crate::frontend::core::ast::Literal;
use crate::frontend::core::type_system::{AtomicShape, Ses, TypeId};

use super::engine::Engine;

/// 一个表达式的推断结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Typed {
    pub ty: TypeId,
    pub ses: Ses,
}

impl Typed {
    pub fn new(
        ty: TypeId,
        ses: Ses,
    ) -> Self {
        Typed { ty, ses }
    }

    /// 无副作用
    pub fn pure(ty: TypeId) -> Self {
        Typed { ty, ses: Ses::Tot }
    }
}

impl<'a> Engine<'a> {
    /// 字面量类型；无后缀的数字取配置中的默认宽度
    pub(crate) fn literal_type(
        &mut self,
        literal: &Literal,
    ) -> TypeId {
        let shape = match literal {
            Literal::Int {
                suffix: Some(suffix),
                ..
            } if suffix.signed => AtomicShape::Signed(suffix.width),
            Literal::Int {
                suffix: Some(suffix),
                ..
            } => AtomicShape::Unsigned(suffix.width),
            Literal::Int { suffix: None, .. } => AtomicShape::Signed(self.config.default_int_width),
            Literal::Float { width, .. } => AtomicShape::Float(width.unwrap_or(self.config.default_float_width)),
            Literal::Bool(_) => return TypeId::BOOL,
            Literal::Str(_) => return TypeId::STRING,
            Literal::Unit => return TypeId::UNIT,
        };
        self.store.mint_atomic(shape)
    }
}
