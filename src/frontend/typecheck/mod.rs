//! 类型检查器模块
//!
//! 对整棵语法森林做 Hindley-Milner 风格的类型推断，支持：
//! - 运算符重载、字段投影、索引、类型转换的延迟约束
//! - 指针/数组/切片的可变性
//! - 副作用规格与闭包捕获分析
//! - 模板（泛型）模块实例化
//!
//! 第一个错误即终止推断。

pub mod context;
pub mod deferred;
pub mod engine;
pub mod errors;
pub mod finalize;
mod inference;
pub mod operators;
mod seed;
mod template;

#[cfg(test)]
mod tests;

pub use context::{
    Context, ContextId, ContextKind, ContextTree, DefFlags, DefId, Definition, FnId,
};
pub use deferred::{DeferredList, DeferredOrder, OrderKind, PassReport, Progress};
pub use engine::Engine;
pub use errors::{TypeError, TypeResult};
pub use finalize::{NodeTyping, TypedProgram};
pub use operators::{binary_rule, unary_rule, OpResult, OpRule, OperandClass};

use crate::frontend::core::ast::Program;
use crate::util::config::InferConfig;

/// 以默认配置检查整个程序
pub fn check_program(program: &Program) -> TypeResult<TypedProgram> {
    Engine::new(program).run()
}

/// 以指定配置检查整个程序
pub fn check_program_with_config(
    program: &Program,
    config: InferConfig,
) -> TypeResult<TypedProgram> {
    Engine::with_config(program, config)?.run()
}
