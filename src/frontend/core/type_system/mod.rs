//! 类型系统子模块
//!
//! 将类型系统拆分为多个子模块：
//! - store: TID 驻留表与类型种类
//! - effect: 副作用规格与闭包规格格
//! - substitute: 类型替换与组合
//! - scheme: 类型方案（实例化 / 泛化）
//! - unify: 合一算法
//! - error: 合一错误定义

pub mod effect;
pub mod error;
pub mod scheme;
pub mod store;
pub mod substitute;
pub mod unify;

#[cfg(test)]
mod tests;

// 重新导出主要类型
pub use effect::{compare_ses, unify_closure_spec, unify_ses, ClosureSpec, Ses};
pub use error::{MismatchReason, UnifyError, UnifyResult};
pub use scheme::Scheme;
pub use store::{AtomicShape, Element, Elements, FnSpec, Kind, TypeDisplay, TypeId, TypeStore};
pub use substitute::{merge_specific, Substitution};
pub use unify::{unify, unify_all, unify_with, Unifier, UnifyOptions};
