//! 统一错误定义

use thiserror::Error;

use super::effect::{ClosureSpec, Ses};
use super::store::{TypeId, TypeStore};

/// 统一失败的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MismatchReason {
    #[error("{left} vs {right}")]
    Kind {
        left: &'static str,
        right: &'static str,
    },
    #[error("different widths")]
    Width,
    #[error("expected {expected} elements, found {found}")]
    Arity { expected: usize, found: usize },
    #[error("field `{expected}` does not match field `{found}`")]
    FieldName { expected: String, found: String },
    #[error("field `{0}` is a type on one side and a value on the other")]
    TypeField(String),
    #[error("effect {left} is incompatible with {right}")]
    Effect { left: Ses, right: Ses },
    #[error("closure requirement `{left}` is incompatible with `{right}`")]
    Closure {
        left: ClosureSpec,
        right: ClosureSpec,
    },
    #[error("an immutable target cannot take a mutable source")]
    MutableSource,
    #[error("a mutable target cannot take an immutable source")]
    ImmutableSource,
    #[error("occurs check: the variable appears inside its own replacement")]
    OccursCheck,
    #[error("conflicting bindings for `{0}` while merging substitutions")]
    Conflict(String),
    #[error("operator `{0}` is not defined for this type")]
    NoOperator(String),
    #[error("no field `{0}`")]
    NoField(String),
    #[error("the type cannot be indexed")]
    NotIndexable,
    #[error("index must be an integer")]
    NonIntegerIndex,
    #[error("the type cannot be called")]
    NotCallable,
    #[error("invalid cast")]
    InvalidCast,
}

/// 统一错误：两个类型无法调和
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot unify `{left}` with `{right}`: {reason}")]
pub struct UnifyError {
    pub left: String,
    pub right: String,
    pub reason: MismatchReason,
}

impl UnifyError {
    /// 渲染两侧类型并构造错误
    pub fn new(
        store: &TypeStore,
        left: TypeId,
        right: TypeId,
        reason: MismatchReason,
    ) -> Self {
        UnifyError {
            left: store.display(left).to_string(),
            right: store.display(right).to_string(),
            reason,
        }
    }

    /// 是否是 occurs check 失败
    pub fn is_occurs_check(&self) -> bool {
        self.reason == MismatchReason::OccursCheck
    }
}

/// 类型系统内部结果
pub type UnifyResult<T> = Result<T, UnifyError>;
