//! 类型检查错误
//!
//! 定义类型检查过程中的所有错误类型。每种错误都是致命的：
//! 第一个错误即终止整个类型检查阶段。

use thiserror::Error;

use crate::frontend::core::ast::Universe;
use crate::frontend::core::type_system::{Ses, UnifyError};
use crate::util::span::Span;

/// 类型错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// 所有外层上下文中都找不到名称
    #[error("{span}: undefined symbol `{name}`")]
    UndefinedSymbol { name: String, span: Span },

    /// 名称的宇宙与使用位置不符
    #[error("{span}: `{name}` is a {found}, expected a {expected}")]
    WrongUniverse {
        name: String,
        expected: Universe,
        found: Universe,
        span: Span,
    },

    /// 同一上下文中重复定义
    #[error("{span}: `{name}` is already defined at {previous}")]
    DoubleDefinition {
        name: String,
        previous: Span,
        span: Span,
    },

    /// 两个具体类型无法调和，或 occurs check 失败
    #[error("{span}: {source}")]
    Unification {
        #[source]
        source: UnifyError,
        span: Span,
    },

    /// 延迟约束在一整轮中没有任何进展
    #[error("{span}: type inference stalled on {} unresolved constraint(s):\n  {}", .orders.len(), .orders.join("\n  "))]
    StalledSolver { orders: Vec<String>, span: Span },

    /// 模板模块实例化失败
    #[error("{span}: cannot instantiate template module `{module}`: {reason}")]
    TemplateMismatch {
        module: String,
        reason: String,
        span: Span,
    },

    /// 表达式的副作用超过了所在上下文的上限
    #[error("{span}: effect {actual} exceeds the allowed effect {allowed}")]
    EffectViolation {
        allowed: Ses,
        actual: Ses,
        span: Span,
    },

    /// 求解结束后类型仍未确定
    #[error("{span}: cannot infer a concrete type, found `{ty}`")]
    AmbiguousType { ty: String, span: Span },

    /// 配置不合法，推断未开始
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TypeError {
    /// 获取错误的位置
    pub fn span(&self) -> Span {
        match self {
            TypeError::UndefinedSymbol { span, .. }
            | TypeError::WrongUniverse { span, .. }
            | TypeError::DoubleDefinition { span, .. }
            | TypeError::Unification { span, .. }
            | TypeError::StalledSolver { span, .. }
            | TypeError::TemplateMismatch { span, .. }
            | TypeError::EffectViolation { span, .. }
            | TypeError::AmbiguousType { span, .. } => *span,
            TypeError::InvalidConfig(_) => Span::dummy(),
        }
    }

    /// 创建未定义符号错误
    pub fn undefined(
        name: &str,
        span: Span,
    ) -> Self {
        TypeError::UndefinedSymbol {
            name: name.to_string(),
            span,
        }
    }

    /// 创建宇宙不符错误
    pub fn wrong_universe(
        name: &str,
        expected: Universe,
        found: Universe,
        span: Span,
    ) -> Self {
        TypeError::WrongUniverse {
            name: name.to_string(),
            expected,
            found,
            span,
        }
    }

    /// 创建合一错误
    pub fn unification(
        source: UnifyError,
        span: Span,
    ) -> Self {
        TypeError::Unification { source, span }
    }

    /// 创建模板实例化错误
    pub fn template(
        module: &str,
        reason: impl Into<String>,
        span: Span,
    ) -> Self {
        TypeError::TemplateMismatch {
            module: module.to_string(),
            reason: reason.into(),
            span,
        }
    }

    /// 是否是合一错误
    pub fn is_unification(&self) -> bool {
        matches!(self, TypeError::Unification { .. })
    }
}

/// 类型检查结果
pub type TypeResult<T> = Result<T, TypeError>;
