//! 副作用与闭包规格格
//!
//! - `Ses`：副作用规格，全序 `Tot < Dv < ST < Exn < ML`，`Tot` 为底元；
//!   `Elim_AnyNonTot` 位于序之外，表示“调用方断言存在某个非 Tot 副作用，
//!   具体由被调用方的实际副作用决定”
//! - `ClosureSpec`：闭包规格，`Maybe` 是尚未观察到闭包需求时的通配

use std::fmt;

/// 副作用规格（Side-Effect Specifier）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ses {
    /// 全函数，无副作用
    Tot,
    /// 可能发散
    Dv,
    /// 读写状态
    St,
    /// 可能抛出异常
    Exn,
    /// 任意副作用
    Ml,
    /// 任意非 Tot 副作用，待被调用方确定
    ElimAnyNonTot,
}

impl Ses {
    /// 在全序中的位置；`ElimAnyNonTot` 不在序中
    fn rank(self) -> Option<u8> {
        match self {
            Ses::Tot => Some(0),
            Ses::Dv => Some(1),
            Ses::St => Some(2),
            Ses::Exn => Some(3),
            Ses::Ml => Some(4),
            Ses::ElimAnyNonTot => None,
        }
    }

    /// 格的并
    pub fn join(
        self,
        other: Ses,
    ) -> Ses {
        unify_ses(self, other)
    }

    /// 多个副作用的并，空序列为 `Tot`
    pub fn join_all(effects: impl IntoIterator<Item = Ses>) -> Ses {
        effects.into_iter().fold(Ses::Tot, unify_ses)
    }

    /// 两个函数类型的副作用规格能否统一
    ///
    /// `ElimAnyNonTot` 与任何规格相容，其余必须完全相同
    pub fn is_compatible(
        self,
        other: Ses,
    ) -> bool {
        self == other || self == Ses::ElimAnyNonTot || other == Ses::ElimAnyNonTot
    }
}

impl fmt::Display for Ses {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Ses::Tot => "Tot",
            Ses::Dv => "Dv",
            Ses::St => "ST",
            Ses::Exn => "Exn",
            Ses::Ml => "ML",
            Ses::ElimAnyNonTot => "Elim_AnyNonTot",
        };
        write!(f, "{}", name)
    }
}

/// 副作用规格的统一（格的并）
///
/// 对任意一对规格都有定义：
/// - `Tot` 是单位元
/// - `ElimAnyNonTot` 遇到具体的非 Tot 规格时让位于它，遇到 `Tot` 时吸收它
/// - 其余取全序中的较大者
pub fn unify_ses(
    a: Ses,
    b: Ses,
) -> Ses {
    match (a, b) {
        (Ses::ElimAnyNonTot, Ses::Tot) | (Ses::Tot, Ses::ElimAnyNonTot) => Ses::ElimAnyNonTot,
        (Ses::ElimAnyNonTot, other) | (other, Ses::ElimAnyNonTot) => other,
        (x, y) => {
            if x.rank() >= y.rank() {
                x
            } else {
                y
            }
        }
    }
}

/// 单向包含检查：`actual` 是否不超过上限 `allowed`
///
/// 任何一方为 `ElimAnyNonTot` 时都推测性地通过
pub fn compare_ses(
    allowed: Ses,
    actual: Ses,
) -> bool {
    match (allowed.rank(), actual.rank()) {
        (Some(allowed), Some(actual)) => actual <= allowed,
        _ => true,
    }
}

/// 闭包规格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureSpec {
    /// 不需要捕获上下文
    No,
    /// 需要捕获上下文
    Yes,
    /// 尚未确定
    Maybe,
}

impl ClosureSpec {
    /// 定型：尚未确定的按不需要处理
    pub fn finalize(self) -> ClosureSpec {
        match self {
            ClosureSpec::Maybe => ClosureSpec::No,
            other => other,
        }
    }
}

impl fmt::Display for ClosureSpec {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            ClosureSpec::No => "no",
            ClosureSpec::Yes => "yes",
            ClosureSpec::Maybe => "maybe",
        };
        write!(f, "{}", name)
    }
}

/// 闭包规格的统一：`Maybe` 与任何规格统一并得到对方，`No` 与 `Yes` 不相容
pub fn unify_closure_spec(
    a: ClosureSpec,
    b: ClosureSpec,
) -> Option<ClosureSpec> {
    match (a, b) {
        (ClosureSpec::Maybe, other) | (other, ClosureSpec::Maybe) => Some(other),
        (x, y) if x == y => Some(x),
        _ => None,
    }
}
