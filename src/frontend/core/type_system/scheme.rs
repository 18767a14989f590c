//! 类型方案（多态类型）
//!
//! `Scheme` = 约束变量列表 + 主体 TID。没有约束变量的方案是单态的。

use std::collections::HashSet;

use super::store::{Kind, TypeId, TypeStore};
use super::substitute::Substitution;

/// 类型方案
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    /// 约束变量（量词）
    pub bound: Vec<TypeId>,
    /// 主体
    pub body: TypeId,
}

impl Scheme {
    /// 单态方案
    pub fn mono(body: TypeId) -> Self {
        Scheme {
            bound: Vec::new(),
            body,
        }
    }

    /// 带量词的方案
    pub fn new(
        bound: Vec<TypeId>,
        body: TypeId,
    ) -> Self {
        Scheme { bound, body }
    }

    /// 是否单态
    pub fn is_mono(&self) -> bool {
        self.bound.is_empty()
    }

    /// 实例化：为每个约束变量创建全新的自由变量
    ///
    /// 返回 (约束变量 → 新变量 的替换, 改写后的主体)。
    /// 同一方案的两次实例化永远不共享变量。
    pub fn instantiate(
        &self,
        store: &mut TypeStore,
    ) -> (Substitution, TypeId) {
        if self.is_mono() {
            return (Substitution::new(), self.body);
        }
        let sub = fresh_for(store, self.bound.iter().copied());
        let body = sub.rewrite(store, self.body);
        (sub, body)
    }

    /// 深度实例化：量词之外，主体中嵌套出现的约束变量也一并换新
    ///
    /// 替换中量词的绑定按声明顺序排在最前。
    pub fn instantiate_deep(
        &self,
        store: &mut TypeStore,
    ) -> (Substitution, TypeId) {
        let nested: Vec<TypeId> = store
            .vars(self.body)
            .iter()
            .copied()
            .filter(|v| store.kind(*v) == Kind::BoundVar && !self.bound.contains(v))
            .collect();
        let sub = fresh_for(store, self.bound.iter().copied().chain(nested));
        let body = sub.rewrite(store, self.body);
        (sub, body)
    }

    /// 泛化：量化主体中的约束变量，以及不在 `fixed` 中的自由变量
    ///
    /// 被量化的自由变量换成新的约束变量。
    pub fn generalize(
        store: &mut TypeStore,
        body: TypeId,
        fixed: &HashSet<TypeId>,
    ) -> Scheme {
        Self::generalize_recorded(store, body, fixed).0
    }

    /// 泛化，同时返回 自由变量 → 新约束变量 的替换
    ///
    /// 调用方用该替换改写仍持有旧自由变量的其他位置。
    pub fn generalize_recorded(
        store: &mut TypeStore,
        body: TypeId,
        fixed: &HashSet<TypeId>,
    ) -> (Scheme, Substitution) {
        let vars: Vec<TypeId> = store.vars(body).to_vec();
        let mut bound = Vec::new();
        let mut pairs = Vec::new();
        for var in vars {
            match store.kind(var) {
                Kind::BoundVar => bound.push(var),
                Kind::FreeVar if !fixed.contains(&var) => {
                    let label = store.label(var).unwrap_or("T").to_string();
                    let fresh = store.mint_bound_var(&label);
                    pairs.push((var, fresh));
                    bound.push(fresh);
                }
                _ => {}
            }
        }
        let sub = Substitution::from_pairs(pairs);
        let body = sub.rewrite(store, body);
        (Scheme { bound, body }, sub)
    }

    /// 以替换改写方案
    ///
    /// 量词被替换成非变量类型时从量词列表中移除。
    pub fn rewrite(
        &mut self,
        store: &mut TypeStore,
        sub: &Substitution,
    ) {
        if sub.is_empty() {
            return;
        }
        self.body = sub.rewrite(store, self.body);
        let mut bound = Vec::with_capacity(self.bound.len());
        for var in &self.bound {
            let target = sub.rewrite(store, *var);
            if store.kind(target) == Kind::BoundVar && !bound.contains(&target) {
                bound.push(target);
            }
        }
        self.bound = bound;
    }

    /// 主体中未被量化的自由变量
    pub fn free_vars(
        &self,
        store: &TypeStore,
    ) -> Vec<TypeId> {
        store
            .free_vars(self.body)
            .filter(|v| !self.bound.contains(v))
            .collect()
    }

    /// 渲染方案
    pub fn display(
        &self,
        store: &TypeStore,
    ) -> String {
        if self.is_mono() {
            return store.display(self.body).to_string();
        }
        let quantifiers: Vec<String> = self
            .bound
            .iter()
            .map(|v| store.display(*v).to_string())
            .collect();
        format!(
            "forall {}. {}",
            quantifiers.join(" "),
            store.display(self.body)
        )
    }
}

fn fresh_for(
    store: &mut TypeStore,
    vars: impl Iterator<Item = TypeId>,
) -> Substitution {
    let pairs: Vec<(TypeId, TypeId)> = vars
        .map(|var| {
            let label = store.label(var).unwrap_or("t").to_string();
            (var, store.mint_free_var(&label))
        })
        .collect();
    Substitution::from_pairs(pairs)
}
