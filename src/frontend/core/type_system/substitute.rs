//! 类型替换
//!
//! `Substitution` 是从变量 TID 到替换 TID 的有限映射：
//! - 不可变语义：组合与改写都返回新值
//! - `compose(later, earlier)` 等价于先应用 `earlier` 再应用 `later`
//! - `rewrite` 保持同一性：元素没有变化时返回原 TID

use std::fmt::Write as _;

use indexmap::IndexMap;
use tracing::trace;

use super::error::{MismatchReason, UnifyError, UnifyResult};
use super::store::{Elements, TypeId, TypeStore};

/// 类型替换映射（键只能是变量 TID）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: IndexMap<TypeId, TypeId>,
}

impl Substitution {
    /// 创建空替换
    pub fn new() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    /// 单个绑定；自映射 `{a: a}` 被容忍并丢弃
    pub fn singleton(
        var: TypeId,
        target: TypeId,
    ) -> Self {
        let mut bindings = IndexMap::new();
        if var != target {
            bindings.insert(var, target);
        }
        Self { bindings }
    }

    /// 由绑定序列构造（同一变量以后出现者为准）
    pub fn from_pairs(pairs: impl IntoIterator<Item = (TypeId, TypeId)>) -> Self {
        Self {
            bindings: pairs.into_iter().filter(|(v, t)| v != t).collect(),
        }
    }

    /// 获取绑定
    pub fn get(
        &self,
        var: TypeId,
    ) -> Option<TypeId> {
        self.bindings.get(&var).copied()
    }

    /// 是否绑定了变量
    pub fn contains(
        &self,
        var: TypeId,
    ) -> bool {
        self.bindings.contains_key(&var)
    }

    /// 遍历绑定
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, TypeId)> + '_ {
        self.bindings.iter().map(|(v, t)| (*v, *t))
    }

    /// 定义域
    pub fn domain(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.bindings.keys().copied()
    }

    /// 获取绑定数量
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 检查是否为空
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// 组合替换：结果等价于先应用 `earlier` 再应用 `later`
    ///
    /// 两侧绑定同一变量且目标不同时，较具体的目标胜出；
    /// 两个目标无法无损调和时报告冲突。
    pub fn compose(
        later: &Substitution,
        earlier: &Substitution,
        store: &mut TypeStore,
    ) -> UnifyResult<Substitution> {
        if earlier.is_empty() {
            return Ok(later.clone());
        }
        if later.is_empty() {
            return Ok(earlier.clone());
        }

        let mut bindings = IndexMap::with_capacity(earlier.len() + later.len());
        for (var, target) in earlier.iter() {
            bindings.insert(var, later.rewrite(store, target));
        }
        for (var, target) in later.iter() {
            match bindings.get(&var).copied() {
                None => {
                    bindings.insert(var, target);
                }
                Some(existing) if existing == target => {}
                Some(existing) => {
                    let merged = merge_specific(store, existing, target).map_err(|_| {
                        UnifyError::new(
                            store,
                            existing,
                            target,
                            MismatchReason::Conflict(store.display(var).to_string()),
                        )
                    })?;
                    bindings.insert(var, merged);
                }
            }
        }
        bindings.retain(|var, target| var != target);

        let result = Substitution { bindings };
        trace!(
            later = later.len(),
            earlier = earlier.len(),
            composed = result.len(),
            "composed substitution"
        );
        Ok(result)
    }

    /// 改写类型：递归替换变量出现
    ///
    /// 类型的变量集与定义域不相交时直接返回原 TID；
    /// 复合类型只有在某个元素确实改变时才重新驻留。
    pub fn rewrite(
        &self,
        store: &mut TypeStore,
        tid: TypeId,
    ) -> TypeId {
        if self.is_empty() || !self.touches(store, tid) {
            return tid;
        }
        if store.is_var(tid) {
            return self.get(tid).unwrap_or(tid);
        }
        let elements = store.elements(tid).clone();
        let mut changed = false;
        let rewritten: Elements = elements
            .iter()
            .map(|element| {
                let ty = self.rewrite(store, element.ty);
                changed |= ty != element.ty;
                element.with_ty(ty)
            })
            .collect();
        if changed {
            store.rebuild(tid, rewritten)
        } else {
            tid
        }
    }

    /// 原地改写一组 TID
    pub fn rewrite_all<'a>(
        &self,
        store: &mut TypeStore,
        tids: impl IntoIterator<Item = &'a mut TypeId>,
    ) {
        if self.is_empty() {
            return;
        }
        for tid in tids {
            *tid = self.rewrite(store, *tid);
        }
    }

    /// 类型的变量集是否与定义域相交
    pub fn touches(
        &self,
        store: &TypeStore,
        tid: TypeId,
    ) -> bool {
        store.vars(tid).iter().any(|v| self.bindings.contains_key(v))
    }

    /// 渲染替换（用于日志与错误信息）
    pub fn display(
        &self,
        store: &TypeStore,
    ) -> String {
        let mut out = String::from("{");
        for (i, (var, target)) in self.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} := {}", store.display(var), store.display(target));
        }
        out.push('}');
        out
    }
}

/// 合并同一变量的两个目标，较具体者胜出
///
/// - 变量总可以被更具体的类型覆盖
/// - 相同形状的复合类型逐元素合并
/// - 其余情况无法无损调和
pub fn merge_specific(
    store: &mut TypeStore,
    a: TypeId,
    b: TypeId,
) -> UnifyResult<TypeId> {
    if a == b {
        return Ok(a);
    }
    if store.is_var(a) {
        return Ok(b);
    }
    if store.is_var(b) {
        return Ok(a);
    }

    let (ka, kb) = (store.kind(a), store.kind(b));
    let same_shape = ka == kb
        && store.atom(a).is_none()
        && store.is_mutable(a) == store.is_mutable(b)
        && store.fn_spec(a) == store.fn_spec(b)
        && store.elements(a).len() == store.elements(b).len()
        && store
            .elements(a)
            .iter()
            .zip(store.elements(b).iter())
            .all(|(x, y)| x.name == y.name && x.is_type_field == y.is_type_field);
    if !same_shape {
        return Err(UnifyError::new(
            store,
            a,
            b,
            MismatchReason::Kind {
                left: ka.name(),
                right: kb.name(),
            },
        ));
    }

    let left = store.elements(a).clone();
    let right = store.elements(b).clone();
    let mut merged = Elements::new();
    for (x, y) in left.iter().zip(right.iter()) {
        merged.push(x.with_ty(merge_specific(store, x.ty, y.ty)?));
    }
    Ok(store.rebuild(a, merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::core::type_system::effect::{ClosureSpec, Ses};
    use crate::frontend::core::type_system::store::Kind;

    #[test]
    fn test_rewrite_is_identity_preserving() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let b = store.mint_free_var("b");
        let pair = store.tuple([TypeId::I32, b]);

        // a 不出现在 pair 中
        let sub = Substitution::singleton(a, TypeId::U8);
        assert_eq!(sub.rewrite(&mut store, pair), pair);

        let sub = Substitution::singleton(b, TypeId::U8);
        let rewritten = sub.rewrite(&mut store, pair);
        assert_ne!(rewritten, pair);
        assert_eq!(rewritten, store.tuple([TypeId::I32, TypeId::U8]));
    }

    #[test]
    fn test_rewrite_keeps_mutability_and_effects() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let ptr = store.pointer(a, true);
        let args = store.tuple([a]);
        let func = store.function(a, args, Ses::St, ClosureSpec::Yes);

        let sub = Substitution::singleton(a, TypeId::I64);
        let ptr2 = sub.rewrite(&mut store, ptr);
        assert!(store.is_mutable(ptr2));
        assert_eq!(store.pointee(ptr2), Some(TypeId::I64));

        let func2 = sub.rewrite(&mut store, func);
        assert_eq!(store.kind(func2), Kind::Fn);
        assert_eq!(store.fn_spec(func2), store.fn_spec(func));
    }

    #[test]
    fn test_self_mapping_is_dropped() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        assert!(Substitution::singleton(a, a).is_empty());
        assert!(Substitution::from_pairs([(a, a)]).is_empty());
    }

    #[test]
    fn test_compose_applies_later_to_earlier_targets() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let b = store.mint_free_var("b");
        let ptr_b = store.pointer(b, false);

        let earlier = Substitution::singleton(a, ptr_b);
        let later = Substitution::singleton(b, TypeId::F32);
        let composed = Substitution::compose(&later, &earlier, &mut store).unwrap();

        let expected = store.pointer(TypeId::F32, false);
        assert_eq!(composed.get(a), Some(expected));
        assert_eq!(composed.get(b), Some(TypeId::F32));
    }

    #[test]
    fn test_compose_conflict_prefers_more_specific() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let c = store.mint_free_var("c");
        let tuple_c = store.tuple([c, TypeId::I8]);
        let tuple_concrete = store.tuple([TypeId::U16, TypeId::I8]);

        let earlier = Substitution::singleton(a, tuple_c);
        let later = Substitution::singleton(a, tuple_concrete);
        let composed = Substitution::compose(&later, &earlier, &mut store).unwrap();
        assert_eq!(composed.get(a), Some(tuple_concrete));
    }

    #[test]
    fn test_compose_conflict_is_fatal() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let earlier = Substitution::singleton(a, TypeId::I32);
        let later = Substitution::singleton(a, TypeId::U8);
        let err = Substitution::compose(&later, &earlier, &mut store).unwrap_err();
        assert!(matches!(err.reason, MismatchReason::Conflict(_)));
    }

    #[test]
    fn test_display() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let sub = Substitution::singleton(a, TypeId::BOOL);
        assert_eq!(sub.display(&store), format!("{{'a{} := bool}}", a.index()));
    }
}
