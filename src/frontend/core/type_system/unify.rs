//! 合一算法
//!
//! 计算使两个 TID 相等的最一般替换：
//! 1. TID 相同 ⇒ 空替换
//! 2. 一侧是变量 ⇒ 绑定（带 occurs check）
//! 3. 同种复合类型 ⇒ 逐元素合一，从左到右串联替换
//! 4. 其余 ⇒ 失败

use tracing::trace;

use super::effect::unify_closure_spec;
use super::error::{MismatchReason, UnifyError, UnifyResult};
use super::store::{Kind, TypeId, TypeStore};
use super::substitute::Substitution;

/// 合一选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnifyOptions {
    /// 允许可变源类型合一到不可变目标（不可变解引用的放宽）
    pub allow_mut_source: bool,
}

/// 合一器
pub struct Unifier<'s> {
    store: &'s mut TypeStore,
    options: UnifyOptions,
}

impl<'s> Unifier<'s> {
    /// 创建新的合一器
    pub fn new(store: &'s mut TypeStore) -> Self {
        Unifier {
            store,
            options: UnifyOptions::default(),
        }
    }

    /// 创建带选项的合一器
    pub fn with_options(
        store: &'s mut TypeStore,
        options: UnifyOptions,
    ) -> Self {
        Unifier { store, options }
    }

    /// 合一 `target` 与 `source`
    pub fn unify(
        &mut self,
        target: TypeId,
        source: TypeId,
    ) -> UnifyResult<Substitution> {
        if target == source {
            return Ok(Substitution::new());
        }
        trace!(
            target = %self.store.display(target),
            source = %self.store.display(source),
            "unify"
        );

        let (kt, ks) = (self.store.kind(target), self.store.kind(source));
        match (kt, ks) {
            // 约束变量遇到自由变量时，优先消去自由变量
            (Kind::BoundVar, Kind::FreeVar) => return self.bind(source, target),
            (k, _) if k.is_var() => return self.bind(target, source),
            (_, k) if k.is_var() => return self.bind(source, target),
            _ => {}
        }

        if kt != ks {
            return Err(self.mismatch(
                target,
                source,
                MismatchReason::Kind {
                    left: kt.name(),
                    right: ks.name(),
                },
            ));
        }

        match kt {
            Kind::Fn => self.unify_fn(target, source),
            Kind::Tuple => self.unify_product(target, source, false),
            Kind::Struct | Kind::Union | Kind::Module => self.unify_product(target, source, true),
            Kind::Pointer | Kind::Slice | Kind::Array => self.unify_window(target, source),
            // 原子类型已驻留，TID 不同即形状不同
            _ => Err(self.mismatch(target, source, MismatchReason::Width)),
        }
    }

    fn mismatch(
        &self,
        left: TypeId,
        right: TypeId,
        reason: MismatchReason,
    ) -> UnifyError {
        UnifyError::new(self.store, left, right, reason)
    }

    /// 绑定变量，执行 occurs check
    fn bind(
        &mut self,
        var: TypeId,
        other: TypeId,
    ) -> UnifyResult<Substitution> {
        if var != other && self.store.contains_var(other, var) {
            return Err(self.mismatch(var, other, MismatchReason::OccursCheck));
        }
        Ok(Substitution::singleton(var, other))
    }

    fn unify_fn(
        &mut self,
        target: TypeId,
        source: TypeId,
    ) -> UnifyResult<Substitution> {
        let (ts, ss) = match (self.store.fn_spec(target), self.store.fn_spec(source)) {
            (Some(ts), Some(ss)) => (ts, ss),
            _ => {
                return Err(self.mismatch(
                    target,
                    source,
                    MismatchReason::Kind {
                        left: "function",
                        right: "function",
                    },
                ))
            }
        };
        if !ts.ses.is_compatible(ss.ses) {
            return Err(self.mismatch(
                target,
                source,
                MismatchReason::Effect {
                    left: ts.ses,
                    right: ss.ses,
                },
            ));
        }
        if unify_closure_spec(ts.closure, ss.closure).is_none() {
            return Err(self.mismatch(
                target,
                source,
                MismatchReason::Closure {
                    left: ts.closure,
                    right: ss.closure,
                },
            ));
        }
        let (tr, ta) = self.fn_parts(target);
        let (sr, sa) = self.fn_parts(source);
        self.unify_pairs(&[(ta, sa), (tr, sr)])
    }

    fn fn_parts(
        &self,
        tid: TypeId,
    ) -> (TypeId, TypeId) {
        self.store.fn_parts(tid).unwrap_or((tid, tid))
    }

    fn unify_product(
        &mut self,
        target: TypeId,
        source: TypeId,
        named: bool,
    ) -> UnifyResult<Substitution> {
        let left = self.store.elements(target).clone();
        let right = self.store.elements(source).clone();
        if left.len() != right.len() {
            return Err(self.mismatch(
                target,
                source,
                MismatchReason::Arity {
                    expected: left.len(),
                    found: right.len(),
                },
            ));
        }
        if named {
            for (l, r) in left.iter().zip(right.iter()) {
                if l.name != r.name {
                    return Err(self.mismatch(
                        target,
                        source,
                        MismatchReason::FieldName {
                            expected: l.name.clone().unwrap_or_default(),
                            found: r.name.clone().unwrap_or_default(),
                        },
                    ));
                }
                if l.is_type_field != r.is_type_field {
                    return Err(self.mismatch(
                        target,
                        source,
                        MismatchReason::TypeField(l.name.clone().unwrap_or_default()),
                    ));
                }
            }
        }
        let pairs: Vec<(TypeId, TypeId)> = left
            .iter()
            .zip(right.iter())
            .map(|(l, r)| (l.ty, r.ty))
            .collect();
        self.unify_pairs(&pairs)
    }

    fn unify_window(
        &mut self,
        target: TypeId,
        source: TypeId,
    ) -> UnifyResult<Substitution> {
        let target_mut = self.store.is_mutable(target);
        let source_mut = self.store.is_mutable(source);
        match (target_mut, source_mut) {
            (false, true) if !self.options.allow_mut_source => {
                return Err(self.mismatch(target, source, MismatchReason::MutableSource))
            }
            (true, false) => {
                return Err(self.mismatch(target, source, MismatchReason::ImmutableSource))
            }
            _ => {}
        }

        let left = self.store.elements(target).clone();
        let right = self.store.elements(source).clone();
        let pairs: Vec<(TypeId, TypeId)> = left
            .iter()
            .zip(right.iter())
            .map(|(l, r)| (l.ty, r.ty))
            .collect();

        // 放宽只作用于最外层窗口
        let saved = self.options;
        self.options.allow_mut_source = false;
        let result = self.unify_pairs(&pairs);
        self.options = saved;
        result
    }

    /// 从左到右合一各对元素，前面学到的信息用于收窄后面的比较
    pub fn unify_pairs(
        &mut self,
        pairs: &[(TypeId, TypeId)],
    ) -> UnifyResult<Substitution> {
        let mut sub = Substitution::new();
        for &(left, right) in pairs {
            let left = sub.rewrite(self.store, left);
            let right = sub.rewrite(self.store, right);
            let step = self.unify(left, right)?;
            sub = Substitution::compose(&step, &sub, self.store)?;
        }
        Ok(sub)
    }
}

/// 合一两个类型
pub fn unify(
    store: &mut TypeStore,
    target: TypeId,
    source: TypeId,
) -> UnifyResult<Substitution> {
    Unifier::new(store).unify(target, source)
}

/// 依次合一多对类型，串联各步得到的替换
pub fn unify_all(
    store: &mut TypeStore,
    pairs: &[(TypeId, TypeId)],
) -> UnifyResult<Substitution> {
    Unifier::new(store).unify_pairs(pairs)
}

/// 以指定选项合一两个类型
pub fn unify_with(
    store: &mut TypeStore,
    target: TypeId,
    source: TypeId,
    options: UnifyOptions,
) -> UnifyResult<Substitution> {
    Unifier::with_options(store, options).unify(target, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::core::type_system::effect::{ClosureSpec, Ses};
    use crate::frontend::core::type_system::store::Element;

    #[test]
    fn test_identical_tids_unify_trivially() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        assert!(unify(&mut store, a, a).unwrap().is_empty());
        assert!(unify(&mut store, TypeId::I32, TypeId::I32).unwrap().is_empty());
    }

    #[test]
    fn test_var_binds_to_concrete() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let sub = unify(&mut store, a, TypeId::U8).unwrap();
        assert_eq!(sub.get(a), Some(TypeId::U8));
        let sub = unify(&mut store, TypeId::U8, a).unwrap();
        assert_eq!(sub.get(a), Some(TypeId::U8));
    }

    #[test]
    fn test_occurs_check() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let ptr = store.pointer(a, false);
        let err = unify(&mut store, a, ptr).unwrap_err();
        assert!(err.is_occurs_check());
    }

    #[test]
    fn test_width_mismatch() {
        let mut store = TypeStore::new();
        let err = unify(&mut store, TypeId::I32, TypeId::U8).unwrap_err();
        assert!(matches!(err.reason, MismatchReason::Kind { .. }));
        let err = unify(&mut store, TypeId::I32, TypeId::I8).unwrap_err();
        assert_eq!(err.reason, MismatchReason::Width);
    }

    #[test]
    fn test_threading_through_fields() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let b = store.mint_free_var("b");
        // (a, a) ~ (b, i16) ⇒ a := b, b := i16
        let left = store.tuple([a, a]);
        let right = store.tuple([b, TypeId::I16]);
        let sub = unify(&mut store, left, right).unwrap();
        assert_eq!(sub.rewrite(&mut store, a), TypeId::I16);
        assert_eq!(sub.rewrite(&mut store, b), TypeId::I16);
    }

    #[test]
    fn test_struct_field_names_must_match() {
        let mut store = TypeStore::new();
        let left = store.mint_composite(
            Kind::Struct,
            [Element::named("x", TypeId::I32)].into_iter().collect(),
        );
        let right = store.mint_composite(
            Kind::Struct,
            [Element::named("y", TypeId::I32)].into_iter().collect(),
        );
        let err = unify(&mut store, left, right).unwrap_err();
        assert!(matches!(err.reason, MismatchReason::FieldName { .. }));
    }

    #[test]
    fn test_mutability_relaxation() {
        let mut store = TypeStore::new();
        let imm = store.pointer(TypeId::I32, false);
        let mutable = store.pointer(TypeId::I32, true);

        let err = unify(&mut store, imm, mutable).unwrap_err();
        assert_eq!(err.reason, MismatchReason::MutableSource);

        let relaxed = UnifyOptions {
            allow_mut_source: true,
        };
        assert!(unify_with(&mut store, imm, mutable, relaxed).is_ok());

        // 可变目标永远不能由不可变源得到
        let err = unify_with(&mut store, mutable, imm, relaxed).unwrap_err();
        assert_eq!(err.reason, MismatchReason::ImmutableSource);
    }

    #[test]
    fn test_relaxation_does_not_reach_nested_windows() {
        let mut store = TypeStore::new();
        let inner_imm = store.pointer(TypeId::I32, false);
        let inner_mut = store.pointer(TypeId::I32, true);
        let outer_imm = store.pointer(inner_imm, false);
        let outer_mut = store.pointer(inner_mut, true);
        let relaxed = UnifyOptions {
            allow_mut_source: true,
        };
        assert!(unify_with(&mut store, outer_imm, outer_mut, relaxed).is_err());
    }

    #[test]
    fn test_array_lengths_unify() {
        let mut store = TypeStore::new();
        let n = store.mint_free_var("n");
        let open = store.array(TypeId::U8, n, false);
        let four = store.array_of_len(TypeId::U8, 4, false);
        let five = store.array_of_len(TypeId::U8, 5, false);

        let sub = unify(&mut store, open, four).unwrap();
        assert_eq!(sub.rewrite(&mut store, open), four);
        assert!(unify(&mut store, four, five).is_err());
    }

    #[test]
    fn test_fn_effects_and_closures() {
        let mut store = TypeStore::new();
        let args = store.tuple([TypeId::I32]);
        let st = store.function(TypeId::I32, args, Ses::St, ClosureSpec::No);
        let tot = store.function(TypeId::I32, args, Ses::Tot, ClosureSpec::No);
        let elim = store.function(TypeId::I32, args, Ses::ElimAnyNonTot, ClosureSpec::Maybe);
        let closure = store.function(TypeId::I32, args, Ses::St, ClosureSpec::Yes);

        assert!(matches!(
            unify(&mut store, st, tot).unwrap_err().reason,
            MismatchReason::Effect { .. }
        ));
        assert!(unify(&mut store, elim, st).is_ok());
        assert!(unify(&mut store, elim, tot).is_ok());
        assert!(matches!(
            unify(&mut store, st, closure).unwrap_err().reason,
            MismatchReason::Closure { .. }
        ));
    }

    #[test]
    fn test_compatible_ground_specs_need_no_substitution() {
        let mut store = TypeStore::new();
        let args = store.tuple([TypeId::I32]);
        let open = store.function(TypeId::I32, args, Ses::Tot, ClosureSpec::Maybe);
        let plain = store.function(TypeId::I32, args, Ses::Tot, ClosureSpec::No);
        assert_ne!(open, plain);
        assert!(unify(&mut store, open, plain).unwrap().is_empty());
        assert!(unify(&mut store, plain, open).unwrap().is_empty());
    }

    #[test]
    fn test_fn_argument_then_return() {
        let mut store = TypeStore::new();
        let a = store.mint_free_var("a");
        let r = store.mint_free_var("r");
        let args_a = store.tuple([a]);
        let args_i = store.tuple([TypeId::I64]);
        let left = store.function(r, args_a, Ses::Tot, ClosureSpec::Maybe);
        let right = store.function(a, args_i, Ses::Tot, ClosureSpec::No);
        let sub = unify(&mut store, left, right).unwrap();
        assert_eq!(sub.rewrite(&mut store, r), TypeId::I64);
    }

    #[test]
    fn test_bound_var_keeps_free_var_side_eliminated() {
        let mut store = TypeStore::new();
        let t = store.mint_bound_var("T");
        let a = store.mint_free_var("a");
        let sub = unify(&mut store, t, a).unwrap();
        assert_eq!(sub.get(a), Some(t));
        assert!(!sub.contains(t));
    }
}
