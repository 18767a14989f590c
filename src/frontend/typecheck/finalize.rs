//! 定型与输出
//!
//! 工作表排空到不动点后：
//! - 重新计算被调用方当时未知的调用及其所在 lambda 的副作用，并检查上限
//! - 模板之外仍含自由变量的节点报告为类型不确定
//! - 把标注、解析结果、捕获集合交给代码生成等下游

use std::collections::HashMap;
use std::ops::Range;

use indexmap::IndexMap;
use tracing::debug;

use crate::frontend::core::ast::NodeId;
use crate::frontend::core::type_system::{
    compare_ses, ClosureSpec, Elements, FnSpec, Kind, Ses, TypeId, TypeStore,
};
use crate::util::span::Span;

use super::context::{ContextTree, DefId, Definition, FnId};
use super::engine::{Engine, LambdaRecord, PendingCall};
use super::errors::{TypeError, TypeResult};

/// 节点的最终类型信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTyping {
    pub ty: TypeId,
    pub ses: Ses,
    pub closure: ClosureSpec,
}

/// 类型检查的输出
#[derive(Debug, Clone)]
pub struct TypedProgram {
    pub store: TypeStore,
    pub typings: IndexMap<NodeId, NodeTyping>,
    /// 标识符、类型名、模块路径 → 定义
    pub resolutions: IndexMap<NodeId, DefId>,
    pub contexts: ContextTree,
    /// lambda 节点 → 非局部捕获
    pub captures: IndexMap<NodeId, IndexMap<String, DefId>>,
    /// 模块占位变量 → 模块最终类型
    pub reseeded: IndexMap<TypeId, TypeId>,
}

impl TypedProgram {
    pub fn typing(
        &self,
        node: NodeId,
    ) -> Option<&NodeTyping> {
        self.typings.get(&node)
    }

    pub fn type_of(
        &self,
        node: NodeId,
    ) -> Option<TypeId> {
        self.typings.get(&node).map(|t| t.ty)
    }

    /// 渲染节点类型
    pub fn display_type(
        &self,
        node: NodeId,
    ) -> Option<String> {
        self.type_of(node)
            .map(|ty| self.store.display(ty).to_string())
    }

    pub fn resolution(
        &self,
        node: NodeId,
    ) -> Option<&Definition> {
        self.resolutions.get(&node).map(|&def| self.contexts.def(def))
    }

    pub fn captures_of(
        &self,
        lambda: NodeId,
    ) -> Option<&IndexMap<String, DefId>> {
        self.captures.get(&lambda)
    }

    /// 按路径查找定义：`["main", "inner", "x"]`
    pub fn lookup(
        &self,
        path: &[&str],
    ) -> Option<&Definition> {
        let (first, rest) = path.split_first()?;
        let mut def = self.contexts.lookup_local(self.contexts.root(), first)?;
        for segment in rest {
            let scope = self.contexts.def(def).scope?;
            def = self.contexts.lookup_local(scope, segment)?;
        }
        Some(self.contexts.def(def))
    }

    /// 按路径查找定义并渲染其方案
    pub fn display_def(
        &self,
        path: &[&str],
    ) -> Option<String> {
        self.lookup(path).map(|d| d.scheme.display(&self.store))
    }
}

impl<'a> Engine<'a> {
    /// 排空工作表并生成输出
    pub(crate) fn finalize(mut self) -> TypeResult<TypedProgram> {
        self.drain()?;
        self.settle_effects()?;

        let mut typings = IndexMap::with_capacity(self.state.annotations.len());
        for (&node, annotation) in &self.state.annotations {
            let ty = self.state.subst.rewrite(&mut self.store, annotation.ty);
            if !annotation.generic && self.store.has_free_vars(ty) {
                return Err(TypeError::AmbiguousType {
                    ty: self.store.display(ty).to_string(),
                    span: annotation.span,
                });
            }
            let closure = match self.store.fn_spec(ty) {
                Some(spec) => spec.closure.finalize(),
                None => ClosureSpec::No,
            };
            typings.insert(
                node,
                NodeTyping {
                    ty,
                    ses: annotation.ses,
                    closure,
                },
            );
        }

        let captures = self
            .state
            .contexts
            .lambda_captures()
            .map(|(node, captures)| (node, captures.clone()))
            .collect();

        Ok(TypedProgram {
            store: self.store,
            typings,
            resolutions: self.resolutions,
            contexts: self.state.contexts,
            captures,
            reseeded: self.state.reseed,
        })
    }

    /// 以被调用方的最终副作用重新计算调用、lambda 与模块条目的副作用
    ///
    /// 调用与 lambda 相互依赖（前向调用、递归），在副作用格上迭代到不动点；
    /// 未声明副作用的 lambda 随后换上确定的函数类型。
    fn settle_effects(&mut self) -> TypeResult<()> {
        let calls = std::mem::take(&mut self.state.pending_calls);
        let sites = std::mem::take(&mut self.state.effect_sites);
        let lambdas: Vec<LambdaRecord> = self.state.lambdas.values().cloned().collect();
        let lambda_tys: Vec<TypeId> = lambdas.iter().map(|l| self.resolve_ty(l.ty)).collect();
        let targets: Vec<Callee> = calls
            .iter()
            .map(|call| self.callee_target(call, &lambda_tys))
            .collect();

        let mut settled: Vec<Ses> = calls.iter().map(|c| known(c.base)).collect();
        let mut effects: Vec<Ses> = lambdas.iter().map(|l| known(l.body_ses)).collect();
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for (i, call) in calls.iter().enumerate() {
                let callee = match &targets[i] {
                    Callee::Fixed(ses) => *ses,
                    Callee::Lambdas(ids) => Ses::join_all(
                        ids.iter().map(|&l| lambdas[l].declared.unwrap_or(effects[l])),
                    ),
                };
                let inner = direct(&calls, &settled, call.inner.clone(), call.function);
                let ses = Ses::join_all([known(call.base), inner, callee]);
                if ses != settled[i] {
                    settled[i] = ses;
                    changed = true;
                }
            }
            for (l, lambda) in lambdas.iter().enumerate() {
                let inner = direct(&calls, &settled, 0..calls.len(), Some(lambda.function));
                let ses = known(lambda.body_ses).join(inner);
                if ses != effects[l] {
                    effects[l] = ses;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        debug!(calls = calls.len(), lambdas = lambdas.len(), rounds, "settled effects");

        for (call, &ses) in calls.iter().zip(&settled) {
            if let Some(annotation) = self.state.annotations.get_mut(&call.node) {
                annotation.ses = ses;
            }
            if let Some(ceiling) = self.state.contexts.ceiling(call.context) {
                check_effect(ceiling, ses, call.span)?;
            }
        }
        for (lambda, &ses) in lambdas.iter().zip(&effects) {
            if let Some(annotation) = self.state.annotations.get_mut(&lambda.body) {
                annotation.ses = ses;
            }
            if let Some(declared) = lambda.declared {
                check_effect(declared, ses, lambda.span)?;
            }
        }
        for site in &sites {
            let ses = known(site.base).join(direct(&calls, &settled, site.calls.clone(), None));
            if let Some(annotation) = self.state.annotations.get_mut(&site.node) {
                annotation.ses = ses;
            }
            if let Some(allowed) = site.allowed {
                check_effect(allowed, ses, site.span)?;
            }
        }

        // 同一函数类型对应多个 lambda 时取并
        let mut respec: HashMap<TypeId, Ses> = HashMap::new();
        for ((lambda, &ty), &ses) in lambdas.iter().zip(&lambda_tys).zip(&effects) {
            let current = self.store.fn_spec(ty).map(|spec| spec.ses);
            if lambda.declared.is_some() || current.is_none() || current == Some(ses) {
                continue;
            }
            respec
                .entry(ty)
                .and_modify(|joined| *joined = joined.join(ses))
                .or_insert(ses);
        }
        if !respec.is_empty() {
            self.respec_functions(&respec);
        }
        Ok(())
    }

    /// 调用的被调用方：能追溯到 lambda 时取其副作用，否则取函数类型上的规格
    fn callee_target(
        &mut self,
        call: &PendingCall,
        lambda_tys: &[TypeId],
    ) -> Callee {
        let bound = call
            .callee_def
            .and_then(|def| self.state.bound_lambdas.get(&def))
            .and_then(|node| self.state.lambdas.get_index_of(node));
        if let Some(idx) = bound {
            return Callee::Lambdas(vec![idx]);
        }
        let mut callee = self.resolve_ty(call.callee);
        if let Some(def) = call.callee_def {
            let declared = self.def_type(def);
            if self.store.kind(declared) == Kind::Fn {
                callee = declared;
            }
        }
        let ids: Vec<usize> = lambda_tys
            .iter()
            .enumerate()
            .filter(|&(_, &ty)| ty == callee)
            .map(|(idx, _)| idx)
            .collect();
        if !ids.is_empty() {
            return Callee::Lambdas(ids);
        }
        let ses = self
            .store
            .fn_spec(callee)
            .map(|spec| spec.ses)
            .unwrap_or(Ses::ElimAnyNonTot);
        Callee::Fixed(ses)
    }

    /// 把标注、定义与重播种表中的函数类型换成副作用确定后的版本
    fn respec_functions(
        &mut self,
        respec: &HashMap<TypeId, Ses>,
    ) {
        let Engine { store, state, .. } = self;
        let mut memo = HashMap::new();
        for annotation in state.annotations.values_mut() {
            annotation.ty = respec_type(store, annotation.ty, respec, &mut memo);
        }
        state
            .contexts
            .retype(|ty| respec_type(store, ty, respec, &mut memo));
        for target in state.reseed.values_mut() {
            *target = respec_type(store, *target, respec, &mut memo);
        }
        debug!(functions = respec.len(), "respecified function types");
    }
}

/// 被调用方的副作用来源
enum Callee {
    Lambdas(Vec<usize>),
    Fixed(Ses),
}

/// 去掉来自未知被调用方的 `ElimAnyNonTot`，由重新计算的调用补回
fn known(ses: Ses) -> Ses {
    if ses == Ses::ElimAnyNonTot {
        Ses::Tot
    } else {
        ses
    }
}

/// `range` 中直接位于 `function` 内的调用的副作用之并
fn direct(
    calls: &[PendingCall],
    settled: &[Ses],
    range: Range<usize>,
    function: Option<FnId>,
) -> Ses {
    Ses::join_all(
        calls[range.clone()]
            .iter()
            .zip(&settled[range])
            .filter(|(call, _)| call.function == function)
            .map(|(_, &ses)| ses),
    )
}

fn check_effect(
    allowed: Ses,
    actual: Ses,
    span: Span,
) -> TypeResult<()> {
    if compare_ses(allowed, actual) {
        Ok(())
    } else {
        Err(TypeError::EffectViolation {
            allowed,
            actual,
            span,
        })
    }
}

/// 自底向上重建类型，替换其中的目标函数类型
fn respec_type(
    store: &mut TypeStore,
    tid: TypeId,
    respec: &HashMap<TypeId, Ses>,
    memo: &mut HashMap<TypeId, TypeId>,
) -> TypeId {
    if let Some(&done) = memo.get(&tid) {
        return done;
    }
    let elements = store.elements(tid).clone();
    let mut result = tid;
    if !elements.is_empty() {
        let mut changed = false;
        let mut rebuilt = Elements::new();
        for element in &elements {
            let ty = respec_type(store, element.ty, respec, memo);
            changed |= ty != element.ty;
            rebuilt.push(element.with_ty(ty));
        }
        if changed {
            result = store.rebuild(tid, rebuilt);
        }
    }
    if let (Some(&ses), Some(spec)) = (respec.get(&tid), store.fn_spec(result)) {
        result = store.with_fn_spec(result, FnSpec { ses, ..spec });
    }
    memo.insert(tid, result);
    result
}
