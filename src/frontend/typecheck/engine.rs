//! 推断引擎
//!
//! 两阶段：先为所有模块和定义播种占位变量，再逐模块推断。
//! 每学到一个替换都立即组合进全局替换，并改写：
//! - 上下文树中的所有定义与返回类型槽
//! - 所有节点的类型标注
//! - 模块重播种表
//! - 未解决的延迟约束

use std::collections::HashMap;
use std::ops::Range;

use indexmap::IndexMap;
use tracing::{info, trace};

use crate::frontend::core::ast::{Expr, ExprKind, ModuleDecl, NodeId, Program};
use crate::frontend::core::type_system::{
    unify, unify_with, Ses, Substitution, TypeId, TypeStore, UnifyOptions, UnifyResult,
};
use crate::util::config::InferConfig;
use crate::util::span::Span;

use super::context::{ContextId, ContextTree, DefId, Definition, FnId};
use super::deferred::{DeferredList, DeferredOrder};
use super::errors::{TypeError, TypeResult};
use super::finalize::TypedProgram;

/// 节点的类型标注
#[derive(Debug, Clone, Copy)]
pub(crate) struct Annotation {
    pub ty: TypeId,
    pub ses: Ses,
    pub span: Span,
    /// 位于模板模块内（允许保留类型变量）
    pub generic: bool,
}

/// 被调用方类型尚未确定的调用，定型时重新计算副作用
#[derive(Debug, Clone)]
pub(crate) struct PendingCall {
    pub node: NodeId,
    pub callee: TypeId,
    pub callee_def: Option<DefId>,
    /// 不含被调用方副作用的部分
    pub base: Ses,
    pub context: ContextId,
    /// 所在函数；模块条目中的调用为 `None`
    pub function: Option<FnId>,
    /// 被调用方与实参中更早登记的调用
    pub inner: Range<usize>,
    pub span: Span,
}

/// lambda 的副作用来源
#[derive(Debug, Clone)]
pub(crate) struct LambdaRecord {
    pub function: FnId,
    pub body: NodeId,
    pub declared: Option<Ses>,
    /// 函数体推断时的副作用
    pub body_ses: Ses,
    pub ty: TypeId,
    pub span: Span,
}

/// 值可能依赖未知被调用方的模块条目
#[derive(Debug, Clone)]
pub(crate) struct EffectSite {
    pub node: NodeId,
    pub base: Ses,
    pub calls: Range<usize>,
    /// 常量条目为 `Tot`
    pub allowed: Option<Ses>,
    pub span: Span,
}

/// 随全局替换一起改写的状态
#[derive(Debug, Default)]
pub(crate) struct TypingState {
    pub subst: Substitution,
    pub contexts: ContextTree,
    pub annotations: IndexMap<NodeId, Annotation>,
    /// 模块占位变量 → 最终类型
    pub reseed: IndexMap<TypeId, TypeId>,
    pub pending_calls: Vec<PendingCall>,
    /// lambda 节点 → 副作用来源
    pub lambdas: IndexMap<NodeId, LambdaRecord>,
    /// 直接绑定 lambda 的定义
    pub bound_lambdas: HashMap<DefId, NodeId>,
    pub effect_sites: Vec<EffectSite>,
    pub trace: bool,
}

impl TypingState {
    /// 组合替换并改写所有持有类型的位置
    pub fn absorb(
        &mut self,
        store: &mut TypeStore,
        sub: &Substitution,
    ) -> UnifyResult<()> {
        if sub.is_empty() {
            return Ok(());
        }
        if self.trace {
            trace!(substitution = %sub.display(store), "apply");
        }
        self.subst = Substitution::compose(sub, &self.subst, store)?;
        self.contexts.rewrite(store, sub);
        for annotation in self.annotations.values_mut() {
            if store.has_vars(annotation.ty) {
                annotation.ty = sub.rewrite(store, annotation.ty);
            }
        }
        for target in self.reseed.values_mut() {
            *target = sub.rewrite(store, *target);
        }
        for call in &mut self.pending_calls {
            call.callee = sub.rewrite(store, call.callee);
        }
        for lambda in self.lambdas.values_mut() {
            lambda.ty = sub.rewrite(store, lambda.ty);
        }
        Ok(())
    }
}

/// 模块推断状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModuleState {
    Seeded,
    InProgress,
    Done(TypeId),
}

/// 模块信息
#[derive(Debug, Clone)]
pub(crate) struct ModuleInfo<'a> {
    pub decl: &'a ModuleDecl,
    pub context: ContextId,
    pub def: DefId,
    pub placeholder: TypeId,
    /// 模板参数对应的约束变量
    pub params: Vec<TypeId>,
    /// 每个条目的定义
    pub item_defs: Vec<DefId>,
    /// 自身或外层模块带模板参数
    pub generic: bool,
    pub state: ModuleState,
    /// 模板体内未解决、涉及量词的约束，每次实例化重新发出
    pub orders: Vec<DeferredOrder>,
    /// 只出现在这些约束中的约束变量
    pub order_vars: Vec<TypeId>,
}

/// 类型推断引擎
pub struct Engine<'a> {
    pub(crate) program: &'a Program,
    pub(crate) config: InferConfig,
    pub(crate) store: TypeStore,
    pub(crate) state: TypingState,
    pub(crate) deferred: DeferredList,
    pub(crate) resolutions: IndexMap<NodeId, DefId>,
    pub(crate) modules: Vec<ModuleInfo<'a>>,
    pub(crate) module_by_def: HashMap<DefId, usize>,
    /// 正在推断的模块
    pub(crate) module_stack: Vec<usize>,
}

impl<'a> Engine<'a> {
    /// 以默认配置创建引擎
    pub fn new(program: &'a Program) -> Self {
        Self::build(program, InferConfig::default())
    }

    /// 以指定配置创建引擎，配置先经过校验
    pub fn with_config(
        program: &'a Program,
        config: InferConfig,
    ) -> TypeResult<Self> {
        config
            .validate()
            .map_err(|e| TypeError::InvalidConfig(e.to_string()))?;
        Ok(Self::build(program, config))
    }

    fn build(
        program: &'a Program,
        config: InferConfig,
    ) -> Self {
        let state = TypingState {
            trace: config.trace_substitutions,
            ..TypingState::default()
        };
        Engine {
            program,
            config,
            store: TypeStore::new(),
            state,
            deferred: DeferredList::new(),
            resolutions: IndexMap::new(),
            modules: Vec::new(),
            module_by_def: HashMap::new(),
            module_stack: Vec::new(),
        }
    }

    /// 对整个程序做类型推断
    pub fn run(mut self) -> TypeResult<TypedProgram> {
        info!(modules = self.program.modules.len(), "type inference started");
        self.seed()?;
        self.infer_all()?;
        let program = self.finalize()?;
        info!(types = program.store.len(), "type inference finished");
        Ok(program)
    }

    pub(crate) fn fresh(
        &mut self,
        label: &str,
    ) -> TypeId {
        self.store.mint_free_var(label)
    }

    /// 以全局替换改写类型
    pub(crate) fn resolve_ty(
        &mut self,
        tid: TypeId,
    ) -> TypeId {
        self.state.subst.rewrite(&mut self.store, tid)
    }

    pub(crate) fn resolve_all(
        &mut self,
        tids: Vec<TypeId>,
    ) -> Vec<TypeId> {
        tids.into_iter().map(|t| self.resolve_ty(t)).collect()
    }

    /// 把替换组合进全局状态
    pub(crate) fn apply(
        &mut self,
        sub: Substitution,
        span: Span,
    ) -> TypeResult<()> {
        if sub.is_empty() {
            return Ok(());
        }
        self.state
            .absorb(&mut self.store, &sub)
            .map_err(|e| TypeError::unification(e, span))?;
        self.deferred.rewrite(&mut self.store, &sub);
        Ok(())
    }

    /// 合一并立即应用
    pub(crate) fn unify_at(
        &mut self,
        target: TypeId,
        source: TypeId,
        span: Span,
    ) -> TypeResult<()> {
        let target = self.resolve_ty(target);
        let source = self.resolve_ty(source);
        let sub = unify(&mut self.store, target, source).map_err(|e| TypeError::unification(e, span))?;
        self.apply(sub, span)
    }

    /// 允许可变源合一到不可变目标（赋值、传参、带标注的绑定）
    pub(crate) fn unify_relaxed_at(
        &mut self,
        target: TypeId,
        source: TypeId,
        span: Span,
    ) -> TypeResult<()> {
        let target = self.resolve_ty(target);
        let source = self.resolve_ty(source);
        let options = UnifyOptions {
            allow_mut_source: true,
        };
        let sub = unify_with(&mut self.store, target, source, options)
            .map_err(|e| TypeError::unification(e, span))?;
        self.apply(sub, span)
    }

    /// 记录节点的类型标注
    pub(crate) fn record(
        &mut self,
        node: NodeId,
        ty: TypeId,
        ses: Ses,
        span: Span,
    ) {
        let generic = self.in_generic();
        self.state.annotations.insert(
            node,
            Annotation {
                ty,
                ses,
                span,
                generic,
            },
        );
    }

    pub(crate) fn in_generic(&self) -> bool {
        self.module_stack
            .last()
            .map(|&idx| self.modules[idx].generic)
            .unwrap_or(false)
    }

    /// 定义名称；重复定义时报错
    pub(crate) fn define(
        &mut self,
        ctx: ContextId,
        def: Definition,
    ) -> TypeResult<DefId> {
        let name = def.name.clone();
        let span = def.span;
        self.state
            .contexts
            .try_define(ctx, def)
            .map_err(|existing| TypeError::DoubleDefinition {
                name,
                previous: self.state.contexts.def(existing).span,
                span,
            })
    }

    /// 定义的值是 lambda 时记下两者的对应
    pub(crate) fn bind_lambda(
        &mut self,
        def: DefId,
        value: &Expr,
    ) {
        if let ExprKind::Lambda(_) = value.kind {
            self.state.bound_lambdas.insert(def, value.id);
        }
    }

    /// 定义的当前类型
    pub(crate) fn def_type(
        &mut self,
        def: DefId,
    ) -> TypeId {
        let body = self.state.contexts.def(def).scheme.body;
        self.resolve_ty(body)
    }

    /// 能立即求解的约束当场求解，否则加入工作表
    pub(crate) fn defer(
        &mut self,
        order: DeferredOrder,
    ) -> TypeResult<()> {
        let progress = order.solve(&mut self.store, &self.config)?;
        if !progress.done {
            trace!(order = %order.display(&self.store), "deferred");
            self.deferred.push(order);
            return Ok(());
        }
        self.apply(progress.substitution, order.span)?;
        for child in progress.spawned {
            self.defer(child)?;
        }
        Ok(())
    }

    /// 非致命扫描：解决能解决的约束
    pub(crate) fn sweep(&mut self) -> TypeResult<()> {
        let Engine {
            store,
            config,
            state,
            deferred,
            ..
        } = self;
        deferred.sweep(store, config, |store, sub, span| {
            state
                .absorb(store, sub)
                .map_err(|e| TypeError::unification(e, span))
        })
    }

    /// 致命扫描：剩余约束即停滞
    pub(crate) fn drain(&mut self) -> TypeResult<()> {
        let Engine {
            store,
            config,
            state,
            deferred,
            ..
        } = self;
        deferred.drain(store, config, |store, sub, span| {
            state
                .absorb(store, sub)
                .map_err(|e| TypeError::unification(e, span))
        })
    }
}
