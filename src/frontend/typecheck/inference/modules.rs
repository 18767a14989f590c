//! 模块推断
//!
//! 模块按森林顺序推断；引用尚未推断的模块时按需推断，
//! 引用正在推断的模块（循环导入）时得到其占位变量。
//! 模块完成后铸造 Module TID，记录 占位 → 最终 的重播种并全局应用。

use std::collections::HashSet;

use tracing::debug;

use crate::frontend::core::ast::{Expr, ExprKind, ItemKind, NodeId, TemplateArg, Universe};
use crate::frontend::core::type_system::{
    compare_ses, Element, Elements, Kind, Scheme, Ses, Substitution, TypeId,
};
use crate::util::span::Span;

use crate::frontend::typecheck::context::{ContextId, DefId};
use crate::frontend::typecheck::engine::{EffectSite, Engine, ModuleState};
use crate::frontend::typecheck::errors::{TypeError, TypeResult};

impl<'a> Engine<'a> {
    /// 第二阶段：按顺序推断所有模块
    pub(crate) fn infer_all(&mut self) -> TypeResult<()> {
        for idx in 0..self.modules.len() {
            if self.modules[idx].state == ModuleState::Seeded {
                self.infer_module(idx)?;
            }
        }
        Ok(())
    }

    /// 推断一个模块体，返回其 Module TID
    pub(crate) fn infer_module(
        &mut self,
        idx: usize,
    ) -> TypeResult<TypeId> {
        let info = &self.modules[idx];
        let (decl, ctx, def, placeholder) = (info.decl, info.context, info.def, info.placeholder);
        let item_defs = info.item_defs.clone();
        let params = info.params.clone();

        self.modules[idx].state = ModuleState::InProgress;
        self.module_stack.push(idx);
        debug!(module = %decl.name, template = decl.is_template(), "inferring module");

        for (item, &item_def) in decl.items.iter().zip(&item_defs) {
            match &item.kind {
                ItemKind::Value {
                    spec,
                    value,
                    constant,
                    ..
                } => {
                    let first_call = self.state.pending_calls.len();
                    let typed = self.infer_expr(ctx, value)?;
                    let ty = match spec {
                        Some(spec) => {
                            let declared = self.infer_type_spec(ctx, spec)?;
                            self.unify_relaxed_at(declared, typed.ty, item.span)?;
                            declared
                        }
                        None => typed.ty,
                    };
                    if *constant && !compare_ses(Ses::Tot, typed.ses) {
                        return Err(TypeError::EffectViolation {
                            allowed: Ses::Tot,
                            actual: typed.ses,
                            span: item.span,
                        });
                    }
                    let slot = self.def_type(item_def);
                    self.unify_at(slot, ty, item.span)?;
                    self.narrow_def(item_def, ty);
                    self.bind_lambda(item_def, value);
                    let ty = self.resolve_ty(ty);
                    self.record(item.id, ty, typed.ses, item.span);
                    let calls = first_call..self.state.pending_calls.len();
                    if !calls.is_empty() {
                        self.state.effect_sites.push(EffectSite {
                            node: item.id,
                            base: typed.ses,
                            calls,
                            allowed: constant.then_some(Ses::Tot),
                            span: item.span,
                        });
                    }
                }
                ItemKind::Type { spec, .. } | ItemKind::Extern { spec, .. } => {
                    let ty = self.infer_type_spec(ctx, spec)?;
                    let slot = self.def_type(item_def);
                    self.unify_at(slot, ty, item.span)?;
                    self.narrow_def(item_def, ty);
                    let ty = self.resolve_ty(ty);
                    self.record(item.id, ty, Ses::Tot, item.span);
                }
                ItemKind::Module(_) => {
                    if let Some(&child) = self.module_by_def.get(&item_def) {
                        if self.modules[child].state == ModuleState::Seeded {
                            self.infer_module(child)?;
                        }
                    }
                }
            }
        }

        let mut elements = Elements::new();
        for (item, &item_def) in decl.items.iter().zip(&item_defs) {
            let ty = self.def_type(item_def);
            match &item.kind {
                ItemKind::Value { name, .. } | ItemKind::Extern { name, .. } => {
                    elements.push(Element::named(name, ty))
                }
                ItemKind::Type { name, .. } => elements.push(Element::type_field(name, ty)),
                ItemKind::Module(_) => {}
            }
        }
        let mut module_ty = self.store.mint_composite(Kind::Module, elements);

        let scheme = if decl.is_template() {
            let fixed = self.state.contexts.free_vars_outside(&self.store, ctx);
            let (scheme, sub) = Scheme::generalize_recorded(&mut self.store, module_ty, &fixed);
            self.apply(sub, decl.span)?;
            module_ty = scheme.body;
            self.capture_orders(idx, &scheme.bound, &fixed, decl.span)?;
            // 量词以模板参数开头，按声明顺序
            let mut bound: Vec<TypeId> = Vec::with_capacity(scheme.bound.len());
            for param in params {
                let param = self.resolve_ty(param);
                if self.store.kind(param) == Kind::BoundVar && !bound.contains(&param) {
                    bound.push(param);
                }
            }
            for var in scheme.bound {
                if !bound.contains(&var) {
                    bound.push(var);
                }
            }
            Scheme::new(bound, module_ty)
        } else {
            Scheme::mono(module_ty)
        };

        self.state.reseed.insert(placeholder, module_ty);
        debug!(
            module = %decl.name,
            placeholder = %self.store.display(placeholder),
            ty = %self.store.display(module_ty),
            "reseeded module"
        );
        self.unify_at(placeholder, module_ty, decl.span)?;
        let module_ty = self.resolve_ty(module_ty);
        self.state.contexts.def_mut(def).scheme = scheme;
        self.record(decl.id, module_ty, Ses::Tot, decl.span);

        self.modules[idx].state = ModuleState::Done(module_ty);
        self.module_stack.pop();
        self.sweep()?;
        Ok(module_ty)
    }

    /// 取出模板体内涉及量词的约束并泛化其中的局部变量
    fn capture_orders(
        &mut self,
        idx: usize,
        bound: &[TypeId],
        fixed: &HashSet<TypeId>,
        span: Span,
    ) -> TypeResult<()> {
        let mut orders = self.deferred.take_related(&self.store, bound, fixed);
        if orders.is_empty() {
            return Ok(());
        }
        let mut locals: Vec<TypeId> = Vec::new();
        for order in &orders {
            for &arg in &order.args {
                for &var in self.store.vars(arg) {
                    if self.store.kind(var) == Kind::FreeVar
                        && !fixed.contains(&var)
                        && !locals.contains(&var)
                    {
                        locals.push(var);
                    }
                }
            }
        }
        let mut pairs = Vec::with_capacity(locals.len());
        for var in locals {
            let label = self.store.label(var).unwrap_or("T").to_string();
            pairs.push((var, self.store.mint_bound_var(&label)));
        }
        let order_vars: Vec<TypeId> = pairs.iter().map(|&(_, fresh)| fresh).collect();
        let sub = Substitution::from_pairs(pairs);
        for order in &mut orders {
            order.rewrite(&mut self.store, &sub);
        }
        self.apply(sub, span)?;
        debug!(
            module = %self.modules[idx].decl.name,
            orders = orders.len(),
            locals = order_vars.len(),
            "captured template constraints"
        );
        self.modules[idx].orders = orders;
        self.modules[idx].order_vars = order_vars;
        Ok(())
    }

    /// 定义的类型换成更具体的一侧（函数类型的副作用与闭包规格）
    fn narrow_def(
        &mut self,
        def: DefId,
        ty: TypeId,
    ) {
        let ty = self.resolve_ty(ty);
        let current = self.def_type(def);
        if current != ty && self.store.kind(current) == Kind::Fn && self.store.kind(ty) == Kind::Fn {
            self.state.contexts.def_mut(def).scheme = Scheme::mono(ty);
        }
    }

    /// 按路径引用模块，必要时实例化模板
    pub(crate) fn module_type(
        &mut self,
        ctx: ContextId,
        segments: &[String],
        node: NodeId,
        args: &'a [TemplateArg],
        span: Span,
    ) -> TypeResult<TypeId> {
        let (def, idx) = self.resolve_module_path(ctx, segments, span)?;
        self.resolutions.insert(node, def);
        let decl = self.modules[idx].decl;
        match self.modules[idx].state {
            ModuleState::Seeded => {
                self.infer_module(idx)?;
            }
            ModuleState::InProgress => {
                if decl.is_template() {
                    return Err(TypeError::template(
                        &decl.name,
                        "the module is still being inferred",
                        span,
                    ));
                }
                if !args.is_empty() {
                    return Err(TypeError::template(
                        &decl.name,
                        "the module takes no template parameters",
                        span,
                    ));
                }
                debug!(module = %decl.name, "cyclic reference, using placeholder");
                let placeholder = self.modules[idx].placeholder;
                return Ok(self.resolve_ty(placeholder));
            }
            ModuleState::Done(_) => {}
        }

        if decl.is_template() {
            return self.instantiate_template(ctx, idx, args, span);
        }
        if !args.is_empty() {
            return Err(TypeError::template(
                &decl.name,
                "the module takes no template parameters",
                span,
            ));
        }
        Ok(self.def_type(def))
    }

    /// 解析模块路径：首段沿上下文链查找，其余各段在前一模块内查找
    fn resolve_module_path(
        &mut self,
        ctx: ContextId,
        segments: &[String],
        span: Span,
    ) -> TypeResult<(DefId, usize)> {
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| TypeError::undefined("", span))?;
        let mut def = self
            .state
            .contexts
            .resolve(ctx, first)
            .ok_or_else(|| TypeError::undefined(first, span))?;
        let mut name = first;
        for segment in rest {
            let scope = self.module_scope(def, name, span)?;
            def = self
                .state
                .contexts
                .lookup_local(scope, segment)
                .ok_or_else(|| TypeError::undefined(segment, span))?;
            name = segment;
        }
        self.module_scope(def, name, span)?;
        let idx = self
            .module_by_def
            .get(&def)
            .copied()
            .ok_or_else(|| TypeError::undefined(name, span))?;
        Ok((def, idx))
    }

    fn module_scope(
        &self,
        def: DefId,
        name: &str,
        span: Span,
    ) -> TypeResult<ContextId> {
        let definition = self.state.contexts.def(def);
        match (definition.universe, definition.scope) {
            (Universe::Module, Some(scope)) if self.module_by_def.contains_key(&def) => Ok(scope),
            (universe, _) => Err(TypeError::wrong_universe(name, Universe::Module, universe, span)),
        }
    }

    /// 作为字段访问基址的表达式若指向模块，返回模块类型
    pub(crate) fn module_position(
        &mut self,
        ctx: ContextId,
        base: &'a Expr,
    ) -> TypeResult<Option<TypeId>> {
        let ty = match &base.kind {
            ExprKind::Instantiate { module, args } => {
                self.module_type(ctx, &module.segments, module.id, args, base.span)?
            }
            _ => {
                let mut segments = Vec::new();
                if !expr_path(base, &mut segments) || !self.names_module(ctx, &segments) {
                    return Ok(None);
                }
                self.module_type(ctx, &segments, base.id, &[], base.span)?
            }
        };
        self.record(base.id, ty, Ses::Tot, base.span);
        Ok(Some(ty))
    }

    /// 路径是否完整地指向一个模块（不报错）
    fn names_module(
        &self,
        ctx: ContextId,
        segments: &[String],
    ) -> bool {
        let contexts = &self.state.contexts;
        let Some((first, rest)) = segments.split_first() else {
            return false;
        };
        let mut current = contexts.lookup(ctx, first);
        for segment in rest {
            current = current
                .and_then(|def| contexts.def(def).scope)
                .and_then(|scope| contexts.lookup_local(scope, segment));
        }
        match current {
            Some(def) => contexts.def(def).universe == Universe::Module,
            None => false,
        }
    }
}

/// 收集 `a.b.c` 形式的表达式路径
fn expr_path(
    expr: &Expr,
    segments: &mut Vec<String>,
) -> bool {
    match &expr.kind {
        ExprKind::Ident(name) => {
            segments.push(name.clone());
            true
        }
        ExprKind::Field { base, name } => {
            let ok = expr_path(base, segments);
            segments.push(name.clone());
            ok
        }
        _ => false,
    }
}
