//! 表达式推断

use crate::frontend::core::ast::{Chain, Expr, ExprKind, Lambda, Universe};
use crate::frontend::core::type_system::{
    compare_ses, ClosureSpec, Element, Kind, MismatchReason, Ses, TypeId, UnifyError,
};

use super::Typed;
use crate::frontend::typecheck::context::{ContextId, ContextKind, DefId, Definition};
use crate::frontend::typecheck::deferred::DeferredOrder;
use crate::frontend::typecheck::engine::{Engine, LambdaRecord, PendingCall};
use crate::frontend::typecheck::errors::{TypeError, TypeResult};
use crate::frontend::typecheck::operators::binary_rule;

impl<'a> Engine<'a> {
    /// 推断表达式的类型与副作用，并记录到节点标注
    pub(crate) fn infer_expr(
        &mut self,
        ctx: ContextId,
        expr: &'a Expr,
    ) -> TypeResult<Typed> {
        let span = expr.span;
        let typed = match &expr.kind {
            ExprKind::Literal(literal) => Typed::pure(self.literal_type(literal)),
            ExprKind::Ident(name) => self.infer_ident(ctx, expr, name)?,
            ExprKind::Unary { op, operand } => {
                let inner = self.infer_expr(ctx, operand)?;
                let result = self.fresh("u");
                self.defer(DeferredOrder::unary(*op, inner.ty, result, span))?;
                Typed::new(result, inner.ses)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.infer_expr(ctx, lhs)?;
                let right = self.infer_expr(ctx, rhs)?;
                if binary_rule(*op).symmetric {
                    self.unify_at(left.ty, right.ty, span)?;
                }
                let (lt, rt) = (self.resolve_ty(left.ty), self.resolve_ty(right.ty));
                let result = self.fresh("b");
                self.defer(DeferredOrder::binary(*op, lt, rt, result, span))?;
                Typed::new(result, left.ses.join(right.ses))
            }
            ExprKind::Call { callee, args } => self.infer_call(ctx, expr, callee, args)?,
            ExprKind::Lambda(lambda) => self.infer_lambda(ctx, expr, lambda)?,
            ExprKind::Chain(chain) => self.infer_chain(ctx, chain, expr)?,
            ExprKind::Tuple(items) => {
                let mut tys = Vec::with_capacity(items.len());
                let mut ses = Ses::Tot;
                for item in items {
                    let typed = self.infer_expr(ctx, item)?;
                    ses = ses.join(typed.ses);
                    tys.push(typed.ty);
                }
                let tys = self.resolve_all(tys);
                Typed::new(self.store.tuple(tys), ses)
            }
            ExprKind::StructLit(fields) => {
                let mut tys = Vec::with_capacity(fields.len());
                let mut ses = Ses::Tot;
                for field in fields {
                    let typed = self.infer_expr(ctx, &field.value)?;
                    ses = ses.join(typed.ses);
                    tys.push(typed.ty);
                }
                let tys = self.resolve_all(tys);
                let elements = fields
                    .iter()
                    .zip(tys)
                    .map(|(field, ty)| Element::named(&field.name, ty))
                    .collect();
                Typed::new(self.store.mint_composite(Kind::Struct, elements), ses)
            }
            ExprKind::ArrayLit(items) => {
                let elem = self.fresh("elem");
                let mut ses = Ses::Tot;
                for item in items {
                    let typed = self.infer_expr(ctx, item)?;
                    ses = ses.join(typed.ses);
                    self.unify_at(elem, typed.ty, item.span)?;
                }
                let elem = self.resolve_ty(elem);
                Typed::new(self.store.array_of_len(elem, items.len() as u64, false), ses)
            }
            ExprKind::Field { base, name } => self.infer_field(ctx, expr, base, name)?,
            ExprKind::TupleIndex { base, index } => {
                let typed = self.infer_expr(ctx, base)?;
                let result = self.fresh("elem");
                self.defer(DeferredOrder::field_index(typed.ty, *index, result, span))?;
                Typed::new(result, typed.ses)
            }
            ExprKind::Index { base, index } => {
                let b = self.infer_expr(ctx, base)?;
                let i = self.infer_expr(ctx, index)?;
                let (bt, it) = (self.resolve_ty(b.ty), self.resolve_ty(i.ty));
                let result = self.fresh("elem");
                self.defer(DeferredOrder::index(bt, it, result, span))?;
                Typed::new(result, b.ses.join(i.ses))
            }
            ExprKind::Cast { value, target } => {
                let typed = self.infer_expr(ctx, value)?;
                let target = self.infer_type_spec(ctx, target)?;
                let source = self.resolve_ty(typed.ty);
                self.defer(DeferredOrder::cast(source, target, span))?;
                Typed::new(target, typed.ses)
            }
            ExprKind::AddrOf { value, mutable } => {
                let typed = self.infer_expr(ctx, value)?;
                let pointee = self.resolve_ty(typed.ty);
                Typed::new(self.store.pointer(pointee, *mutable), typed.ses)
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.infer_expr(ctx, cond)?;
                self.unify_at(TypeId::BOOL, c.ty, cond.span)?;
                let then = self.infer_expr(ctx, then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let other = self.infer_expr(ctx, else_branch)?;
                        self.unify_at(then.ty, other.ty, span)?;
                        Typed::new(then.ty, c.ses.join(then.ses).join(other.ses))
                    }
                    None => {
                        self.unify_at(TypeId::UNIT, then.ty, then_branch.span)?;
                        Typed::new(TypeId::UNIT, c.ses.join(then.ses))
                    }
                }
            }
            ExprKind::Return(value) => {
                let slot = self
                    .state
                    .contexts
                    .return_slot(ctx)
                    .ok_or_else(|| TypeError::undefined("return", span))?;
                let typed = match value {
                    Some(value) => self.infer_expr(ctx, value)?,
                    None => Typed::pure(TypeId::UNIT),
                };
                self.unify_at(slot, typed.ty, span)?;
                // 类型即所在函数的返回类型，可出现在任何分支
                Typed::new(slot, typed.ses)
            }
            ExprKind::Instantiate { module, .. } => {
                return Err(TypeError::wrong_universe(
                    &module.to_string(),
                    Universe::Value,
                    Universe::Module,
                    span,
                ))
            }
        };
        let ty = self.resolve_ty(typed.ty);
        self.record(expr.id, ty, typed.ses, span);
        Ok(Typed::new(ty, typed.ses))
    }

    fn infer_ident(
        &mut self,
        ctx: ContextId,
        expr: &'a Expr,
        name: &str,
    ) -> TypeResult<Typed> {
        let def = self
            .state
            .contexts
            .resolve(ctx, name)
            .ok_or_else(|| TypeError::undefined(name, expr.span))?;
        self.resolutions.insert(expr.id, def);
        let definition = self.state.contexts.def(def);
        if definition.universe != Universe::Value {
            return Err(TypeError::wrong_universe(
                name,
                Universe::Value,
                definition.universe,
                expr.span,
            ));
        }
        let scheme = definition.scheme.clone();
        let (_, ty) = scheme.instantiate(&mut self.store);
        Ok(Typed::pure(ty))
    }

    fn infer_field(
        &mut self,
        ctx: ContextId,
        expr: &'a Expr,
        base: &'a Expr,
        name: &str,
    ) -> TypeResult<Typed> {
        let (base_ty, ses) = match self.module_position(ctx, base)? {
            Some(module) => (module, Ses::Tot),
            None => {
                let typed = self.infer_expr(ctx, base)?;
                (typed.ty, typed.ses)
            }
        };
        let base_ty = self.resolve_ty(base_ty);
        let result = self.fresh(name);
        self.defer(DeferredOrder::field(base_ty, name, Universe::Value, result, expr.span))?;
        Ok(Typed::new(result, ses))
    }

    fn infer_call(
        &mut self,
        ctx: ContextId,
        expr: &'a Expr,
        callee: &'a Expr,
        args: &'a [Expr],
    ) -> TypeResult<Typed> {
        let span = expr.span;
        let first_inner = self.state.pending_calls.len();
        let function = self.infer_expr(ctx, callee)?;
        let mut base = function.ses;
        let mut arg_tys = Vec::with_capacity(args.len());
        for arg in args {
            let typed = self.infer_expr(ctx, arg)?;
            base = base.join(typed.ses);
            arg_tys.push(typed.ty);
        }

        let callee_ty = self.resolve_ty(function.ty);
        let callee_def = self.resolutions.get(&callee.id).copied();
        let ret = self.fresh("ret");
        let effect = match self.store.kind(callee_ty) {
            Kind::Fn => {
                let (fn_ret, fn_arg) = self.store.fn_parts(callee_ty).unwrap_or((callee_ty, callee_ty));
                let params: Vec<TypeId> = match self.store.kind(fn_arg) {
                    Kind::Tuple => self.store.elements(fn_arg).iter().map(|e| e.ty).collect(),
                    _ => vec![fn_arg],
                };
                if params.len() != args.len() {
                    let found = self.store.tuple(arg_tys.iter().copied());
                    let error = UnifyError::new(
                        &self.store,
                        fn_arg,
                        found,
                        MismatchReason::Arity {
                            expected: params.len(),
                            found: args.len(),
                        },
                    );
                    return Err(TypeError::unification(error, span));
                }
                for ((param, arg_ty), arg) in params.into_iter().zip(arg_tys).zip(args) {
                    self.unify_relaxed_at(param, arg_ty, arg.span)?;
                }
                self.unify_at(ret, fn_ret, span)?;
                let fn_ses = self.store.fn_spec(callee_ty).map(|s| s.ses).unwrap_or(Ses::Tot);
                if fn_ses == Ses::ElimAnyNonTot {
                    self.pending_call(expr, callee_ty, callee_def, base, ctx, first_inner);
                }
                base.join(fn_ses)
            }
            k if k.is_var() => {
                let arg_tys = self.resolve_all(arg_tys);
                let arg = self.store.tuple(arg_tys);
                let provisional = self
                    .store
                    .function(ret, arg, Ses::ElimAnyNonTot, ClosureSpec::Maybe);
                self.unify_at(callee_ty, provisional, span)?;
                self.pending_call(expr, provisional, callee_def, base, ctx, first_inner);
                base.join(Ses::ElimAnyNonTot)
            }
            _ => {
                let error = UnifyError::new(&self.store, callee_ty, callee_ty, MismatchReason::NotCallable);
                return Err(TypeError::unification(error, span));
            }
        };
        Ok(Typed::new(ret, effect))
    }

    fn pending_call(
        &mut self,
        expr: &'a Expr,
        callee: TypeId,
        callee_def: Option<DefId>,
        base: Ses,
        ctx: ContextId,
        first_inner: usize,
    ) {
        let callee = self.resolve_ty(callee);
        let inner = first_inner..self.state.pending_calls.len();
        self.state.pending_calls.push(PendingCall {
            node: expr.id,
            callee,
            callee_def,
            base,
            context: ctx,
            function: self.state.contexts.context(ctx).function,
            inner,
            span: expr.span,
        });
    }

    fn infer_lambda(
        &mut self,
        ctx: ContextId,
        expr: &'a Expr,
        lambda: &'a Lambda,
    ) -> TypeResult<Typed> {
        let (function, body_ctx) = self.state.contexts.push_function(ctx, expr.id);
        self.state.contexts.context_mut(body_ctx).ceiling = lambda.effect;

        let mut params = Vec::with_capacity(lambda.params.len());
        for param in &lambda.params {
            let ty = match &param.spec {
                Some(spec) => self.infer_type_spec(ctx, spec)?,
                None => self.fresh(&param.name),
            };
            self.define(body_ctx, Definition::new(&param.name, ty, Universe::Value, param.span))?;
            self.record(param.id, ty, Ses::Tot, param.span);
            params.push(ty);
        }
        let ret = match &lambda.ret {
            Some(spec) => self.infer_type_spec(ctx, spec)?,
            None => self.fresh("ret"),
        };
        self.state.contexts.context_mut(body_ctx).return_slot = Some(ret);

        let body = self.infer_expr(body_ctx, &lambda.body)?;
        let slot = self.state.contexts.return_slot(body_ctx).unwrap_or(ret);
        self.unify_at(slot, body.ty, lambda.body.span)?;

        if let Some(declared) = lambda.effect {
            if !compare_ses(declared, body.ses) {
                return Err(TypeError::EffectViolation {
                    allowed: declared,
                    actual: body.ses,
                    span: lambda.body.span,
                });
            }
        }
        let ses = lambda.effect.unwrap_or(body.ses);
        let closure = if self.state.contexts.captures(function).is_empty() {
            ClosureSpec::No
        } else {
            ClosureSpec::Yes
        };

        let params = self.resolve_all(params);
        let arg = self.store.tuple(params);
        let ret = self.resolve_ty(slot);
        let ty = self.store.function(ret, arg, ses, closure);
        self.state.lambdas.insert(
            expr.id,
            LambdaRecord {
                function,
                body: lambda.body.id,
                declared: lambda.effect,
                body_ses: body.ses,
                ty,
                span: lambda.body.span,
            },
        );
        Ok(Typed::pure(ty))
    }

    fn infer_chain(
        &mut self,
        ctx: ContextId,
        chain: &'a Chain,
        expr: &'a Expr,
    ) -> TypeResult<Typed> {
        let inner = self.state.contexts.push(ctx, ContextKind::Chain);
        self.state.contexts.context_mut(inner).ceiling = chain.effect;

        let mut ses = Ses::Tot;
        for stmt in &chain.stmts {
            ses = ses.join(self.infer_stmt(inner, stmt)?);
        }
        let ty = match &chain.tail {
            Some(tail) => {
                let typed = self.infer_expr(inner, tail)?;
                ses = ses.join(typed.ses);
                typed.ty
            }
            None => TypeId::UNIT,
        };
        if let Some(ceiling) = chain.effect {
            if !compare_ses(ceiling, ses) {
                return Err(TypeError::EffectViolation {
                    allowed: ceiling,
                    actual: ses,
                    span: expr.span,
                });
            }
        }
        Ok(Typed::new(ty, ses))
    }
}
