//! 模板模块实例化
//!
//! 模板模块的方案以模板参数作为前几个量词。
//! - 无实参引用：普通实例化
//! - 带实参引用：检查元数、宇宙、值实参的副作用必须恰为 `Tot`，
//!   然后深度实例化并把每个实参与对应的新变量合一
//! - 两种引用都以新变量重新发出模板体内未解决的约束

use tracing::{debug, info};

use crate::frontend::core::ast::{TemplateArg, Universe};
use crate::frontend::core::type_system::{unify_all, Kind, Ses, Substitution, TypeId};
use crate::util::span::Span;

use super::context::ContextId;
use super::engine::Engine;
use super::errors::{TypeError, TypeResult};

impl<'a> Engine<'a> {
    /// 实例化已推断完成的模板模块
    pub(crate) fn instantiate_template(
        &mut self,
        ctx: ContextId,
        idx: usize,
        args: &'a [TemplateArg],
        span: Span,
    ) -> TypeResult<TypeId> {
        let info = &self.modules[idx];
        let (decl, def) = (info.decl, info.def);
        let params = info.params.clone();
        let name = decl.name.as_str();

        if args.is_empty() {
            let scheme = self.state.contexts.def(def).scheme.clone();
            let (sub, body) = scheme.instantiate(&mut self.store);
            self.reissue_orders(idx, &sub, span)?;
            let body = self.resolve_ty(body);
            debug!(module = name, ty = %self.store.display(body), "instantiated template without arguments");
            return Ok(body);
        }
        if args.len() != decl.params.len() {
            return Err(TypeError::template(
                name,
                format!(
                    "expected {} template argument(s), found {}",
                    decl.params.len(),
                    args.len()
                ),
                span,
            ));
        }

        let mut actuals = Vec::with_capacity(args.len());
        for (param, arg) in decl.params.iter().zip(args) {
            let actual = match (param.universe(), arg) {
                (Universe::Type, TemplateArg::Type(spec)) => self.infer_type_spec(ctx, spec)?,
                (Universe::Value, TemplateArg::Value(expr)) => {
                    let typed = self.infer_expr(ctx, expr)?;
                    if typed.ses != Ses::Tot {
                        return Err(TypeError::template(
                            name,
                            format!(
                                "value argument for `{}` must be Tot, found {}",
                                param.name, typed.ses
                            ),
                            span,
                        ));
                    }
                    typed.ty
                }
                (expected, arg) => {
                    let found = match arg {
                        TemplateArg::Type(_) => Universe::Type,
                        TemplateArg::Value(_) => Universe::Value,
                    };
                    return Err(TypeError::template(
                        name,
                        format!(
                            "argument for `{}` must be a {}, found a {}",
                            param.name, expected, found
                        ),
                        span,
                    ));
                }
            };
            actuals.push(actual);
        }

        let scheme = self.state.contexts.def(def).scheme.clone();
        let (sub, body) = scheme.instantiate_deep(&mut self.store);
        let mut pairs = Vec::with_capacity(actuals.len());
        for (param, actual) in params.into_iter().zip(actuals) {
            let current = self.resolve_ty(param);
            let formal = sub.rewrite(&mut self.store, current);
            let actual = self.resolve_ty(actual);
            pairs.push((formal, actual));
        }
        let step = unify_all(&mut self.store, &pairs)
            .map_err(|e| TypeError::template(name, e.to_string(), span))?;
        let body = step.rewrite(&mut self.store, body);
        self.apply(step, span)?;
        self.reissue_orders(idx, &sub, span)?;
        let body = self.resolve_ty(body);

        info!(
            module = name,
            args = args.len(),
            ty = %self.store.display(body),
            "instantiated template"
        );
        Ok(body)
    }

    /// 以实例化替换重新发出模板体内的约束，位置取实例化处
    fn reissue_orders(
        &mut self,
        idx: usize,
        sub: &Substitution,
        span: Span,
    ) -> TypeResult<()> {
        let info = &self.modules[idx];
        if info.orders.is_empty() {
            return Ok(());
        }
        let orders = info.orders.clone();
        let order_vars = info.order_vars.clone();
        let mut pairs = Vec::with_capacity(order_vars.len());
        for var in order_vars {
            let label = self.store.label(var).unwrap_or("t").to_string();
            pairs.push((var, self.store.mint_free_var(&label)));
        }
        let locals = Substitution::from_pairs(pairs);

        for mut order in orders {
            order.rewrite(&mut self.store, sub);
            order.rewrite(&mut self.store, &locals);
            order.rewrite(&mut self.store, &self.state.subst);
            let foreign = order
                .args
                .iter()
                .flat_map(|a| self.store.vars(*a).iter())
                .any(|v| self.store.kind(*v) == Kind::BoundVar);
            if foreign {
                // 外层模板的参数，只能随外层实例化确定
                debug!(order = %order.display(&self.store), "skipped constraint on outer template parameter");
                continue;
            }
            order.span = span;
            self.defer(order)?;
        }
        Ok(())
    }
}
