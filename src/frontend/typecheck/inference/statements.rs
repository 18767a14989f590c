//! 语句推断

use crate::frontend::core::ast::{Stmt, StmtKind, Universe};
use crate::frontend::core::type_system::{compare_ses, Ses, TypeId};

use crate::frontend::typecheck::context::{ContextId, Definition};
use crate::frontend::typecheck::engine::Engine;
use crate::frontend::typecheck::errors::{TypeError, TypeResult};

impl<'a> Engine<'a> {
    /// 推断语句，返回其副作用
    pub(crate) fn infer_stmt(
        &mut self,
        ctx: ContextId,
        stmt: &'a Stmt,
    ) -> TypeResult<Ses> {
        match &stmt.kind {
            StmtKind::Let { name, spec, value } => {
                let typed = self.infer_expr(ctx, value)?;
                let ty = match spec {
                    Some(spec) => {
                        let declared = self.infer_type_spec(ctx, spec)?;
                        self.unify_relaxed_at(declared, typed.ty, stmt.span)?;
                        declared
                    }
                    None => typed.ty,
                };
                let ty = self.resolve_ty(ty);
                let def = self.define(ctx, Definition::new(name, ty, Universe::Value, stmt.span))?;
                self.bind_lambda(def, value);
                self.record(stmt.id, ty, typed.ses, stmt.span);
                Ok(typed.ses)
            }
            StmtKind::Assign { target, value } => {
                let place = self.infer_expr(ctx, target)?;
                let typed = self.infer_expr(ctx, value)?;
                self.unify_relaxed_at(place.ty, typed.ty, stmt.span)?;
                let ses = Ses::St.join(place.ses).join(typed.ses);
                if let Some(ceiling) = self.state.contexts.ceiling(ctx) {
                    if !compare_ses(ceiling, ses) {
                        return Err(TypeError::EffectViolation {
                            allowed: ceiling,
                            actual: ses,
                            span: stmt.span,
                        });
                    }
                }
                self.record(stmt.id, TypeId::UNIT, ses, stmt.span);
                Ok(ses)
            }
            StmtKind::Expr(expr) => Ok(self.infer_expr(ctx, expr)?.ses),
        }
    }
}
