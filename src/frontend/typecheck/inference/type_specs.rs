//! 类型标注求值

use crate::frontend::core::ast::{FieldSpec, TypeSpec, TypeSpecKind, Universe};
use crate::frontend::core::type_system::{Element, Kind, Ses, TypeId};

use crate::frontend::typecheck::context::ContextId;
use crate::frontend::typecheck::deferred::DeferredOrder;
use crate::frontend::typecheck::engine::Engine;
use crate::frontend::typecheck::errors::{TypeError, TypeResult};

impl<'a> Engine<'a> {
    /// 把类型标注求值为 TID
    pub(crate) fn infer_type_spec(
        &mut self,
        ctx: ContextId,
        spec: &'a TypeSpec,
    ) -> TypeResult<TypeId> {
        let span = spec.span;
        let ty = match &spec.kind {
            TypeSpecKind::Named(name) => {
                let def = self
                    .state
                    .contexts
                    .lookup(ctx, name)
                    .ok_or_else(|| TypeError::undefined(name, span))?;
                let definition = self.state.contexts.def(def);
                if definition.universe != Universe::Type {
                    return Err(TypeError::wrong_universe(
                        name,
                        Universe::Type,
                        definition.universe,
                        span,
                    ));
                }
                let body = definition.scheme.body;
                self.resolutions.insert(spec.id, def);
                body
            }
            TypeSpecKind::Pointer { pointee, mutable } => {
                let pointee = self.infer_type_spec(ctx, pointee)?;
                let pointee = self.resolve_ty(pointee);
                self.store.pointer(pointee, *mutable)
            }
            TypeSpecKind::Array { elem, len, mutable } => {
                let elem = self.infer_type_spec(ctx, elem)?;
                let elem = self.resolve_ty(elem);
                self.store.array_of_len(elem, *len, *mutable)
            }
            TypeSpecKind::Slice { elem, mutable } => {
                let elem = self.infer_type_spec(ctx, elem)?;
                let elem = self.resolve_ty(elem);
                self.store.slice(elem, *mutable)
            }
            TypeSpecKind::Fn {
                params,
                ret,
                effect,
                closure,
            } => {
                let params = self.infer_type_specs(ctx, params)?;
                let ret = self.infer_type_spec(ctx, ret)?;
                let params = self.resolve_all(params);
                let ret = self.resolve_ty(ret);
                let arg = self.store.tuple(params);
                self.store.function(ret, arg, *effect, *closure)
            }
            TypeSpecKind::Tuple(items) => {
                let items = self.infer_type_specs(ctx, items)?;
                let items = self.resolve_all(items);
                self.store.tuple(items)
            }
            TypeSpecKind::Struct(fields) => self.infer_fields(ctx, Kind::Struct, fields)?,
            TypeSpecKind::Union(fields) => self.infer_fields(ctx, Kind::Union, fields)?,
            TypeSpecKind::Member { base, name } => {
                let module = self.module_spec(ctx, base)?;
                let result = self.fresh(name);
                self.defer(DeferredOrder::field(module, name, Universe::Type, result, span))?;
                result
            }
            TypeSpecKind::Instantiate { module, .. } => {
                return Err(TypeError::wrong_universe(
                    &module.to_string(),
                    Universe::Type,
                    Universe::Module,
                    span,
                ))
            }
        };
        let ty = self.resolve_ty(ty);
        self.record(spec.id, ty, Ses::Tot, span);
        Ok(ty)
    }

    fn infer_type_specs(
        &mut self,
        ctx: ContextId,
        specs: &'a [TypeSpec],
    ) -> TypeResult<Vec<TypeId>> {
        specs.iter().map(|s| self.infer_type_spec(ctx, s)).collect()
    }

    fn infer_fields(
        &mut self,
        ctx: ContextId,
        kind: Kind,
        fields: &'a [FieldSpec],
    ) -> TypeResult<TypeId> {
        let mut tys = Vec::with_capacity(fields.len());
        for field in fields {
            tys.push(self.infer_type_spec(ctx, &field.spec)?);
        }
        let tys = self.resolve_all(tys);
        let elements = fields
            .iter()
            .zip(tys)
            .map(|(field, ty)| Element::named(&field.name, ty))
            .collect();
        Ok(self.store.mint_composite(kind, elements))
    }

    /// 类型位置上的模块引用：`M` 或 `M[args]`
    fn module_spec(
        &mut self,
        ctx: ContextId,
        base: &'a TypeSpec,
    ) -> TypeResult<TypeId> {
        let ty = match &base.kind {
            TypeSpecKind::Instantiate { module, args } => {
                self.module_type(ctx, &module.segments, module.id, args, base.span)?
            }
            TypeSpecKind::Named(name) => {
                self.module_type(ctx, std::slice::from_ref(name), base.id, &[], base.span)?
            }
            TypeSpecKind::Member { base: outer, name } => {
                let mut segments = Vec::new();
                if !Self::spec_path(outer, &mut segments) {
                    return Err(TypeError::wrong_universe(
                        name,
                        Universe::Module,
                        Universe::Type,
                        base.span,
                    ));
                }
                segments.push(name.clone());
                self.module_type(ctx, &segments, base.id, &[], base.span)?
            }
            _ => {
                return Err(TypeError::wrong_universe(
                    "type",
                    Universe::Module,
                    Universe::Type,
                    base.span,
                ))
            }
        };
        self.record(base.id, ty, Ses::Tot, base.span);
        Ok(ty)
    }

    /// 收集 `a.b.c` 形式的类型路径
    fn spec_path(
        spec: &TypeSpec,
        segments: &mut Vec<String>,
    ) -> bool {
        match &spec.kind {
            TypeSpecKind::Named(name) => {
                segments.push(name.clone());
                true
            }
            TypeSpecKind::Member { base, name } => {
                let ok = Self::spec_path(base, segments);
                segments.push(name.clone());
                ok
            }
            _ => false,
        }
    }
}
