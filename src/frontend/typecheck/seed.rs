//! 播种阶段
//!
//! 在推断任何模块体之前，为每个模块和每个条目安装占位变量，
//! 使互相引用的模块总能拿到一个类型（循环导入）。

use tracing::debug;

use crate::frontend::core::ast::{ItemKind, ModuleDecl, Universe};
use crate::frontend::core::type_system::TypeId;
use crate::util::span::Span;

use super::context::{ContextId, ContextKind, Definition};
use super::engine::{Engine, ModuleInfo, ModuleState};
use super::errors::TypeResult;

/// 内置类型名称
const BUILTIN_TYPES: &[(&str, TypeId)] = &[
    ("unit", TypeId::UNIT),
    ("str", TypeId::STRING),
    ("bool", TypeId::BOOL),
    ("i8", TypeId::I8),
    ("i16", TypeId::I16),
    ("i32", TypeId::I32),
    ("i64", TypeId::I64),
    ("u8", TypeId::U8),
    ("u16", TypeId::U16),
    ("u32", TypeId::U32),
    ("u64", TypeId::U64),
    ("f32", TypeId::F32),
    ("f64", TypeId::F64),
    ("int8", TypeId::I8),
    ("int16", TypeId::I16),
    ("int32", TypeId::I32),
    ("int64", TypeId::I64),
    ("uint8", TypeId::U8),
    ("uint16", TypeId::U16),
    ("uint32", TypeId::U32),
    ("uint64", TypeId::U64),
    ("float32", TypeId::F32),
    ("float64", TypeId::F64),
];

impl<'a> Engine<'a> {
    /// 第一阶段：内置类型、模块占位、条目占位
    pub(crate) fn seed(&mut self) -> TypeResult<()> {
        let root = self.state.contexts.root();
        for (name, tid) in BUILTIN_TYPES {
            let def = Definition::new(name, *tid, Universe::Type, Span::dummy()).global();
            self.define(root, def)?;
        }
        let program = self.program;
        for decl in &program.modules {
            self.seed_module(decl, root, false)?;
        }
        debug!(modules = self.modules.len(), "seeding finished");
        Ok(())
    }

    fn seed_module(
        &mut self,
        decl: &'a ModuleDecl,
        parent: ContextId,
        outer_generic: bool,
    ) -> TypeResult<usize> {
        let ctx = self.state.contexts.push(parent, ContextKind::Module);
        let placeholder = self.fresh(&decl.name);
        let def = self.define(
            parent,
            Definition::new(&decl.name, placeholder, Universe::Module, decl.span)
                .global()
                .with_scope(ctx),
        )?;

        let idx = self.modules.len();
        let generic = outer_generic || decl.is_template();
        self.modules.push(ModuleInfo {
            decl,
            context: ctx,
            def,
            placeholder,
            params: Vec::new(),
            item_defs: Vec::new(),
            generic,
            state: ModuleState::Seeded,
            orders: Vec::new(),
            order_vars: Vec::new(),
        });
        self.module_by_def.insert(def, idx);
        debug!(module = %decl.name, placeholder = %self.store.display(placeholder), "seeded module");

        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let universe = param.universe();
            let var = self.store.mint_bound_var(&param.name);
            let def = Definition::new(&param.name, var, universe, param.span)
                .global()
                .constant(universe == Universe::Value)
                .placeholder();
            self.define(ctx, def)?;
            params.push(var);
        }

        let mut item_defs = Vec::with_capacity(decl.items.len());
        for item in &decl.items {
            let def = match &item.kind {
                ItemKind::Module(child) => {
                    let child = self.seed_module(child, ctx, generic)?;
                    self.modules[child].def
                }
                kind => {
                    let placeholder = self.fresh(item.name());
                    let mut def = Definition::new(item.name(), placeholder, item.universe(), item.span).global();
                    match kind {
                        ItemKind::Value { constant, .. } => def = def.constant(*constant),
                        ItemKind::Extern { tag, .. } => def = def.with_extern(tag),
                        _ => {}
                    }
                    self.define(ctx, def)?
                }
            };
            item_defs.push(def);
        }

        let info = &mut self.modules[idx];
        info.params = params;
        info.item_defs = item_defs;
        Ok(idx)
    }
}
