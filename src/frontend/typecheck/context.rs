//! 词法上下文树与闭包分析
//!
//! 上下文以 arena 存储，父子关系用 `ContextId` 句柄表示：
//! - 进入模块、链表达式、lambda 体时创建上下文，永不删除
//! - 查找先查本地符号表，再沿父链向上
//! - 标识符解析到非全局定义、且两者所在函数不同时，记录为闭包捕获

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use crate::frontend::core::ast::{NodeId, Universe};
use crate::frontend::core::type_system::{Scheme, Ses, Substitution, TypeId, TypeStore};
use crate::util::span::Span;

/// 上下文句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

/// 定义句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

/// 函数标记：每个 lambda 一个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FnId(pub u32);

/// 上下文种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Root,
    Module,
    Chain,
    Lambda,
}

/// 定义标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefFlags {
    /// 全局可见（模块级定义），引用它不构成捕获
    pub global: bool,
    /// 编译期常量
    pub constant: bool,
    /// 模板参数占位
    pub bound_var_placeholder: bool,
}

/// 名称绑定
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub scheme: Scheme,
    pub universe: Universe,
    pub span: Span,
    pub extern_tag: Option<String>,
    pub flags: DefFlags,
    /// 所在上下文
    pub context: ContextId,
    /// 所在函数
    pub function: Option<FnId>,
    /// 模块定义自身的上下文
    pub scope: Option<ContextId>,
}

impl Definition {
    /// 以单态方案创建定义
    pub fn new(
        name: &str,
        ty: TypeId,
        universe: Universe,
        span: Span,
    ) -> Self {
        Definition {
            name: name.to_string(),
            scheme: Scheme::mono(ty),
            universe,
            span,
            extern_tag: None,
            flags: DefFlags::default(),
            context: ContextId(0),
            function: None,
            scope: None,
        }
    }

    pub fn global(mut self) -> Self {
        self.flags.global = true;
        self
    }

    pub fn constant(
        mut self,
        constant: bool,
    ) -> Self {
        self.flags.constant = constant;
        self
    }

    pub fn placeholder(mut self) -> Self {
        self.flags.bound_var_placeholder = true;
        self
    }

    pub fn with_extern(
        mut self,
        tag: &str,
    ) -> Self {
        self.extern_tag = Some(tag.to_string());
        self
    }

    pub fn with_scope(
        mut self,
        scope: ContextId,
    ) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// 上下文节点
#[derive(Debug, Clone)]
pub struct Context {
    pub kind: ContextKind,
    pub parent: Option<ContextId>,
    pub children: Vec<ContextId>,
    pub symbols: IndexMap<String, DefId>,
    /// 所在函数（lambda 上下文是新函数，其余继承父上下文）
    pub function: Option<FnId>,
    /// lambda 的返回类型槽
    pub return_slot: Option<TypeId>,
    /// 副作用上限
    pub ceiling: Option<Ses>,
}

#[derive(Debug, Clone)]
struct FnInfo {
    parent: Option<FnId>,
    node: NodeId,
    captures: IndexMap<String, DefId>,
}

/// 上下文树
#[derive(Debug, Clone)]
pub struct ContextTree {
    contexts: Vec<Context>,
    defs: Vec<Definition>,
    functions: Vec<FnInfo>,
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTree {
    /// 创建只含根上下文的树
    pub fn new() -> Self {
        ContextTree {
            contexts: vec![Context {
                kind: ContextKind::Root,
                parent: None,
                children: Vec::new(),
                symbols: IndexMap::new(),
                function: None,
                return_slot: None,
                ceiling: None,
            }],
            defs: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// 根上下文
    pub fn root(&self) -> ContextId {
        ContextId(0)
    }

    /// 创建子上下文
    pub fn push(
        &mut self,
        parent: ContextId,
        kind: ContextKind,
    ) -> ContextId {
        let id = ContextId(self.contexts.len() as u32);
        let function = self.context(parent).function;
        self.contexts.push(Context {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            symbols: IndexMap::new(),
            function,
            return_slot: None,
            ceiling: None,
        });
        self.context_mut(parent).children.push(id);
        id
    }

    /// 为 lambda 创建函数标记与函数体上下文
    pub fn push_function(
        &mut self,
        parent: ContextId,
        node: NodeId,
    ) -> (FnId, ContextId) {
        let fn_id = FnId(self.functions.len() as u32);
        self.functions.push(FnInfo {
            parent: self.context(parent).function,
            node,
            captures: IndexMap::new(),
        });
        let ctx = self.push(parent, ContextKind::Lambda);
        self.context_mut(ctx).function = Some(fn_id);
        (fn_id, ctx)
    }

    pub fn context(
        &self,
        id: ContextId,
    ) -> &Context {
        &self.contexts[id.0 as usize]
    }

    pub fn context_mut(
        &mut self,
        id: ContextId,
    ) -> &mut Context {
        &mut self.contexts[id.0 as usize]
    }

    pub fn def(
        &self,
        id: DefId,
    ) -> &Definition {
        &self.defs[id.0 as usize]
    }

    pub fn def_mut(
        &mut self,
        id: DefId,
    ) -> &mut Definition {
        &mut self.defs[id.0 as usize]
    }

    /// 所有定义
    pub fn defs(&self) -> impl Iterator<Item = (DefId, &Definition)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, d)| (DefId(i as u32), d))
    }

    /// 上下文数量
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// 永远至少有根上下文
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// 插入定义；名称已存在时返回已有定义
    pub fn try_define(
        &mut self,
        ctx: ContextId,
        mut def: Definition,
    ) -> Result<DefId, DefId> {
        if let Some(&existing) = self.context(ctx).symbols.get(&def.name) {
            return Err(existing);
        }
        def.context = ctx;
        def.function = self.context(ctx).function;
        let id = DefId(self.defs.len() as u32);
        self.context_mut(ctx).symbols.insert(def.name.clone(), id);
        self.defs.push(def);
        Ok(id)
    }

    /// 沿父链查找名称
    pub fn lookup(
        &self,
        ctx: ContextId,
        name: &str,
    ) -> Option<DefId> {
        let mut current = Some(ctx);
        while let Some(id) = current {
            let context = self.context(id);
            if let Some(&def) = context.symbols.get(name) {
                return Some(def);
            }
            current = context.parent;
        }
        None
    }

    /// 只查本地符号表
    pub fn lookup_local(
        &self,
        ctx: ContextId,
        name: &str,
    ) -> Option<DefId> {
        self.context(ctx).symbols.get(name).copied()
    }

    /// 解析标识符并记录闭包捕获
    ///
    /// 捕获记录在标识符所在函数上，并沿函数链一直记录到定义所在函数为止。
    pub fn resolve(
        &mut self,
        ctx: ContextId,
        name: &str,
    ) -> Option<DefId> {
        let id = self.lookup(ctx, name)?;
        let def = self.def(id);
        let at = self.context(ctx).function;
        if def.flags.global || def.function == at {
            return Some(id);
        }
        let owner = def.function;
        let mut current = at;
        while let Some(f) = current {
            if Some(f) == owner {
                break;
            }
            trace!(name, function = f.0, "captured");
            let info = &mut self.functions[f.0 as usize];
            info.captures.insert(name.to_string(), id);
            current = info.parent;
        }
        Some(id)
    }

    /// 函数的捕获集合
    pub fn captures(
        &self,
        f: FnId,
    ) -> &IndexMap<String, DefId> {
        &self.functions[f.0 as usize].captures
    }

    /// 所有 lambda 的 (节点, 捕获集合)
    pub fn lambda_captures(&self) -> impl Iterator<Item = (NodeId, &IndexMap<String, DefId>)> {
        self.functions.iter().map(|f| (f.node, &f.captures))
    }

    /// 最近的副作用上限，不越过 lambda 边界
    pub fn ceiling(
        &self,
        ctx: ContextId,
    ) -> Option<Ses> {
        let mut current = Some(ctx);
        while let Some(id) = current {
            let context = self.context(id);
            if context.ceiling.is_some() || context.kind == ContextKind::Lambda {
                return context.ceiling;
            }
            current = context.parent;
        }
        None
    }

    /// 最近的 lambda 返回类型槽
    pub fn return_slot(
        &self,
        ctx: ContextId,
    ) -> Option<TypeId> {
        let mut current = Some(ctx);
        while let Some(id) = current {
            let context = self.context(id);
            if context.kind == ContextKind::Lambda {
                return context.return_slot;
            }
            current = context.parent;
        }
        None
    }

    /// `ctx` 是否位于 `ancestor` 之内（含自身）
    pub fn is_within(
        &self,
        ctx: ContextId,
        ancestor: ContextId,
    ) -> bool {
        let mut current = Some(ctx);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.context(id).parent;
        }
        false
    }

    /// `scope` 之外的定义中出现的自由变量
    pub fn free_vars_outside(
        &self,
        store: &TypeStore,
        scope: ContextId,
    ) -> HashSet<TypeId> {
        self.defs
            .iter()
            .filter(|d| !self.is_within(d.context, scope))
            .flat_map(|d| d.scheme.free_vars(store))
            .collect()
    }

    /// 以映射改写所有定义的方案主体（用于非变量类型的整体替换）
    pub fn retype(
        &mut self,
        mut f: impl FnMut(TypeId) -> TypeId,
    ) {
        for def in &mut self.defs {
            def.scheme.body = f(def.scheme.body);
        }
    }

    /// 以替换改写所有定义与返回类型槽
    pub fn rewrite(
        &mut self,
        store: &mut TypeStore,
        sub: &Substitution,
    ) {
        if sub.is_empty() {
            return;
        }
        for def in &mut self.defs {
            if store.has_vars(def.scheme.body) {
                def.scheme.rewrite(store, sub);
            }
        }
        for context in &mut self.contexts {
            if let Some(slot) = context.return_slot.as_mut() {
                *slot = sub.rewrite(store, *slot);
            }
        }
    }
}
