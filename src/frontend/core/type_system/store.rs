//! 类型存储（TID 驻留表）
//!
//! 所有类型都以 `TypeId` 句柄表示：
//! - 原子类型按形状驻留：同一形状总是得到同一个 TID
//! - 复合类型按元素列表结构驻留：结构相同 ⇒ TID 相同
//! - 自由变量 / 约束变量从不驻留：每次创建都是全新的 TID
//!
//! 因此在不含变量的类型上，TID 相等即结构相等。存储只增不减，
//! 一次编译的类型宇宙受程序规模约束。

use std::collections::{HashMap, HashSet};
use std::fmt;

use smallvec::SmallVec;

use super::effect::{ClosureSpec, Ses};

/// 类型标识符
///
/// 不透明句柄，仅在创建它的 `TypeStore` 内有意义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    // `TypeStore::new` 按以下顺序预先驻留常用原子类型
    pub const UNIT: TypeId = TypeId(0);
    pub const STRING: TypeId = TypeId(1);
    pub const I8: TypeId = TypeId(2);
    pub const I16: TypeId = TypeId(3);
    pub const I32: TypeId = TypeId(4);
    pub const I64: TypeId = TypeId(5);
    pub const BOOL: TypeId = TypeId(6);
    pub const U8: TypeId = TypeId(7);
    pub const U16: TypeId = TypeId(8);
    pub const U32: TypeId = TypeId(9);
    pub const U64: TypeId = TypeId(10);
    pub const F32: TypeId = TypeId(11);
    pub const F64: TypeId = TypeId(12);

    /// 获取原始索引
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// 类型种类，创建时确定，终生不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Unit,
    String,
    SignedInt,
    UnsignedInt,
    Float,
    Pointer,
    Array,
    Slice,
    Fn,
    Tuple,
    Struct,
    Union,
    Module,
    FreeVar,
    BoundVar,
    /// 数组长度编码，只作为 Array 的第二个元素出现
    Length,
}

impl Kind {
    /// 是否是变量
    pub fn is_var(self) -> bool {
        matches!(self, Kind::FreeVar | Kind::BoundVar)
    }

    /// 是否是整数
    pub fn is_integer(self) -> bool {
        matches!(self, Kind::SignedInt | Kind::UnsignedInt)
    }

    /// 是否是数值
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::SignedInt | Kind::UnsignedInt | Kind::Float)
    }

    /// 是否是内存窗口类型（指针 / 数组 / 切片）
    pub fn is_memory_window(self) -> bool {
        matches!(self, Kind::Pointer | Kind::Array | Kind::Slice)
    }

    /// 是否是带命名字段的积类型
    pub fn has_named_fields(self) -> bool {
        matches!(self, Kind::Struct | Kind::Union | Kind::Module)
    }

    /// 种类名称（用于错误信息）
    pub fn name(self) -> &'static str {
        match self {
            Kind::Unit => "unit",
            Kind::String => "string",
            Kind::SignedInt => "signed integer",
            Kind::UnsignedInt => "unsigned integer",
            Kind::Float => "float",
            Kind::Pointer => "pointer",
            Kind::Array => "array",
            Kind::Slice => "slice",
            Kind::Fn => "function",
            Kind::Tuple => "tuple",
            Kind::Struct => "struct",
            Kind::Union => "union",
            Kind::Module => "module",
            Kind::FreeVar => "free variable",
            Kind::BoundVar => "bound variable",
            Kind::Length => "array length",
        }
    }
}

/// 原子类型形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicShape {
    Unit,
    String,
    /// 有符号整数（位宽）
    Signed(u32),
    /// 无符号整数（位宽），`Unsigned(1)` 即 bool
    Unsigned(u32),
    /// 浮点数（位宽）
    Float(u32),
    /// 数组长度
    Length(u64),
}

impl AtomicShape {
    /// 形状对应的种类
    pub fn kind(self) -> Kind {
        match self {
            AtomicShape::Unit => Kind::Unit,
            AtomicShape::String => Kind::String,
            AtomicShape::Signed(_) => Kind::SignedInt,
            AtomicShape::Unsigned(_) => Kind::UnsignedInt,
            AtomicShape::Float(_) => Kind::Float,
            AtomicShape::Length(_) => Kind::Length,
        }
    }
}

/// 复合类型的元素：(可选名称, 元素 TID, 是否类型字段)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    pub name: Option<String>,
    pub ty: TypeId,
    pub is_type_field: bool,
}

impl Element {
    /// 位置元素
    pub fn positional(ty: TypeId) -> Self {
        Element {
            name: None,
            ty,
            is_type_field: false,
        }
    }

    /// 命名值字段
    pub fn named(
        name: impl Into<String>,
        ty: TypeId,
    ) -> Self {
        Element {
            name: Some(name.into()),
            ty,
            is_type_field: false,
        }
    }

    /// 命名类型字段（模块导出的类型定义）
    pub fn type_field(
        name: impl Into<String>,
        ty: TypeId,
    ) -> Self {
        Element {
            name: Some(name.into()),
            ty,
            is_type_field: true,
        }
    }

    /// 替换元素类型，保留名称和标志
    pub fn with_ty(
        &self,
        ty: TypeId,
    ) -> Self {
        Element {
            name: self.name.clone(),
            ty,
            is_type_field: self.is_type_field,
        }
    }
}

/// 元素列表
pub type Elements = SmallVec<[Element; 4]>;

/// 函数类型附带的副作用与闭包规格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnSpec {
    pub ses: Ses,
    pub closure: ClosureSpec,
}

/// 驻留键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Atomic(AtomicShape),
    Composite {
        kind: Kind,
        elements: Elements,
        mutable: bool,
        spec: Option<FnSpec>,
    },
}

/// 单个 TID 的元数据
#[derive(Debug, Clone)]
struct TypeData {
    kind: Kind,
    atom: Option<AtomicShape>,
    elements: Elements,
    spec: Option<FnSpec>,
    /// 变量的显示名称
    label: Option<String>,
    /// 已排序的变量集合（自由变量与约束变量）
    vars: SmallVec<[TypeId; 4]>,
}

/// 类型存储
///
/// 只增不减的驻留表，显式地以引用传给每个组件
#[derive(Debug, Clone)]
pub struct TypeStore {
    types: Vec<TypeData>,
    interned: HashMap<TypeKey, TypeId>,
    /// 可变性旁表：仅对指针 / 数组 / 切片设置，缺省即不可变
    mutable: HashSet<TypeId>,
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeStore {
    /// 创建新的类型存储并预先驻留常用原子类型
    pub fn new() -> Self {
        let mut store = TypeStore {
            types: Vec::new(),
            interned: HashMap::new(),
            mutable: HashSet::new(),
        };
        for shape in [
            AtomicShape::Unit,
            AtomicShape::String,
            AtomicShape::Signed(8),
            AtomicShape::Signed(16),
            AtomicShape::Signed(32),
            AtomicShape::Signed(64),
            AtomicShape::Unsigned(1),
            AtomicShape::Unsigned(8),
            AtomicShape::Unsigned(16),
            AtomicShape::Unsigned(32),
            AtomicShape::Unsigned(64),
            AtomicShape::Float(32),
            AtomicShape::Float(64),
        ] {
            store.mint_atomic(shape);
        }
        store
    }

    /// 已创建的 TID 数量
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// 是否为空（预驻留之后永远不为空）
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn push(
        &mut self,
        data: TypeData,
    ) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(data);
        id
    }

    fn data(
        &self,
        tid: TypeId,
    ) -> &TypeData {
        &self.types[tid.0 as usize]
    }

    // ------------------------------------------------------------------
    // 创建
    // ------------------------------------------------------------------

    /// 创建（或取回）原子类型
    pub fn mint_atomic(
        &mut self,
        shape: AtomicShape,
    ) -> TypeId {
        let key = TypeKey::Atomic(shape);
        if let Some(&tid) = self.interned.get(&key) {
            return tid;
        }
        let tid = self.push(TypeData {
            kind: shape.kind(),
            atom: Some(shape),
            elements: Elements::new(),
            spec: None,
            label: None,
            vars: SmallVec::new(),
        });
        self.interned.insert(key, tid);
        tid
    }

    fn mint_interned(
        &mut self,
        kind: Kind,
        elements: Elements,
        mutable: bool,
        spec: Option<FnSpec>,
    ) -> TypeId {
        let key = TypeKey::Composite {
            kind,
            elements,
            mutable,
            spec,
        };
        if let Some(&tid) = self.interned.get(&key) {
            return tid;
        }
        let elements = match &key {
            TypeKey::Composite { elements, .. } => elements.clone(),
            TypeKey::Atomic(_) => Elements::new(),
        };
        let mut vars: SmallVec<[TypeId; 4]> = SmallVec::new();
        for element in &elements {
            vars.extend(self.data(element.ty).vars.iter().copied());
        }
        vars.sort_unstable();
        vars.dedup();
        let tid = self.push(TypeData {
            kind,
            atom: None,
            elements,
            spec,
            label: None,
            vars,
        });
        if mutable {
            self.mutable.insert(tid);
        }
        self.interned.insert(key, tid);
        tid
    }

    /// 创建（或取回）积类型：Tuple / Struct / Union / Module
    pub fn mint_composite(
        &mut self,
        kind: Kind,
        elements: Elements,
    ) -> TypeId {
        debug_assert!(
            matches!(kind, Kind::Tuple | Kind::Struct | Kind::Union | Kind::Module),
            "mint_composite called with {:?}",
            kind
        );
        self.mint_interned(kind, elements, false, None)
    }

    /// 元组类型
    pub fn tuple(
        &mut self,
        items: impl IntoIterator<Item = TypeId>,
    ) -> TypeId {
        let elements = items.into_iter().map(Element::positional).collect();
        self.mint_composite(Kind::Tuple, elements)
    }

    /// 指针类型
    pub fn pointer(
        &mut self,
        pointee: TypeId,
        mutable: bool,
    ) -> TypeId {
        let elements = std::iter::once(Element::positional(pointee)).collect();
        self.mint_interned(Kind::Pointer, elements, mutable, None)
    }

    /// 切片类型
    pub fn slice(
        &mut self,
        elem: TypeId,
        mutable: bool,
    ) -> TypeId {
        let elements = std::iter::once(Element::positional(elem)).collect();
        self.mint_interned(Kind::Slice, elements, mutable, None)
    }

    /// 数组类型，`length` 是 `Length` 原子或变量
    pub fn array(
        &mut self,
        elem: TypeId,
        length: TypeId,
        mutable: bool,
    ) -> TypeId {
        let elements = [Element::positional(elem), Element::positional(length)]
            .into_iter()
            .collect();
        self.mint_interned(Kind::Array, elements, mutable, None)
    }

    /// 定长数组类型
    pub fn array_of_len(
        &mut self,
        elem: TypeId,
        len: u64,
        mutable: bool,
    ) -> TypeId {
        let length = self.mint_atomic(AtomicShape::Length(len));
        self.array(elem, length, mutable)
    }

    /// 函数类型：元素为 (返回, 参数)
    pub fn function(
        &mut self,
        ret: TypeId,
        arg: TypeId,
        ses: Ses,
        closure: ClosureSpec,
    ) -> TypeId {
        let elements = [Element::positional(ret), Element::positional(arg)]
            .into_iter()
            .collect();
        self.mint_interned(Kind::Fn, elements, false, Some(FnSpec { ses, closure }))
    }

    /// 创建全新的自由变量
    pub fn mint_free_var(
        &mut self,
        label: &str,
    ) -> TypeId {
        self.mint_var(Kind::FreeVar, label)
    }

    /// 创建全新的约束变量
    pub fn mint_bound_var(
        &mut self,
        label: &str,
    ) -> TypeId {
        self.mint_var(Kind::BoundVar, label)
    }

    fn mint_var(
        &mut self,
        kind: Kind,
        label: &str,
    ) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeData {
            kind,
            atom: None,
            elements: Elements::new(),
            spec: None,
            label: Some(label.to_string()),
            vars: std::iter::once(id).collect(),
        });
        id
    }

    /// 以新元素重建复合类型，保留种类、可变性与函数规格
    pub fn rebuild(
        &mut self,
        tid: TypeId,
        elements: Elements,
    ) -> TypeId {
        let data = self.data(tid);
        let (kind, spec) = (data.kind, data.spec);
        let mutable = self.is_mutable(tid);
        self.mint_interned(kind, elements, mutable, spec)
    }

    /// 以新的函数规格重建函数类型
    pub fn with_fn_spec(
        &mut self,
        tid: TypeId,
        spec: FnSpec,
    ) -> TypeId {
        let elements = self.data(tid).elements.clone();
        self.mint_interned(Kind::Fn, elements, false, Some(spec))
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    /// 获取种类
    pub fn kind(
        &self,
        tid: TypeId,
    ) -> Kind {
        self.data(tid).kind
    }

    /// 是否是变量（自由或约束）
    pub fn is_var(
        &self,
        tid: TypeId,
    ) -> bool {
        self.kind(tid).is_var()
    }

    /// 获取原子形状
    pub fn atom(
        &self,
        tid: TypeId,
    ) -> Option<AtomicShape> {
        self.data(tid).atom
    }

    /// 整数或浮点位宽
    pub fn width(
        &self,
        tid: TypeId,
    ) -> Option<u32> {
        match self.atom(tid)? {
            AtomicShape::Signed(w) | AtomicShape::Unsigned(w) | AtomicShape::Float(w) => Some(w),
            _ => None,
        }
    }

    /// 是否是 bool（`Unsigned(1)`）
    pub fn is_bool(
        &self,
        tid: TypeId,
    ) -> bool {
        self.atom(tid) == Some(AtomicShape::Unsigned(1))
    }

    /// 获取元素列表
    pub fn elements(
        &self,
        tid: TypeId,
    ) -> &Elements {
        &self.data(tid).elements
    }

    /// 按名称查找元素
    pub fn field(
        &self,
        tid: TypeId,
        name: &str,
    ) -> Option<&Element> {
        self.elements(tid)
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
    }

    /// 内存窗口类型的被指元素
    pub fn pointee(
        &self,
        tid: TypeId,
    ) -> Option<TypeId> {
        if self.kind(tid).is_memory_window() {
            self.elements(tid).first().map(|e| e.ty)
        } else {
            None
        }
    }

    /// 函数类型的 (返回, 参数)
    pub fn fn_parts(
        &self,
        tid: TypeId,
    ) -> Option<(TypeId, TypeId)> {
        if self.kind(tid) != Kind::Fn {
            return None;
        }
        let elements = self.elements(tid);
        Some((elements[0].ty, elements[1].ty))
    }

    /// 函数类型的副作用与闭包规格
    pub fn fn_spec(
        &self,
        tid: TypeId,
    ) -> Option<FnSpec> {
        self.data(tid).spec
    }

    /// 可变性（仅对内存窗口类型有意义）
    pub fn is_mutable(
        &self,
        tid: TypeId,
    ) -> bool {
        self.mutable.contains(&tid)
    }

    /// 变量的显示名称
    pub fn label(
        &self,
        tid: TypeId,
    ) -> Option<&str> {
        self.data(tid).label.as_deref()
    }

    /// 类型中出现的全部变量（已排序）
    pub fn vars(
        &self,
        tid: TypeId,
    ) -> &[TypeId] {
        &self.data(tid).vars
    }

    /// 类型中出现的自由变量
    pub fn free_vars(
        &self,
        tid: TypeId,
    ) -> impl Iterator<Item = TypeId> + '_ {
        self.vars(tid)
            .iter()
            .copied()
            .filter(|v| self.kind(*v) == Kind::FreeVar)
    }

    /// 类型是否仍含变量（含变量的类型可能被后续替换改写）
    pub fn has_vars(
        &self,
        tid: TypeId,
    ) -> bool {
        !self.vars(tid).is_empty()
    }

    /// 类型是否仍含自由变量
    pub fn has_free_vars(
        &self,
        tid: TypeId,
    ) -> bool {
        self.free_vars(tid).next().is_some()
    }

    /// occurs check：`var` 是否出现在 `tid` 中
    pub fn contains_var(
        &self,
        tid: TypeId,
        var: TypeId,
    ) -> bool {
        self.vars(tid).binary_search(&var).is_ok()
    }

    /// 可显示包装
    pub fn display(
        &self,
        tid: TypeId,
    ) -> TypeDisplay<'_> {
        TypeDisplay { store: self, tid }
    }

    fn fmt_type(
        &self,
        tid: TypeId,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let data = self.data(tid);
        if let Some(atom) = data.atom {
            return match atom {
                AtomicShape::Unit => write!(f, "()"),
                AtomicShape::String => write!(f, "str"),
                AtomicShape::Unsigned(1) => write!(f, "bool"),
                AtomicShape::Signed(w) => write!(f, "i{}", w),
                AtomicShape::Unsigned(w) => write!(f, "u{}", w),
                AtomicShape::Float(w) => write!(f, "f{}", w),
                AtomicShape::Length(n) => write!(f, "{}", n),
            };
        }
        let mutability = if self.is_mutable(tid) { "mut " } else { "" };
        match data.kind {
            Kind::FreeVar => write!(f, "'{}{}", data.label.as_deref().unwrap_or("t"), tid.0),
            Kind::BoundVar => write!(f, "^{}{}", data.label.as_deref().unwrap_or("T"), tid.0),
            Kind::Pointer => {
                write!(f, "*{}", mutability)?;
                self.fmt_type(data.elements[0].ty, f)
            }
            Kind::Slice => {
                write!(f, "[]{}", mutability)?;
                self.fmt_type(data.elements[0].ty, f)
            }
            Kind::Array => {
                write!(f, "[{}", mutability)?;
                self.fmt_type(data.elements[0].ty, f)?;
                write!(f, "; ")?;
                self.fmt_type(data.elements[1].ty, f)?;
                write!(f, "]")
            }
            Kind::Fn => {
                let spec = data.spec.unwrap_or(FnSpec {
                    ses: Ses::Tot,
                    closure: ClosureSpec::Maybe,
                });
                if spec.closure == ClosureSpec::Yes {
                    write!(f, "closure ")?;
                }
                write!(f, "fn")?;
                let arg = data.elements[1].ty;
                write!(f, "(")?;
                if self.kind(arg) == Kind::Tuple {
                    for (i, element) in self.elements(arg).iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        self.fmt_type(element.ty, f)?;
                    }
                } else {
                    self.fmt_type(arg, f)?;
                }
                write!(f, ")")?;
                write!(f, " -> ")?;
                self.fmt_type(data.elements[0].ty, f)?;
                if spec.ses != Ses::Tot {
                    write!(f, " / {}", spec.ses)?;
                }
                Ok(())
            }
            Kind::Tuple => {
                write!(f, "(")?;
                for (i, element) in data.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_type(element.ty, f)?;
                }
                if data.elements.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Kind::Struct | Kind::Union | Kind::Module => {
                let keyword = match data.kind {
                    Kind::Struct => "struct",
                    Kind::Union => "union",
                    _ => "module",
                };
                write!(f, "{} {{", keyword)?;
                for (i, element) in data.elements.iter().enumerate() {
                    write!(f, "{}", if i > 0 { ", " } else { " " })?;
                    if element.is_type_field {
                        write!(f, "type ")?;
                    }
                    write!(f, "{}: ", element.name.as_deref().unwrap_or("_"))?;
                    self.fmt_type(element.ty, f)?;
                }
                if data.elements.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
            // 原子种类已在上面处理
            _ => write!(f, "{}", tid),
        }
    }
}

/// 类型的可显示视图
pub struct TypeDisplay<'a> {
    store: &'a TypeStore,
    tid: TypeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        self.store.fmt_type(self.tid, f)
    }
}
