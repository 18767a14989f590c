//! Abstract Syntax Tree types
//!
//! The tree is produced by an external parser and never mutated by the
//! engine. Every node that can receive a type carries a [`NodeId`]; the
//! engine keeps resolved types and definitions in side tables keyed by it.

use std::fmt;

use crate::frontend::core::type_system::{ClosureSpec, Ses};
use crate::util::span::Span;

pub mod builder;

pub use builder::AstBuilder;

/// Node identifier, unique within one forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal, optionally suffixed (`2u8`, `7i64`)
    Int {
        value: u64,
        suffix: Option<IntSuffix>,
    },
    /// Float literal, optionally suffixed with its width (`1.5f32`)
    Float { value: f64, width: Option<u32> },
    Bool(bool),
    Str(String),
    Unit,
}

/// Integer literal suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntSuffix {
    pub signed: bool,
    pub width: u32,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinOp {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let op = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{}", op)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    Deref,
}

impl fmt::Display for UnOp {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let op = match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::Deref => "*",
        };
        write!(f, "{}", op)
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Lambda(Lambda),
    Chain(Chain),
    Tuple(Vec<Expr>),
    StructLit(Vec<FieldInit>),
    ArrayLit(Vec<Expr>),
    /// `base.name`, on structs, unions and modules
    Field {
        base: Box<Expr>,
        name: String,
    },
    /// `base.0`, on tuples and structs
    TupleIndex {
        base: Box<Expr>,
        index: usize,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Cast {
        value: Box<Expr>,
        target: TypeSpec,
    },
    /// `&value` / `&mut value`
    AddrOf {
        value: Box<Expr>,
        mutable: bool,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    Return(Option<Box<Expr>>),
    /// `M[int32, 4]`
    Instantiate {
        module: Path,
        args: Vec<TemplateArg>,
    },
}

/// Lambda expression: `fn(params) -> ret / effect { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub ret: Option<Box<TypeSpec>>,
    /// Declared effect ceiling
    pub effect: Option<Ses>,
    pub body: Box<Expr>,
}

/// Lambda parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub id: NodeId,
    pub name: String,
    pub spec: Option<TypeSpec>,
    pub span: Span,
}

/// Chain expression: `{ stmt; stmt; tail }`, optionally with an effect ceiling
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub effect: Option<Ses>,
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
}

/// Field initializer inside a struct literal
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
}

/// Dotted module path: `outer.inner.M`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub id: NodeId,
    pub segments: Vec<String>,
    pub span: Span,
}

impl fmt::Display for Path {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Actual template argument
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    Type(TypeSpec),
    Value(Expr),
}

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `name: spec := value`
    Let {
        name: String,
        spec: Option<TypeSpec>,
        value: Expr,
    },
    /// `target = value`
    Assign { target: Expr, value: Expr },
    Expr(Expr),
}

/// Type specification
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub id: NodeId,
    pub kind: TypeSpecKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpecKind {
    Named(String),
    Pointer {
        pointee: Box<TypeSpec>,
        mutable: bool,
    },
    Array {
        elem: Box<TypeSpec>,
        len: u64,
        mutable: bool,
    },
    Slice {
        elem: Box<TypeSpec>,
        mutable: bool,
    },
    Fn {
        params: Vec<TypeSpec>,
        ret: Box<TypeSpec>,
        effect: Ses,
        closure: ClosureSpec,
    },
    Tuple(Vec<TypeSpec>),
    Struct(Vec<FieldSpec>),
    Union(Vec<FieldSpec>),
    /// Type field of a module: `base.name`
    Member {
        base: Box<TypeSpec>,
        name: String,
    },
    /// Module reference in type position, optionally instantiated
    Instantiate {
        module: Path,
        args: Vec<TemplateArg>,
    },
}

/// Named field of a struct or union type spec
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub spec: TypeSpec,
}

/// Universe of a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Universe {
    Value,
    Type,
    Module,
}

impl fmt::Display for Universe {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Universe::Value => "value",
            Universe::Type => "type",
            Universe::Module => "module",
        };
        write!(f, "{}", name)
    }
}

/// Module item
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: NodeId,
    pub kind: ItemKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Value {
        name: String,
        spec: Option<TypeSpec>,
        value: Expr,
        constant: bool,
    },
    Type {
        name: String,
        spec: TypeSpec,
    },
    /// Symbol provided by the host, typed only by its spec
    Extern {
        name: String,
        spec: TypeSpec,
        tag: String,
    },
    Module(ModuleDecl),
}

impl Item {
    /// Name bound by this item
    pub fn name(&self) -> &str {
        match &self.kind {
            ItemKind::Value { name, .. }
            | ItemKind::Type { name, .. }
            | ItemKind::Extern { name, .. } => name,
            ItemKind::Module(module) => &module.name,
        }
    }

    /// Universe of the name bound by this item
    pub fn universe(&self) -> Universe {
        match &self.kind {
            ItemKind::Value { .. } | ItemKind::Extern { .. } => Universe::Value,
            ItemKind::Type { .. } => Universe::Type,
            ItemKind::Module(_) => Universe::Module,
        }
    }
}

/// Template parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParam {
    pub name: String,
    pub span: Span,
}

impl TemplateParam {
    /// Uppercase-initial parameters range over types, the rest over values
    pub fn universe(&self) -> Universe {
        match self.name.chars().next() {
            Some(c) if c.is_uppercase() => Universe::Type,
            _ => Universe::Value,
        }
    }
}

/// Module declaration; a source file is a top-level module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub id: NodeId,
    pub name: String,
    pub params: Vec<TemplateParam>,
    pub items: Vec<Item>,
    pub span: Span,
}

impl ModuleDecl {
    /// Whether the module takes template parameters
    pub fn is_template(&self) -> bool {
        !self.params.is_empty()
    }
}

/// The forest handed to the engine: one module per source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub modules: Vec<ModuleDecl>,
}
