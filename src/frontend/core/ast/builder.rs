//! Tree construction helpers
//!
//! Hands out fresh [`NodeId`]s and synthetic spans (one line per node) so
//! that embedding tools and tests can build forests without a parser.

use super::*;
use crate::util::span::FileId;

/// Builds AST nodes with unique ids
#[derive(Debug, Default)]
pub struct AstBuilder {
    next: u32,
    file: FileId,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder whose spans point into `file`
    pub fn for_file(file: FileId) -> Self {
        Self { next: 0, file }
    }

    /// Continue numbering in another file without reusing ids
    pub fn switch_file(
        &mut self,
        file: FileId,
    ) {
        self.file = file;
    }

    fn fresh(&mut self) -> (NodeId, Span) {
        let id = NodeId(self.next);
        self.next += 1;
        let line = self.next as usize;
        (id, Span::line(self.file, line, 1, 2))
    }

    fn expr(
        &mut self,
        kind: ExprKind,
    ) -> Expr {
        let (id, span) = self.fresh();
        Expr { id, kind, span }
    }

    fn spec(
        &mut self,
        kind: TypeSpecKind,
    ) -> TypeSpec {
        let (id, span) = self.fresh();
        TypeSpec { id, kind, span }
    }

    fn stmt(
        &mut self,
        kind: StmtKind,
    ) -> Stmt {
        let (id, span) = self.fresh();
        Stmt { id, kind, span }
    }

    fn item(
        &mut self,
        kind: ItemKind,
    ) -> Item {
        let (id, span) = self.fresh();
        Item { id, kind, span }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Unsuffixed integer literal
    pub fn int(
        &mut self,
        value: u64,
    ) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int {
            value,
            suffix: None,
        }))
    }

    /// Suffixed integer literal, e.g. `int_suffixed(2, false, 8)` for `2u8`
    pub fn int_suffixed(
        &mut self,
        value: u64,
        signed: bool,
        width: u32,
    ) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int {
            value,
            suffix: Some(IntSuffix { signed, width }),
        }))
    }

    pub fn float(
        &mut self,
        value: f64,
        width: Option<u32>,
    ) -> Expr {
        self.expr(ExprKind::Literal(Literal::Float { value, width }))
    }

    pub fn bool(
        &mut self,
        value: bool,
    ) -> Expr {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn string(
        &mut self,
        value: &str,
    ) -> Expr {
        self.expr(ExprKind::Literal(Literal::Str(value.to_string())))
    }

    pub fn unit(&mut self) -> Expr {
        self.expr(ExprKind::Literal(Literal::Unit))
    }

    pub fn ident(
        &mut self,
        name: &str,
    ) -> Expr {
        self.expr(ExprKind::Ident(name.to_string()))
    }

    pub fn unary(
        &mut self,
        op: UnOp,
        operand: Expr,
    ) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(
        &mut self,
        op: BinOp,
        lhs: Expr,
        rhs: Expr,
    ) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn call(
        &mut self,
        callee: Expr,
        args: Vec<Expr>,
    ) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn param(
        &mut self,
        name: &str,
        spec: Option<TypeSpec>,
    ) -> Param {
        let (id, span) = self.fresh();
        Param {
            id,
            name: name.to_string(),
            spec,
            span,
        }
    }

    pub fn lambda(
        &mut self,
        params: Vec<Param>,
        ret: Option<TypeSpec>,
        effect: Option<Ses>,
        body: Expr,
    ) -> Expr {
        self.expr(ExprKind::Lambda(Lambda {
            params,
            ret: ret.map(Box::new),
            effect,
            body: Box::new(body),
        }))
    }

    pub fn chain(
        &mut self,
        effect: Option<Ses>,
        stmts: Vec<Stmt>,
        tail: Option<Expr>,
    ) -> Expr {
        self.expr(ExprKind::Chain(Chain {
            effect,
            stmts,
            tail: tail.map(Box::new),
        }))
    }

    pub fn tuple(
        &mut self,
        items: Vec<Expr>,
    ) -> Expr {
        self.expr(ExprKind::Tuple(items))
    }

    pub fn struct_lit(
        &mut self,
        fields: Vec<(&str, Expr)>,
    ) -> Expr {
        let fields = fields
            .into_iter()
            .map(|(name, value)| FieldInit {
                name: name.to_string(),
                value,
            })
            .collect();
        self.expr(ExprKind::StructLit(fields))
    }

    pub fn array_lit(
        &mut self,
        items: Vec<Expr>,
    ) -> Expr {
        self.expr(ExprKind::ArrayLit(items))
    }

    pub fn field(
        &mut self,
        base: Expr,
        name: &str,
    ) -> Expr {
        self.expr(ExprKind::Field {
            base: Box::new(base),
            name: name.to_string(),
        })
    }

    pub fn tuple_index(
        &mut self,
        base: Expr,
        index: usize,
    ) -> Expr {
        self.expr(ExprKind::TupleIndex {
            base: Box::new(base),
            index,
        })
    }

    pub fn index(
        &mut self,
        base: Expr,
        index: Expr,
    ) -> Expr {
        self.expr(ExprKind::Index {
            base: Box::new(base),
            index: Box::new(index),
        })
    }

    pub fn cast(
        &mut self,
        value: Expr,
        target: TypeSpec,
    ) -> Expr {
        self.expr(ExprKind::Cast {
            value: Box::new(value),
            target,
        })
    }

    pub fn addr_of(
        &mut self,
        value: Expr,
        mutable: bool,
    ) -> Expr {
        self.expr(ExprKind::AddrOf {
            value: Box::new(value),
            mutable,
        })
    }

    pub fn if_(
        &mut self,
        cond: Expr,
        then_branch: Expr,
        else_branch: Option<Expr>,
    ) -> Expr {
        self.expr(ExprKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn ret(
        &mut self,
        value: Option<Expr>,
    ) -> Expr {
        self.expr(ExprKind::Return(value.map(Box::new)))
    }

    pub fn path(
        &mut self,
        segments: &[&str],
    ) -> Path {
        let (id, span) = self.fresh();
        Path {
            id,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            span,
        }
    }

    pub fn instantiate(
        &mut self,
        module: &[&str],
        args: Vec<TemplateArg>,
    ) -> Expr {
        let module = self.path(module);
        self.expr(ExprKind::Instantiate { module, args })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn let_(
        &mut self,
        name: &str,
        spec: Option<TypeSpec>,
        value: Expr,
    ) -> Stmt {
        self.stmt(StmtKind::Let {
            name: name.to_string(),
            spec,
            value,
        })
    }

    pub fn assign(
        &mut self,
        target: Expr,
        value: Expr,
    ) -> Stmt {
        self.stmt(StmtKind::Assign { target, value })
    }

    pub fn expr_stmt(
        &mut self,
        expr: Expr,
    ) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    // ------------------------------------------------------------------
    // Type specs
    // ------------------------------------------------------------------

    pub fn named(
        &mut self,
        name: &str,
    ) -> TypeSpec {
        self.spec(TypeSpecKind::Named(name.to_string()))
    }

    pub fn pointer(
        &mut self,
        pointee: TypeSpec,
        mutable: bool,
    ) -> TypeSpec {
        self.spec(TypeSpecKind::Pointer {
            pointee: Box::new(pointee),
            mutable,
        })
    }

    pub fn array(
        &mut self,
        elem: TypeSpec,
        len: u64,
        mutable: bool,
    ) -> TypeSpec {
        self.spec(TypeSpecKind::Array {
            elem: Box::new(elem),
            len,
            mutable,
        })
    }

    pub fn slice(
        &mut self,
        elem: TypeSpec,
        mutable: bool,
    ) -> TypeSpec {
        self.spec(TypeSpecKind::Slice {
            elem: Box::new(elem),
            mutable,
        })
    }

    pub fn fn_type(
        &mut self,
        params: Vec<TypeSpec>,
        ret: TypeSpec,
        effect: Ses,
        closure: ClosureSpec,
    ) -> TypeSpec {
        self.spec(TypeSpecKind::Fn {
            params,
            ret: Box::new(ret),
            effect,
            closure,
        })
    }

    pub fn tuple_type(
        &mut self,
        items: Vec<TypeSpec>,
    ) -> TypeSpec {
        self.spec(TypeSpecKind::Tuple(items))
    }

    pub fn struct_type(
        &mut self,
        fields: Vec<(&str, TypeSpec)>,
    ) -> TypeSpec {
        let fields = field_specs(fields);
        self.spec(TypeSpecKind::Struct(fields))
    }

    pub fn union_type(
        &mut self,
        fields: Vec<(&str, TypeSpec)>,
    ) -> TypeSpec {
        let fields = field_specs(fields);
        self.spec(TypeSpecKind::Union(fields))
    }

    pub fn member(
        &mut self,
        base: TypeSpec,
        name: &str,
    ) -> TypeSpec {
        self.spec(TypeSpecKind::Member {
            base: Box::new(base),
            name: name.to_string(),
        })
    }

    pub fn instantiate_type(
        &mut self,
        module: &[&str],
        args: Vec<TemplateArg>,
    ) -> TypeSpec {
        let module = self.path(module);
        self.spec(TypeSpecKind::Instantiate { module, args })
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    pub fn value_item(
        &mut self,
        name: &str,
        spec: Option<TypeSpec>,
        value: Expr,
    ) -> Item {
        self.item(ItemKind::Value {
            name: name.to_string(),
            spec,
            value,
            constant: false,
        })
    }

    pub fn const_item(
        &mut self,
        name: &str,
        spec: Option<TypeSpec>,
        value: Expr,
    ) -> Item {
        self.item(ItemKind::Value {
            name: name.to_string(),
            spec,
            value,
            constant: true,
        })
    }

    pub fn type_item(
        &mut self,
        name: &str,
        spec: TypeSpec,
    ) -> Item {
        self.item(ItemKind::Type {
            name: name.to_string(),
            spec,
        })
    }

    pub fn extern_item(
        &mut self,
        name: &str,
        spec: TypeSpec,
        tag: &str,
    ) -> Item {
        self.item(ItemKind::Extern {
            name: name.to_string(),
            spec,
            tag: tag.to_string(),
        })
    }

    pub fn module(
        &mut self,
        name: &str,
        params: &[&str],
        items: Vec<Item>,
    ) -> ModuleDecl {
        let (id, span) = self.fresh();
        let params = params
            .iter()
            .map(|p| TemplateParam {
                name: p.to_string(),
                span,
            })
            .collect();
        ModuleDecl {
            id,
            name: name.to_string(),
            params,
            items,
            span,
        }
    }

    pub fn module_item(
        &mut self,
        module: ModuleDecl,
    ) -> Item {
        self.item(ItemKind::Module(module))
    }
}

fn field_specs(fields: Vec<(&str, TypeSpec)>) -> Vec<FieldSpec> {
    fields
        .into_iter()
        .map(|(name, spec)| FieldSpec {
            name: name.to_string(),
            spec,
        })
        .collect()
}
