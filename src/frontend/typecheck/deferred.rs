//! 延迟约束求解器
//!
//! 推断时无法立即确定的类型关系（运算符重载、字段投影、索引、类型转换）
//! 记录为 `DeferredOrder`，由 `DeferredList` 反复扫描直到不动点：
//! - 每一轮对每个未解决的约束尝试一次
//! - 解决后立即把替换应用到剩余约束，并通过回调传播到全局
//! - 一整轮没有任何进展且仍有约束时，求解停滞

use std::collections::HashSet;
use std::fmt;

use smallvec::{smallvec, SmallVec};
use tracing::{debug, warn};

use crate::frontend::core::ast::{BinOp, UnOp, Universe};
use crate::frontend::core::type_system::{
    unify_all, AtomicShape, Kind, MismatchReason, Substitution, TypeId, TypeStore, UnifyError,
};
use crate::util::config::InferConfig;
use crate::util::span::Span;

use super::errors::{TypeError, TypeResult};
use super::operators::{binary_rule, unary_rule, OpResult, OpRule, OperandClass};

/// 约束种类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKind {
    /// 参数：[操作数, 结果]
    UnaryOp(UnOp),
    /// 参数：[左, 右, 结果]
    BinaryOp(BinOp),
    /// 参数：[基, 结果]
    Field { name: String, universe: Universe },
    /// 参数：[基, 结果]
    FieldIndex(usize),
    /// 参数：[基, 索引, 结果]
    Index,
    /// 参数：[源, 目标]
    Cast,
}

/// 一个延迟约束
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredOrder {
    pub kind: OrderKind,
    pub args: SmallVec<[TypeId; 3]>,
    pub span: Span,
}

/// 单次求解的结果
#[derive(Debug, Default)]
pub struct Progress {
    pub done: bool,
    pub substitution: Substitution,
    /// 求解过程中派生的子约束
    pub spawned: Vec<DeferredOrder>,
}

impl Progress {
    fn pending() -> Self {
        Progress::default()
    }

    fn solved(substitution: Substitution) -> Self {
        Progress {
            done: true,
            substitution,
            spawned: Vec::new(),
        }
    }
}

impl DeferredOrder {
    pub fn unary(
        op: UnOp,
        operand: TypeId,
        result: TypeId,
        span: Span,
    ) -> Self {
        DeferredOrder {
            kind: OrderKind::UnaryOp(op),
            args: smallvec![operand, result],
            span,
        }
    }

    pub fn binary(
        op: BinOp,
        lhs: TypeId,
        rhs: TypeId,
        result: TypeId,
        span: Span,
    ) -> Self {
        DeferredOrder {
            kind: OrderKind::BinaryOp(op),
            args: smallvec![lhs, rhs, result],
            span,
        }
    }

    pub fn field(
        base: TypeId,
        name: &str,
        universe: Universe,
        result: TypeId,
        span: Span,
    ) -> Self {
        DeferredOrder {
            kind: OrderKind::Field {
                name: name.to_string(),
                universe,
            },
            args: smallvec![base, result],
            span,
        }
    }

    pub fn field_index(
        base: TypeId,
        index: usize,
        result: TypeId,
        span: Span,
    ) -> Self {
        DeferredOrder {
            kind: OrderKind::FieldIndex(index),
            args: smallvec![base, result],
            span,
        }
    }

    pub fn index(
        base: TypeId,
        index: TypeId,
        result: TypeId,
        span: Span,
    ) -> Self {
        DeferredOrder {
            kind: OrderKind::Index,
            args: smallvec![base, index, result],
            span,
        }
    }

    pub fn cast(
        source: TypeId,
        target: TypeId,
        span: Span,
    ) -> Self {
        DeferredOrder {
            kind: OrderKind::Cast,
            args: smallvec![source, target],
            span,
        }
    }

    /// 以替换改写参数
    pub fn rewrite(
        &mut self,
        store: &mut TypeStore,
        sub: &Substitution,
    ) {
        for arg in self.args.iter_mut() {
            *arg = sub.rewrite(store, *arg);
        }
    }

    /// 尝试求解
    ///
    /// 参数已被全局替换改写；无法判定时返回未完成且不带替换。
    pub fn solve(
        &self,
        store: &mut TypeStore,
        config: &InferConfig,
    ) -> TypeResult<Progress> {
        match &self.kind {
            OrderKind::UnaryOp(op) => self.solve_unary(store, *op),
            OrderKind::BinaryOp(op) => self.solve_binary(store, *op),
            OrderKind::Field { name, universe } => self.solve_field(store, name, *universe),
            OrderKind::FieldIndex(index) => self.solve_field_index(store, *index),
            OrderKind::Index => self.solve_index(store, config),
            OrderKind::Cast => self.solve_cast(store),
        }
    }

    fn fail(
        &self,
        store: &TypeStore,
        left: TypeId,
        right: TypeId,
        reason: MismatchReason,
    ) -> TypeError {
        TypeError::unification(UnifyError::new(store, left, right, reason), self.span)
    }

    fn finish(
        &self,
        store: &mut TypeStore,
        pairs: &[(TypeId, TypeId)],
    ) -> TypeResult<Progress> {
        let sub = unify_all(store, pairs).map_err(|e| TypeError::unification(e, self.span))?;
        Ok(Progress::solved(sub))
    }

    fn check_operand(
        &self,
        store: &TypeStore,
        rule: &OpRule,
        op: &dyn fmt::Display,
        operand: TypeId,
        result: TypeId,
    ) -> TypeResult<()> {
        match OperandClass::of(store, operand) {
            Some(class) if rule.accepts(class) => Ok(()),
            _ => Err(self.fail(
                store,
                operand,
                result,
                MismatchReason::NoOperator(op.to_string()),
            )),
        }
    }

    fn solve_unary(
        &self,
        store: &mut TypeStore,
        op: UnOp,
    ) -> TypeResult<Progress> {
        let rule = unary_rule(op);
        let (operand, result) = (self.args[0], self.args[1]);
        if store.is_var(operand) {
            return match rule.result {
                OpResult::Bool => self.finish(store, &[(operand, TypeId::BOOL), (result, TypeId::BOOL)]),
                OpResult::Same if !store.is_var(result) => {
                    self.check_operand(store, rule, &op, result, result)?;
                    self.finish(store, &[(operand, result)])
                }
                _ => Ok(Progress::pending()),
            };
        }
        self.check_operand(store, rule, &op, operand, result)?;
        let target = match rule.result {
            OpResult::Same => operand,
            OpResult::Bool => TypeId::BOOL,
            OpResult::Pointee => match store.pointee(operand) {
                Some(pointee) => pointee,
                None => return Err(self.fail(store, operand, result, MismatchReason::NoOperator(op.to_string()))),
            },
        };
        self.finish(store, &[(result, target)])
    }

    fn solve_binary(
        &self,
        store: &mut TypeStore,
        op: BinOp,
    ) -> TypeResult<Progress> {
        let rule = binary_rule(op);
        let (lhs, rhs, result) = (self.args[0], self.args[1], self.args[2]);

        if !rule.symmetric {
            // 移位：结果随左操作数，右操作数是任意整数
            if store.is_var(lhs) {
                if store.is_var(result) {
                    return Ok(Progress::pending());
                }
                self.check_operand(store, rule, &op, result, result)?;
                let mut pairs = vec![(lhs, result)];
                if store.is_var(rhs) {
                    pairs.push((rhs, result));
                }
                return self.finish(store, &pairs);
            }
            self.check_operand(store, rule, &op, lhs, result)?;
            if !store.is_var(rhs) {
                self.check_operand(store, rule, &op, rhs, result)?;
                return self.finish(store, &[(result, lhs)]);
            }
            return self.finish(store, &[(rhs, lhs), (result, lhs)]);
        }

        if store.is_var(lhs) && store.is_var(rhs) {
            if matches!(op, BinOp::And | BinOp::Or) {
                return self.finish(
                    store,
                    &[(lhs, TypeId::BOOL), (rhs, TypeId::BOOL), (result, TypeId::BOOL)],
                );
            }
            if rule.result == OpResult::Same && !store.is_var(result) {
                self.check_operand(store, rule, &op, result, result)?;
                return self.finish(store, &[(lhs, result), (rhs, result)]);
            }
            return Ok(Progress::pending());
        }

        let operand = if store.is_var(lhs) { rhs } else { lhs };
        self.check_operand(store, rule, &op, operand, result)?;
        let target = match rule.result {
            OpResult::Bool => TypeId::BOOL,
            _ => operand,
        };
        self.finish(store, &[(lhs, rhs), (result, target)])
    }

    /// 穿过一层指针
    fn look_through_pointer(
        store: &TypeStore,
        base: TypeId,
    ) -> TypeId {
        if store.kind(base) == Kind::Pointer {
            store.pointee(base).unwrap_or(base)
        } else {
            base
        }
    }

    fn solve_field(
        &self,
        store: &mut TypeStore,
        name: &str,
        universe: Universe,
    ) -> TypeResult<Progress> {
        let (base, result) = (Self::look_through_pointer(store, self.args[0]), self.args[1]);
        if store.is_var(base) {
            return Ok(Progress::pending());
        }
        let element = match store.field(base, name) {
            Some(element) if store.kind(base).has_named_fields() => element.clone(),
            _ => {
                return Err(self.fail(
                    store,
                    base,
                    result,
                    MismatchReason::NoField(name.to_string()),
                ))
            }
        };
        let found = if element.is_type_field {
            Universe::Type
        } else {
            Universe::Value
        };
        if found != universe {
            return Err(TypeError::wrong_universe(name, universe, found, self.span));
        }
        self.finish(store, &[(result, element.ty)])
    }

    fn solve_field_index(
        &self,
        store: &mut TypeStore,
        index: usize,
    ) -> TypeResult<Progress> {
        let (base, result) = (Self::look_through_pointer(store, self.args[0]), self.args[1]);
        if store.is_var(base) {
            return Ok(Progress::pending());
        }
        let element = match store.kind(base) {
            Kind::Tuple | Kind::Struct => store.elements(base).get(index).map(|e| e.ty),
            _ => None,
        };
        match element {
            Some(ty) => self.finish(store, &[(result, ty)]),
            None => Err(self.fail(store, base, result, MismatchReason::NoField(index.to_string()))),
        }
    }

    fn solve_index(
        &self,
        store: &mut TypeStore,
        config: &InferConfig,
    ) -> TypeResult<Progress> {
        let (base, index, result) = (self.args[0], self.args[1], self.args[2]);
        if store.is_var(base) {
            return Ok(Progress::pending());
        }
        let element = match store.kind(base) {
            Kind::Array | Kind::Slice => store.pointee(base),
            Kind::Pointer => match store.pointee(base) {
                Some(inner) if store.kind(inner) == Kind::FreeVar => {
                    return Ok(Progress::pending());
                }
                Some(inner) if matches!(store.kind(inner), Kind::Array | Kind::Slice) => {
                    store.pointee(inner)
                }
                other => other,
            },
            _ => None,
        };
        let Some(element) = element else {
            return Err(self.fail(store, base, index, MismatchReason::NotIndexable));
        };

        if store.is_var(index) {
            let width = store.mint_atomic(AtomicShape::Unsigned(config.index_width));
            return self.finish(store, &[(index, width), (result, element)]);
        }
        if !store.kind(index).is_integer() || store.is_bool(index) {
            return Err(self.fail(store, index, base, MismatchReason::NonIntegerIndex));
        }
        self.finish(store, &[(result, element)])
    }

    fn solve_cast(
        &self,
        store: &mut TypeStore,
    ) -> TypeResult<Progress> {
        let (source, target) = (self.args[0], self.args[1]);
        if source == target {
            return Ok(Progress::solved(Substitution::new()));
        }
        if store.is_var(source) || store.is_var(target) {
            return Ok(Progress::pending());
        }
        let (ks, kt) = (store.kind(source), store.kind(target));
        let address = |store: &TypeStore, tid: TypeId| {
            store.kind(tid) == Kind::UnsignedInt && store.width(tid) == Some(64)
        };
        match (ks, kt) {
            _ if ks.is_numeric() && kt.is_numeric() => Ok(Progress::solved(Substitution::new())),
            (Kind::Pointer, Kind::Pointer) => Ok(Progress::solved(Substitution::new())),
            (Kind::Pointer, Kind::UnsignedInt) if address(&*store, target) => {
                Ok(Progress::solved(Substitution::new()))
            }
            (Kind::UnsignedInt, Kind::Pointer) if address(&*store, source) => {
                Ok(Progress::solved(Substitution::new()))
            }
            (Kind::Array, Kind::Slice) => {
                let (from, to) = match (store.pointee(source), store.pointee(target)) {
                    (Some(from), Some(to)) => (from, to),
                    _ => return Err(self.fail(store, source, target, MismatchReason::InvalidCast)),
                };
                self.finish(store, &[(to, from)])
            }
            (Kind::Fn, Kind::Fn) => self.finish(store, &[(target, source)]),
            (Kind::Tuple, Kind::Tuple) | (Kind::Struct, Kind::Struct) => {
                let from = store.elements(source).clone();
                let to = store.elements(target).clone();
                let names_match = from.iter().zip(to.iter()).all(|(a, b)| a.name == b.name);
                if from.len() != to.len() || !names_match {
                    return Err(self.fail(store, source, target, MismatchReason::InvalidCast));
                }
                let spawned = from
                    .iter()
                    .zip(to.iter())
                    .filter(|(a, b)| a.ty != b.ty)
                    .map(|(a, b)| DeferredOrder::cast(a.ty, b.ty, self.span))
                    .collect();
                Ok(Progress {
                    done: true,
                    substitution: Substitution::new(),
                    spawned,
                })
            }
            _ => Err(self.fail(store, source, target, MismatchReason::InvalidCast)),
        }
    }

    /// 渲染约束（用于停滞报告）
    pub fn display(
        &self,
        store: &TypeStore,
    ) -> String {
        let a = |i: usize| store.display(self.args[i]).to_string();
        let body = match &self.kind {
            OrderKind::UnaryOp(op) => format!("{}{} -> {}", op, a(0), a(1)),
            OrderKind::BinaryOp(op) => format!("{} {} {} -> {}", a(0), op, a(1), a(2)),
            OrderKind::Field { name, .. } => format!("{}.{} -> {}", a(0), name, a(1)),
            OrderKind::FieldIndex(index) => format!("{}.{} -> {}", a(0), index, a(1)),
            OrderKind::Index => format!("{}[{}] -> {}", a(0), a(1), a(2)),
            OrderKind::Cast => format!("{} as {}", a(0), a(1)),
        };
        format!("{}: {}", self.span, body)
    }
}

/// 一轮扫描的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub attempted: usize,
    pub solved: usize,
}

/// 延迟约束工作表
#[derive(Debug, Clone, Default)]
pub struct DeferredList {
    orders: Vec<DeferredOrder>,
}

impl DeferredList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        order: DeferredOrder,
    ) {
        self.orders.push(order);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredOrder> {
        self.orders.iter()
    }

    /// 以替换改写所有未解决的约束
    pub fn rewrite(
        &mut self,
        store: &mut TypeStore,
        sub: &Substitution,
    ) {
        if sub.is_empty() {
            return;
        }
        for order in &mut self.orders {
            order.rewrite(store, sub);
        }
    }

    /// 对每个未解决的约束尝试一次
    ///
    /// 每解决一个约束，其替换立即改写剩余约束并交给 `on_solved` 传播，
    /// 同一轮中靠后的约束因此能看到靠前约束的结果。派生的子约束追加到
    /// 表尾，在本轮内继续尝试。
    pub fn run_pass<F>(
        &mut self,
        store: &mut TypeStore,
        config: &InferConfig,
        mut on_solved: F,
    ) -> TypeResult<PassReport>
    where
        F: FnMut(&mut TypeStore, &Substitution, Span) -> TypeResult<()>,
    {
        let mut report = PassReport {
            attempted: 0,
            solved: 0,
        };
        let mut i = 0;
        while i < self.orders.len() {
            report.attempted += 1;
            let progress = self.orders[i].solve(store, config)?;
            if !progress.done {
                i += 1;
                continue;
            }
            let order = self.orders.remove(i);
            self.orders.extend(progress.spawned);
            if !progress.substitution.is_empty() {
                self.rewrite(store, &progress.substitution);
                on_solved(store, &progress.substitution, order.span)?;
            }
            report.solved += 1;
        }
        debug!(
            attempted = report.attempted,
            solved = report.solved,
            remaining = self.orders.len(),
            "deferred pass"
        );
        Ok(report)
    }

    /// 扫描到不动点，剩余约束留待之后的信息
    pub fn sweep<F>(
        &mut self,
        store: &mut TypeStore,
        config: &InferConfig,
        mut on_solved: F,
    ) -> TypeResult<()>
    where
        F: FnMut(&mut TypeStore, &Substitution, Span) -> TypeResult<()>,
    {
        while !self.is_empty() {
            let report = self.run_pass(store, config, &mut on_solved)?;
            if report.solved == 0 {
                break;
            }
        }
        Ok(())
    }

    /// 扫描到不动点；仍有约束剩余时报告求解停滞
    pub fn drain<F>(
        &mut self,
        store: &mut TypeStore,
        config: &InferConfig,
        on_solved: F,
    ) -> TypeResult<()>
    where
        F: FnMut(&mut TypeStore, &Substitution, Span) -> TypeResult<()>,
    {
        self.sweep(store, config, on_solved)?;
        match self.orders.first() {
            None => Ok(()),
            Some(first) => {
                let orders = self.report(store);
                warn!(count = orders.len(), "deferred solver stalled");
                Err(TypeError::StalledSolver {
                    orders,
                    span: first.span,
                })
            }
        }
    }

    /// 取出与 `seeds` 中变量相关的约束
    ///
    /// 相关性经约束之间共享、且不在 `fixed` 中的变量传递。
    pub fn take_related(
        &mut self,
        store: &TypeStore,
        seeds: &[TypeId],
        fixed: &HashSet<TypeId>,
    ) -> Vec<DeferredOrder> {
        let mut reach: HashSet<TypeId> = seeds.iter().copied().collect();
        let mut taken = Vec::new();
        loop {
            let before = taken.len();
            let mut i = 0;
            while i < self.orders.len() {
                let vars: Vec<TypeId> = self.orders[i]
                    .args
                    .iter()
                    .flat_map(|a| store.vars(*a).iter().copied())
                    .collect();
                if vars.iter().any(|v| reach.contains(v)) {
                    reach.extend(vars.into_iter().filter(|v| !fixed.contains(v)));
                    taken.push(self.orders.remove(i));
                } else {
                    i += 1;
                }
            }
            if taken.len() == before {
                break;
            }
        }
        taken
    }

    /// 所有未解决约束的文本
    pub fn report(
        &self,
        store: &TypeStore,
    ) -> Vec<String> {
        self.orders.iter().map(|o| o.display(store)).collect()
    }
}
