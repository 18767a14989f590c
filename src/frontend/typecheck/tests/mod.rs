//! 类型检查器测试模块

mod context;
mod modules;
mod templates;

use crate::frontend::core::ast::{AstBuilder, Item, ModuleDecl, Program};
use crate::frontend::typecheck::{check_program, TypeResult, TypedProgram};

/// 以若干模块构建程序
pub(crate) fn program_of(modules: Vec<ModuleDecl>) -> Program {
    Program { modules }
}

/// 只含 `main` 模块的程序
pub(crate) fn main_module(build: impl FnOnce(&mut AstBuilder) -> Vec<Item>) -> Program {
    let mut b = AstBuilder::new();
    let items = build(&mut b);
    let main = b.module("main", &[], items);
    program_of(vec![main])
}

/// 检查只含 `main` 模块的程序
pub(crate) fn check_main(build: impl FnOnce(&mut AstBuilder) -> Vec<Item>) -> TypeResult<TypedProgram> {
    check_program(&main_module(build))
}

/// 检查由构建器产生的多模块程序
pub(crate) fn check_modules(build: impl FnOnce(&mut AstBuilder) -> Vec<ModuleDecl>) -> TypeResult<TypedProgram> {
    let mut b = AstBuilder::new();
    let modules = build(&mut b);
    check_program(&program_of(modules))
}
