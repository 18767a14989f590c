//! Sema Core
//!
//! Static semantic core for a small systems language: Hindley-Milner style
//! type inference over a forest of modules, with
//!
//! - interned type terms and substitutions ([`frontend::core::type_system`])
//! - operator, field, index and cast constraints solved lazily by a worklist
//! - pointer, array and slice mutability
//! - side-effect specifications (SES) and closure capture analysis
//! - template (generic) module instantiation
//!
//! # Example
//!
//! ```
//! use sema_core::{check_program, AstBuilder, Program};
//!
//! let mut b = AstBuilder::new();
//! let three = b.int(3);
//! let x = b.value_item("x", None, three);
//! let main = b.module("main", &[], vec![x]);
//!
//! let typed = check_program(&Program { modules: vec![main] }).unwrap();
//! assert_eq!(typed.display_def(&["main", "x"]).as_deref(), Some("i32"));
//! ```

#![warn(rust_2018_idioms)]

pub mod frontend;
pub mod util;

pub use frontend::core::ast::{AstBuilder, Program};
pub use frontend::core::type_system::{Scheme, Ses, TypeId, TypeStore};
pub use frontend::typecheck::{
    check_program, check_program_with_config, Engine, TypeError, TypeResult, TypedProgram,
};
pub use util::config::InferConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
