//! Frontend semantic analysis
//!
//! Takes the parsed module forest and produces per-node types, effects and
//! closure captures for code generation.

pub mod core;
pub mod typecheck;
