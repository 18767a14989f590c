//! Core data layer shared by the type checker
//!
//! - `ast`: the module forest handed over by the parser
//! - `type_system`: type terms, substitutions, schemes and unification

pub mod ast;
pub mod type_system;
