//! Where-conditions and their compilation to SQL
//!
//! - `condition.rs` - Condition tree and in-memory evaluation
//! - `compiler.rs` - SQL + residual filter compilation

pub mod compiler;
pub mod condition;

pub use compiler::{CompiledCondition, PredicateCompiler, ResidualFilter};
pub use condition::{FieldMatch, FieldPredicate, WhereCondition};
