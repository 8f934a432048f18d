#![forbid(unsafe_code)]

//! Grammar and semantic validation.
//!
//! Both passes are independent, run to completion and return every
//! diagnostic they find in pre-order, left to right.

/// Grammar-version checks over the syntax tree.
pub mod grammar;

/// Resolution and type checks over a [`QueryContext`](crate::query::QueryContext).
pub mod semantic;

pub use grammar::GrammarValidator;
pub use semantic::{SemanticValidator, TypeCategory};
