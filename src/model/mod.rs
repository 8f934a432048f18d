#![forbid(unsafe_code)]

//! Editable query model.
//!
//! [`StateObject`] mirrors the syntax tree without source positions and can be
//! mutated in place. [`traverse`] is the only traversal primitive; the
//! [`Formatter`] writes a tree back to JPQL text.

/// AST conversion and the `CASE` builder.
pub mod builder;
/// State tree to text.
pub mod formatter;
/// State object types.
pub mod state;
/// Visitor and traversal.
pub mod visitor;

pub use builder::{build_state, CaseExpressionBuilder};
pub use formatter::{Formatter, IdentifierStyle};
pub use state::{
    AbstractSchemaNameState, ConstructorState, EntityTypeLiteralState,
    IdentificationVariableState, PathState, StateObject,
};
pub use visitor::{traverse, StateVisitor, Visit};
