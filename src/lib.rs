//! JPQL query tooling: grammars, a tolerant parser, resolution of
//! identification variables against ORM metadata, grammar and semantic
//! validation, an editable state-object model with rename refactorings, and
//! content assist.
//!
//! Most callers start from a [`GrammarRegistry`] and either use the
//! individual passes or the [`QueryHelper`] facade:
//!
//! ```
//! use jpql::{GrammarRegistry, InMemoryMetadata, ManagedType, QueryHelper};
//!
//! let metadata = InMemoryMetadata::new()
//!     .with_type(ManagedType::entity("com.acme.Employee", "Employee").with_basic("name", "String"));
//! let registry = GrammarRegistry::new();
//! let mut helper = QueryHelper::new(registry.latest(), &metadata);
//! helper.set_query("select e from Employee e where e.name = 'x'").unwrap();
//! assert!(helper.validate().is_empty());
//! assert_eq!(helper.format().unwrap(), "SELECT e FROM Employee e WHERE e.name = 'x'");
//! ```

#![warn(missing_docs)]

pub mod content_assist;
pub mod diagnostic;
pub mod error;
pub mod grammar;
pub mod helper;
pub mod model;
pub mod parser;
pub mod query;
pub mod refactor;
pub mod validation;

pub use content_assist::{Proposal, ProposalKind};
pub use diagnostic::{Diagnostic, DiagnosticKey, Severity};
pub use error::{GrammarError, JpqlError, ParseError, Result};
pub use grammar::{Grammar, GrammarBuilder, GrammarKind, GrammarRegistry};
pub use helper::{HelperOptions, QueryHelper};
pub use model::{Formatter, IdentifierStyle, StateObject};
pub use parser::{Expression, ExpressionKind, JpqlExpression, Parser, Span};
pub use query::context::QueryContext;
pub use query::metadata::{InMemoryMetadata, ManagedType, ManagedTypeProvider, MappingKind};
pub use refactor::RefactoringTool;
pub use validation::{GrammarValidator, SemanticValidator};
