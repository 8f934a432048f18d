#![forbid(unsafe_code)]

//! Query resolution layer.
//!
//! Binds a parsed query to ORM metadata: FROM-clause declarations, the
//! resolver arena for identification variables and path segments, and the
//! profiling counters shared by every phase.

/// Query context built from a parsed query and a metadata provider.
///
/// Owns one scope per (sub)query FROM clause and the path resolutions used by
/// the semantic validator.
pub mod context;

/// FROM-clause declarations (range, collection member, derived).
pub mod declaration;

/// Managed-type metadata consumed by resolution.
///
/// Defines the provider trait plus an in-memory implementation that can be
/// loaded from JSON or TOML.
pub mod metadata;

/// Performance profiling for query operations.
///
/// Collects timing and count statistics when `JPQL_PROFILE` is set.
pub mod profile;

/// Resolver arena with memoized child lookup.
pub mod resolver;

pub use context::{PathResolution, QueryContext, Scope, ScopeId};
pub use declaration::{Declaration, JoinDeclaration, JoinFetch};
pub use metadata::{InMemoryMetadata, ManagedType, ManagedTypeProvider, Mapping, MappingKind};
pub use resolver::{Resolver, ResolverArena, ResolverId, ResolverKind};
