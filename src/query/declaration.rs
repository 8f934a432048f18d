//! FROM-clause declarations.

use serde::Serialize;

use crate::parser::Span;
use crate::query::metadata::Mapping;

/// A JOIN FETCH attached to a range declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinFetch {
    /// Joined path as written.
    pub path: String,
    /// Optional identification variable.
    pub variable: Option<String>,
    /// Source range of the join.
    pub span: Span,
}

/// A plain (non-fetch) join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinDeclaration {
    /// Joined path as written.
    pub path: String,
    /// Identification variable.
    pub variable: Option<String>,
    /// Source range of the join.
    pub span: Span,
}

/// `Entity [AS] var`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeDeclaration {
    root_path: String,
    variable: Option<String>,
    descriptor: Option<String>,
    join_fetches: Option<Vec<JoinFetch>>,
    joins: Vec<JoinDeclaration>,
    span: Span,
}

/// `IN(path) [AS] var` or a derived `path [AS] var` in a subquery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathDeclaration {
    root_path: String,
    variable: Option<String>,
    mapping: Option<Mapping>,
    joins: Vec<JoinDeclaration>,
    span: Span,
}

/// One FROM-clause binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    /// Range variable over an entity.
    Range(RangeDeclaration),
    /// `IN(collection)` member declaration.
    CollectionMember(PathDeclaration),
    /// Path declaration in a subquery FROM clause.
    Derived(PathDeclaration),
}

impl RangeDeclaration {
    pub(crate) fn new(
        root_path: String,
        variable: Option<String>,
        descriptor: Option<String>,
        span: Span,
    ) -> Self {
        Self {
            root_path,
            variable,
            descriptor,
            join_fetches: None,
            joins: Vec::new(),
            span,
        }
    }
}

impl PathDeclaration {
    pub(crate) fn new(
        root_path: String,
        variable: Option<String>,
        mapping: Option<Mapping>,
        span: Span,
    ) -> Self {
        Self {
            root_path,
            variable,
            mapping,
            joins: Vec::new(),
            span,
        }
    }
}

impl Declaration {
    /// Entity name or root path as written.
    pub fn root_path(&self) -> &str {
        match self {
            Declaration::Range(d) => &d.root_path,
            Declaration::CollectionMember(d) | Declaration::Derived(d) => &d.root_path,
        }
    }

    /// Declared identification variable.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Declaration::Range(d) => d.variable.as_deref(),
            Declaration::CollectionMember(d) | Declaration::Derived(d) => d.variable.as_deref(),
        }
    }

    /// Source range of the declaration.
    pub fn span(&self) -> Span {
        match self {
            Declaration::Range(d) => d.span,
            Declaration::CollectionMember(d) | Declaration::Derived(d) => d.span,
        }
    }

    /// Whether this is a range declaration.
    pub fn is_range(&self) -> bool {
        matches!(self, Declaration::Range(_))
    }

    /// Whether this is a derived declaration.
    pub fn is_derived(&self) -> bool {
        matches!(self, Declaration::Derived(_))
    }

    /// Whether this is a collection member declaration.
    pub fn is_collection_member(&self) -> bool {
        matches!(self, Declaration::CollectionMember(_))
    }

    /// Entity class of a range declaration; always `None` for the others.
    pub fn descriptor(&self) -> Option<&str> {
        match self {
            Declaration::Range(d) => d.descriptor.as_deref(),
            _ => None,
        }
    }

    /// Mapping of the root path; always `None` for range declarations.
    pub fn mapping(&self) -> Option<&Mapping> {
        match self {
            Declaration::Range(_) => None,
            Declaration::CollectionMember(d) | Declaration::Derived(d) => d.mapping.as_ref(),
        }
    }

    /// JOIN FETCH entries in parse order; empty until one is added.
    pub fn join_fetches(&self) -> &[JoinFetch] {
        match self {
            Declaration::Range(d) => d.join_fetches.as_deref().unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Whether the join-fetch list has been allocated.
    pub fn has_join_fetches(&self) -> bool {
        matches!(self, Declaration::Range(d) if d.join_fetches.is_some())
    }

    /// Appends a JOIN FETCH; only range declarations accept one.
    pub fn add_join_fetch(&mut self, join_fetch: JoinFetch) -> bool {
        match self {
            Declaration::Range(d) => {
                d.join_fetches.get_or_insert_with(Vec::new).push(join_fetch);
                true
            }
            _ => false,
        }
    }

    /// Plain joins in parse order.
    pub fn joins(&self) -> &[JoinDeclaration] {
        match self {
            Declaration::Range(d) => &d.joins,
            Declaration::CollectionMember(d) | Declaration::Derived(d) => &d.joins,
        }
    }

    pub(crate) fn push_join(&mut self, join: JoinDeclaration) {
        match self {
            Declaration::Range(d) => d.joins.push(join),
            Declaration::CollectionMember(d) | Declaration::Derived(d) => d.joins.push(join),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::metadata::MappingKind;

    fn fetch(path: &str) -> JoinFetch {
        JoinFetch {
            path: path.to_string(),
            variable: None,
            span: Span::default(),
        }
    }

    #[test]
    fn range_declaration_allocates_join_fetches_lazily() {
        let mut decl = Declaration::Range(RangeDeclaration::new(
            "Employee".into(),
            Some("e".into()),
            Some("com.acme.Employee".into()),
            Span::new(0, 10),
        ));
        assert!(decl.is_range());
        assert!(!decl.is_derived());
        assert!(decl.mapping().is_none());
        assert_eq!(decl.descriptor(), Some("com.acme.Employee"));
        assert!(!decl.has_join_fetches());
        assert!(decl.join_fetches().is_empty());

        assert!(decl.add_join_fetch(fetch("e.phones")));
        assert!(decl.add_join_fetch(fetch("e.address")));
        assert!(decl.has_join_fetches());
        let paths: Vec<&str> = decl.join_fetches().iter().map(|j| j.path.as_str()).collect();
        assert_eq!(paths, vec!["e.phones", "e.address"]);
    }

    #[test]
    fn path_declarations_reject_join_fetch() {
        let mapping = Mapping {
            name: "phones".into(),
            kind: MappingKind::OneToMany,
            attribute_type: "java.util.Collection".into(),
            reference_type: Some("com.acme.Phone".into()),
            declaring_type: "com.acme.Employee".into(),
        };
        let mut decl = Declaration::CollectionMember(PathDeclaration::new(
            "e.phones".into(),
            Some("p".into()),
            Some(mapping),
            Span::new(0, 10),
        ));
        assert!(decl.is_collection_member());
        assert!(decl.descriptor().is_none());
        assert!(decl.mapping().is_some());
        assert!(!decl.add_join_fetch(fetch("p.owner")));
        assert!(!decl.has_join_fetches());
    }
}
