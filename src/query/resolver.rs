//! Arena of resolvers for identification variables and path segments.
//!
//! Every record knows its parent by id, and children are found through a
//! `(parent, segment)` index, so resolving the same path twice always yields
//! the same ids.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::trace;

use crate::query::metadata::{ManagedTypeProvider, Mapping};

/// Handle to a resolver record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResolverId(u32);

impl ResolverId {
    /// Index into the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a resolver stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    /// Identification variable declared in a FROM clause.
    IdentificationVariable,
    /// Single-valued path segment.
    StateField,
    /// Collection-valued path segment.
    CollectionValuedField,
}

/// One resolver record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolver {
    /// Own id.
    pub id: ResolverId,
    /// Parent resolver; `None` for identification variables.
    pub parent: Option<ResolverId>,
    /// Resolver kind.
    pub kind: ResolverKind,
    /// Variable name or path segment.
    pub name: String,
    /// Resolved type, when known.
    pub type_name: Option<String>,
    /// Mapping of the segment (or of the declaration root for variables).
    pub mapping: Option<Mapping>,
}

/// Resolver storage.
#[derive(Debug, Clone, Default)]
pub struct ResolverArena {
    records: Vec<Resolver>,
    children: FxHashMap<(ResolverId, String), ResolverId>,
}

impl ResolverArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resolvers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the arena holds no resolver.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolver by id.
    pub fn get(&self, id: ResolverId) -> &Resolver {
        &self.records[id.index()]
    }

    /// Iterates every resolver in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Resolver> {
        self.records.iter()
    }

    fn push(
        &mut self,
        parent: Option<ResolverId>,
        kind: ResolverKind,
        name: &str,
        type_name: Option<String>,
        mapping: Option<Mapping>,
    ) -> ResolverId {
        let id = ResolverId(self.records.len() as u32);
        self.records.push(Resolver {
            id,
            parent,
            kind,
            name: name.to_string(),
            type_name,
            mapping,
        });
        id
    }

    /// Adds a root resolver for an identification variable.
    pub fn add_variable(
        &mut self,
        name: &str,
        type_name: Option<String>,
        mapping: Option<Mapping>,
    ) -> ResolverId {
        let id = self.push(
            None,
            ResolverKind::IdentificationVariable,
            name,
            type_name,
            mapping,
        );
        trace!(variable = name, id = id.0, "query.resolver.variable");
        id
    }

    /// Existing child of `parent` for `segment`.
    pub fn child(&self, parent: ResolverId, segment: &str) -> Option<ResolverId> {
        self.children.get(&(parent, segment.to_string())).copied()
    }

    /// Returns the memoized child or creates one by looking the segment up on
    /// the parent's type.
    pub fn child_or_create(
        &mut self,
        provider: &dyn ManagedTypeProvider,
        parent: ResolverId,
        segment: &str,
        collection_valued: bool,
    ) -> ResolverId {
        if let Some(id) = self.child(parent, segment) {
            return id;
        }
        let mapping = self
            .get(parent)
            .type_name
            .as_deref()
            .and_then(|ty| provider.attribute(ty, segment))
            .cloned();
        let type_name = mapping.as_ref().map(|m| m.target_type().to_string());
        let kind = if collection_valued {
            ResolverKind::CollectionValuedField
        } else {
            ResolverKind::StateField
        };
        let id = self.push(Some(parent), kind, segment, type_name, mapping);
        self.children.insert((parent, segment.to_string()), id);
        trace!(
            parent = parent.0,
            segment,
            id = id.0,
            resolved = self.get(id).mapping.is_some(),
            "query.resolver.child"
        );
        id
    }

    /// Names from the root variable down to `id`.
    pub fn path_of(&self, id: ResolverId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let record = self.get(id);
            names.push(record.name.as_str());
            current = record.parent;
        }
        names.reverse();
        names
    }
}
