//! Query context: declarations, scopes and the resolver chain of one query.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::grammar::Grammar;
use crate::parser::{Expression, ExpressionKind as K, JpqlExpression, Span};
use crate::query::declaration::{
    Declaration, JoinDeclaration, JoinFetch, PathDeclaration, RangeDeclaration,
};
use crate::query::metadata::ManagedTypeProvider;
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};
use crate::query::resolver::{Resolver, ResolverArena, ResolverId};

/// Handle to a query scope (the top-level query or one subquery).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The top-level scope.
    pub const ROOT: ScopeId = ScopeId(0);
}

/// Declarations and variables of one FROM clause.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Own id.
    pub id: ScopeId,
    /// Enclosing scope.
    pub parent: Option<ScopeId>,
    /// Source range of the (sub)query.
    pub span: Span,
    declarations: Vec<Declaration>,
    variables: FxHashMap<String, ResolverId>,
}

impl Scope {
    /// Declarations in FROM-clause order.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }
}

/// Resolution of one path expression, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolution {
    /// Resolver of the root identification variable, if declared.
    pub root: Option<ResolverId>,
    /// One resolver per segment after the root.
    pub segments: Vec<ResolverId>,
}

impl PathResolution {
    /// Resolver of the last segment.
    pub fn last(&self) -> Option<ResolverId> {
        self.segments.last().copied().or(self.root)
    }
}

/// A duplicate identification variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateVariable {
    /// Variable name as written.
    pub name: String,
    /// Where the second declaration appears.
    pub span: Span,
}

/// Binds a grammar, a parsed query and a metadata provider, and owns the
/// declarations and resolvers built from them.
pub struct QueryContext<'p> {
    grammar: Arc<Grammar>,
    provider: &'p dyn ManagedTypeProvider,
    expression: Option<JpqlExpression>,
    scopes: Vec<Scope>,
    scope_by_span: FxHashMap<Span, ScopeId>,
    arena: ResolverArena,
    paths: FxHashMap<Span, PathResolution>,
    duplicates: Vec<DuplicateVariable>,
    rejected_join_fetches: Vec<Span>,
    result_variables: Vec<String>,
}

impl<'p> QueryContext<'p> {
    /// Creates an empty context.
    pub fn new(grammar: Arc<Grammar>, provider: &'p dyn ManagedTypeProvider) -> Self {
        Self {
            grammar,
            provider,
            expression: None,
            scopes: Vec::new(),
            scope_by_span: FxHashMap::default(),
            arena: ResolverArena::new(),
            paths: FxHashMap::default(),
            duplicates: Vec::new(),
            rejected_join_fetches: Vec::new(),
            result_variables: Vec::new(),
        }
    }

    /// Binds a parsed query and rebuilds declarations and resolvers.
    pub fn set_expression(&mut self, expression: &JpqlExpression) {
        let timer = profile_timer();
        self.scopes.clear();
        self.scope_by_span.clear();
        self.arena = ResolverArena::new();
        self.paths.clear();
        self.duplicates.clear();
        self.rejected_join_fetches.clear();
        self.result_variables.clear();

        let root = expression.root();
        self.add_scope(root.span, None);
        self.declare(root, ScopeId::ROOT);
        self.resolve_paths(root, ScopeId::ROOT);
        self.expression = Some(expression.clone());
        record_profile_timer(QueryProfileKind::Context, timer);
        debug!(
            grammar = self.grammar.name(),
            scopes = self.scopes.len(),
            declarations = self.scopes.iter().map(|s| s.declarations.len()).sum::<usize>(),
            resolvers = self.arena.len(),
            "query.context.built"
        );
    }

    /// Grammar handle.
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Metadata provider.
    pub fn provider(&self) -> &'p dyn ManagedTypeProvider {
        self.provider
    }

    /// Bound query, if any.
    pub fn expression(&self) -> Option<&JpqlExpression> {
        self.expression.as_ref()
    }

    /// All scopes, top-level first then subqueries in pre-order.
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Scope by id.
    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    /// Declarations of the top-level FROM clause.
    pub fn declarations(&self) -> &[Declaration] {
        self.scope(ScopeId::ROOT)
            .map(Scope::declarations)
            .unwrap_or(&[])
    }

    /// Declaration binding `variable` (case-insensitive) in any scope.
    pub fn declaration(&self, variable: &str) -> Option<&Declaration> {
        self.scopes
            .iter()
            .flat_map(|s| s.declarations.iter())
            .find(|d| {
                d.variable()
                    .is_some_and(|v| v.eq_ignore_ascii_case(variable))
            })
    }

    /// Innermost scope whose query covers `span`.
    pub fn scope_for(&self, span: Span) -> ScopeId {
        self.scopes
            .iter()
            .filter(|s| s.span.start <= span.start && span.end <= s.span.end)
            .min_by_key(|s| s.span.end - s.span.start)
            .map(|s| s.id)
            .unwrap_or(ScopeId::ROOT)
    }

    /// Resolver arena.
    pub fn resolvers(&self) -> &ResolverArena {
        &self.arena
    }

    /// Resolver record by id.
    pub fn get(&self, id: ResolverId) -> &Resolver {
        self.arena.get(id)
    }

    /// Looks up a variable in the top-level scope, then in the subquery scopes.
    pub fn resolver(&self, name: &str) -> Option<ResolverId> {
        let key = name.to_lowercase();
        self.scopes
            .iter()
            .find_map(|scope| scope.variables.get(&key).copied())
    }

    /// Looks up a variable visible from `scope`.
    pub fn resolver_in(&self, scope: ScopeId, name: &str) -> Option<ResolverId> {
        let key = name.to_lowercase();
        let mut current = self.scope(scope);
        while let Some(s) = current {
            if let Some(id) = s.variables.get(&key) {
                return Some(*id);
            }
            current = s.parent.and_then(|p| self.scope(p));
        }
        None
    }

    /// Memoized child resolver.
    pub fn child_or_create(
        &mut self,
        parent: ResolverId,
        segment: &str,
        collection_valued: bool,
    ) -> ResolverId {
        self.arena
            .child_or_create(self.provider, parent, segment, collection_valued)
    }

    /// Resolves `segments` from the variable visible in `scope`.
    ///
    /// The last segment becomes a collection-valued resolver when
    /// `collection_valued` is set and it does not exist yet.
    pub fn resolve_path(
        &mut self,
        scope: ScopeId,
        segments: &[String],
        collection_valued: bool,
    ) -> Option<ResolverId> {
        self.path_chain(scope, segments, collection_valued).last()
    }

    fn path_chain(
        &mut self,
        scope: ScopeId,
        segments: &[String],
        collection_valued: bool,
    ) -> PathResolution {
        let Some((first, rest)) = segments.split_first() else {
            return PathResolution {
                root: None,
                segments: Vec::new(),
            };
        };
        let Some(mut current) = self.resolver_in(scope, first) else {
            return PathResolution {
                root: None,
                segments: Vec::new(),
            };
        };
        let root = current;
        let mut ids = Vec::with_capacity(rest.len());
        for (idx, segment) in rest.iter().enumerate() {
            let last = idx + 1 == rest.len();
            current = self.child_or_create(current, segment, last && collection_valued);
            ids.push(current);
        }
        PathResolution {
            root: Some(root),
            segments: ids,
        }
    }

    /// Resolution recorded for the path expression at `span`.
    pub fn path_resolution(&self, span: Span) -> Option<&PathResolution> {
        self.paths.get(&span)
    }

    /// Variables declared twice in one scope chain.
    pub fn duplicate_variables(&self) -> &[DuplicateVariable] {
        &self.duplicates
    }

    /// JOIN FETCH clauses attached to non-range declarations.
    pub fn rejected_join_fetches(&self) -> &[Span] {
        &self.rejected_join_fetches
    }

    /// Whether `name` is a result variable of the top-level SELECT clause.
    pub fn is_result_variable(&self, name: &str) -> bool {
        self.result_variables
            .iter()
            .any(|v| v.eq_ignore_ascii_case(name))
    }

    /// Type of the identification variable, when resolved.
    pub fn variable_type(&self, scope: ScopeId, name: &str) -> Option<&str> {
        let id = self.resolver_in(scope, name)?;
        self.arena.get(id).type_name.as_deref()
    }

    // ---- building ------------------------------------------------------

    fn add_scope(&mut self, span: Span, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            parent,
            span,
            declarations: Vec::new(),
            variables: FxHashMap::default(),
        });
        self.scope_by_span.insert(span, id);
        id
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// Declares FROM clauses, the enclosing query before its subqueries.
    fn declare(&mut self, node: &Expression, scope: ScopeId) {
        let scope = match &node.kind {
            K::Subquery { .. } if scope != ScopeId::ROOT || node.span != self.scopes[0].span => {
                self.add_scope(node.span, Some(scope))
            }
            _ => scope,
        };
        match &node.kind {
            K::SelectStatement { from, .. } | K::Subquery { from, .. } => {
                self.declare_from(from, scope);
                for child in node.children() {
                    if !std::ptr::eq(child, from.as_ref()) {
                        self.declare(child, scope);
                    }
                }
                return;
            }
            K::UpdateClause { declaration, .. } | K::DeleteClause { declaration } => {
                self.declare_entry(declaration, scope);
            }
            K::ResultVariable { name, .. } if scope == ScopeId::ROOT => {
                self.result_variables.push(name.clone());
            }
            _ => {}
        }
        for child in node.children() {
            self.declare(child, scope);
        }
    }

    fn declare_from(&mut self, from: &Expression, scope: ScopeId) {
        if let K::FromClause { declarations } = &from.kind {
            for declaration in declarations {
                self.declare_entry(declaration, scope);
            }
        }
        // Subqueries nested in join conditions.
        for child in from.children() {
            self.declare_nested(child, scope);
        }
    }

    fn declare_nested(&mut self, node: &Expression, scope: ScopeId) {
        if matches!(node.kind, K::Subquery { .. }) {
            self.declare(node, scope);
            return;
        }
        for child in node.children() {
            self.declare_nested(child, scope);
        }
    }

    fn declare_entry(&mut self, node: &Expression, scope: ScopeId) {
        let (mut declaration, variable, joins) = match &node.kind {
            K::RangeDeclaration {
                entity,
                variable,
                joins,
                ..
            } => {
                let K::AbstractSchemaName { name } = &entity.kind else {
                    return;
                };
                let descriptor = self.provider.entity(name).map(|ty| ty.name().to_string());
                let var = variable_name(variable.as_deref());
                let decl = Declaration::Range(RangeDeclaration::new(
                    name.clone(),
                    var.clone(),
                    descriptor.clone(),
                    node.span,
                ));
                if let Some(var) = &var {
                    let id = self.arena.add_variable(var, descriptor, None);
                    self.bind(scope, var, id, variable_span(variable.as_deref(), node.span));
                }
                (decl, var, joins.as_slice())
            }
            K::CollectionMemberDeclaration { path, variable, .. } => {
                let var = variable_name(variable.as_deref());
                let decl = self.declare_path(scope, path, variable.as_deref(), true, node.span);
                (Declaration::CollectionMember(decl), var, &[][..])
            }
            K::DerivedDeclaration {
                path,
                variable,
                joins,
                ..
            } => {
                let var = variable_name(variable.as_deref());
                let decl = self.declare_path(scope, path, variable.as_deref(), false, node.span);
                (Declaration::Derived(decl), var, joins.as_slice())
            }
            _ => return,
        };

        for join in joins {
            self.declare_join(scope, &mut declaration, join);
        }
        debug!(
            variable = variable.as_deref().unwrap_or(""),
            root = declaration.root_path(),
            range = declaration.is_range(),
            "query.context.declaration"
        );
        self.scope_mut(scope).declarations.push(declaration);
    }

    fn declare_path(
        &mut self,
        scope: ScopeId,
        path: &Expression,
        variable: Option<&Expression>,
        collection_valued: bool,
        span: Span,
    ) -> PathDeclaration {
        let (root_path, resolved) = match &path.kind {
            K::Path { segments, .. } => (
                segments.join("."),
                self.resolve_path(scope, segments, collection_valued),
            ),
            K::IdentificationVariable { name } => (name.clone(), None),
            K::Unknown { text } => (text.clone(), None),
            _ => (String::new(), None),
        };
        let mapping = resolved.and_then(|id| self.arena.get(id).mapping.clone());
        let var = variable_name(variable);
        if let Some(var) = &var {
            let type_name = mapping.as_ref().map(|m| m.target_type().to_string());
            let id = self.arena.add_variable(var, type_name, mapping.clone());
            self.bind(scope, var, id, variable_span(variable, span));
        }
        PathDeclaration::new(root_path, var, mapping, span)
    }

    fn declare_join(&mut self, scope: ScopeId, declaration: &mut Declaration, join: &Expression) {
        let K::Join {
            fetch,
            path,
            variable,
            ..
        } = &join.kind
        else {
            return;
        };
        let (path_text, resolved) = match &path.kind {
            K::Path { segments, .. } => (
                segments.join("."),
                self.resolve_path(scope, segments, false),
            ),
            K::IdentificationVariable { name } => (name.clone(), None),
            K::Unknown { text } => (text.clone(), None),
            _ => (String::new(), None),
        };
        let var = variable_name(variable.as_deref());
        if let Some(var) = &var {
            let (type_name, mapping) = match resolved {
                Some(id) => {
                    let record = self.arena.get(id);
                    (record.type_name.clone(), record.mapping.clone())
                }
                None => (None, None),
            };
            let id = self.arena.add_variable(var, type_name, mapping);
            self.bind(scope, var, id, variable_span(variable.as_deref(), join.span));
        }
        if *fetch {
            let accepted = declaration.add_join_fetch(JoinFetch {
                path: path_text,
                variable: var,
                span: join.span,
            });
            if !accepted {
                self.rejected_join_fetches.push(join.span);
            }
        } else {
            declaration.push_join(JoinDeclaration {
                path: path_text,
                variable: var,
                span: join.span,
            });
        }
    }

    fn bind(&mut self, scope: ScopeId, name: &str, id: ResolverId, span: Span) {
        if self.resolver_in(scope, name).is_some() {
            self.duplicates.push(DuplicateVariable {
                name: name.to_string(),
                span,
            });
            return;
        }
        self.scope_mut(scope)
            .variables
            .insert(name.to_lowercase(), id);
    }

    fn resolve_paths(&mut self, node: &Expression, scope: ScopeId) {
        let scope = match node.kind {
            K::Subquery { .. } => self.scope_by_span.get(&node.span).copied().unwrap_or(scope),
            _ => scope,
        };
        if let K::Path {
            segments,
            collection_valued,
        } = &node.kind
        {
            let chain = self.path_chain(scope, segments, *collection_valued);
            self.paths.insert(node.span, chain);
        }
        for child in node.children() {
            self.resolve_paths(child, scope);
        }
    }
}

fn variable_name(variable: Option<&Expression>) -> Option<String> {
    match variable.map(|v| &v.kind) {
        Some(K::IdentificationVariable { name }) => Some(name.clone()),
        _ => None,
    }
}

fn variable_span(variable: Option<&Expression>, fallback: Span) -> Span {
    variable.map(|v| v.span).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarKind, GrammarRegistry};
    use crate::parser::Parser;
    use crate::query::metadata::{InMemoryMetadata, ManagedType, MappingKind};
    use crate::query::resolver::ResolverKind;

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_type(
                ManagedType::entity("com.acme.Employee", "Employee")
                    .with_basic("name", "String")
                    .with_relationship("address", MappingKind::OneToOne, "com.acme.Address")
                    .with_relationship("phones", MappingKind::OneToMany, "com.acme.Phone")
                    .with_relationship("projects", MappingKind::ManyToMany, "com.acme.Project"),
            )
            .with_type(ManagedType::embeddable("com.acme.Address").with_basic("city", "String"))
            .with_type(ManagedType::entity("com.acme.Phone", "Phone").with_basic("number", "String"))
            .with_type(
                ManagedType::entity("com.acme.Project", "Project").with_basic("title", "String"),
            )
    }

    fn context<'p>(metadata: &'p InMemoryMetadata, text: &str) -> QueryContext<'p> {
        let registry = GrammarRegistry::new();
        let grammar = registry.get(GrammarKind::Jpql2_1);
        let expression = Parser::parse_statement(&grammar, text).expect("parse");
        let mut context = QueryContext::new(grammar, metadata);
        context.set_expression(&expression);
        context
    }

    #[test]
    fn range_declaration_has_descriptor_and_ordered_join_fetches() {
        let metadata = metadata();
        let ctx = context(
            &metadata,
            "SELECT e FROM Employee e JOIN FETCH e.phones JOIN FETCH e.projects WHERE e.name = 'x'",
        );
        let decl = &ctx.declarations()[0];
        assert!(decl.is_range());
        assert_eq!(decl.descriptor(), Some("com.acme.Employee"));
        assert!(decl.mapping().is_none());
        let fetches: Vec<&str> = decl.join_fetches().iter().map(|j| j.path.as_str()).collect();
        assert_eq!(fetches, vec!["e.phones", "e.projects"]);
    }

    #[test]
    fn resolving_twice_returns_same_resolvers() {
        let metadata = metadata();
        let mut ctx = context(&metadata, "SELECT e FROM Employee e");
        let segments = vec!["e".to_string(), "address".to_string(), "city".to_string()];
        let first = ctx.resolve_path(ScopeId::ROOT, &segments, false).expect("resolve");
        let address = ctx.get(first).parent.expect("parent");
        let second = ctx.resolve_path(ScopeId::ROOT, &segments, false).expect("resolve");
        assert_eq!(first, second);
        assert_eq!(ctx.get(second).parent, Some(address));
        assert_eq!(ctx.get(first).type_name.as_deref(), Some("String"));
    }

    #[test]
    fn variables_are_case_insensitive_and_unknown_is_none() {
        let metadata = metadata();
        let ctx = context(&metadata, "SELECT e FROM Employee e");
        assert!(ctx.resolver("E").is_some());
        assert!(ctx.resolver("x").is_none());
    }

    #[test]
    fn collection_member_and_subquery_scopes() {
        let metadata = metadata();
        let ctx = context(
            &metadata,
            "SELECT e FROM Employee e, IN(e.phones) p WHERE EXISTS \
             (SELECT pr FROM e.projects pr WHERE pr.title = p.number)",
        );
        assert_eq!(ctx.scopes().len(), 2);
        let member = &ctx.declarations()[1];
        assert!(member.is_collection_member());
        assert_eq!(member.mapping().map(|m| m.name.as_str()), Some("phones"));
        assert!(member.descriptor().is_none());

        let sub = &ctx.scopes()[1];
        assert_eq!(sub.parent, Some(ScopeId::ROOT));
        assert!(sub.declarations()[0].is_derived());
        assert!(ctx.resolver_in(ScopeId::ROOT, "pr").is_none());
        assert!(ctx.resolver_in(sub.id, "pr").is_some());
        assert!(ctx.resolver_in(sub.id, "e").is_some());
        assert!(ctx.resolver("pr").is_some());
        assert_eq!(
            ctx.variable_type(sub.id, "pr"),
            Some("com.acme.Project")
        );
    }

    #[test]
    fn join_fetch_on_derived_declaration_is_rejected() {
        let metadata = metadata();
        let ctx = context(
            &metadata,
            "SELECT e FROM Employee e WHERE EXISTS (SELECT p FROM e.projects p JOIN FETCH p.title)",
        );
        assert_eq!(ctx.rejected_join_fetches().len(), 1);
        assert!(!ctx.scopes()[1].declarations()[0].has_join_fetches());
    }

    #[test]
    fn duplicate_variables_are_recorded() {
        let metadata = metadata();
        let ctx = context(&metadata, "SELECT e FROM Employee e, Phone E");
        assert_eq!(ctx.duplicate_variables().len(), 1);
        assert_eq!(ctx.duplicate_variables()[0].name, "E");
    }

    #[test]
    fn collection_paths_get_collection_resolvers() {
        let metadata = metadata();
        let ctx = context(&metadata, "SELECT e FROM Employee e WHERE e.phones IS EMPTY");
        let resolver = ctx
            .resolvers()
            .iter()
            .find(|r| r.name == "phones")
            .expect("phones resolver");
        assert_eq!(resolver.kind, ResolverKind::CollectionValuedField);
    }
}
