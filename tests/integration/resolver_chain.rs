#![allow(missing_docs)]

use std::path::PathBuf;

use jpql::query::{ResolverKind, ScopeId};
use jpql::{GrammarRegistry, InMemoryMetadata, MappingKind, Parser, QueryContext, Span};

fn fixture_metadata() -> InMemoryMetadata {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/employees.json");
    InMemoryMetadata::load(&path).expect("fixture metadata")
}

fn context<'p>(metadata: &'p InMemoryMetadata, text: &str) -> QueryContext<'p> {
    let grammar = GrammarRegistry::new().latest();
    let expression = Parser::parse_statement(&grammar, text).expect("parse");
    let mut context = QueryContext::new(grammar, metadata);
    context.set_expression(&expression);
    context
}

fn segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

#[test]
fn self_referencing_paths_share_resolvers() {
    let metadata = fixture_metadata();
    let mut ctx = context(&metadata, "SELECT e FROM Employee e");
    let before = ctx.resolvers().len();

    let name = ctx
        .resolve_path(ScopeId::ROOT, &segments("e.manager.manager.name"), false)
        .expect("resolved");
    let created = ctx.resolvers().len() - before;
    assert_eq!(created, 3);

    let again = ctx
        .resolve_path(ScopeId::ROOT, &segments("e.manager.manager.name"), false)
        .expect("resolved");
    assert_eq!(name, again);
    assert_eq!(ctx.resolvers().len() - before, 3);

    let record = ctx.get(name);
    assert_eq!(record.type_name.as_deref(), Some("String"));
    assert_eq!(ctx.resolvers().path_of(name), vec!["e", "manager", "manager", "name"]);

    let inner_manager = record.parent.expect("parent");
    assert_eq!(
        ctx.get(inner_manager).type_name.as_deref(),
        Some("com.acme.Employee")
    );
    let outer_manager = ctx.get(inner_manager).parent.expect("parent");
    assert_ne!(outer_manager, inner_manager);
    let root = ctx.get(outer_manager).parent.expect("root");
    assert_eq!(ctx.get(root).kind, ResolverKind::IdentificationVariable);
    assert_eq!(ctx.get(root).parent, None);
}

#[test]
fn unknown_segments_resolve_without_mapping() {
    let metadata = fixture_metadata();
    let mut ctx = context(&metadata, "SELECT e FROM Employee e");
    let id = ctx
        .resolve_path(ScopeId::ROOT, &segments("e.nickname.first"), false)
        .expect("chain still built");
    assert!(ctx.get(id).mapping.is_none());
    assert!(ctx.get(id).type_name.is_none());
    assert!(ctx
        .resolve_path(ScopeId::ROOT, &segments("x.name"), false)
        .is_none());
}

#[test]
fn join_variables_take_the_target_type() {
    let metadata = fixture_metadata();
    let ctx = context(
        &metadata,
        "SELECT p FROM Employee e JOIN e.phones p LEFT JOIN e.manager m",
    );
    assert_eq!(ctx.variable_type(ScopeId::ROOT, "P"), Some("com.acme.Phone"));
    assert_eq!(
        ctx.variable_type(ScopeId::ROOT, "m"),
        Some("com.acme.Employee")
    );

    let declaration = ctx.declaration("E").expect("range declaration");
    assert_eq!(declaration.descriptor(), Some("com.acme.Employee"));
    let joins: Vec<(&str, Option<&str>)> = declaration
        .joins()
        .iter()
        .map(|j| (j.path.as_str(), j.variable.as_deref()))
        .collect();
    assert_eq!(joins, vec![("e.phones", Some("p")), ("e.manager", Some("m"))]);
    assert!(!declaration.has_join_fetches());
}

#[test]
fn join_fetches_keep_parse_order() {
    let metadata = fixture_metadata();
    let ctx = context(
        &metadata,
        "SELECT e FROM Employee e JOIN FETCH e.manager JOIN e.phones p JOIN FETCH e.address",
    );
    let declaration = &ctx.declarations()[0];
    let fetches: Vec<&str> = declaration
        .join_fetches()
        .iter()
        .map(|f| f.path.as_str())
        .collect();
    assert_eq!(fetches, vec!["e.manager", "e.address"]);
    assert_eq!(declaration.joins().len(), 1);
}

#[test]
fn subquery_scopes_see_enclosing_variables() {
    let metadata = fixture_metadata();
    let text = "SELECT e FROM Employee e WHERE EXISTS \
                (SELECT ph FROM Phone ph WHERE ph.owner = e)";
    let ctx = context(&metadata, text);
    assert_eq!(ctx.scopes().len(), 2);

    let inner_start = text.find("ph.owner").expect("inner path");
    let inner = ctx.scope_for(Span::new(inner_start, inner_start + 8));
    assert_ne!(inner, ScopeId::ROOT);
    assert_eq!(ctx.scope(inner).and_then(|s| s.parent), Some(ScopeId::ROOT));
    assert_eq!(ctx.variable_type(inner, "ph"), Some("com.acme.Phone"));
    assert_eq!(ctx.variable_type(inner, "e"), Some("com.acme.Employee"));
    assert!(ctx.resolver_in(ScopeId::ROOT, "ph").is_none());

    let resolution = ctx
        .path_resolution(Span::new(inner_start, inner_start + 8))
        .expect("recorded path");
    let owner = resolution.last().expect("owner");
    let mapping = ctx.get(owner).mapping.as_ref().expect("mapping");
    assert_eq!(mapping.kind, MappingKind::ManyToOne);
    assert_eq!(mapping.declaring_type, "com.acme.Phone");
}

#[test]
fn collection_member_declaration_carries_mapping() {
    let metadata = fixture_metadata();
    let ctx = context(&metadata, "SELECT p FROM Employee e, IN(e.phones) AS p");
    let member = &ctx.declarations()[1];
    assert!(member.is_collection_member());
    assert!(member.descriptor().is_none());
    let mapping = member.mapping().expect("mapping");
    assert_eq!(mapping.name, "phones");
    assert!(mapping.is_collection());
    assert_eq!(ctx.variable_type(ScopeId::ROOT, "p"), Some("com.acme.Phone"));
}
