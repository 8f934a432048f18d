#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use jpql::grammar::{JpaVersion, Provider};
use jpql::{
    DiagnosticKey, Grammar, GrammarBuilder, GrammarError, GrammarKind, GrammarRegistry,
    GrammarValidator, InMemoryMetadata, Parser, QueryContext, SemanticValidator,
};

fn fixture_metadata() -> InMemoryMetadata {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/employees.json");
    InMemoryMetadata::load(&path).expect("fixture metadata")
}

fn grammar_keys(grammar: &Grammar, text: &str) -> Vec<DiagnosticKey> {
    let expression = Parser::parse_statement(grammar, text).expect("parse");
    GrammarValidator::new(grammar)
        .validate(&expression)
        .into_iter()
        .map(|d| d.key)
        .collect()
}

fn semantic_keys(metadata: &InMemoryMetadata, text: &str) -> Vec<DiagnosticKey> {
    let grammar = GrammarRegistry::new().latest();
    let expression = Parser::parse_statement(&grammar, text).expect("parse");
    let mut context = QueryContext::new(grammar, metadata);
    context.set_expression(&expression);
    SemanticValidator::new(&context)
        .validate()
        .into_iter()
        .map(|d| d.key)
        .collect()
}

#[test]
fn custom_grammar_without_join_fetch() {
    let registry = GrammarRegistry::new();
    let grammar = GrammarBuilder::new("no-join-fetch", JpaVersion::V2_1, Provider::Jpa)
        .base(registry.get(GrammarKind::Jpql2_1))
        .without_identifier("JOIN FETCH")
        .build();
    let text = "SELECT e FROM Employee e JOIN FETCH e.phones";

    let expression = Parser::parse_statement(&grammar, text).expect("parse");
    let diagnostics = GrammarValidator::new(&grammar).validate(&expression);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].key, DiagnosticKey::IdentifierNotSupported);
    assert!(diagnostics[0].message.contains("JOIN FETCH"));

    assert!(grammar_keys(&registry.get(GrammarKind::Jpql2_1), text).is_empty());
    assert_eq!(grammar.chain(), vec!["no-join-fetch", "jpql-2.1", "jpql-2.0", "jpql-1.0"]);
}

#[test]
fn every_grammar_resolves_its_base_rules() {
    let registry = GrammarRegistry::new();
    for grammar in registry.iter() {
        let mut base = grammar.base();
        while let Some(parent) = base {
            for id in parent.bnf_ids() {
                assert!(
                    grammar.bnf(id).is_ok(),
                    "{} does not resolve {id} from {}",
                    grammar.name(),
                    parent.name()
                );
            }
            base = parent.base();
        }
    }
}

#[test]
fn registry_lookup_by_name() {
    let registry = GrammarRegistry::new();
    let grammar = registry.by_name("EclipseLink-2.1").expect("case-insensitive name");
    assert_eq!(grammar.kind(), Some(GrammarKind::EclipseLink2_1));
    assert_eq!(grammar.chain(), vec!["eclipselink-2.1", "jpql-2.1", "jpql-2.0", "jpql-1.0"]);
    assert_eq!(registry.get(GrammarKind::Jpql1_0).chain(), vec!["jpql-1.0"]);

    assert!(matches!(
        registry.by_name("hql-6"),
        Err(GrammarError::UnknownGrammar(ref name)) if name == "hql-6"
    ));
}

#[test]
fn grammar_handles_are_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Grammar>();

    let grammar = GrammarRegistry::new().latest();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let grammar = Arc::clone(&grammar);
            std::thread::spawn(move || {
                grammar_keys(&grammar, "SELECT e FROM Employee e WHERE e.name = 'x'").len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("thread"), 0);
    }
}

#[test]
fn version_gates_follow_the_chain() {
    let registry = GrammarRegistry::new();
    let text = "SELECT e FROM Employee e JOIN e.phones p ON p.number = '1'";
    assert_eq!(
        grammar_keys(&registry.get(GrammarKind::EclipseLink1_0), text),
        vec![DiagnosticKey::IdentifierNotSupported]
    );
    assert!(grammar_keys(&registry.get(GrammarKind::EclipseLink2_1), text).is_empty());
}

#[test]
fn fixture_metadata_drives_semantic_checks() {
    let metadata = fixture_metadata();
    assert!(semantic_keys(
        &metadata,
        "SELECT e FROM Employee e JOIN e.phones p WHERE p.number LIKE '0%' \
         AND e.address.city = 'Oslo' AND e.status = com.acme.Status.RETIRED"
    )
    .is_empty());
    assert_eq!(
        semantic_keys(&metadata, "SELECT e FROM Employee e WHERE e.address.zip = '1'"),
        vec![DiagnosticKey::PathNotResolvable]
    );
    assert_eq!(
        semantic_keys(&metadata, "SELECT e FROM Employee e WHERE e.phones = 'a'"),
        vec![DiagnosticKey::StateFieldPathCollectionType]
    );
    assert_eq!(
        semantic_keys(&metadata, "SELECT d FROM Department d"),
        vec![DiagnosticKey::AbstractSchemaNameUnknown]
    );
}
