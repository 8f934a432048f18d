#![allow(missing_docs)]

use jpql::grammar::bnf_ids;
use jpql::parser::{BinaryOp, ExpressionKind};
use jpql::{
    DiagnosticKey, GrammarError, GrammarKind, GrammarRegistry, InMemoryMetadata, JpqlError, Parser,
    QueryContext,
};

#[test]
fn trailing_dot_yields_placeholder_at_path_position() {
    let registry = GrammarRegistry::new();
    let grammar = registry.latest();
    let text = "SELECT e FROM Employee e WHERE e.";
    let expression = Parser::parse(&grammar, text, bnf_ids::QL_STATEMENT, true)
        .expect("tolerant parse never fails on a trailing dot");

    assert!(expression.is_incomplete());
    let mut placeholders = Vec::new();
    expression.root().walk(&mut |node| {
        if matches!(node.kind, ExpressionKind::Unknown { .. }) {
            placeholders.push(node.span);
        }
    });
    assert_eq!(placeholders.len(), 1);
    assert_eq!(expression.slice(placeholders[0]), "e.");

    let diagnostics = expression.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].key, DiagnosticKey::IncompletePathExpression);
    assert_eq!(diagnostics[0].span.start, text.len() - 2);
}

#[test]
fn trailing_dot_before_from_keeps_the_from_clause() {
    let grammar = GrammarRegistry::new().latest();
    let text = "SELECT e. FROM Employee e";
    let expression = Parser::parse_statement(&grammar, text).expect("tolerant");

    let mut placeholders = Vec::new();
    expression.root().walk(&mut |node| {
        if matches!(node.kind, ExpressionKind::Unknown { .. }) {
            placeholders.push(node.span);
        }
    });
    assert_eq!(placeholders.len(), 1);
    assert_eq!(expression.slice(placeholders[0]), "e.");

    let keys: Vec<DiagnosticKey> = expression.diagnostics().iter().map(|d| d.key).collect();
    assert_eq!(keys, vec![DiagnosticKey::IncompletePathExpression]);

    let metadata = InMemoryMetadata::new();
    let mut context = QueryContext::new(grammar.clone(), &metadata);
    context.set_expression(&expression);
    assert_eq!(context.declarations().len(), 1);
    assert_eq!(context.declarations()[0].variable(), Some("e"));

    let err = Parser::parse(&grammar, text, bnf_ids::QL_STATEMENT, false).unwrap_err();
    match err {
        JpqlError::Parse(parse) => assert_eq!(parse.position, 10),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn strict_mode_fails_with_position() {
    let grammar = GrammarRegistry::new().latest();
    let err = Parser::parse(
        &grammar,
        "SELECT e FROM Employee e WHERE e.",
        bnf_ids::QL_STATEMENT,
        false,
    )
    .unwrap_err();
    match err {
        JpqlError::Parse(parse) => assert_eq!(parse.position, 33),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn unknown_and_version_specific_bnf_ids() {
    let registry = GrammarRegistry::new();
    let jpql1 = registry.get(GrammarKind::Jpql1_0);
    let err = Parser::parse(&jpql1, "e.name", "no_such_rule", true).unwrap_err();
    assert!(matches!(
        err,
        JpqlError::Grammar(GrammarError::UnknownBnf { ref id, .. }) if id == "no_such_rule"
    ));

    let case = "CASE WHEN e.salary > 1 THEN 'high' ELSE 'low' END";
    assert!(matches!(
        Parser::parse(&jpql1, case, bnf_ids::CASE_EXPRESSION, true),
        Err(JpqlError::Grammar(GrammarError::UnknownBnf { .. }))
    ));
    let jpql2 = registry.get(GrammarKind::Jpql2_0);
    let expression =
        Parser::parse(&jpql2, case, bnf_ids::CASE_EXPRESSION, false).expect("case fragment");
    assert!(matches!(expression.root().kind, ExpressionKind::Case { .. }));
}

#[test]
fn fragments_parse_from_their_bnf() {
    let grammar = GrammarRegistry::new().latest();
    let expression = Parser::parse(
        &grammar,
        "e.salary > 10 AND e.name LIKE 'A%'",
        bnf_ids::CONDITIONAL_EXPRESSION,
        false,
    )
    .expect("condition");
    assert!(matches!(
        expression.root().kind,
        ExpressionKind::Binary {
            op: BinaryOp::And,
            ..
        }
    ));
    assert_eq!(expression.bnf_id(), bnf_ids::CONDITIONAL_EXPRESSION);
    assert_eq!(expression.grammar_name(), "jpql-2.1");
}

#[test]
fn treat_is_not_implemented_in_either_mode() {
    let grammar = GrammarRegistry::new().latest();
    let text = "SELECT TREAT(e.project AS LargeProject) FROM Employee e";
    for tolerant in [true, false] {
        let err = Parser::parse(&grammar, text, bnf_ids::QL_STATEMENT, tolerant).unwrap_err();
        assert!(matches!(err, JpqlError::NotImplemented { .. }), "{err}");
    }
}

#[test]
fn malformed_clauses_become_placeholders() {
    let grammar = GrammarRegistry::new().latest();
    let expression = Parser::parse_statement(
        &grammar,
        "SELECT e FROM Employee e WHERE e.salary > ORDER BY e.name",
    )
    .expect("tolerant");
    assert!(expression.is_incomplete());
    assert!(!expression.diagnostics().is_empty());
    assert!(matches!(
        expression.root().kind,
        ExpressionKind::SelectStatement {
            order_by: Some(_),
            ..
        }
    ));
}

#[test]
fn expression_serializes_to_json() {
    let grammar = GrammarRegistry::new().latest();
    let expression =
        Parser::parse_statement(&grammar, "SELECT e FROM Employee e").expect("parse");
    let value = serde_json::to_value(&expression).expect("json");
    assert_eq!(value["text"], "SELECT e FROM Employee e");
    assert_eq!(value["grammar"], "jpql-2.1");
    assert!(value["diagnostics"].as_array().is_some_and(Vec::is_empty));
    assert!(value.get("root").is_some());
}
