#![allow(missing_docs)]

use std::path::PathBuf;

use jpql::grammar::bnf_ids;
use jpql::model::CaseExpressionBuilder;
use jpql::{
    Formatter, GrammarKind, GrammarRegistry, GrammarValidator, IdentifierStyle, InMemoryMetadata,
    JpqlError, ManagedType, Parser, RefactoringTool,
};

fn fixture_metadata() -> InMemoryMetadata {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/employees.json");
    InMemoryMetadata::load(&path).expect("fixture metadata")
}

fn tool<'p>(metadata: &'p InMemoryMetadata, text: &str) -> RefactoringTool<'p> {
    RefactoringTool::new(GrammarRegistry::new().latest(), metadata, text)
}

#[test]
fn class_rename_and_back_restores_text() {
    let metadata = fixture_metadata();
    let text = "SELECT NEW com.acme.EmployeeView(e.name, e.salary) FROM Employee e";
    let mut tool = tool(&metadata, text);
    assert_eq!(
        tool.rename_class_name("com.acme.EmployeeView", "com.acme.Summary")
            .expect("rename"),
        1
    );
    assert_eq!(
        tool.to_actual_text().expect("text"),
        "SELECT NEW com.acme.Summary(e.name, e.salary) FROM Employee e"
    );
    assert_eq!(
        tool.rename_class_name("com.acme.Summary", "com.acme.EmployeeView")
            .expect("rename back"),
        1
    );
    assert_eq!(tool.to_actual_text().expect("text"), text);
    assert_eq!(tool.original_text(), text);
}

#[test]
fn enum_constant_rename_only_touches_enum_paths() {
    let metadata =
        InMemoryMetadata::new().with_type(ManagedType::enumeration("Employee", ["Exempt", "FullTime"]));
    let mut tool = tool(
        &metadata,
        "SELECT e FROM Worker e WHERE e.kind = Employee.Exempt OR e.exempt = TRUE",
    );
    assert_eq!(
        tool.rename_enum_constant("Employee.Exempt", "Employee.FullTime")
            .expect("rename"),
        1
    );
    assert_eq!(
        tool.to_actual_text().expect("text"),
        "SELECT e FROM Worker e WHERE e.kind = Employee.FullTime OR e.exempt = TRUE"
    );
    assert_eq!(tool.rename_enum_constant("e.exempt", "e.salaried").expect("noop"), 0);
}

#[test]
fn variable_rename_reaches_subqueries() {
    let metadata = fixture_metadata();
    let mut tool = tool(
        &metadata,
        "SELECT E FROM Employee e WHERE EXISTS (SELECT p FROM Phone p WHERE p.owner = e)",
    );
    assert_eq!(tool.rename_variable("e", "emp").expect("rename"), 3);
    assert_eq!(
        tool.to_actual_text().expect("text"),
        "SELECT emp FROM Employee emp WHERE EXISTS (SELECT p FROM Phone p WHERE p.owner = emp)"
    );
}

#[test]
fn entity_rename_in_nested_declarations() {
    let metadata = fixture_metadata();
    let mut tool = tool(
        &metadata,
        "SELECT e FROM Employee e WHERE EXISTS (SELECT p FROM Phone p WHERE p.owner = e)",
    );
    assert_eq!(tool.rename_entity_name("Phone", "Handset").expect("rename"), 1);
    assert_eq!(tool.rename_entity_name("phone", "Handset").expect("case"), 0);
    assert_eq!(
        tool.to_actual_text().expect("text"),
        "SELECT e FROM Employee e WHERE EXISTS (SELECT p FROM Handset p WHERE p.owner = e)"
    );
}

#[test]
fn entity_rename_carries_matching_path_roots() {
    let metadata = fixture_metadata();
    let mut tool = tool(
        &metadata,
        "SELECT phone FROM Employee e JOIN e.phones phone WHERE phone.number = '1'",
    );
    assert_eq!(tool.rename_entity_name("phone", "Handset").expect("rename"), 3);
    assert_eq!(
        tool.to_actual_text().expect("text"),
        "SELECT Handset FROM Employee e JOIN e.phones Handset WHERE Handset.number = '1'"
    );
}

#[test]
fn result_variable_rename_updates_declaration_and_order_by() {
    let metadata = fixture_metadata();
    let mut tool = tool(&metadata, "SELECT e.name AS n FROM Employee e ORDER BY n");
    assert_eq!(tool.rename_variable("n", "m").expect("rename"), 2);
    assert_eq!(
        tool.to_actual_text().expect("text"),
        "SELECT e.name AS m FROM Employee e ORDER BY m"
    );
}

#[test]
fn enum_constant_rename_requires_a_declared_constant() {
    let metadata = fixture_metadata();
    let text = "SELECT e FROM Employee e WHERE e.status = com.acme.Status.BOGUS";
    let mut bogus = tool(&metadata, text);
    assert_eq!(
        bogus
            .rename_enum_constant("com.acme.Status.BOGUS", "com.acme.Status.X")
            .expect("rename"),
        0
    );
    assert_eq!(bogus.to_actual_text().expect("text"), text);

    let mut real = tool(
        &metadata,
        "SELECT e FROM Employee e WHERE e.status = com.acme.Status.RETIRED",
    );
    assert_eq!(
        real.rename_enum_constant("com.acme.Status.RETIRED", "com.acme.Status.ACTIVE")
            .expect("rename"),
        1
    );
}

#[test]
fn incomplete_queries_format_to_themselves() {
    let metadata = fixture_metadata();
    for text in [
        "SELECT",
        "SELECT NEW ( FROM Employee e",
        "SELECT e. FROM Employee e",
    ] {
        let mut first = tool(&metadata, text);
        let formatted = first.to_actual_text().expect("text");
        assert_eq!(formatted, text);
        let mut second = tool(&metadata, &formatted);
        assert_eq!(second.to_actual_text().expect("text"), formatted);
    }
}

#[test]
fn field_rename_follows_embedded_types() {
    let metadata = fixture_metadata();
    let mut tool = tool(
        &metadata,
        "SELECT e FROM Employee e WHERE e.address.city = 'Oslo' AND e.manager.address.city = 'Bergen'",
    );
    assert_eq!(
        tool.rename_field("com.acme.Address", "city", "town")
            .expect("rename"),
        2
    );
    assert_eq!(tool.rename_field("Employee", "city", "x").expect("wrong type"), 0);
    assert_eq!(
        tool.to_actual_text().expect("text"),
        "SELECT e FROM Employee e WHERE e.address.town = 'Oslo' AND e.manager.address.town = 'Bergen'"
    );
}

#[test]
fn formatter_styles() {
    let metadata = fixture_metadata();
    let mut tool = tool(&metadata, "select e from Employee e where e.name = 'x' order by e.name desc");
    assert_eq!(
        tool.to_actual_text().expect("upper"),
        "SELECT e FROM Employee e WHERE e.name = 'x' ORDER BY e.name DESC"
    );
    tool.set_formatter(Formatter::new(IdentifierStyle::Lowercase).expect("lowercase"));
    assert_eq!(
        tool.to_actual_text().expect("lower"),
        "select e from Employee e where e.name = 'x' order by e.name desc"
    );
    assert!(matches!(
        Formatter::new(IdentifierStyle::Preserve),
        Err(JpqlError::NotImplemented { .. })
    ));
}

#[test]
fn built_case_expression_is_valid_jpql() {
    let registry = GrammarRegistry::new();
    let grammar = registry.get(GrammarKind::Jpql2_0);
    let case = CaseExpressionBuilder::new()
        .when_jpql(&grammar, "e.salary > 100000", "'high'")
        .and_then(|b| b.when_jpql(&grammar, "e.salary > 50000", "'medium'"))
        .and_then(|b| b.otherwise_jpql(&grammar, "'low'"))
        .expect("fragments")
        .build()
        .expect("case");
    let text = Formatter::default().format(&case);
    assert_eq!(
        text,
        "CASE WHEN e.salary > 100000 THEN 'high' WHEN e.salary > 50000 THEN 'medium' ELSE 'low' END"
    );

    let reparsed =
        Parser::parse(&grammar, &text, bnf_ids::CASE_EXPRESSION, false).expect("reparse");
    assert!(GrammarValidator::new(&grammar).validate(&reparsed).is_empty());
}
