#![forbid(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use jpql::grammar::GrammarKind;
use jpql::model::build_state;
use jpql::{
    Formatter, GrammarRegistry, GrammarValidator, InMemoryMetadata, ManagedType, MappingKind,
    Parser, QueryContext, SemanticValidator,
};

const QUERIES: &[&str] = &[
    "SELECT e FROM Employee e WHERE e.name = 'x'",
    "SELECT DISTINCT e.name, COUNT(p) FROM Employee e JOIN e.phones p \
     WHERE e.salary BETWEEN 1000 AND 5000 AND p.number LIKE '47%' \
     GROUP BY e.name HAVING COUNT(p) > 1 ORDER BY e.name DESC",
    "SELECT NEW com.acme.EmployeeView(e.name, e.address.city) FROM Employee e \
     WHERE EXISTS (SELECT p FROM Phone p WHERE p.owner = e) \
     AND CASE WHEN e.salary > 100 THEN 'high' ELSE 'low' END = 'high'",
    "UPDATE Employee e SET e.salary = e.salary * 2 WHERE e.manager IS NULL",
    "SELECT e FROM Employee e WHERE e.",
];

fn metadata() -> InMemoryMetadata {
    InMemoryMetadata::new()
        .with_type(
            ManagedType::entity("com.acme.Employee", "Employee")
                .with_basic("name", "String")
                .with_basic("salary", "long")
                .with_relationship("address", MappingKind::Embedded, "com.acme.Address")
                .with_relationship("manager", MappingKind::ManyToOne, "com.acme.Employee")
                .with_relationship("phones", MappingKind::OneToMany, "com.acme.Phone"),
        )
        .with_type(ManagedType::embeddable("com.acme.Address").with_basic("city", "String"))
        .with_type(
            ManagedType::entity("com.acme.Phone", "Phone")
                .with_basic("number", "String")
                .with_relationship("owner", MappingKind::ManyToOne, "com.acme.Employee"),
        )
        .with_type(ManagedType::class("com.acme.EmployeeView"))
}

fn parse_pipeline(c: &mut Criterion) {
    let registry = GrammarRegistry::new();
    let grammar = registry.get(GrammarKind::Jpql2_1);
    let metadata = metadata();
    let bytes: usize = QUERIES.iter().map(|q| q.len()).sum();

    let mut group = c.benchmark_group("jpql/pipeline");
    group.sample_size(50);
    group.throughput(Throughput::Bytes(bytes as u64));

    group.bench_function("parse", |b| {
        b.iter(|| {
            for query in QUERIES {
                black_box(Parser::parse_statement(&grammar, query).expect("parse"));
            }
        });
    });

    let parsed: Vec<_> = QUERIES
        .iter()
        .map(|q| Parser::parse_statement(&grammar, q).expect("parse"))
        .collect();

    group.bench_function("format", |b| {
        let formatter = Formatter::default();
        b.iter(|| {
            for expression in &parsed {
                black_box(formatter.format(&build_state(expression.root())));
            }
        });
    });

    group.bench_function("validate", |b| {
        let validator = GrammarValidator::new(&grammar);
        b.iter(|| {
            for expression in &parsed {
                black_box(validator.validate(expression));
                let mut context = QueryContext::new(grammar.clone(), &metadata);
                context.set_expression(expression);
                black_box(SemanticValidator::new(&context).validate());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, parse_pipeline);
criterion_main!(benches);
