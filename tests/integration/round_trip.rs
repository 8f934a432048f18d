#![allow(missing_docs)]

use jpql::model::build_state;
use jpql::{Formatter, GrammarRegistry, Parser};
use proptest::prelude::*;

const VARIABLES: [&str; 4] = ["e", "emp", "w", "x1"];
const ENTITIES: [&str; 3] = ["Employee", "Phone", "Project"];
const ATTRIBUTES: [&str; 4] = ["name", "salary", "title", "city"];
const COMPARISONS: [&str; 6] = ["=", "<>", "<", "<=", ">", ">="];

#[derive(Debug, Clone)]
enum Condition {
    Compare { attribute: usize, op: usize, value: Literal },
    Between { attribute: usize, low: u32, high: u32 },
    Like { attribute: usize, pattern: String },
    IsNull { attribute: usize, not: bool },
    In { attribute: usize, values: Vec<u32> },
}

#[derive(Debug, Clone)]
enum Literal {
    Number(u32),
    Text(String),
}

#[derive(Debug, Clone)]
struct Query {
    distinct: bool,
    variable: usize,
    entity: usize,
    conditions: Vec<(Condition, bool)>,
    order_by: Option<(usize, bool)>,
    lowercase: bool,
}

fn arb_literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        (0u32..100_000).prop_map(Literal::Number),
        "[a-z]{1,6}".prop_map(Literal::Text),
    ]
}

fn arb_condition() -> impl Strategy<Value = Condition> {
    prop_oneof![
        (0..ATTRIBUTES.len(), 0..COMPARISONS.len(), arb_literal())
            .prop_map(|(attribute, op, value)| Condition::Compare { attribute, op, value }),
        (0..ATTRIBUTES.len(), 0u32..50, 50u32..500)
            .prop_map(|(attribute, low, high)| Condition::Between { attribute, low, high }),
        (0..ATTRIBUTES.len(), "[a-z]{1,4}%?")
            .prop_map(|(attribute, pattern)| Condition::Like { attribute, pattern }),
        (0..ATTRIBUTES.len(), any::<bool>())
            .prop_map(|(attribute, not)| Condition::IsNull { attribute, not }),
        (0..ATTRIBUTES.len(), prop::collection::vec(0u32..1000, 1..4))
            .prop_map(|(attribute, values)| Condition::In { attribute, values }),
    ]
}

fn arb_query() -> impl Strategy<Value = Query> {
    (
        any::<bool>(),
        0..VARIABLES.len(),
        0..ENTITIES.len(),
        prop::collection::vec((arb_condition(), any::<bool>()), 0..4),
        prop::option::of((0..ATTRIBUTES.len(), any::<bool>())),
        any::<bool>(),
    )
        .prop_map(
            |(distinct, variable, entity, conditions, order_by, lowercase)| Query {
                distinct,
                variable,
                entity,
                conditions,
                order_by,
                lowercase,
            },
        )
}

impl Query {
    fn kw(&self, identifier: &str) -> String {
        if self.lowercase {
            identifier.to_ascii_lowercase()
        } else {
            identifier.to_string()
        }
    }

    fn render(&self) -> String {
        let var = VARIABLES[self.variable];
        let mut text = self.kw("SELECT ");
        if self.distinct {
            text.push_str(&self.kw("DISTINCT "));
        }
        text.push_str(&format!(
            "{var} {} {} {var}",
            self.kw("FROM"),
            ENTITIES[self.entity]
        ));
        for (idx, (condition, or)) in self.conditions.iter().enumerate() {
            if idx == 0 {
                text.push_str(&format!(" {} ", self.kw("WHERE")));
            } else {
                let joiner = if *or { "OR" } else { "AND" };
                text.push_str(&format!(" {} ", self.kw(joiner)));
            }
            text.push_str(&self.condition(var, condition));
        }
        if let Some((attribute, desc)) = self.order_by {
            text.push_str(&format!(
                " {} {var}.{}",
                self.kw("ORDER BY"),
                ATTRIBUTES[attribute]
            ));
            if desc {
                text.push_str(&format!(" {}", self.kw("DESC")));
            }
        }
        text
    }

    fn condition(&self, var: &str, condition: &Condition) -> String {
        match condition {
            Condition::Compare {
                attribute,
                op,
                value,
            } => {
                let value = match value {
                    Literal::Number(n) => n.to_string(),
                    Literal::Text(s) => format!("'{s}'"),
                };
                format!("{var}.{} {} {value}", ATTRIBUTES[*attribute], COMPARISONS[*op])
            }
            Condition::Between {
                attribute,
                low,
                high,
            } => format!(
                "{var}.{} {} {low} {} {high}",
                ATTRIBUTES[*attribute],
                self.kw("BETWEEN"),
                self.kw("AND")
            ),
            Condition::Like { attribute, pattern } => format!(
                "{var}.{} {} '{pattern}'",
                ATTRIBUTES[*attribute],
                self.kw("LIKE")
            ),
            Condition::IsNull { attribute, not } => {
                let keyword = if *not { "IS NOT NULL" } else { "IS NULL" };
                format!("{var}.{} {}", ATTRIBUTES[*attribute], self.kw(keyword))
            }
            Condition::In { attribute, values } => {
                let values: Vec<String> = values.iter().map(u32::to_string).collect();
                format!(
                    "{var}.{} {} ({})",
                    ATTRIBUTES[*attribute],
                    self.kw("IN"),
                    values.join(", ")
                )
            }
        }
    }
}

fn format_once(text: &str) -> String {
    let grammar = GrammarRegistry::new().latest();
    let expression = Parser::parse_statement(&grammar, text).expect("tolerant parse");
    assert!(
        expression.diagnostics().is_empty(),
        "{text}: {:?}",
        expression.diagnostics()
    );
    Formatter::default().format(&build_state(expression.root()))
}

proptest! {
    #[test]
    fn prop_format_is_a_fixpoint(query in arb_query()) {
        let text = query.render();
        let first = format_once(&text);
        let second = format_once(&first);
        prop_assert_eq!(&first, &second);
        if !query.lowercase {
            prop_assert_eq!(first, text);
        }
    }

    #[test]
    fn prop_prefixes_parse_tolerantly(query in arb_query(), cut in 0usize..200) {
        let text = query.render();
        let cut = cut.min(text.len());
        let prefix = &text[..cut];
        let grammar = GrammarRegistry::new().latest();
        let expression = Parser::parse_statement(&grammar, prefix);
        prop_assert!(expression.is_ok(), "{prefix}");
    }
}
