//! Identifier, factory and BNF tables for the shipped grammars.

use super::{EntryPoint, ExpressionFactory, GrammarBuilder, IdentifierRole};

/// Identifiers of the BNF rules usable as parse entry points.
pub mod bnf_ids {
    /// Any statement.
    pub const QL_STATEMENT: &str = "ql_statement";
    /// SELECT statement.
    pub const SELECT_STATEMENT: &str = "select_statement";
    /// UPDATE statement.
    pub const UPDATE_STATEMENT: &str = "update_statement";
    /// DELETE statement.
    pub const DELETE_STATEMENT: &str = "delete_statement";
    /// Subquery.
    pub const SUBQUERY: &str = "subquery";
    /// Select item.
    pub const SELECT_EXPRESSION: &str = "select_expression";
    /// Conditional expression.
    pub const CONDITIONAL_EXPRESSION: &str = "conditional_expression";
    /// Scalar expression.
    pub const SCALAR_EXPRESSION: &str = "scalar_expression";
    /// Range variable declaration.
    pub const RANGE_VARIABLE_DECLARATION: &str = "range_variable_declaration";
    /// CASE expression (JPA 2.0+).
    pub const CASE_EXPRESSION: &str = "case_expression";
}

use IdentifierRole::{Clause, Function, Keyword, Literal, Operator};

const JPQL_1_0_IDENTIFIERS: &[(&str, IdentifierRole)] = &[
    ("SELECT", Clause),
    ("FROM", Clause),
    ("WHERE", Clause),
    ("GROUP BY", Clause),
    ("HAVING", Clause),
    ("ORDER BY", Clause),
    ("UPDATE", Clause),
    ("SET", Clause),
    ("DELETE FROM", Clause),
    ("JOIN", Clause),
    ("INNER JOIN", Clause),
    ("LEFT JOIN", Clause),
    ("LEFT OUTER JOIN", Clause),
    ("JOIN FETCH", Clause),
    ("INNER JOIN FETCH", Clause),
    ("LEFT JOIN FETCH", Clause),
    ("LEFT OUTER JOIN FETCH", Clause),
    ("IN", Operator),
    ("DISTINCT", Keyword),
    ("AS", Keyword),
    ("ASC", Keyword),
    ("DESC", Keyword),
    ("NEW", Function),
    ("OBJECT", Function),
    ("AND", Operator),
    ("OR", Operator),
    ("NOT", Operator),
    ("BETWEEN", Operator),
    ("NOT BETWEEN", Operator),
    ("LIKE", Operator),
    ("NOT LIKE", Operator),
    ("ESCAPE", Keyword),
    ("NOT IN", Operator),
    ("IS NULL", Operator),
    ("IS NOT NULL", Operator),
    ("IS EMPTY", Operator),
    ("IS NOT EMPTY", Operator),
    ("MEMBER", Operator),
    ("MEMBER OF", Operator),
    ("NOT MEMBER", Operator),
    ("NOT MEMBER OF", Operator),
    ("EXISTS", Operator),
    ("NOT EXISTS", Operator),
    ("ALL", Operator),
    ("ANY", Operator),
    ("SOME", Operator),
    ("NULL", Literal),
    ("TRUE", Literal),
    ("FALSE", Literal),
    ("AVG", Function),
    ("MAX", Function),
    ("MIN", Function),
    ("SUM", Function),
    ("COUNT", Function),
    ("ABS", Function),
    ("SQRT", Function),
    ("MOD", Function),
    ("SIZE", Function),
    ("LENGTH", Function),
    ("LOCATE", Function),
    ("CONCAT", Function),
    ("SUBSTRING", Function),
    ("LOWER", Function),
    ("UPPER", Function),
    ("TRIM", Function),
    ("LEADING", Keyword),
    ("TRAILING", Keyword),
    ("BOTH", Keyword),
    ("CURRENT_DATE", Literal),
    ("CURRENT_TIME", Literal),
    ("CURRENT_TIMESTAMP", Literal),
];

const JPQL_1_0_FACTORIES: &[(&str, ExpressionFactory)] = &[
    ("AVG", ExpressionFactory::Aggregate),
    ("MAX", ExpressionFactory::Aggregate),
    ("MIN", ExpressionFactory::Aggregate),
    ("SUM", ExpressionFactory::Aggregate),
    ("COUNT", ExpressionFactory::Aggregate),
    ("ABS", ExpressionFactory::Function),
    ("SQRT", ExpressionFactory::Function),
    ("MOD", ExpressionFactory::Function),
    ("SIZE", ExpressionFactory::Function),
    ("LENGTH", ExpressionFactory::Function),
    ("LOCATE", ExpressionFactory::Function),
    ("CONCAT", ExpressionFactory::Function),
    ("SUBSTRING", ExpressionFactory::Function),
    ("LOWER", ExpressionFactory::Function),
    ("UPPER", ExpressionFactory::Function),
    ("TRIM", ExpressionFactory::Trim),
    ("CURRENT_DATE", ExpressionFactory::DateTime),
    ("CURRENT_TIME", ExpressionFactory::DateTime),
    ("CURRENT_TIMESTAMP", ExpressionFactory::DateTime),
    ("NEW", ExpressionFactory::Constructor),
    ("OBJECT", ExpressionFactory::Object),
    ("EXISTS", ExpressionFactory::Exists),
    ("ALL", ExpressionFactory::AllOrAny),
    ("ANY", ExpressionFactory::AllOrAny),
    ("SOME", ExpressionFactory::AllOrAny),
];

const JPQL_2_0_IDENTIFIERS: &[(&str, IdentifierRole)] = &[
    ("CASE", Function),
    ("WHEN", Keyword),
    ("THEN", Keyword),
    ("ELSE", Keyword),
    ("END", Keyword),
    ("COALESCE", Function),
    ("NULLIF", Function),
    ("KEY", Function),
    ("VALUE", Function),
    ("ENTRY", Function),
    ("INDEX", Function),
    ("TYPE", Function),
];

const JPQL_2_0_FACTORIES: &[(&str, ExpressionFactory)] = &[
    ("CASE", ExpressionFactory::Case),
    ("COALESCE", ExpressionFactory::Coalesce),
    ("NULLIF", ExpressionFactory::NullIf),
    ("KEY", ExpressionFactory::MapEntry),
    ("VALUE", ExpressionFactory::MapEntry),
    ("ENTRY", ExpressionFactory::MapEntry),
    ("INDEX", ExpressionFactory::Index),
    ("TYPE", ExpressionFactory::Type),
];

const JPQL_2_1_IDENTIFIERS: &[(&str, IdentifierRole)] = &[
    ("ON", Keyword),
    ("FUNCTION", Function),
    ("TREAT", Function),
];

const JPQL_2_1_FACTORIES: &[(&str, ExpressionFactory)] = &[
    ("FUNCTION", ExpressionFactory::SqlFunction),
    ("TREAT", ExpressionFactory::Treat),
];

fn apply(
    mut builder: GrammarBuilder,
    identifiers: &[(&'static str, IdentifierRole)],
    factories: &[(&str, ExpressionFactory)],
) -> GrammarBuilder {
    for &(identifier, role) in identifiers {
        builder = builder.with_identifier(identifier, role);
    }
    for &(identifier, factory) in factories {
        builder = builder.with_factory(identifier, factory);
    }
    builder
}

pub(super) fn jpql_1_0(builder: GrammarBuilder) -> GrammarBuilder {
    apply(builder, JPQL_1_0_IDENTIFIERS, JPQL_1_0_FACTORIES)
        .with_bnf(bnf_ids::QL_STATEMENT, EntryPoint::Statement)
        .with_bnf(bnf_ids::SELECT_STATEMENT, EntryPoint::SelectStatement)
        .with_bnf(bnf_ids::UPDATE_STATEMENT, EntryPoint::UpdateStatement)
        .with_bnf(bnf_ids::DELETE_STATEMENT, EntryPoint::DeleteStatement)
        .with_bnf(bnf_ids::SUBQUERY, EntryPoint::Subquery)
        .with_bnf(bnf_ids::SELECT_EXPRESSION, EntryPoint::SelectExpression)
        .with_bnf(
            bnf_ids::CONDITIONAL_EXPRESSION,
            EntryPoint::ConditionalExpression,
        )
        .with_bnf(bnf_ids::SCALAR_EXPRESSION, EntryPoint::ScalarExpression)
        .with_bnf(
            bnf_ids::RANGE_VARIABLE_DECLARATION,
            EntryPoint::RangeVariableDeclaration,
        )
}

pub(super) fn jpql_2_0(builder: GrammarBuilder) -> GrammarBuilder {
    apply(builder, JPQL_2_0_IDENTIFIERS, JPQL_2_0_FACTORIES)
        .with_bnf(bnf_ids::CASE_EXPRESSION, EntryPoint::CaseExpression)
}

pub(super) fn jpql_2_1(builder: GrammarBuilder) -> GrammarBuilder {
    apply(builder, JPQL_2_1_IDENTIFIERS, JPQL_2_1_FACTORIES)
}
