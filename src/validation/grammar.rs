//! Checks a parsed tree against one grammar version.

use tracing::debug;

use crate::diagnostic::{Diagnostic, DiagnosticKey};
use crate::grammar::Grammar;
use crate::parser::{Expression, ExpressionKind as K, JoinKind, JpqlExpression, Ordering};
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};

/// Grammar validator.
///
/// The parser accepts every syntax shipped by the registry; this pass reports
/// what the selected grammar does not define, plus the lexical problems the
/// tolerant parser let through.
pub struct GrammarValidator<'g> {
    grammar: &'g Grammar,
}

impl<'g> GrammarValidator<'g> {
    /// Validator for `grammar`.
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar }
    }

    /// Validates a parsed query; diagnostics come out in pre-order.
    pub fn validate(&self, expression: &JpqlExpression) -> Vec<Diagnostic> {
        let timer = profile_timer();
        let mut out = Vec::new();
        self.visit(expression.root(), &mut out);
        record_profile_timer(QueryProfileKind::GrammarValidation, timer);
        debug!(
            grammar = self.grammar.name(),
            diagnostics = out.len(),
            "validation.grammar.completed"
        );
        out
    }

    fn visit(&self, node: &Expression, out: &mut Vec<Diagnostic>) {
        self.check_node(node, out);
        for child in node.children() {
            self.visit(child, out);
        }
    }

    fn require(&self, node: &Expression, identifier: &str, out: &mut Vec<Diagnostic>) -> bool {
        if self.grammar.has_identifier(identifier) {
            return true;
        }
        out.push(Diagnostic::error(
            node.span,
            DiagnosticKey::IdentifierNotSupported,
            format!(
                "'{identifier}' is not supported by grammar {}",
                self.grammar.name()
            ),
        ));
        false
    }

    fn require_factory(&self, node: &Expression, identifier: &str, out: &mut Vec<Diagnostic>) {
        if !self.require(node, identifier, out) {
            return;
        }
        if self.grammar.expression_factory(identifier).is_none() {
            out.push(Diagnostic::error(
                node.span,
                DiagnosticKey::ExpressionFactoryNotSupported,
                format!(
                    "grammar {} has no expression factory for '{identifier}'",
                    self.grammar.name()
                ),
            ));
        }
    }

    fn check_node(&self, node: &Expression, out: &mut Vec<Diagnostic>) {
        match &node.kind {
            K::SelectClause { distinct, items } => {
                self.require(node, "SELECT", out);
                if *distinct {
                    self.require(node, "DISTINCT", out);
                }
                if items.is_empty() {
                    out.push(Diagnostic::error(
                        node.span,
                        DiagnosticKey::SelectClauseEmpty,
                        "SELECT clause has no select item",
                    ));
                }
            }
            K::FromClause { declarations } => {
                self.require(node, "FROM", out);
                if declarations.is_empty() {
                    out.push(Diagnostic::error(
                        node.span,
                        DiagnosticKey::FromClauseEmpty,
                        "FROM clause has no declaration",
                    ));
                }
                for declaration in declarations {
                    if let K::RangeDeclaration {
                        entity,
                        variable: None,
                        ..
                    } = &declaration.kind
                    {
                        out.push(Diagnostic::error(
                            declaration.span,
                            DiagnosticKey::MissingIdentificationVariable,
                            format!(
                                "range declaration '{}' has no identification variable",
                                schema_name(entity)
                            ),
                        ));
                    }
                }
            }
            K::WhereClause { .. } => {
                self.require(node, "WHERE", out);
            }
            K::HavingClause { .. } => {
                self.require(node, "HAVING", out);
            }
            K::GroupByClause { .. } => {
                self.require(node, "GROUP BY", out);
            }
            K::OrderByClause { .. } => {
                self.require(node, "ORDER BY", out);
            }
            K::OrderByItem {
                ordering: Some(ordering),
                ..
            } => {
                let keyword = match ordering {
                    Ordering::Asc => "ASC",
                    Ordering::Desc => "DESC",
                };
                self.require(node, keyword, out);
            }
            K::UpdateClause { .. } => {
                self.require(node, "UPDATE", out);
                self.require(node, "SET", out);
            }
            K::DeleteClause { .. } => {
                self.require(node, "DELETE FROM", out);
            }
            K::ResultVariable { has_as: true, .. }
            | K::RangeDeclaration { has_as: true, .. }
            | K::DerivedDeclaration { has_as: true, .. } => {
                self.require(node, "AS", out);
            }
            K::CollectionMemberDeclaration { has_as, .. } => {
                self.require(node, "IN", out);
                if *has_as {
                    self.require(node, "AS", out);
                }
            }
            K::Join {
                join_kind,
                fetch,
                has_as,
                variable,
                on,
                ..
            } => {
                let identifier = join_identifier(*join_kind, *fetch);
                self.require(node, &identifier, out);
                if *has_as {
                    self.require(node, "AS", out);
                }
                if *fetch && variable.is_some() && !self.grammar.allows_join_fetch_variable() {
                    out.push(Diagnostic::error(
                        node.span,
                        DiagnosticKey::JoinFetchIdentificationVariableNotAllowed,
                        format!(
                            "grammar {} does not allow an identification variable on {identifier}",
                            self.grammar.name()
                        ),
                    ));
                }
                if let Some(on) = on {
                    if self.require(on, "ON", out) && *fetch {
                        out.push(Diagnostic::error(
                            on.span,
                            DiagnosticKey::JoinFetchOnNotAllowed,
                            format!("ON is not allowed on {identifier}"),
                        ));
                    }
                }
            }
            K::Binary { op, .. } if op.is_logical() => {
                self.require(node, op.symbol(), out);
            }
            K::Not { .. } => {
                self.require(node, "NOT", out);
            }
            K::Between { not, .. } => {
                self.require(node, negated(*not, "BETWEEN").as_str(), out);
            }
            K::Like { not, escape, .. } => {
                self.require(node, negated(*not, "LIKE").as_str(), out);
                if escape.is_some() {
                    self.require(node, "ESCAPE", out);
                }
            }
            K::In { not, .. } => {
                self.require(node, negated(*not, "IN").as_str(), out);
            }
            K::IsNull { not, .. } => {
                let identifier = if *not { "IS NOT NULL" } else { "IS NULL" };
                self.require(node, identifier, out);
            }
            K::IsEmpty { not, .. } => {
                let identifier = if *not { "IS NOT EMPTY" } else { "IS EMPTY" };
                self.require(node, identifier, out);
            }
            K::MemberOf { not, of, .. } => {
                let base = if *of { "MEMBER OF" } else { "MEMBER" };
                self.require(node, negated(*not, base).as_str(), out);
            }
            K::Exists { not, .. } => {
                self.require_factory(node, "EXISTS", out);
                if *not {
                    self.require(node, "NOT EXISTS", out);
                }
            }
            K::AllOrAny { keyword, .. } => self.require_factory(node, keyword, out),
            K::BooleanLiteral { value } => {
                self.require(node, if *value { "TRUE" } else { "FALSE" }, out);
            }
            K::NullLiteral => {
                self.require(node, "NULL", out);
            }
            K::DateTime { keyword } => self.require_factory(node, keyword, out),
            K::FunctionCall { name, .. } => self.require_factory(node, name, out),
            K::Aggregate { name, distinct, .. } => {
                self.require_factory(node, name, out);
                if *distinct {
                    self.require(node, "DISTINCT", out);
                }
            }
            K::Constructor { .. } => self.require_factory(node, "NEW", out),
            K::Trim { specification, .. } => {
                self.require_factory(node, "TRIM", out);
                if let Some(spec) = specification {
                    self.require(node, spec.keyword(), out);
                }
            }
            K::Case { otherwise, .. } => {
                self.require_factory(node, "CASE", out);
                for keyword in ["WHEN", "THEN", "END"] {
                    self.require(node, keyword, out);
                }
                if !matches!(otherwise.kind, K::Unknown { .. }) {
                    self.require(node, "ELSE", out);
                }
            }
            K::SqlFunction { .. } => self.require_factory(node, "FUNCTION", out),
            K::StringLiteral {
                text,
                terminated: false,
            } => out.push(Diagnostic::error(
                node.span,
                DiagnosticKey::StringLiteralUnterminated,
                format!("string literal {text} is not terminated"),
            )),
            K::NumericLiteral { text, valid: false } => out.push(Diagnostic::error(
                node.span,
                DiagnosticKey::NumericLiteralMalformed,
                format!("'{text}' is not a valid numeric literal"),
            )),
            K::Unknown { text } => {
                let message = if text.is_empty() {
                    "expression is missing".to_string()
                } else {
                    format!("'{text}' is not a valid expression")
                };
                out.push(Diagnostic::error(
                    node.span,
                    DiagnosticKey::IncompleteExpression,
                    message,
                ));
            }
            _ => {}
        }
    }
}

fn join_identifier(kind: JoinKind, fetch: bool) -> String {
    let mut identifier = match kind {
        JoinKind::Inner { explicit: true } => "INNER JOIN",
        JoinKind::Inner { explicit: false } => "JOIN",
        JoinKind::Left { outer: true } => "LEFT OUTER JOIN",
        JoinKind::Left { outer: false } => "LEFT JOIN",
    }
    .to_string();
    if fetch {
        identifier.push_str(" FETCH");
    }
    identifier
}

fn negated(not: bool, identifier: &str) -> String {
    if not {
        format!("NOT {identifier}")
    } else {
        identifier.to_string()
    }
}

fn schema_name(entity: &Expression) -> &str {
    match &entity.kind {
        K::AbstractSchemaName { name } => name,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarBuilder, GrammarKind, GrammarRegistry, JpaVersion, Provider};
    use crate::parser::Parser;

    fn keys(grammar: &Grammar, text: &str) -> Vec<DiagnosticKey> {
        let expression = Parser::parse_statement(grammar, text).expect("parse");
        GrammarValidator::new(grammar)
            .validate(&expression)
            .into_iter()
            .map(|d| d.key)
            .collect()
    }

    #[test]
    fn jpql_1_0_rejects_case_and_on() {
        let registry = GrammarRegistry::new();
        let grammar = registry.get(GrammarKind::Jpql1_0);
        assert_eq!(
            keys(
                &grammar,
                "SELECT CASE WHEN e.age > 1 THEN 1 ELSE 0 END FROM Employee e"
            ),
            vec![
                DiagnosticKey::IdentifierNotSupported,
                DiagnosticKey::IdentifierNotSupported,
                DiagnosticKey::IdentifierNotSupported,
                DiagnosticKey::IdentifierNotSupported,
                DiagnosticKey::IdentifierNotSupported,
            ]
        );
        assert_eq!(
            keys(
                &grammar,
                "SELECT e FROM Employee e JOIN e.phones p ON p.number = '1'"
            ),
            vec![DiagnosticKey::IdentifierNotSupported]
        );
        let latest = registry.get(GrammarKind::Jpql2_1);
        assert!(keys(
            &latest,
            "SELECT e FROM Employee e JOIN e.phones p ON p.number = '1'"
        )
        .is_empty());
    }

    #[test]
    fn join_fetch_variable_depends_on_provider() {
        let registry = GrammarRegistry::new();
        let text = "SELECT e FROM Employee e JOIN FETCH e.phones p";
        assert_eq!(
            keys(&registry.get(GrammarKind::Jpql2_1), text),
            vec![DiagnosticKey::JoinFetchIdentificationVariableNotAllowed]
        );
        assert!(keys(&registry.get(GrammarKind::EclipseLink2_1), text).is_empty());
    }

    #[test]
    fn factory_missing_is_reported_once() {
        let registry = GrammarRegistry::new();
        let grammar = GrammarBuilder::new("no-abs", JpaVersion::V2_1, Provider::Jpa)
            .base(registry.get(GrammarKind::Jpql2_1))
            .without_factory("ABS")
            .build();
        assert_eq!(
            keys(&grammar, "SELECT ABS(e.age) FROM Employee e"),
            vec![DiagnosticKey::ExpressionFactoryNotSupported]
        );
    }

    #[test]
    fn lexical_problems_and_placeholders() {
        let registry = GrammarRegistry::new();
        let grammar = registry.get(GrammarKind::Jpql2_1);
        assert_eq!(
            keys(&grammar, "SELECT e FROM Employee e WHERE e.name = 'abc"),
            vec![DiagnosticKey::StringLiteralUnterminated]
        );
        assert_eq!(
            keys(&grammar, "SELECT e FROM Employee e WHERE e.age = 12abc"),
            vec![DiagnosticKey::NumericLiteralMalformed]
        );
        assert_eq!(
            keys(&grammar, "SELECT e FROM Employee e WHERE e."),
            vec![DiagnosticKey::IncompleteExpression]
        );
        assert_eq!(
            keys(&grammar, "SELECT e FROM Employee"),
            vec![DiagnosticKey::MissingIdentificationVariable]
        );
    }

    #[test]
    fn update_without_variable_is_allowed() {
        let registry = GrammarRegistry::new();
        let grammar = registry.get(GrammarKind::Jpql1_0);
        assert!(keys(&grammar, "UPDATE Employee SET name = 'x'").is_empty());
    }
}
