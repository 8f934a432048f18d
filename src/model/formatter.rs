//! Writes state objects back to JPQL text.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{JpqlError, Result};
use crate::parser::{JoinKind, Ordering, Sign};

use super::state::StateObject;

/// Case used for JPQL identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierStyle {
    /// `SELECT`.
    #[default]
    Uppercase,
    /// `select`.
    Lowercase,
    /// Keep the case written in the source.
    Preserve,
}

/// Formats state trees; only identifiers are affected by the style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Formatter {
    style: IdentifierStyle,
}

impl Formatter {
    /// Formatter with the given identifier style.
    ///
    /// `Preserve` needs the source text of every identifier, which state
    /// objects do not keep, and is reported as not implemented.
    pub fn new(style: IdentifierStyle) -> Result<Self> {
        if style == IdentifierStyle::Preserve {
            return Err(JpqlError::not_implemented("identifier case preservation"));
        }
        Ok(Self { style })
    }

    /// Identifier style.
    pub fn style(&self) -> IdentifierStyle {
        self.style
    }

    /// Formats a tree.
    pub fn format(&self, state: &StateObject) -> String {
        let mut out = String::new();
        self.write(state, &mut out);
        out
    }

    fn kw(&self, out: &mut String, identifier: &str) {
        match self.style {
            IdentifierStyle::Lowercase => out.push_str(&identifier.to_ascii_lowercase()),
            _ => out.push_str(identifier),
        }
    }

    fn list(&self, items: &[StateObject], out: &mut String) {
        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            self.write(item, out);
        }
    }

    /// Writes ` clause`; a missing FROM clause is a blank placeholder and
    /// writes nothing.
    fn clause(&self, clause: Option<&StateObject>, out: &mut String) {
        if let Some(clause) = clause.filter(|c| !c.is_blank()) {
            out.push(' ');
            self.write(clause, out);
        }
    }

    fn variable(&self, has_as: bool, variable: Option<&StateObject>, out: &mut String) {
        if let Some(variable) = variable {
            out.push(' ');
            if has_as {
                self.kw(out, "AS");
                out.push(' ');
            }
            self.write(variable, out);
        }
    }

    fn not(&self, not: bool, out: &mut String) {
        if not {
            self.kw(out, "NOT");
            out.push(' ');
        }
    }

    fn write(&self, state: &StateObject, out: &mut String) {
        use StateObject::*;
        match state {
            SelectStatement {
                select,
                from,
                where_clause,
                group_by,
                having,
                order_by,
            } => {
                self.write(select, out);
                self.clause(Some(from), out);
                self.clause(where_clause.as_deref(), out);
                self.clause(group_by.as_deref(), out);
                self.clause(having.as_deref(), out);
                self.clause(order_by.as_deref(), out);
            }
            Subquery {
                select,
                from,
                where_clause,
                group_by,
                having,
            } => {
                self.write(select, out);
                self.clause(Some(from), out);
                self.clause(where_clause.as_deref(), out);
                self.clause(group_by.as_deref(), out);
                self.clause(having.as_deref(), out);
            }
            UpdateStatement {
                update: clause,
                where_clause,
            }
            | DeleteStatement {
                delete: clause,
                where_clause,
            } => {
                self.write(clause, out);
                self.clause(where_clause.as_deref(), out);
            }
            SelectClause { distinct, items } => {
                self.kw(out, "SELECT");
                if *distinct {
                    out.push(' ');
                    self.kw(out, "DISTINCT");
                }
                if !items.is_empty() {
                    out.push(' ');
                    self.list(items, out);
                }
            }
            ResultVariable {
                expression,
                has_as,
                name,
            } => {
                self.write(expression, out);
                out.push(' ');
                if *has_as {
                    self.kw(out, "AS");
                    out.push(' ');
                }
                out.push_str(name);
            }
            FromClause { declarations } => {
                self.kw(out, "FROM");
                if !declarations.is_empty() {
                    out.push(' ');
                    self.list(declarations, out);
                }
            }
            WhereClause { condition } => {
                self.kw(out, "WHERE");
                out.push(' ');
                self.write(condition, out);
            }
            HavingClause { condition } => {
                self.kw(out, "HAVING");
                out.push(' ');
                self.write(condition, out);
            }
            GroupByClause { items } => {
                self.kw(out, "GROUP BY");
                out.push(' ');
                self.list(items, out);
            }
            OrderByClause { items } => {
                self.kw(out, "ORDER BY");
                out.push(' ');
                self.list(items, out);
            }
            OrderByItem {
                expression,
                ordering,
            } => {
                self.write(expression, out);
                match ordering {
                    Some(Ordering::Asc) => {
                        out.push(' ');
                        self.kw(out, "ASC");
                    }
                    Some(Ordering::Desc) => {
                        out.push(' ');
                        self.kw(out, "DESC");
                    }
                    None => {}
                }
            }
            UpdateClause { declaration, items } => {
                self.kw(out, "UPDATE");
                out.push(' ');
                self.write(declaration, out);
                out.push(' ');
                self.kw(out, "SET");
                out.push(' ');
                self.list(items, out);
            }
            UpdateItem { path, value } => {
                self.write(path, out);
                out.push_str(" = ");
                self.write(value, out);
            }
            DeleteClause { declaration } => {
                self.kw(out, "DELETE FROM");
                out.push(' ');
                self.write(declaration, out);
            }
            RangeDeclaration {
                entity: root,
                has_as,
                variable,
                joins,
            }
            | DerivedDeclaration {
                path: root,
                has_as,
                variable,
                joins,
            } => {
                self.write(root, out);
                self.variable(*has_as, variable.as_deref(), out);
                for join in joins {
                    out.push(' ');
                    self.write(join, out);
                }
            }
            CollectionMemberDeclaration {
                path,
                has_as,
                variable,
            } => {
                self.kw(out, "IN");
                out.push('(');
                self.write(path, out);
                out.push(')');
                self.variable(*has_as, variable.as_deref(), out);
            }
            Join {
                join_kind,
                fetch,
                path,
                has_as,
                variable,
                on,
            } => {
                let prefix = match join_kind {
                    JoinKind::Inner { explicit: true } => "INNER JOIN",
                    JoinKind::Inner { explicit: false } => "JOIN",
                    JoinKind::Left { outer: true } => "LEFT OUTER JOIN",
                    JoinKind::Left { outer: false } => "LEFT JOIN",
                };
                self.kw(out, prefix);
                if *fetch {
                    out.push(' ');
                    self.kw(out, "FETCH");
                }
                out.push(' ');
                self.write(path, out);
                self.variable(*has_as, variable.as_deref(), out);
                if let Some(on) = on {
                    out.push(' ');
                    self.kw(out, "ON");
                    out.push(' ');
                    self.write(on, out);
                }
            }
            AbstractSchemaName(name) => out.push_str(name.text()),
            IdentificationVariable(variable) => out.push_str(variable.text()),
            Path(path) => out.push_str(&path.path_text()),
            EntityTypeLiteral(literal) => out.push_str(literal.text()),
            StringLiteral { text } | NumericLiteral { text } | InputParameter { text } => {
                out.push_str(text)
            }
            BooleanLiteral { value } => self.kw(out, if *value { "TRUE" } else { "FALSE" }),
            NullLiteral => self.kw(out, "NULL"),
            DateTime { keyword } => self.kw(out, keyword),
            Binary { op, left, right } => {
                self.write(left, out);
                out.push(' ');
                if op.is_logical() {
                    self.kw(out, op.symbol());
                } else {
                    out.push_str(op.symbol());
                }
                out.push(' ');
                self.write(right, out);
            }
            Not { operand } => {
                self.kw(out, "NOT");
                out.push(' ');
                self.write(operand, out);
            }
            Unary { sign, operand } => {
                out.push(match sign {
                    Sign::Plus => '+',
                    Sign::Minus => '-',
                });
                self.write(operand, out);
            }
            Between {
                not,
                expression,
                lower,
                upper,
            } => {
                self.write(expression, out);
                out.push(' ');
                self.not(*not, out);
                self.kw(out, "BETWEEN");
                out.push(' ');
                self.write(lower, out);
                out.push(' ');
                self.kw(out, "AND");
                out.push(' ');
                self.write(upper, out);
            }
            Like {
                not,
                expression,
                pattern,
                escape,
            } => {
                self.write(expression, out);
                out.push(' ');
                self.not(*not, out);
                self.kw(out, "LIKE");
                out.push(' ');
                self.write(pattern, out);
                if let Some(escape) = escape {
                    out.push(' ');
                    self.kw(out, "ESCAPE");
                    out.push(' ');
                    self.write(escape, out);
                }
            }
            In {
                not,
                expression,
                items,
                has_parens,
            } => {
                self.write(expression, out);
                out.push(' ');
                self.not(*not, out);
                self.kw(out, "IN");
                out.push(' ');
                if *has_parens {
                    out.push('(');
                    self.list(items, out);
                    out.push(')');
                } else {
                    self.list(items, out);
                }
            }
            IsNull { not, expression } => {
                self.write(expression, out);
                out.push(' ');
                self.kw(out, if *not { "IS NOT NULL" } else { "IS NULL" });
            }
            IsEmpty { not, expression } => {
                self.write(expression, out);
                out.push(' ');
                self.kw(out, if *not { "IS NOT EMPTY" } else { "IS EMPTY" });
            }
            MemberOf {
                not,
                of,
                entity,
                collection,
            } => {
                self.write(entity, out);
                out.push(' ');
                self.not(*not, out);
                self.kw(out, if *of { "MEMBER OF" } else { "MEMBER" });
                out.push(' ');
                self.write(collection, out);
            }
            Exists { not, subquery } => {
                self.not(*not, out);
                self.kw(out, "EXISTS");
                out.push_str(" (");
                self.write(subquery, out);
                out.push(')');
            }
            AllOrAny { keyword, subquery } => {
                self.kw(out, keyword);
                out.push_str(" (");
                self.write(subquery, out);
                out.push(')');
            }
            FunctionCall { name, arguments } => {
                self.kw(out, name);
                out.push('(');
                self.list(arguments, out);
                out.push(')');
            }
            Aggregate {
                name,
                distinct,
                argument,
            } => {
                self.kw(out, name);
                out.push('(');
                if *distinct {
                    self.kw(out, "DISTINCT");
                    out.push(' ');
                }
                self.write(argument, out);
                out.push(')');
            }
            Constructor(constructor) => {
                self.kw(out, "NEW");
                let _ = write!(out, " {}(", constructor.class_name());
                self.list(constructor.arguments(), out);
                out.push(')');
            }
            Trim {
                specification,
                character,
                has_from,
                string,
            } => {
                self.kw(out, "TRIM");
                out.push('(');
                if let Some(spec) = specification {
                    self.kw(out, spec.keyword());
                    out.push(' ');
                }
                if let Some(character) = character {
                    self.write(character, out);
                    out.push(' ');
                }
                if *has_from {
                    self.kw(out, "FROM");
                    out.push(' ');
                }
                self.write(string, out);
                out.push(')');
            }
            Case {
                operand,
                whens,
                otherwise,
            } => {
                self.kw(out, "CASE");
                if let Some(operand) = operand {
                    out.push(' ');
                    self.write(operand, out);
                }
                for when in whens {
                    out.push(' ');
                    self.write(when, out);
                }
                out.push(' ');
                self.kw(out, "ELSE");
                out.push(' ');
                self.write(otherwise, out);
                out.push(' ');
                self.kw(out, "END");
            }
            When { condition, result } => {
                self.kw(out, "WHEN");
                out.push(' ');
                self.write(condition, out);
                out.push(' ');
                self.kw(out, "THEN");
                out.push(' ');
                self.write(result, out);
            }
            SqlFunction {
                function_name,
                arguments,
            } => {
                self.kw(out, "FUNCTION");
                out.push('(');
                out.push_str(function_name);
                for argument in arguments {
                    out.push_str(", ");
                    self.write(argument, out);
                }
                out.push(')');
            }
            Parenthesized { expression } => {
                out.push('(');
                self.write(expression, out);
                out.push(')');
            }
            Unknown { text } => out.push_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarKind, GrammarRegistry};
    use crate::model::build_state;
    use crate::parser::Parser;

    fn format(text: &str, style: IdentifierStyle) -> String {
        let registry = GrammarRegistry::new();
        let grammar = registry.get(GrammarKind::Jpql2_1);
        let expression = Parser::parse(&grammar, text, "ql_statement", false).expect("parse");
        Formatter::new(style)
            .expect("formatter")
            .format(&build_state(expression.root()))
    }

    #[test]
    fn keywords_are_normalized_and_names_kept() {
        assert_eq!(
            format(
                "select   e from Employee e left outer join fetch e.phones where e.name='Ann' order by e.name desc",
                IdentifierStyle::Uppercase
            ),
            "SELECT e FROM Employee e LEFT OUTER JOIN FETCH e.phones WHERE e.name = 'Ann' ORDER BY e.name DESC"
        );
        assert_eq!(
            format(
                "SELECT NEW com.acme.View(e.name) FROM Employee AS e WHERE e.salary NOT BETWEEN 1 AND 2",
                IdentifierStyle::Lowercase
            ),
            "select new com.acme.View(e.name) from Employee as e where e.salary not between 1 and 2"
        );
    }

    #[test]
    fn subqueries_and_functions() {
        let text = "SELECT TRIM(LEADING 'x' FROM e.name), COUNT(DISTINCT e.id) FROM Employee e \
                    WHERE NOT EXISTS (SELECT p FROM Phone p WHERE p.owner = e) \
                    AND e.id IN :ids AND e.salary > ALL (SELECT m.salary FROM Manager m) \
                    GROUP BY e.name HAVING COUNT(e) > 1";
        assert_eq!(format(text, IdentifierStyle::Uppercase), text);
    }

    #[test]
    fn preserve_is_not_implemented() {
        assert!(matches!(
            Formatter::new(IdentifierStyle::Preserve),
            Err(JpqlError::NotImplemented { .. })
        ));
    }
}
