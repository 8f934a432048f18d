//! Conversion from the syntax tree and programmatic construction.

use crate::error::{JpqlError, Result};
use crate::grammar::{bnf_ids, Grammar};
use crate::parser::{Expression, ExpressionKind as K, Parser};

use super::state::{
    AbstractSchemaNameState, ConstructorState, EntityTypeLiteralState,
    IdentificationVariableState, PathState, StateObject,
};

fn boxed(expr: &Expression) -> Box<StateObject> {
    build_state(expr).boxed()
}

fn boxed_opt(expr: &Option<Box<Expression>>) -> Option<Box<StateObject>> {
    expr.as_deref().map(boxed)
}

fn all(items: &[Expression]) -> Vec<StateObject> {
    items.iter().map(build_state).collect()
}

/// Builds the state tree mirroring `expr`.
pub fn build_state(expr: &Expression) -> StateObject {
    match &expr.kind {
        K::SelectStatement {
            select,
            from,
            where_clause,
            group_by,
            having,
            order_by,
        } => StateObject::SelectStatement {
            select: boxed(select),
            from: boxed(from),
            where_clause: boxed_opt(where_clause),
            group_by: boxed_opt(group_by),
            having: boxed_opt(having),
            order_by: boxed_opt(order_by),
        },
        K::UpdateStatement {
            update,
            where_clause,
        } => StateObject::UpdateStatement {
            update: boxed(update),
            where_clause: boxed_opt(where_clause),
        },
        K::DeleteStatement {
            delete,
            where_clause,
        } => StateObject::DeleteStatement {
            delete: boxed(delete),
            where_clause: boxed_opt(where_clause),
        },
        K::Subquery {
            select,
            from,
            where_clause,
            group_by,
            having,
        } => StateObject::Subquery {
            select: boxed(select),
            from: boxed(from),
            where_clause: boxed_opt(where_clause),
            group_by: boxed_opt(group_by),
            having: boxed_opt(having),
        },
        K::SelectClause { distinct, items } => StateObject::SelectClause {
            distinct: *distinct,
            items: all(items),
        },
        K::ResultVariable {
            expression,
            has_as,
            name,
        } => StateObject::ResultVariable {
            expression: boxed(expression),
            has_as: *has_as,
            name: name.clone(),
        },
        // Synthesized by tolerant parsing when the FROM keyword is missing.
        K::FromClause { declarations } if declarations.is_empty() && expr.span.is_empty() => {
            StateObject::Unknown {
                text: String::new(),
            }
        }
        K::FromClause { declarations } => StateObject::FromClause {
            declarations: all(declarations),
        },
        K::WhereClause { condition } => StateObject::WhereClause {
            condition: boxed(condition),
        },
        K::HavingClause { condition } => StateObject::HavingClause {
            condition: boxed(condition),
        },
        K::GroupByClause { items } => StateObject::GroupByClause { items: all(items) },
        K::OrderByClause { items } => StateObject::OrderByClause { items: all(items) },
        K::OrderByItem {
            expression,
            ordering,
        } => StateObject::OrderByItem {
            expression: boxed(expression),
            ordering: *ordering,
        },
        K::UpdateClause { declaration, items } => StateObject::UpdateClause {
            declaration: boxed(declaration),
            items: all(items),
        },
        K::UpdateItem { path, value } => StateObject::UpdateItem {
            path: boxed(path),
            value: boxed(value),
        },
        K::DeleteClause { declaration } => StateObject::DeleteClause {
            declaration: boxed(declaration),
        },
        K::RangeDeclaration {
            entity,
            has_as,
            variable,
            joins,
        } => StateObject::RangeDeclaration {
            entity: boxed(entity),
            has_as: *has_as,
            variable: boxed_opt(variable),
            joins: all(joins),
        },
        K::DerivedDeclaration {
            path,
            has_as,
            variable,
            joins,
        } => StateObject::DerivedDeclaration {
            path: boxed(path),
            has_as: *has_as,
            variable: boxed_opt(variable),
            joins: all(joins),
        },
        K::CollectionMemberDeclaration {
            path,
            has_as,
            variable,
        } => StateObject::CollectionMemberDeclaration {
            path: boxed(path),
            has_as: *has_as,
            variable: boxed_opt(variable),
        },
        K::Join {
            join_kind,
            fetch,
            path,
            has_as,
            variable,
            on,
        } => StateObject::Join {
            join_kind: *join_kind,
            fetch: *fetch,
            path: boxed(path),
            has_as: *has_as,
            variable: boxed_opt(variable),
            on: boxed_opt(on),
        },
        K::AbstractSchemaName { name } => {
            StateObject::AbstractSchemaName(AbstractSchemaNameState::new(name.clone()))
        }
        K::IdentificationVariable { name } => {
            StateObject::IdentificationVariable(IdentificationVariableState::new(name.clone()))
        }
        K::Path {
            segments,
            collection_valued,
        } => StateObject::Path(PathState::new(segments.iter().cloned(), *collection_valued)),
        K::EntityTypeLiteral { name } => {
            StateObject::EntityTypeLiteral(EntityTypeLiteralState::new(name.clone()))
        }
        K::StringLiteral { text, .. } => StateObject::StringLiteral { text: text.clone() },
        K::NumericLiteral { text, .. } => StateObject::NumericLiteral { text: text.clone() },
        K::BooleanLiteral { value } => StateObject::BooleanLiteral { value: *value },
        K::NullLiteral => StateObject::NullLiteral,
        K::InputParameter { text } => StateObject::InputParameter { text: text.clone() },
        K::DateTime { keyword } => StateObject::DateTime {
            keyword: keyword.clone(),
        },
        K::Binary { op, left, right } => StateObject::Binary {
            op: *op,
            left: boxed(left),
            right: boxed(right),
        },
        K::Not { operand } => StateObject::Not {
            operand: boxed(operand),
        },
        K::Unary { sign, operand } => StateObject::Unary {
            sign: *sign,
            operand: boxed(operand),
        },
        K::Between {
            not,
            expression,
            lower,
            upper,
        } => StateObject::Between {
            not: *not,
            expression: boxed(expression),
            lower: boxed(lower),
            upper: boxed(upper),
        },
        K::Like {
            not,
            expression,
            pattern,
            escape,
        } => StateObject::Like {
            not: *not,
            expression: boxed(expression),
            pattern: boxed(pattern),
            escape: boxed_opt(escape),
        },
        K::In {
            not,
            expression,
            items,
            has_parens,
        } => StateObject::In {
            not: *not,
            expression: boxed(expression),
            items: all(items),
            has_parens: *has_parens,
        },
        K::IsNull { not, expression } => StateObject::IsNull {
            not: *not,
            expression: boxed(expression),
        },
        K::IsEmpty { not, expression } => StateObject::IsEmpty {
            not: *not,
            expression: boxed(expression),
        },
        K::MemberOf {
            not,
            of,
            entity,
            collection,
        } => StateObject::MemberOf {
            not: *not,
            of: *of,
            entity: boxed(entity),
            collection: boxed(collection),
        },
        K::Exists { not, subquery } => StateObject::Exists {
            not: *not,
            subquery: boxed(subquery),
        },
        K::AllOrAny { keyword, subquery } => StateObject::AllOrAny {
            keyword: keyword.clone(),
            subquery: boxed(subquery),
        },
        K::FunctionCall { name, arguments } => StateObject::FunctionCall {
            name: name.clone(),
            arguments: all(arguments),
        },
        K::Aggregate {
            name,
            distinct,
            argument,
        } => StateObject::Aggregate {
            name: name.clone(),
            distinct: *distinct,
            argument: boxed(argument),
        },
        K::Constructor {
            class_name,
            arguments,
        } => StateObject::Constructor(ConstructorState::new(class_name.clone(), all(arguments))),
        K::Trim {
            specification,
            character,
            has_from,
            string,
        } => StateObject::Trim {
            specification: *specification,
            character: boxed_opt(character),
            has_from: *has_from,
            string: boxed(string),
        },
        K::Case {
            operand,
            whens,
            otherwise,
        } => StateObject::Case {
            operand: boxed_opt(operand),
            whens: all(whens),
            otherwise: boxed(otherwise),
        },
        K::When { condition, result } => StateObject::When {
            condition: boxed(condition),
            result: boxed(result),
        },
        K::SqlFunction {
            function_name,
            arguments,
        } => StateObject::SqlFunction {
            function_name: function_name.clone(),
            arguments: all(arguments),
        },
        K::Parenthesized { expression } => StateObject::Parenthesized {
            expression: boxed(expression),
        },
        K::Unknown { text } => StateObject::Unknown { text: text.clone() },
    }
}

impl From<&Expression> for StateObject {
    fn from(expr: &Expression) -> Self {
        build_state(expr)
    }
}

/// Builds a `CASE` state object.
///
/// ```
/// use jpql::grammar::{GrammarKind, GrammarRegistry};
/// use jpql::model::{CaseExpressionBuilder, Formatter};
///
/// let registry = GrammarRegistry::new();
/// let grammar = registry.get(GrammarKind::Jpql2_1);
/// let case = CaseExpressionBuilder::new()
///     .when_jpql(&grammar, "e.age > 65", "'senior'")?
///     .otherwise_jpql(&grammar, "'regular'")?
///     .build()?;
/// assert_eq!(
///     Formatter::default().format(&case),
///     "CASE WHEN e.age > 65 THEN 'senior' ELSE 'regular' END"
/// );
/// # Ok::<(), jpql::error::JpqlError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct CaseExpressionBuilder {
    operand: Option<StateObject>,
    whens: Vec<StateObject>,
    otherwise: Option<StateObject>,
}

impl CaseExpressionBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes this a simple case over `operand`.
    pub fn operand(mut self, operand: StateObject) -> Self {
        self.operand = Some(operand);
        self
    }

    /// Appends `WHEN condition THEN result`.
    pub fn when(mut self, condition: StateObject, result: StateObject) -> Self {
        self.whens.push(StateObject::When {
            condition: condition.boxed(),
            result: result.boxed(),
        });
        self
    }

    /// Sets the `ELSE` result; `NULL` when never called.
    pub fn otherwise(mut self, result: StateObject) -> Self {
        self.otherwise = Some(result);
        self
    }

    /// Appends a `WHEN` clause parsed from JPQL fragments.
    ///
    /// The condition is a conditional expression for a general case and a
    /// scalar expression once an operand is set.
    pub fn when_jpql(self, grammar: &Grammar, condition: &str, result: &str) -> Result<Self> {
        let bnf = if self.operand.is_some() {
            bnf_ids::SCALAR_EXPRESSION
        } else {
            bnf_ids::CONDITIONAL_EXPRESSION
        };
        let condition = parse_fragment(grammar, condition, bnf)?;
        let result = parse_fragment(grammar, result, bnf_ids::SCALAR_EXPRESSION)?;
        Ok(self.when(condition, result))
    }

    /// Sets the `ELSE` result from a scalar JPQL fragment.
    pub fn otherwise_jpql(self, grammar: &Grammar, result: &str) -> Result<Self> {
        let result = parse_fragment(grammar, result, bnf_ids::SCALAR_EXPRESSION)?;
        Ok(self.otherwise(result))
    }

    /// Finishes the expression; fails without any `WHEN` clause.
    pub fn build(self) -> Result<StateObject> {
        if self.whens.is_empty() {
            return Err(JpqlError::InvalidArgument(
                "CASE expression needs at least one WHEN clause".to_string(),
            ));
        }
        Ok(StateObject::Case {
            operand: self.operand.map(StateObject::boxed),
            whens: self.whens,
            otherwise: self.otherwise.unwrap_or(StateObject::NullLiteral).boxed(),
        })
    }
}

fn parse_fragment(grammar: &Grammar, text: &str, bnf: &str) -> Result<StateObject> {
    let expression = Parser::parse(grammar, text, bnf, false)?;
    Ok(build_state(expression.root()))
}
