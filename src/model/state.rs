//! Mutable mirror of the syntax tree.

use crate::parser::{BinaryOp, JoinKind, Ordering, Sign, TrimSpec};

/// Identification variable occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentificationVariableState {
    text: String,
}

impl IdentificationVariableState {
    /// New occurrence.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Variable name as written.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the name.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

/// Entity name of a range declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractSchemaNameState {
    text: String,
}

impl AbstractSchemaNameState {
    /// New schema name.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Entity name.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the entity name.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

/// Entity name compared with `TYPE(x)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeLiteralState {
    text: String,
}

impl EntityTypeLiteralState {
    /// New literal.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Entity name.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the entity name.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

/// `NEW class(args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorState {
    class_name: String,
    arguments: Vec<StateObject>,
}

impl ConstructorState {
    /// New constructor expression.
    pub fn new(class_name: impl Into<String>, arguments: Vec<StateObject>) -> Self {
        Self {
            class_name: class_name.into(),
            arguments,
        }
    }

    /// Fully-qualified class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Replaces the class name.
    pub fn set_class_name(&mut self, class_name: impl Into<String>) {
        self.class_name = class_name.into();
    }

    /// Constructor arguments.
    pub fn arguments(&self) -> &[StateObject] {
        &self.arguments
    }
}

/// Dotted path expression.
///
/// The root identification variable is created lazily; once it exists it owns
/// the text of the first segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PathState {
    segments: Vec<String>,
    collection_valued: bool,
    variable: Option<Box<StateObject>>,
}

impl PathState {
    /// New path from its segments.
    pub fn new<I, S>(segments: I, collection_valued: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            collection_valued,
            variable: None,
        }
    }

    /// Parses `a.b.c`.
    pub fn parse(text: &str, collection_valued: bool) -> Self {
        Self::new(text.split('.'), collection_valued)
    }

    /// Whether the path is used where a collection is expected.
    pub fn is_collection_valued(&self) -> bool {
        self.collection_valued
    }

    /// Number of segments, root included.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Segment by index; index 0 is the root variable.
    pub fn segment(&self, index: usize) -> Option<&str> {
        if index == 0 {
            if let Some(StateObject::IdentificationVariable(variable)) = self.variable.as_deref() {
                return Some(variable.text());
            }
        }
        self.segments.get(index).map(String::as_str)
    }

    /// All segments.
    pub fn segments(&self) -> Vec<&str> {
        (0..self.segments.len())
            .filter_map(|index| self.segment(index))
            .collect()
    }

    /// Dotted text.
    pub fn path_text(&self) -> String {
        self.segments().join(".")
    }

    /// Replaces one segment.
    pub fn set_path(&mut self, index: usize, text: impl Into<String>) {
        let text = text.into();
        if index == 0 {
            if let Some(StateObject::IdentificationVariable(variable)) = self.variable.as_deref_mut()
            {
                variable.set_text(text.clone());
            }
        }
        if let Some(segment) = self.segments.get_mut(index) {
            *segment = text;
        }
    }

    /// Replaces the whole path.
    pub fn set_path_text(&mut self, text: &str) {
        self.segments = text.split('.').map(str::to_string).collect();
        self.variable = None;
    }

    /// Whether the root variable has been materialized.
    pub fn has_identification_variable(&self) -> bool {
        self.variable.is_some()
    }

    /// Root variable, created on first access.
    pub fn identification_variable_mut(&mut self) -> Option<&mut IdentificationVariableState> {
        let root = self.segments.first()?.clone();
        let state = self.variable.get_or_insert_with(|| {
            Box::new(StateObject::IdentificationVariable(
                IdentificationVariableState::new(root),
            ))
        });
        match state.as_mut() {
            StateObject::IdentificationVariable(variable) => Some(variable),
            _ => None,
        }
    }

    fn variable_state_mut(&mut self) -> Option<&mut StateObject> {
        self.variable.as_deref_mut()
    }
}

/// Editable query node.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum StateObject {
    SelectStatement {
        select: Box<StateObject>,
        from: Box<StateObject>,
        where_clause: Option<Box<StateObject>>,
        group_by: Option<Box<StateObject>>,
        having: Option<Box<StateObject>>,
        order_by: Option<Box<StateObject>>,
    },
    UpdateStatement {
        update: Box<StateObject>,
        where_clause: Option<Box<StateObject>>,
    },
    DeleteStatement {
        delete: Box<StateObject>,
        where_clause: Option<Box<StateObject>>,
    },
    Subquery {
        select: Box<StateObject>,
        from: Box<StateObject>,
        where_clause: Option<Box<StateObject>>,
        group_by: Option<Box<StateObject>>,
        having: Option<Box<StateObject>>,
    },
    SelectClause {
        distinct: bool,
        items: Vec<StateObject>,
    },
    ResultVariable {
        expression: Box<StateObject>,
        has_as: bool,
        name: String,
    },
    FromClause {
        declarations: Vec<StateObject>,
    },
    WhereClause {
        condition: Box<StateObject>,
    },
    HavingClause {
        condition: Box<StateObject>,
    },
    GroupByClause {
        items: Vec<StateObject>,
    },
    OrderByClause {
        items: Vec<StateObject>,
    },
    OrderByItem {
        expression: Box<StateObject>,
        ordering: Option<Ordering>,
    },
    UpdateClause {
        declaration: Box<StateObject>,
        items: Vec<StateObject>,
    },
    UpdateItem {
        path: Box<StateObject>,
        value: Box<StateObject>,
    },
    DeleteClause {
        declaration: Box<StateObject>,
    },
    RangeDeclaration {
        entity: Box<StateObject>,
        has_as: bool,
        variable: Option<Box<StateObject>>,
        joins: Vec<StateObject>,
    },
    DerivedDeclaration {
        path: Box<StateObject>,
        has_as: bool,
        variable: Option<Box<StateObject>>,
        joins: Vec<StateObject>,
    },
    CollectionMemberDeclaration {
        path: Box<StateObject>,
        has_as: bool,
        variable: Option<Box<StateObject>>,
    },
    Join {
        join_kind: JoinKind,
        fetch: bool,
        path: Box<StateObject>,
        has_as: bool,
        variable: Option<Box<StateObject>>,
        on: Option<Box<StateObject>>,
    },
    AbstractSchemaName(AbstractSchemaNameState),
    IdentificationVariable(IdentificationVariableState),
    Path(PathState),
    EntityTypeLiteral(EntityTypeLiteralState),
    StringLiteral {
        text: String,
    },
    NumericLiteral {
        text: String,
    },
    BooleanLiteral {
        value: bool,
    },
    NullLiteral,
    InputParameter {
        text: String,
    },
    DateTime {
        keyword: String,
    },
    Binary {
        op: BinaryOp,
        left: Box<StateObject>,
        right: Box<StateObject>,
    },
    Not {
        operand: Box<StateObject>,
    },
    Unary {
        sign: Sign,
        operand: Box<StateObject>,
    },
    Between {
        not: bool,
        expression: Box<StateObject>,
        lower: Box<StateObject>,
        upper: Box<StateObject>,
    },
    Like {
        not: bool,
        expression: Box<StateObject>,
        pattern: Box<StateObject>,
        escape: Option<Box<StateObject>>,
    },
    In {
        not: bool,
        expression: Box<StateObject>,
        items: Vec<StateObject>,
        has_parens: bool,
    },
    IsNull {
        not: bool,
        expression: Box<StateObject>,
    },
    IsEmpty {
        not: bool,
        expression: Box<StateObject>,
    },
    MemberOf {
        not: bool,
        of: bool,
        entity: Box<StateObject>,
        collection: Box<StateObject>,
    },
    Exists {
        not: bool,
        subquery: Box<StateObject>,
    },
    AllOrAny {
        keyword: String,
        subquery: Box<StateObject>,
    },
    FunctionCall {
        name: String,
        arguments: Vec<StateObject>,
    },
    Aggregate {
        name: String,
        distinct: bool,
        argument: Box<StateObject>,
    },
    Constructor(ConstructorState),
    Trim {
        specification: Option<TrimSpec>,
        character: Option<Box<StateObject>>,
        has_from: bool,
        string: Box<StateObject>,
    },
    Case {
        operand: Option<Box<StateObject>>,
        whens: Vec<StateObject>,
        otherwise: Box<StateObject>,
    },
    When {
        condition: Box<StateObject>,
        result: Box<StateObject>,
    },
    SqlFunction {
        function_name: String,
        arguments: Vec<StateObject>,
    },
    Parenthesized {
        expression: Box<StateObject>,
    },
    Unknown {
        text: String,
    },
}

impl StateObject {
    /// Placeholder for text that was never written, such as a missing FROM
    /// clause.
    pub fn is_blank(&self) -> bool {
        matches!(self, StateObject::Unknown { text } if text.is_empty())
    }

    /// Boxes the node.
    pub fn boxed(self) -> Box<StateObject> {
        Box::new(self)
    }

    /// Direct children in source order, for in-place mutation.
    pub fn children_mut(&mut self) -> Vec<&mut StateObject> {
        use StateObject::*;
        let mut out: Vec<&mut StateObject> = Vec::new();
        match self {
            SelectStatement {
                select,
                from,
                where_clause,
                group_by,
                having,
                order_by,
            } => {
                out.push(select);
                out.push(from);
                out.extend(where_clause.as_deref_mut());
                out.extend(group_by.as_deref_mut());
                out.extend(having.as_deref_mut());
                out.extend(order_by.as_deref_mut());
            }
            Subquery {
                select,
                from,
                where_clause,
                group_by,
                having,
            } => {
                out.push(select);
                out.push(from);
                out.extend(where_clause.as_deref_mut());
                out.extend(group_by.as_deref_mut());
                out.extend(having.as_deref_mut());
            }
            UpdateStatement {
                update: clause,
                where_clause,
            }
            | DeleteStatement {
                delete: clause,
                where_clause,
            } => {
                out.push(clause);
                out.extend(where_clause.as_deref_mut());
            }
            SelectClause { items, .. } | GroupByClause { items } | OrderByClause { items } => {
                out.extend(items.iter_mut())
            }
            FromClause { declarations } => out.extend(declarations.iter_mut()),
            ResultVariable { expression, .. } | OrderByItem { expression, .. } => {
                out.push(expression)
            }
            WhereClause { condition } | HavingClause { condition } => out.push(condition),
            UpdateClause { declaration, items } => {
                out.push(declaration);
                out.extend(items.iter_mut());
            }
            UpdateItem { path, value } => {
                out.push(path);
                out.push(value);
            }
            DeleteClause { declaration } => out.push(declaration),
            RangeDeclaration {
                entity: root,
                variable,
                joins,
                ..
            }
            | DerivedDeclaration {
                path: root,
                variable,
                joins,
                ..
            } => {
                out.push(root);
                out.extend(variable.as_deref_mut());
                out.extend(joins.iter_mut());
            }
            CollectionMemberDeclaration { path, variable, .. } => {
                out.push(path);
                out.extend(variable.as_deref_mut());
            }
            Join {
                path, variable, on, ..
            } => {
                out.push(path);
                out.extend(variable.as_deref_mut());
                out.extend(on.as_deref_mut());
            }
            Path(path) => out.extend(path.variable_state_mut()),
            Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Not { operand } | Unary { operand, .. } => out.push(operand),
            Between {
                expression,
                lower,
                upper,
                ..
            } => {
                out.push(expression);
                out.push(lower);
                out.push(upper);
            }
            Like {
                expression,
                pattern,
                escape,
                ..
            } => {
                out.push(expression);
                out.push(pattern);
                out.extend(escape.as_deref_mut());
            }
            In {
                expression, items, ..
            } => {
                out.push(expression);
                out.extend(items.iter_mut());
            }
            IsNull { expression, .. } | IsEmpty { expression, .. } => out.push(expression),
            MemberOf {
                entity, collection, ..
            } => {
                out.push(entity);
                out.push(collection);
            }
            Exists { subquery, .. } | AllOrAny { subquery, .. } => out.push(subquery),
            FunctionCall { arguments, .. } | SqlFunction { arguments, .. } => {
                out.extend(arguments.iter_mut())
            }
            Constructor(constructor) => out.extend(constructor.arguments.iter_mut()),
            Aggregate { argument, .. } => out.push(argument),
            Trim {
                character, string, ..
            } => {
                out.extend(character.as_deref_mut());
                out.push(string);
            }
            Case {
                operand,
                whens,
                otherwise,
            } => {
                out.extend(operand.as_deref_mut());
                out.extend(whens.iter_mut());
                out.push(otherwise);
            }
            When { condition, result } => {
                out.push(condition);
                out.push(result);
            }
            Parenthesized { expression } => out.push(expression),
            AbstractSchemaName(_)
            | IdentificationVariable(_)
            | EntityTypeLiteral(_)
            | StringLiteral { .. }
            | NumericLiteral { .. }
            | BooleanLiteral { .. }
            | NullLiteral
            | InputParameter { .. }
            | DateTime { .. }
            | Unknown { .. } => {}
        }
        out
    }

    /// Snake-case name of the node kind.
    pub fn kind_name(&self) -> &'static str {
        use StateObject::*;
        match self {
            SelectStatement { .. } => "select_statement",
            UpdateStatement { .. } => "update_statement",
            DeleteStatement { .. } => "delete_statement",
            Subquery { .. } => "subquery",
            SelectClause { .. } => "select_clause",
            ResultVariable { .. } => "result_variable",
            FromClause { .. } => "from_clause",
            WhereClause { .. } => "where_clause",
            HavingClause { .. } => "having_clause",
            GroupByClause { .. } => "group_by_clause",
            OrderByClause { .. } => "order_by_clause",
            OrderByItem { .. } => "order_by_item",
            UpdateClause { .. } => "update_clause",
            UpdateItem { .. } => "update_item",
            DeleteClause { .. } => "delete_clause",
            RangeDeclaration { .. } => "range_declaration",
            DerivedDeclaration { .. } => "derived_declaration",
            CollectionMemberDeclaration { .. } => "collection_member_declaration",
            Join { .. } => "join",
            AbstractSchemaName(_) => "abstract_schema_name",
            IdentificationVariable(_) => "identification_variable",
            Path(_) => "path",
            EntityTypeLiteral(_) => "entity_type_literal",
            StringLiteral { .. } => "string_literal",
            NumericLiteral { .. } => "numeric_literal",
            BooleanLiteral { .. } => "boolean_literal",
            NullLiteral => "null_literal",
            InputParameter { .. } => "input_parameter",
            DateTime { .. } => "date_time",
            Binary { .. } => "binary",
            Not { .. } => "not",
            Unary { .. } => "unary",
            Between { .. } => "between",
            Like { .. } => "like",
            In { .. } => "in",
            IsNull { .. } => "is_null",
            IsEmpty { .. } => "is_empty",
            MemberOf { .. } => "member_of",
            Exists { .. } => "exists",
            AllOrAny { .. } => "all_or_any",
            FunctionCall { .. } => "function_call",
            Aggregate { .. } => "aggregate",
            Constructor(_) => "constructor",
            Trim { .. } => "trim",
            Case { .. } => "case",
            When { .. } => "when",
            SqlFunction { .. } => "sql_function",
            Parenthesized { .. } => "parenthesized",
            Unknown { .. } => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_root_variable_is_lazy_and_owns_first_segment() {
        let mut path = PathState::parse("e.address.city", false);
        assert!(!path.has_identification_variable());
        path.identification_variable_mut()
            .expect("root")
            .set_text("emp");
        assert!(path.has_identification_variable());
        assert_eq!(path.path_text(), "emp.address.city");

        path.set_path(0, "x");
        path.set_path(2, "town");
        assert_eq!(path.segment(0), Some("x"));
        assert_eq!(path.path_text(), "x.address.town");

        path.set_path_text("Status.ACTIVE");
        assert!(!path.has_identification_variable());
        assert_eq!(path.segment_count(), 2);
    }

    #[test]
    fn path_children_expose_materialized_root() {
        let mut state = StateObject::Path(PathState::parse("e.name", false));
        assert!(state.children_mut().is_empty());
        if let StateObject::Path(path) = &mut state {
            path.identification_variable_mut();
        }
        let children = state.children_mut();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind_name(), "identification_variable");
    }
}
