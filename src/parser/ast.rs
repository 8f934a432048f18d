#![forbid(unsafe_code)]

//! Immutable JPQL syntax tree produced by the parser.

use serde::Serialize;
use smallvec::SmallVec;

/// Byte range into the query text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Creates a span.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Whether the span covers no text.
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Whether `offset` falls inside the span (end inclusive).
    pub fn touches(self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }
}

/// Dotted path segments; most paths have few of them.
pub type Segments = SmallVec<[String; 4]>;

/// A node of the syntax tree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Expression {
    /// Node payload.
    pub kind: ExpressionKind,
    /// Source range covered by the node.
    pub span: Span,
}

/// `JOIN` flavours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// `JOIN` or `INNER JOIN`.
    Inner {
        /// `INNER` keyword written explicitly.
        explicit: bool,
    },
    /// `LEFT JOIN` or `LEFT OUTER JOIN`.
    Left {
        /// `OUTER` keyword written.
        outer: bool,
    },
}

/// Binary operators, lowest precedence first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// `OR`.
    Or,
    /// `AND`.
    And,
    /// `=`.
    Eq,
    /// `<>`.
    Ne,
    /// `<`.
    Lt,
    /// `<=`.
    Le,
    /// `>`.
    Gt,
    /// `>=`.
    Ge,
    /// `+`.
    Add,
    /// `-`.
    Sub,
    /// `*`.
    Mul,
    /// `/`.
    Div,
}

impl BinaryOp {
    /// Operator text.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "OR",
            BinaryOp::And => "AND",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Whether the operator is a keyword (`AND`, `OR`).
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And)
    }

    /// Whether the operator compares its operands.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Whether the operator is arithmetic.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }
}

/// Unary sign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    /// `+x`.
    Plus,
    /// `-x`.
    Minus,
}

/// `ORDER BY` direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordering {
    /// `ASC`.
    Asc,
    /// `DESC`.
    Desc,
}

/// `TRIM` specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimSpec {
    /// `LEADING`.
    Leading,
    /// `TRAILING`.
    Trailing,
    /// `BOTH`.
    Both,
}

impl TrimSpec {
    /// Keyword text.
    pub fn keyword(self) -> &'static str {
        match self {
            TrimSpec::Leading => "LEADING",
            TrimSpec::Trailing => "TRAILING",
            TrimSpec::Both => "BOTH",
        }
    }
}

/// Node payloads.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpressionKind {
    /// `SELECT ... FROM ... [WHERE] [GROUP BY] [HAVING] [ORDER BY]`.
    SelectStatement {
        /// SELECT clause.
        select: Box<Expression>,
        /// FROM clause.
        from: Box<Expression>,
        /// WHERE clause.
        #[serde(rename = "where")]
        where_clause: Option<Box<Expression>>,
        /// GROUP BY clause.
        group_by: Option<Box<Expression>>,
        /// HAVING clause.
        having: Option<Box<Expression>>,
        /// ORDER BY clause.
        order_by: Option<Box<Expression>>,
    },
    /// `UPDATE ... SET ... [WHERE]`.
    UpdateStatement {
        /// UPDATE clause.
        update: Box<Expression>,
        /// WHERE clause.
        #[serde(rename = "where")]
        where_clause: Option<Box<Expression>>,
    },
    /// `DELETE FROM ... [WHERE]`.
    DeleteStatement {
        /// DELETE clause.
        delete: Box<Expression>,
        /// WHERE clause.
        #[serde(rename = "where")]
        where_clause: Option<Box<Expression>>,
    },
    /// Nested `SELECT` without ORDER BY.
    Subquery {
        /// SELECT clause.
        select: Box<Expression>,
        /// FROM clause.
        from: Box<Expression>,
        /// WHERE clause.
        #[serde(rename = "where")]
        where_clause: Option<Box<Expression>>,
        /// GROUP BY clause.
        group_by: Option<Box<Expression>>,
        /// HAVING clause.
        having: Option<Box<Expression>>,
    },
    /// `SELECT [DISTINCT] items`.
    SelectClause {
        /// `DISTINCT` present.
        distinct: bool,
        /// Select items.
        items: Vec<Expression>,
    },
    /// `expr [AS] name` in a select clause.
    ResultVariable {
        /// Selected expression.
        expression: Box<Expression>,
        /// `AS` written.
        has_as: bool,
        /// Result variable name.
        name: String,
    },
    /// `FROM declarations`.
    FromClause {
        /// Declarations in source order.
        declarations: Vec<Expression>,
    },
    /// `Entity [AS] var joins*`.
    RangeDeclaration {
        /// Abstract schema name.
        entity: Box<Expression>,
        /// `AS` written.
        has_as: bool,
        /// Identification variable.
        variable: Option<Box<Expression>>,
        /// Joins in source order.
        joins: Vec<Expression>,
    },
    /// `path [AS] var joins*` in a subquery FROM clause.
    DerivedDeclaration {
        /// Root path.
        path: Box<Expression>,
        /// `AS` written.
        has_as: bool,
        /// Identification variable.
        variable: Option<Box<Expression>>,
        /// Joins in source order.
        joins: Vec<Expression>,
    },
    /// `IN(path) [AS] var`.
    CollectionMemberDeclaration {
        /// Collection-valued path.
        path: Box<Expression>,
        /// `AS` written.
        has_as: bool,
        /// Identification variable.
        variable: Option<Box<Expression>>,
    },
    /// `[LEFT [OUTER] | INNER] JOIN [FETCH] path [[AS] var] [ON cond]`.
    Join {
        /// Join flavour.
        join_kind: JoinKind,
        /// `FETCH` written.
        fetch: bool,
        /// Joined path.
        path: Box<Expression>,
        /// `AS` written.
        has_as: bool,
        /// Identification variable.
        variable: Option<Box<Expression>>,
        /// `ON` condition.
        on: Option<Box<Expression>>,
    },
    /// `WHERE cond`.
    WhereClause {
        /// Condition.
        condition: Box<Expression>,
    },
    /// `HAVING cond`.
    HavingClause {
        /// Condition.
        condition: Box<Expression>,
    },
    /// `GROUP BY items`.
    GroupByClause {
        /// Grouping items.
        items: Vec<Expression>,
    },
    /// `ORDER BY items`.
    OrderByClause {
        /// Ordering items.
        items: Vec<Expression>,
    },
    /// `expr [ASC|DESC]`.
    OrderByItem {
        /// Ordered expression.
        expression: Box<Expression>,
        /// Direction.
        ordering: Option<Ordering>,
    },
    /// `UPDATE declaration SET items`.
    UpdateClause {
        /// Range declaration being updated.
        declaration: Box<Expression>,
        /// Assignments.
        items: Vec<Expression>,
    },
    /// `path = value`.
    UpdateItem {
        /// Updated path.
        path: Box<Expression>,
        /// New value.
        value: Box<Expression>,
    },
    /// `DELETE FROM declaration`.
    DeleteClause {
        /// Range declaration.
        declaration: Box<Expression>,
    },
    /// Entity name in a range declaration.
    AbstractSchemaName {
        /// Name as written.
        name: String,
    },
    /// Identification variable (or an unqualified name).
    IdentificationVariable {
        /// Name as written.
        name: String,
    },
    /// Dotted path `a.b.c`.
    Path {
        /// Segments, root first.
        segments: Segments,
        /// Used where a collection is expected.
        collection_valued: bool,
    },
    /// Entity name compared with `TYPE(x)`.
    EntityTypeLiteral {
        /// Name as written.
        name: String,
    },
    /// String literal, raw text including quotes.
    StringLiteral {
        /// Raw text.
        text: String,
        /// Closing quote found.
        terminated: bool,
    },
    /// Numeric literal, raw text.
    NumericLiteral {
        /// Raw text.
        text: String,
        /// Lexically valid.
        valid: bool,
    },
    /// `TRUE` or `FALSE`.
    BooleanLiteral {
        /// Value.
        value: bool,
    },
    /// `NULL`.
    NullLiteral,
    /// `:name` or `?1`.
    InputParameter {
        /// Raw text.
        text: String,
    },
    /// `CURRENT_DATE`, `CURRENT_TIME` or `CURRENT_TIMESTAMP`.
    DateTime {
        /// Canonical keyword.
        keyword: String,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// `NOT cond`.
    Not {
        /// Negated condition.
        operand: Box<Expression>,
    },
    /// Signed operand.
    Unary {
        /// Sign.
        sign: Sign,
        /// Operand.
        operand: Box<Expression>,
    },
    /// `expr [NOT] BETWEEN lower AND upper`.
    Between {
        /// `NOT` written.
        not: bool,
        /// Tested expression.
        expression: Box<Expression>,
        /// Lower bound.
        lower: Box<Expression>,
        /// Upper bound.
        upper: Box<Expression>,
    },
    /// `expr [NOT] LIKE pattern [ESCAPE char]`.
    Like {
        /// `NOT` written.
        not: bool,
        /// Tested expression.
        expression: Box<Expression>,
        /// Pattern.
        pattern: Box<Expression>,
        /// Escape character.
        escape: Option<Box<Expression>>,
    },
    /// `expr [NOT] IN (items)` or `expr [NOT] IN :param`.
    In {
        /// `NOT` written.
        not: bool,
        /// Tested expression.
        expression: Box<Expression>,
        /// Items or a single subquery.
        items: Vec<Expression>,
        /// Items enclosed in parentheses.
        has_parens: bool,
    },
    /// `expr IS [NOT] NULL`.
    IsNull {
        /// `NOT` written.
        not: bool,
        /// Tested expression.
        expression: Box<Expression>,
    },
    /// `path IS [NOT] EMPTY`.
    IsEmpty {
        /// `NOT` written.
        not: bool,
        /// Tested collection.
        expression: Box<Expression>,
    },
    /// `entity [NOT] MEMBER [OF] collection`.
    MemberOf {
        /// `NOT` written.
        not: bool,
        /// `OF` written.
        of: bool,
        /// Candidate member.
        entity: Box<Expression>,
        /// Collection-valued path.
        collection: Box<Expression>,
    },
    /// `[NOT] EXISTS (subquery)`.
    Exists {
        /// `NOT` written.
        not: bool,
        /// Subquery.
        subquery: Box<Expression>,
    },
    /// `ALL|ANY|SOME (subquery)`.
    AllOrAny {
        /// Canonical keyword.
        keyword: String,
        /// Subquery.
        subquery: Box<Expression>,
    },
    /// Fixed-name function: `ABS(x)`, `KEY(m)`, `COALESCE(a, b)`, `OBJECT(e)`, ...
    FunctionCall {
        /// Canonical upper-case name.
        name: String,
        /// Arguments.
        arguments: Vec<Expression>,
    },
    /// Aggregate function.
    Aggregate {
        /// Canonical upper-case name.
        name: String,
        /// `DISTINCT` written.
        distinct: bool,
        /// Aggregated expression.
        argument: Box<Expression>,
    },
    /// `NEW class(args)`.
    Constructor {
        /// Fully-qualified class name.
        class_name: String,
        /// Constructor arguments.
        arguments: Vec<Expression>,
    },
    /// `TRIM([spec] [char] [FROM] string)`.
    Trim {
        /// Trim specification.
        specification: Option<TrimSpec>,
        /// Trim character.
        character: Option<Box<Expression>>,
        /// `FROM` written.
        has_from: bool,
        /// Trimmed string.
        string: Box<Expression>,
    },
    /// `CASE [operand] WHEN ... THEN ... ELSE ... END`.
    Case {
        /// Operand of a simple case.
        operand: Option<Box<Expression>>,
        /// `WHEN` clauses.
        whens: Vec<Expression>,
        /// `ELSE` result.
        otherwise: Box<Expression>,
    },
    /// `WHEN cond THEN result`.
    When {
        /// Condition or comparison value.
        condition: Box<Expression>,
        /// Result.
        result: Box<Expression>,
    },
    /// `FUNCTION('name', args)`.
    SqlFunction {
        /// Raw string literal naming the database function.
        function_name: String,
        /// Arguments.
        arguments: Vec<Expression>,
    },
    /// `(expr)`.
    Parenthesized {
        /// Wrapped expression.
        expression: Box<Expression>,
    },
    /// Placeholder for text the tolerant parser could not understand.
    Unknown {
        /// Skipped text.
        text: String,
    },
}

impl Expression {
    /// Creates a node.
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Boxes the node.
    pub fn boxed(self) -> Box<Expression> {
        Box::new(self)
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&Expression> {
        use ExpressionKind::*;
        let mut out: Vec<&Expression> = Vec::new();
        match &self.kind {
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
                out.extend(where_clause.as_deref());
                out.extend(group_by.as_deref());
                out.extend(having.as_deref());
                out.extend(order_by.as_deref());
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
                out.extend(where_clause.as_deref());
                out.extend(group_by.as_deref());
                out.extend(having.as_deref());
            }
            UpdateStatement {
                update,
                where_clause,
            } => {
                out.push(update);
                out.extend(where_clause.as_deref());
            }
            DeleteStatement {
                delete,
                where_clause,
            } => {
                out.push(delete);
                out.extend(where_clause.as_deref());
            }
            SelectClause { items, .. }
            | GroupByClause { items }
            | OrderByClause { items } => out.extend(items.iter()),
            FromClause { declarations } => out.extend(declarations.iter()),
            ResultVariable { expression, .. } | OrderByItem { expression, .. } => {
                out.push(expression)
            }
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
                out.extend(variable.as_deref());
                out.extend(joins.iter());
            }
            CollectionMemberDeclaration { path, variable, .. } => {
                out.push(path);
                out.extend(variable.as_deref());
            }
            Join {
                path, variable, on, ..
            } => {
                out.push(path);
                out.extend(variable.as_deref());
                out.extend(on.as_deref());
            }
            WhereClause { condition } | HavingClause { condition } => out.push(condition),
            UpdateClause { declaration, items } => {
                out.push(declaration);
                out.extend(items.iter());
            }
            UpdateItem { path, value } => {
                out.push(path);
                out.push(value);
            }
            DeleteClause { declaration } => out.push(declaration),
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
                out.extend(escape.as_deref());
            }
            In {
                expression, items, ..
            } => {
                out.push(expression);
                out.extend(items.iter());
            }
            IsNull { expression, .. } | IsEmpty { expression, .. } => out.push(expression),
            MemberOf {
                entity, collection, ..
            } => {
                out.push(entity);
                out.push(collection);
            }
            Exists { subquery, .. } | AllOrAny { subquery, .. } => out.push(subquery),
            FunctionCall { arguments, .. }
            | Constructor { arguments, .. }
            | SqlFunction { arguments, .. } => out.extend(arguments.iter()),
            Aggregate { argument, .. } => out.push(argument),
            Trim {
                character, string, ..
            } => {
                out.extend(character.as_deref());
                out.push(string);
            }
            Case {
                operand,
                whens,
                otherwise,
            } => {
                out.extend(operand.as_deref());
                out.extend(whens.iter());
                out.push(otherwise);
            }
            When { condition, result } => {
                out.push(condition);
                out.push(result);
            }
            Parenthesized { expression } => out.push(expression),
            AbstractSchemaName { .. }
            | IdentificationVariable { .. }
            | Path { .. }
            | EntityTypeLiteral { .. }
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

    /// Visits the node and all descendants in pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Whether the node or any descendant is a placeholder.
    pub fn has_unknown(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if matches!(node.kind, ExpressionKind::Unknown { .. }) {
                found = true;
            }
        });
        found
    }

    /// Short name of the node kind, used in logs and JSON.
    pub fn kind_name(&self) -> &'static str {
        use ExpressionKind::*;
        match &self.kind {
            SelectStatement { .. } => "select_statement",
            UpdateStatement { .. } => "update_statement",
            DeleteStatement { .. } => "delete_statement",
            Subquery { .. } => "subquery",
            SelectClause { .. } => "select_clause",
            ResultVariable { .. } => "result_variable",
            FromClause { .. } => "from_clause",
            RangeDeclaration { .. } => "range_declaration",
            DerivedDeclaration { .. } => "derived_declaration",
            CollectionMemberDeclaration { .. } => "collection_member_declaration",
            Join { .. } => "join",
            WhereClause { .. } => "where_clause",
            HavingClause { .. } => "having_clause",
            GroupByClause { .. } => "group_by_clause",
            OrderByClause { .. } => "order_by_clause",
            OrderByItem { .. } => "order_by_item",
            UpdateClause { .. } => "update_clause",
            UpdateItem { .. } => "update_item",
            DeleteClause { .. } => "delete_clause",
            AbstractSchemaName { .. } => "abstract_schema_name",
            IdentificationVariable { .. } => "identification_variable",
            Path { .. } => "path",
            EntityTypeLiteral { .. } => "entity_type_literal",
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
            Constructor { .. } => "constructor",
            Trim { .. } => "trim",
            Case { .. } => "case",
            When { .. } => "when",
            SqlFunction { .. } => "sql_function",
            Parenthesized { .. } => "parenthesized",
            Unknown { .. } => "unknown",
        }
    }
}
