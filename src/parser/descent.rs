//! Recursive-descent parser over the token stream.

use smallvec::SmallVec;

use super::ast::{
    BinaryOp, Expression, ExpressionKind as K, JoinKind, Ordering, Segments, Sign, Span, TrimSpec,
};
use super::lexer::{tokenize, Token, TokenKind};
use crate::diagnostic::{Diagnostic, DiagnosticKey};
use crate::error::{JpqlError, ParseError, Result};
use crate::grammar::EntryPoint;

/// Words that never name an identification variable or result variable.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "BY", "UPDATE", "SET", "DELETE",
    "JOIN", "INNER", "LEFT", "OUTER", "FETCH", "IN", "AS", "AND", "OR", "NOT", "BETWEEN", "LIKE",
    "ESCAPE", "IS", "NULL", "EMPTY", "MEMBER", "OF", "EXISTS", "ALL", "ANY", "SOME", "TRUE",
    "FALSE", "ON", "WHEN", "THEN", "ELSE", "END", "ASC", "DESC", "DISTINCT", "NEW", "CASE",
];

const AGGREGATES: &[&str] = &["AVG", "MAX", "MIN", "SUM", "COUNT"];

/// Fixed-name functions with their (min, max) argument counts.
const FUNCTIONS: &[(&str, usize, usize)] = &[
    ("ABS", 1, 1),
    ("SQRT", 1, 1),
    ("MOD", 2, 2),
    ("SIZE", 1, 1),
    ("LENGTH", 1, 1),
    ("LOCATE", 2, 3),
    ("CONCAT", 2, usize::MAX),
    ("SUBSTRING", 2, 3),
    ("LOWER", 1, 1),
    ("UPPER", 1, 1),
    ("OBJECT", 1, 1),
    ("COALESCE", 2, usize::MAX),
    ("NULLIF", 2, 2),
    ("KEY", 1, 1),
    ("VALUE", 1, 1),
    ("ENTRY", 1, 1),
    ("INDEX", 1, 1),
    ("TYPE", 1, 1),
];

const DATE_TIME: &[&str] = &["CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP"];

pub(super) fn parse_entry(
    source: &str,
    entry: EntryPoint,
    tolerant: bool,
) -> Result<(Expression, Vec<Diagnostic>)> {
    let mut p = Descent {
        src: source,
        tokens: tokenize(source),
        pos: 0,
        tolerant,
        diagnostics: Vec::new(),
    };
    let root = match p.entry(entry) {
        Ok(root) => root,
        Err(JpqlError::Parse(err)) if tolerant => {
            p.pos = 0;
            let span = p.skip_to_end();
            p.diagnostics.push(Diagnostic::error(
                span,
                DiagnosticKey::UnexpectedToken,
                err.message,
            ));
            p.unknown(span)
        }
        Err(err) => return Err(err),
    };
    if !p.at(TokenKind::Eof) {
        let err = p.error("unexpected trailing input");
        if !tolerant {
            return Err(err);
        }
        let span = p.skip_to_end();
        p.diagnostics.push(Diagnostic::error(
            span,
            DiagnosticKey::UnexpectedToken,
            format!("unexpected trailing input '{}'", p.slice(span)),
        ));
    }
    Ok((root, p.diagnostics))
}

struct Descent<'s> {
    src: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    tolerant: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'s> Descent<'s> {
    // ---- token helpers -------------------------------------------------

    fn peek(&self) -> Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        self.tokens[idx]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn word_at(&self, n: usize) -> Option<&'s str> {
        let token = self.peek_at(n);
        (token.kind == TokenKind::Word).then(|| token.text(self.src))
    }

    fn is_word_at(&self, n: usize, keyword: &str) -> bool {
        self.word_at(n)
            .is_some_and(|w| w.eq_ignore_ascii_case(keyword))
    }

    fn at_kw(&self, keyword: &str) -> bool {
        self.is_word_at(0, keyword)
    }

    fn at_kws(&self, keywords: &[&str]) -> bool {
        keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.is_word_at(i, kw))
    }

    fn advance(&mut self) -> Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, keyword: &str) -> bool {
        if self.at_kw(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn expect_kw(&mut self, keyword: &str) -> Result<Token> {
        if self.at_kw(keyword) {
            Ok(self.advance())
        } else {
            Err(self.error(&format!("expected {keyword}")))
        }
    }

    fn start(&self) -> usize {
        self.peek().span.start
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end().max(start))
    }

    fn slice(&self, span: Span) -> &'s str {
        &self.src[span.start..span.end]
    }

    fn node(&self, kind: K, start: usize) -> Expression {
        Expression::new(kind, self.span_from(start))
    }

    fn unknown(&self, span: Span) -> Expression {
        Expression::new(
            K::Unknown {
                text: self.slice(span).to_string(),
            },
            span,
        )
    }

    fn error(&self, message: &str) -> JpqlError {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", token.text(self.src)),
        };
        JpqlError::Parse(ParseError::new(token.span.start, found, message))
    }

    fn is_reserved(word: &str) -> bool {
        RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
    }

    /// Whether the current token is a word usable as a variable name.
    fn at_variable_name(&self) -> bool {
        self.word_at(0).is_some_and(|w| !Self::is_reserved(w))
    }

    fn at_clause_boundary(&self) -> bool {
        let token = self.peek();
        match token.kind {
            TokenKind::Eof | TokenKind::RParen => true,
            TokenKind::Word => {
                self.at_kw("FROM")
                    || self.at_kw("WHERE")
                    || self.at_kw("HAVING")
                    || self.at_kw("SET")
                    || self.at_kws(&["GROUP", "BY"])
                    || self.at_kws(&["ORDER", "BY"])
            }
            _ => false,
        }
    }

    /// Skips tokens up to the next clause boundary at nesting depth zero.
    fn skip_to_boundary(&mut self, stop_at_comma: bool) -> Span {
        let start = self.start();
        let mut depth = 0usize;
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen if depth == 0 => break,
                TokenKind::RParen => depth -= 1,
                TokenKind::Comma if depth == 0 && stop_at_comma => break,
                _ if depth == 0 && self.at_clause_boundary() => break,
                _ => {}
            }
            self.advance();
        }
        self.span_from(start)
    }

    fn skip_to_end(&mut self) -> Span {
        let start = self.start();
        while !self.at(TokenKind::Eof) {
            self.advance();
        }
        self.span_from(start)
    }

    /// Runs `f`; in tolerant mode a parse failure turns the fragment into a
    /// placeholder spanning everything up to the next boundary.
    fn recover(
        &mut self,
        stop_at_comma: bool,
        f: impl FnOnce(&mut Self) -> Result<Expression>,
    ) -> Result<Expression> {
        let restart = self.pos;
        let mark = self.diagnostics.len();
        match f(self) {
            Ok(expr) => Ok(expr),
            Err(JpqlError::Parse(err)) if self.tolerant => {
                self.pos = restart;
                self.diagnostics.truncate(mark);
                let mut span = self.skip_to_boundary(stop_at_comma);
                if span.start == span.end {
                    span = Span::new(err.position, err.position);
                }
                self.diagnostics.push(Diagnostic::error(
                    span,
                    DiagnosticKey::UnexpectedToken,
                    format!("{} (found {})", err.message, err.found),
                ));
                Ok(self.unknown(span))
            }
            Err(err) => Err(err),
        }
    }

    // ---- entry points --------------------------------------------------

    fn entry(&mut self, entry: EntryPoint) -> Result<Expression> {
        match entry {
            EntryPoint::Statement => {
                if self.at_kw("UPDATE") {
                    self.update_statement()
                } else if self.at_kw("DELETE") {
                    self.delete_statement()
                } else {
                    self.select_statement()
                }
            }
            EntryPoint::SelectStatement => self.select_statement(),
            EntryPoint::UpdateStatement => self.update_statement(),
            EntryPoint::DeleteStatement => self.delete_statement(),
            EntryPoint::Subquery => {
                if self.eat(TokenKind::LParen) {
                    let sub = self.subquery()?;
                    self.expect(TokenKind::RParen, "')'")?;
                    Ok(sub)
                } else {
                    self.subquery()
                }
            }
            EntryPoint::SelectExpression => self.select_item(),
            EntryPoint::ConditionalExpression => self.conditional(),
            EntryPoint::ScalarExpression => self.arithmetic(),
            EntryPoint::RangeVariableDeclaration => self.range_declaration(false),
            EntryPoint::CaseExpression => {
                if !self.at_kw("CASE") {
                    return Err(self.error("expected CASE"));
                }
                self.primary()
            }
        }
    }

    // ---- statements ----------------------------------------------------

    fn select_statement(&mut self) -> Result<Expression> {
        let start = self.start();
        let select = self.select_clause()?;
        let from = self.from_clause()?;
        let where_clause = self.where_clause()?;
        let group_by = self.group_by_clause()?;
        let having = self.having_clause()?;
        let order_by = self.order_by_clause()?;
        Ok(self.node(
            K::SelectStatement {
                select: select.boxed(),
                from: from.boxed(),
                where_clause,
                group_by,
                having,
                order_by,
            },
            start,
        ))
    }

    fn subquery(&mut self) -> Result<Expression> {
        let start = self.start();
        let select = self.select_clause()?;
        let from = self.from_clause()?;
        let where_clause = self.where_clause()?;
        let group_by = self.group_by_clause()?;
        let having = self.having_clause()?;
        Ok(self.node(
            K::Subquery {
                select: select.boxed(),
                from: from.boxed(),
                where_clause,
                group_by,
                having,
            },
            start,
        ))
    }

    fn update_statement(&mut self) -> Result<Expression> {
        let start = self.start();
        self.expect_kw("UPDATE")?;
        let declaration = self.range_declaration(false)?;
        let mut items = Vec::new();
        if self.eat_kw("SET") {
            items = self.comma_list("update item", |p| p.update_item())?;
        } else if !self.tolerant {
            return Err(self.error("expected SET"));
        } else {
            let at = self.start();
            self.diagnostics.push(Diagnostic::error(
                Span::new(at, at),
                DiagnosticKey::UnexpectedToken,
                "expected SET",
            ));
        }
        let update = self.node(
            K::UpdateClause {
                declaration: declaration.boxed(),
                items,
            },
            start,
        );
        let where_clause = self.where_clause()?;
        Ok(self.node(
            K::UpdateStatement {
                update: update.boxed(),
                where_clause,
            },
            start,
        ))
    }

    fn update_item(&mut self) -> Result<Expression> {
        let start = self.start();
        let path = self.path_or_variable(false)?;
        self.expect(TokenKind::Eq, "'='")?;
        let value = self.arithmetic()?;
        Ok(self.node(
            K::UpdateItem {
                path: path.boxed(),
                value: value.boxed(),
            },
            start,
        ))
    }

    fn delete_statement(&mut self) -> Result<Expression> {
        let start = self.start();
        self.expect_kw("DELETE")?;
        self.expect_kw("FROM")?;
        let declaration = self.range_declaration(false)?;
        let delete = self.node(
            K::DeleteClause {
                declaration: declaration.boxed(),
            },
            start,
        );
        let where_clause = self.where_clause()?;
        Ok(self.node(
            K::DeleteStatement {
                delete: delete.boxed(),
                where_clause,
            },
            start,
        ))
    }

    // ---- clauses -------------------------------------------------------

    fn select_clause(&mut self) -> Result<Expression> {
        let start = self.start();
        self.expect_kw("SELECT")?;
        let distinct = self.eat_kw("DISTINCT");
        let items = self.comma_list("select expression", |p| p.select_item())?;
        Ok(self.node(K::SelectClause { distinct, items }, start))
    }

    fn select_item(&mut self) -> Result<Expression> {
        let start = self.start();
        let expression = self.arithmetic()?;
        let has_as = self.eat_kw("AS");
        if has_as || self.at_variable_name() {
            let name = self.variable_name()?;
            return Ok(self.node(
                K::ResultVariable {
                    expression: expression.boxed(),
                    has_as,
                    name,
                },
                start,
            ));
        }
        Ok(expression)
    }

    fn from_clause(&mut self) -> Result<Expression> {
        let start = self.start();
        if !self.at_kw("FROM") {
            let err = self.error("expected FROM");
            if !self.tolerant {
                return Err(err);
            }
            self.diagnostics.push(Diagnostic::error(
                Span::new(start, start),
                DiagnosticKey::UnexpectedToken,
                "expected FROM",
            ));
            return Ok(Expression::new(
                K::FromClause {
                    declarations: Vec::new(),
                },
                Span::new(start, start),
            ));
        }
        self.advance();
        let declarations =
            self.comma_list("identification variable declaration", |p| p.declaration())?;
        Ok(self.node(K::FromClause { declarations }, start))
    }

    fn where_clause(&mut self) -> Result<Option<Box<Expression>>> {
        if !self.at_kw("WHERE") {
            return Ok(None);
        }
        let start = self.start();
        self.advance();
        let condition = self.recover(false, |p| p.conditional())?;
        Ok(Some(
            self.node(
                K::WhereClause {
                    condition: condition.boxed(),
                },
                start,
            )
            .boxed(),
        ))
    }

    fn having_clause(&mut self) -> Result<Option<Box<Expression>>> {
        if !self.at_kw("HAVING") {
            return Ok(None);
        }
        let start = self.start();
        self.advance();
        let condition = self.recover(false, |p| p.conditional())?;
        Ok(Some(
            self.node(
                K::HavingClause {
                    condition: condition.boxed(),
                },
                start,
            )
            .boxed(),
        ))
    }

    fn group_by_clause(&mut self) -> Result<Option<Box<Expression>>> {
        if !self.at_kws(&["GROUP", "BY"]) {
            return Ok(None);
        }
        let start = self.start();
        self.advance();
        self.advance();
        let items = self.comma_list("grouping expression", |p| p.arithmetic())?;
        Ok(Some(self.node(K::GroupByClause { items }, start).boxed()))
    }

    fn order_by_clause(&mut self) -> Result<Option<Box<Expression>>> {
        if !self.at_kws(&["ORDER", "BY"]) {
            return Ok(None);
        }
        let start = self.start();
        self.advance();
        self.advance();
        let items = self.comma_list("ordering expression", |p| p.order_by_item())?;
        Ok(Some(self.node(K::OrderByClause { items }, start).boxed()))
    }

    fn order_by_item(&mut self) -> Result<Expression> {
        let start = self.start();
        let expression = self.arithmetic()?;
        let ordering = if self.eat_kw("ASC") {
            Some(Ordering::Asc)
        } else if self.eat_kw("DESC") {
            Some(Ordering::Desc)
        } else {
            None
        };
        Ok(self.node(
            K::OrderByItem {
                expression: expression.boxed(),
                ordering,
            },
            start,
        ))
    }

    /// Comma-separated items up to the next clause boundary. A dangling
    /// comma yields an empty placeholder in tolerant mode.
    fn comma_list(
        &mut self,
        what: &str,
        item: impl Fn(&mut Self) -> Result<Expression>,
    ) -> Result<Vec<Expression>> {
        let mut items = Vec::new();
        if self.at_clause_boundary() {
            if !self.tolerant {
                return Err(self.error(&format!("expected {what}")));
            }
            return Ok(items);
        }
        loop {
            if self.at_clause_boundary() {
                if !self.tolerant {
                    return Err(self.error(&format!("expected {what}")));
                }
                let at = Span::new(self.start(), self.start());
                self.diagnostics.push(Diagnostic::error(
                    at,
                    DiagnosticKey::UnexpectedToken,
                    format!("expected {what}"),
                ));
                items.push(self.unknown(at));
                break;
            }
            items.push(self.recover(true, &item)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    // ---- declarations --------------------------------------------------

    fn declaration(&mut self) -> Result<Expression> {
        if self.at_kw("IN") && self.peek_at(1).kind == TokenKind::LParen {
            return self.collection_member_declaration();
        }
        if self.peek_at(1).kind == TokenKind::Dot {
            return self.derived_declaration();
        }
        self.range_declaration(true)
    }

    fn range_declaration(&mut self, with_joins: bool) -> Result<Expression> {
        let start = self.start();
        let Some(word) = self.word_at(0).filter(|w| !Self::is_reserved(w)) else {
            return Err(self.error("expected entity name"));
        };
        let token = self.advance();
        let entity = Expression::new(
            K::AbstractSchemaName {
                name: word.to_string(),
            },
            token.span,
        );
        let (has_as, variable) = self.optional_variable()?;
        let joins = if with_joins { self.joins()? } else { Vec::new() };
        Ok(self.node(
            K::RangeDeclaration {
                entity: entity.boxed(),
                has_as,
                variable,
                joins,
            },
            start,
        ))
    }

    fn derived_declaration(&mut self) -> Result<Expression> {
        let start = self.start();
        let path = self.path_or_variable(false)?;
        let (has_as, variable) = self.optional_variable()?;
        let joins = self.joins()?;
        Ok(self.node(
            K::DerivedDeclaration {
                path: path.boxed(),
                has_as,
                variable,
                joins,
            },
            start,
        ))
    }

    fn collection_member_declaration(&mut self) -> Result<Expression> {
        let start = self.start();
        self.expect_kw("IN")?;
        self.expect(TokenKind::LParen, "'('")?;
        let path = self.path_or_variable(true)?;
        self.expect(TokenKind::RParen, "')'")?;
        let (has_as, variable) = self.optional_variable()?;
        if variable.is_none() && !self.tolerant {
            return Err(self.error("expected identification variable"));
        }
        Ok(self.node(
            K::CollectionMemberDeclaration {
                path: path.boxed(),
                has_as,
                variable,
            },
            start,
        ))
    }

    fn optional_variable(&mut self) -> Result<(bool, Option<Box<Expression>>)> {
        let has_as = self.eat_kw("AS");
        if !has_as && !self.at_variable_name() {
            return Ok((false, None));
        }
        let start = self.start();
        let name = self.variable_name()?;
        Ok((
            has_as,
            Some(self.node(K::IdentificationVariable { name }, start).boxed()),
        ))
    }

    fn variable_name(&mut self) -> Result<String> {
        if !self.at_variable_name() {
            return Err(self.error("expected identification variable"));
        }
        Ok(self.advance().text(self.src).to_string())
    }

    fn at_join(&self) -> bool {
        self.at_kw("JOIN")
            || self.at_kws(&["INNER", "JOIN"])
            || self.at_kws(&["LEFT", "JOIN"])
            || self.at_kws(&["LEFT", "OUTER", "JOIN"])
    }

    fn joins(&mut self) -> Result<Vec<Expression>> {
        let mut joins = Vec::new();
        while self.at_join() {
            joins.push(self.join()?);
        }
        Ok(joins)
    }

    fn join(&mut self) -> Result<Expression> {
        let start = self.start();
        let join_kind = if self.eat_kw("LEFT") {
            JoinKind::Left {
                outer: self.eat_kw("OUTER"),
            }
        } else {
            JoinKind::Inner {
                explicit: self.eat_kw("INNER"),
            }
        };
        self.expect_kw("JOIN")?;
        let fetch = self.eat_kw("FETCH");
        let path = self.path_or_variable(false)?;
        let (has_as, variable) = self.optional_variable()?;
        if variable.is_none() && !fetch && !self.tolerant {
            return Err(self.error("expected identification variable"));
        }
        let on = if self.eat_kw("ON") {
            Some(self.conditional()?.boxed())
        } else {
            None
        };
        Ok(self.node(
            K::Join {
                join_kind,
                fetch,
                path: path.boxed(),
                has_as,
                variable,
                on,
            },
            start,
        ))
    }

    // ---- conditional expressions ---------------------------------------

    fn conditional(&mut self) -> Result<Expression> {
        let start = self.start();
        let mut left = self.conditional_term()?;
        while self.eat_kw("OR") {
            let right = self.conditional_term()?;
            left = self.node(
                K::Binary {
                    op: BinaryOp::Or,
                    left: left.boxed(),
                    right: right.boxed(),
                },
                start,
            );
        }
        Ok(left)
    }

    fn conditional_term(&mut self) -> Result<Expression> {
        let start = self.start();
        let mut left = self.conditional_factor()?;
        while self.eat_kw("AND") {
            let right = self.conditional_factor()?;
            left = self.node(
                K::Binary {
                    op: BinaryOp::And,
                    left: left.boxed(),
                    right: right.boxed(),
                },
                start,
            );
        }
        Ok(left)
    }

    fn conditional_factor(&mut self) -> Result<Expression> {
        let start = self.start();
        if self.at_kws(&["NOT", "EXISTS"]) {
            self.advance();
            return self.exists(start, true);
        }
        if self.eat_kw("NOT") {
            let operand = self.conditional_factor()?;
            return Ok(self.node(
                K::Not {
                    operand: operand.boxed(),
                },
                start,
            ));
        }
        if self.at_kw("EXISTS") {
            return self.exists(start, false);
        }
        let left = self.arithmetic()?;
        self.comparison_tail(start, left)
    }

    fn exists(&mut self, start: usize, not: bool) -> Result<Expression> {
        self.expect_kw("EXISTS")?;
        let subquery = self.parenthesized_subquery()?;
        Ok(self.node(
            K::Exists {
                not,
                subquery: subquery.boxed(),
            },
            start,
        ))
    }

    fn parenthesized_subquery(&mut self) -> Result<Expression> {
        self.expect(TokenKind::LParen, "'('")?;
        let sub = self.subquery()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(sub)
    }

    fn comparison_tail(&mut self, start: usize, left: Expression) -> Result<Expression> {
        let not = self.at_kw("NOT")
            && (self.is_word_at(1, "BETWEEN")
                || self.is_word_at(1, "LIKE")
                || self.is_word_at(1, "IN")
                || self.is_word_at(1, "MEMBER"));
        if not {
            self.advance();
        }

        if self.eat_kw("BETWEEN") {
            let lower = self.arithmetic()?;
            self.expect_kw("AND")?;
            let upper = self.arithmetic()?;
            return Ok(self.node(
                K::Between {
                    not,
                    expression: left.boxed(),
                    lower: lower.boxed(),
                    upper: upper.boxed(),
                },
                start,
            ));
        }
        if self.eat_kw("LIKE") {
            let pattern = self.arithmetic()?;
            let escape = if self.eat_kw("ESCAPE") {
                Some(self.arithmetic()?.boxed())
            } else {
                None
            };
            return Ok(self.node(
                K::Like {
                    not,
                    expression: left.boxed(),
                    pattern: pattern.boxed(),
                    escape,
                },
                start,
            ));
        }
        if self.eat_kw("IN") {
            return self.in_tail(start, not, left);
        }
        if self.eat_kw("MEMBER") {
            let of = self.eat_kw("OF");
            let collection = mark_collection(self.path_or_variable(true)?);
            return Ok(self.node(
                K::MemberOf {
                    not,
                    of,
                    entity: left.boxed(),
                    collection: collection.boxed(),
                },
                start,
            ));
        }
        if not {
            return Err(self.error("expected BETWEEN, LIKE, IN or MEMBER"));
        }
        if self.eat_kw("IS") {
            let not = self.eat_kw("NOT");
            if self.eat_kw("NULL") {
                return Ok(self.node(
                    K::IsNull {
                        not,
                        expression: left.boxed(),
                    },
                    start,
                ));
            }
            if self.eat_kw("EMPTY") {
                return Ok(self.node(
                    K::IsEmpty {
                        not,
                        expression: mark_collection(left).boxed(),
                    },
                    start,
                ));
            }
            return Err(self.error("expected NULL or EMPTY"));
        }

        let op = match self.peek().kind {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let mut right = self.arithmetic()?;
        let mut left = left;
        if is_type_function(&left) {
            right = as_type_literal(right);
        } else if is_type_function(&right) {
            left = as_type_literal(left);
        }
        Ok(self.node(
            K::Binary {
                op,
                left: left.boxed(),
                right: right.boxed(),
            },
            start,
        ))
    }

    fn in_tail(&mut self, start: usize, not: bool, left: Expression) -> Result<Expression> {
        let type_test = is_type_function(&left);
        if self.at(TokenKind::Parameter) {
            let item = self.primary()?;
            return Ok(self.node(
                K::In {
                    not,
                    expression: left.boxed(),
                    items: vec![item],
                    has_parens: false,
                },
                start,
            ));
        }
        self.expect(TokenKind::LParen, "'('")?;
        let mut items = Vec::new();
        if self.at_kw("SELECT") {
            items.push(self.subquery()?);
        } else {
            loop {
                let item = self.arithmetic()?;
                items.push(if type_test { as_type_literal(item) } else { item });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(self.node(
            K::In {
                not,
                expression: left.boxed(),
                items,
                has_parens: true,
            },
            start,
        ))
    }

    // ---- scalar expressions --------------------------------------------

    fn arithmetic(&mut self) -> Result<Expression> {
        let start = self.start();
        let mut left = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = self.node(
                K::Binary {
                    op,
                    left: left.boxed(),
                    right: right.boxed(),
                },
                start,
            );
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expression> {
        let start = self.start();
        let mut left = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = self.node(
                K::Binary {
                    op,
                    left: left.boxed(),
                    right: right.boxed(),
                },
                start,
            );
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expression> {
        let start = self.start();
        let sign = match self.peek().kind {
            TokenKind::Plus => Sign::Plus,
            TokenKind::Minus => Sign::Minus,
            _ => return self.primary(),
        };
        self.advance();
        let operand = self.factor()?;
        Ok(self.node(
            K::Unary {
                sign,
                operand: operand.boxed(),
            },
            start,
        ))
    }

    fn primary(&mut self) -> Result<Expression> {
        let start = self.start();
        let token = self.peek();
        match token.kind {
            TokenKind::LParen => {
                self.advance();
                let inner = if self.at_kw("SELECT") {
                    self.subquery()?
                } else {
                    self.conditional()?
                };
                self.expect(TokenKind::RParen, "')'")?;
                Ok(self.node(
                    K::Parenthesized {
                        expression: inner.boxed(),
                    },
                    start,
                ))
            }
            TokenKind::String { terminated } => {
                self.advance();
                Ok(self.node(
                    K::StringLiteral {
                        text: token.text(self.src).to_string(),
                        terminated,
                    },
                    start,
                ))
            }
            TokenKind::Number { valid } => {
                self.advance();
                Ok(self.node(
                    K::NumericLiteral {
                        text: token.text(self.src).to_string(),
                        valid,
                    },
                    start,
                ))
            }
            TokenKind::Parameter => {
                self.advance();
                Ok(self.node(
                    K::InputParameter {
                        text: token.text(self.src).to_string(),
                    },
                    start,
                ))
            }
            TokenKind::Word => self.word_primary(start),
            _ => Err(self.error("expected expression")),
        }
    }

    fn word_primary(&mut self, start: usize) -> Result<Expression> {
        let word = self.word_at(0).unwrap_or_default();
        let upper = word.to_ascii_uppercase();
        let call = self.peek_at(1).kind == TokenKind::LParen;

        match upper.as_str() {
            "TRUE" | "FALSE" => {
                self.advance();
                return Ok(self.node(
                    K::BooleanLiteral {
                        value: upper == "TRUE",
                    },
                    start,
                ));
            }
            "NULL" => {
                self.advance();
                return Ok(self.node(K::NullLiteral, start));
            }
            "CASE" => return self.case_expression(start),
            "NEW" => return self.constructor(start),
            "TREAT" if call => return Err(JpqlError::not_implemented("TREAT expression")),
            "TRIM" if call => return self.trim(start),
            "FUNCTION" if call => return self.sql_function(start),
            "ALL" | "ANY" | "SOME" if call => {
                self.advance();
                let subquery = self.parenthesized_subquery()?;
                return Ok(self.node(
                    K::AllOrAny {
                        keyword: upper,
                        subquery: subquery.boxed(),
                    },
                    start,
                ));
            }
            "EXISTS" if call => return self.exists(start, false),
            _ => {}
        }
        if DATE_TIME.contains(&upper.as_str()) {
            self.advance();
            return Ok(self.node(K::DateTime { keyword: upper }, start));
        }
        if call && AGGREGATES.contains(&upper.as_str()) {
            return self.aggregate(start, upper);
        }
        if call {
            if let Some(&(_, min, max)) = FUNCTIONS.iter().find(|(name, _, _)| *name == upper) {
                return self.function_call(start, upper, min, max);
            }
            return Err(self.error(&format!("unknown function '{word}'")));
        }
        if Self::is_reserved(word) {
            return Err(self.error("expected expression"));
        }
        self.path_or_variable(false)
    }

    /// `var` or `var.a.b`; a trailing dot is an incomplete path.
    fn path_or_variable(&mut self, collection_valued: bool) -> Result<Expression> {
        let start = self.start();
        let Some(root) = self.word_at(0) else {
            return Err(self.error("expected path expression"));
        };
        self.advance();
        let mut segments: Segments = SmallVec::new();
        segments.push(root.to_string());
        while self.at(TokenKind::Dot) {
            self.advance();
            // A reserved word after the dot starts the next clause or operator.
            match self.word_at(0).filter(|w| !Self::is_reserved(w)) {
                Some(segment) => {
                    self.advance();
                    segments.push(segment.to_string());
                }
                None if self.tolerant => {
                    let span = self.span_from(start);
                    self.diagnostics.push(Diagnostic::error(
                        span,
                        DiagnosticKey::IncompletePathExpression,
                        format!("incomplete path expression '{}'", self.slice(span)),
                    ));
                    return Ok(self.unknown(span));
                }
                None => return Err(self.error("expected path segment after '.'")),
            }
        }
        if segments.len() == 1 {
            return Ok(self.node(
                K::IdentificationVariable {
                    name: root.to_string(),
                },
                start,
            ));
        }
        Ok(self.node(
            K::Path {
                segments,
                collection_valued,
            },
            start,
        ))
    }

    fn arguments(&mut self) -> Result<Vec<Expression>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.arithmetic()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn function_call(
        &mut self,
        start: usize,
        name: String,
        min: usize,
        max: usize,
    ) -> Result<Expression> {
        self.advance();
        let mut arguments = self.arguments()?;
        if arguments.len() < min || arguments.len() > max {
            return Err(JpqlError::Parse(ParseError::new(
                start,
                format!("{} argument(s)", arguments.len()),
                format!("wrong number of arguments for {name}"),
            )));
        }
        if name == "SIZE" {
            arguments = arguments.into_iter().map(mark_collection).collect();
        }
        Ok(self.node(K::FunctionCall { name, arguments }, start))
    }

    fn aggregate(&mut self, start: usize, name: String) -> Result<Expression> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let distinct = self.eat_kw("DISTINCT");
        let argument = self.arithmetic()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(self.node(
            K::Aggregate {
                name,
                distinct,
                argument: argument.boxed(),
            },
            start,
        ))
    }

    fn constructor(&mut self, start: usize) -> Result<Expression> {
        self.expect_kw("NEW")?;
        let mut class_name = match self.word_at(0) {
            Some(word) => word.to_string(),
            None => return Err(self.error("expected class name")),
        };
        self.advance();
        while self.at(TokenKind::Dot) {
            self.advance();
            let Some(part) = self.word_at(0) else {
                return Err(self.error("expected class name segment"));
            };
            self.advance();
            class_name.push('.');
            class_name.push_str(part);
        }
        let arguments = self.arguments()?;
        if arguments.is_empty() {
            return Err(self.error("expected constructor argument"));
        }
        Ok(self.node(
            K::Constructor {
                class_name,
                arguments,
            },
            start,
        ))
    }

    fn trim(&mut self, start: usize) -> Result<Expression> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let specification = if self.eat_kw("LEADING") {
            Some(TrimSpec::Leading)
        } else if self.eat_kw("TRAILING") {
            Some(TrimSpec::Trailing)
        } else if self.eat_kw("BOTH") {
            Some(TrimSpec::Both)
        } else {
            None
        };
        let (character, has_from, string) = if self.eat_kw("FROM") {
            (None, true, self.arithmetic()?)
        } else {
            let first = self.arithmetic()?;
            if self.eat_kw("FROM") {
                (Some(first.boxed()), true, self.arithmetic()?)
            } else {
                (None, false, first)
            }
        };
        self.expect(TokenKind::RParen, "')'")?;
        Ok(self.node(
            K::Trim {
                specification,
                character,
                has_from,
                string: string.boxed(),
            },
            start,
        ))
    }

    fn sql_function(&mut self, start: usize) -> Result<Expression> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let name = self.peek();
        if !matches!(name.kind, TokenKind::String { terminated: true }) {
            return Err(self.error("expected function name string"));
        }
        self.advance();
        let mut arguments = Vec::new();
        while self.eat(TokenKind::Comma) {
            arguments.push(self.arithmetic()?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(self.node(
            K::SqlFunction {
                function_name: name.text(self.src).to_string(),
                arguments,
            },
            start,
        ))
    }

    fn case_expression(&mut self, start: usize) -> Result<Expression> {
        self.expect_kw("CASE")?;
        let operand = if self.at_kw("WHEN") {
            None
        } else {
            Some(self.arithmetic()?.boxed())
        };
        let mut whens = Vec::new();
        while self.at_kw("WHEN") {
            let when_start = self.start();
            self.advance();
            let condition = if operand.is_some() {
                self.arithmetic()?
            } else {
                self.conditional()?
            };
            self.expect_kw("THEN")?;
            let result = self.arithmetic()?;
            whens.push(self.node(
                K::When {
                    condition: condition.boxed(),
                    result: result.boxed(),
                },
                when_start,
            ));
        }
        if whens.is_empty() {
            return Err(self.error("expected WHEN"));
        }
        self.expect_kw("ELSE")?;
        let otherwise = self.arithmetic()?;
        self.expect_kw("END")?;
        Ok(self.node(
            K::Case {
                operand,
                whens,
                otherwise: otherwise.boxed(),
            },
            start,
        ))
    }
}

fn is_type_function(expr: &Expression) -> bool {
    matches!(&expr.kind, K::FunctionCall { name, .. } if name == "TYPE")
}

fn as_type_literal(expr: Expression) -> Expression {
    match expr.kind {
        K::IdentificationVariable { name } => Expression::new(K::EntityTypeLiteral { name }, expr.span),
        kind => Expression::new(kind, expr.span),
    }
}

fn mark_collection(expr: Expression) -> Expression {
    match expr.kind {
        K::Path { segments, .. } => Expression::new(
            K::Path {
                segments,
                collection_valued: true,
            },
            expr.span,
        ),
        kind => Expression::new(kind, expr.span),
    }
}
