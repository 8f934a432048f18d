#![forbid(unsafe_code)]

//! JPQL parsing.
//!
//! [`Parser::parse`] turns query text into an immutable [`Expression`] tree,
//! rooted at the production named by a BNF rule id of the selected grammar.
//! The parser accepts the union of every shipped grammar's syntax; checking a
//! tree against one particular grammar is the job of
//! [`GrammarValidator`](crate::validation::GrammarValidator).
//!
//! In tolerant mode malformed input never aborts the parse: the offending
//! tokens become [`ExpressionKind::Unknown`] placeholders and a [`Diagnostic`]
//! is recorded, which is what editors need for content assist and
//! refactoring of half-typed queries.

pub mod ast;
mod descent;
pub(crate) mod lexer;

use serde::Serialize;
use tracing::debug;

use crate::diagnostic::Diagnostic;
use crate::error::Result;
use crate::grammar::{bnf_ids, Grammar};
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};

pub use ast::{
    BinaryOp, Expression, ExpressionKind, JoinKind, Ordering, Segments, Sign, Span, TrimSpec,
};

/// Parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Replace malformed fragments by placeholders instead of failing.
    pub tolerant: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { tolerant: true }
    }
}

/// A parsed query or fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JpqlExpression {
    text: String,
    bnf_id: String,
    grammar: String,
    root: Expression,
    diagnostics: Vec<Diagnostic>,
}

impl JpqlExpression {
    /// Source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// BNF rule the text was parsed against.
    pub fn bnf_id(&self) -> &str {
        &self.bnf_id
    }

    /// Name of the grammar used.
    pub fn grammar_name(&self) -> &str {
        &self.grammar
    }

    /// Root node.
    pub fn root(&self) -> &Expression {
        &self.root
    }

    /// Diagnostics recorded by a tolerant parse.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether the tree contains placeholder nodes.
    pub fn is_incomplete(&self) -> bool {
        self.root.has_unknown()
    }

    /// Source text covered by `span`.
    pub fn slice(&self, span: Span) -> &str {
        self.text.get(span.start..span.end).unwrap_or_default()
    }
}

/// Entry point for parsing JPQL text.
pub struct Parser;

impl Parser {
    /// Parses `text` starting at the production named `bnf_id`.
    ///
    /// Fails with [`GrammarError::UnknownBnf`](crate::error::GrammarError::UnknownBnf)
    /// when the grammar does not define the rule, with a
    /// [`ParseError`](crate::error::ParseError) on malformed input when
    /// `tolerant` is false, and with `NotImplemented` for `TREAT`.
    pub fn parse(
        grammar: &Grammar,
        text: &str,
        bnf_id: &str,
        tolerant: bool,
    ) -> Result<JpqlExpression> {
        Self::parse_with(grammar, text, bnf_id, ParseOptions { tolerant })
    }

    /// Parses a full statement tolerantly.
    pub fn parse_statement(grammar: &Grammar, text: &str) -> Result<JpqlExpression> {
        Self::parse_with(grammar, text, bnf_ids::QL_STATEMENT, ParseOptions::default())
    }

    /// Parses with explicit options.
    pub fn parse_with(
        grammar: &Grammar,
        text: &str,
        bnf_id: &str,
        options: ParseOptions,
    ) -> Result<JpqlExpression> {
        let rule = grammar.bnf(bnf_id)?;
        let timer = profile_timer();
        debug!(
            grammar = grammar.name(),
            bnf = bnf_id,
            tolerant = options.tolerant,
            "parser.parse.start"
        );
        let outcome = descent::parse_entry(text, rule.entry, options.tolerant);
        record_profile_timer(QueryProfileKind::Parse, timer);
        let (root, diagnostics) = outcome?;
        debug!(
            grammar = grammar.name(),
            root = root.kind_name(),
            diagnostics = diagnostics.len(),
            "parser.parse.completed"
        );
        Ok(JpqlExpression {
            text: text.to_string(),
            bnf_id: rule.id.to_string(),
            grammar: grammar.name().to_string(),
            root,
            diagnostics,
        })
    }
}
