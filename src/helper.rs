#![forbid(unsafe_code)]

//! One-stop facade over a single query.
//!
//! [`QueryHelper`] parses the query once, keeps the resolved
//! [`QueryContext`] and hands out everything an editor needs: diagnostics,
//! completion proposals, parameter types, formatted text and a
//! [`RefactoringTool`].

use std::sync::Arc;

use tracing::debug;

use crate::content_assist::{self, Proposal};
use crate::diagnostic::{sort_by_position, Diagnostic};
use crate::error::{JpqlError, Result};
use crate::grammar::{bnf_ids, Grammar};
use crate::model::{build_state, Formatter, IdentifierStyle};
use crate::parser::{Expression, ExpressionKind as K, JpqlExpression, ParseOptions, Parser};
use crate::query::context::QueryContext;
use crate::query::metadata::ManagedTypeProvider;
use crate::refactor::RefactoringTool;
use crate::validation::{GrammarValidator, SemanticValidator, TypeCategory};

/// Settings for a [`QueryHelper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperOptions {
    /// Parse tolerantly.
    pub tolerant: bool,
    /// BNF rule queries are parsed against.
    pub bnf_id: String,
    /// Identifier case used by [`QueryHelper::format`].
    pub identifier_style: IdentifierStyle,
}

impl Default for HelperOptions {
    fn default() -> Self {
        Self {
            tolerant: true,
            bnf_id: bnf_ids::QL_STATEMENT.to_string(),
            identifier_style: IdentifierStyle::Uppercase,
        }
    }
}

/// Parse, validation, content assist and refactoring for one query.
pub struct QueryHelper<'p> {
    grammar: Arc<Grammar>,
    provider: &'p dyn ManagedTypeProvider,
    options: HelperOptions,
    context: Option<QueryContext<'p>>,
}

impl<'p> QueryHelper<'p> {
    /// Helper with default options.
    pub fn new(grammar: Arc<Grammar>, provider: &'p dyn ManagedTypeProvider) -> Self {
        Self::with_options(grammar, provider, HelperOptions::default())
    }

    /// Helper with explicit options.
    pub fn with_options(
        grammar: Arc<Grammar>,
        provider: &'p dyn ManagedTypeProvider,
        options: HelperOptions,
    ) -> Self {
        Self {
            grammar,
            provider,
            options,
            context: None,
        }
    }

    /// Options in effect.
    pub fn options(&self) -> &HelperOptions {
        &self.options
    }

    /// Grammar in use.
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Parses `text` and rebuilds the context. A failed parse clears the
    /// previous query.
    pub fn set_query(&mut self, text: &str) -> Result<&JpqlExpression> {
        self.context = None;
        let expression = Parser::parse_with(
            &self.grammar,
            text,
            &self.options.bnf_id,
            ParseOptions {
                tolerant: self.options.tolerant,
            },
        )?;
        let mut context = QueryContext::new(Arc::clone(&self.grammar), self.provider);
        context.set_expression(&expression);
        debug!(
            grammar = self.grammar.name(),
            incomplete = expression.is_incomplete(),
            "helper.query.set"
        );
        let context = self.context.insert(context);
        context
            .expression()
            .ok_or_else(|| JpqlError::InvalidArgument("query context lost its expression".into()))
    }

    /// Parsed query, if one was set.
    pub fn query(&self) -> Option<&JpqlExpression> {
        self.context.as_ref().and_then(|c| c.expression())
    }

    /// Resolved context of the current query.
    pub fn context(&self) -> Option<&QueryContext<'p>> {
        self.context.as_ref()
    }

    /// Diagnostics recorded while parsing.
    pub fn parse_diagnostics(&self) -> &[Diagnostic] {
        self.query().map(|q| q.diagnostics()).unwrap_or_default()
    }

    /// Grammar diagnostics for the current query.
    pub fn validate_grammar(&self) -> Vec<Diagnostic> {
        self.query()
            .map(|q| GrammarValidator::new(&self.grammar).validate(q))
            .unwrap_or_default()
    }

    /// Semantic diagnostics for the current query.
    pub fn validate_semantics(&self) -> Vec<Diagnostic> {
        self.context
            .as_ref()
            .map(|c| SemanticValidator::new(c).validate())
            .unwrap_or_default()
    }

    /// Parse, grammar and semantic diagnostics, ordered by position.
    ///
    /// Diagnostics at the same position keep the pass order.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut all = self.parse_diagnostics().to_vec();
        all.extend(self.validate_grammar());
        all.extend(self.validate_semantics());
        sort_by_position(&mut all);
        all
    }

    /// Completion proposals at `cursor`.
    pub fn content_assist(&self, cursor: usize) -> Vec<Proposal> {
        self.context
            .as_ref()
            .map(|c| content_assist::proposals(c, cursor))
            .unwrap_or_default()
    }

    /// Type expected for the input parameter `name` (`:name` or `?1`).
    ///
    /// The type comes from the first expression the parameter is compared
    /// with, tested against or assigned to.
    pub fn parameter_type(&self, name: &str) -> Option<TypeCategory> {
        let context = self.context.as_ref()?;
        let root = context.expression()?.root();
        let validator = SemanticValidator::new(context);
        let mut found = None;
        root.walk(&mut |node| {
            if found.is_some() {
                return;
            }
            if let Some(partner) = parameter_partner(node, name) {
                let scope = context.scope_for(node.span);
                found = match partner {
                    Partner::Expression(expr) => validator.category(expr, scope),
                    Partner::String => Some(TypeCategory::String),
                };
            }
        });
        found
    }

    /// Current query in canonical form.
    pub fn format(&self) -> Result<String> {
        let query = self
            .query()
            .ok_or_else(|| JpqlError::InvalidArgument("no query set".into()))?;
        let formatter = Formatter::new(self.options.identifier_style)?;
        Ok(formatter.format(&build_state(query.root())))
    }

    /// Refactoring tool over the current query text.
    pub fn refactoring_tool(&self) -> Result<RefactoringTool<'p>> {
        let query = self
            .query()
            .ok_or_else(|| JpqlError::InvalidArgument("no query set".into()))?;
        let mut tool = RefactoringTool::with_bnf(
            Arc::clone(&self.grammar),
            self.provider,
            query.text(),
            query.bnf_id(),
        );
        tool.set_formatter(Formatter::new(self.options.identifier_style)?);
        Ok(tool)
    }
}

enum Partner<'a> {
    Expression(&'a Expression),
    String,
}

fn is_parameter(expr: &Expression, name: &str) -> bool {
    matches!(&expr.kind, K::InputParameter { text } if text == name)
}

fn parameter_partner<'a>(node: &'a Expression, name: &str) -> Option<Partner<'a>> {
    match &node.kind {
        K::Binary { op, left, right } if op.is_comparison() || op.is_arithmetic() => {
            if is_parameter(left, name) {
                Some(Partner::Expression(right))
            } else if is_parameter(right, name) {
                Some(Partner::Expression(left))
            } else {
                None
            }
        }
        K::Between {
            expression,
            lower,
            upper,
            ..
        } => {
            if is_parameter(expression, name) {
                Some(Partner::Expression(lower))
            } else if is_parameter(lower, name) || is_parameter(upper, name) {
                Some(Partner::Expression(expression))
            } else {
                None
            }
        }
        K::Like {
            expression,
            pattern,
            ..
        } if is_parameter(expression, name) || is_parameter(pattern, name) => {
            Some(Partner::String)
        }
        K::In {
            expression, items, ..
        } if items.iter().any(|item| is_parameter(item, name)) => {
            Some(Partner::Expression(expression))
        }
        K::UpdateItem { path, value } if is_parameter(value, name) => {
            Some(Partner::Expression(path))
        }
        _ => None,
    }
}
