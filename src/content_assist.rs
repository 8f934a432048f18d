#![forbid(unsafe_code)]

//! Completion proposals at a cursor position.
//!
//! Proposals are computed from the tokens in front of the cursor and the
//! declarations of a [`QueryContext`] built from the same (usually
//! incomplete) text:
//!
//! * after `var.` or `var.a.b.`: attribute names of the resolved type;
//! * after `FROM`, `UPDATE`, `JOIN` or a comma inside a FROM clause: entity
//!   names (`JOIN` also offers identification variables);
//! * anywhere else: the identification variables visible at the cursor and
//!   the identifiers of the context's grammar.
//!
//! Every list is filtered by the partially typed word under the cursor,
//! case-insensitively.

use serde::Serialize;
use tracing::debug;

use crate::parser::lexer::{tokenize, Token, TokenKind};
use crate::parser::Span;
use crate::query::context::{QueryContext, ScopeId};

/// What a proposal inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    /// Attribute of the type reached by the path in front of the cursor.
    Attribute,
    /// Entity (abstract schema) name.
    Entity,
    /// Identification variable visible at the cursor.
    IdentificationVariable,
    /// Reserved identifier of the grammar.
    Identifier,
}

/// One completion proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proposal {
    /// Proposal kind.
    pub kind: ProposalKind,
    /// Text to insert.
    pub label: String,
    /// Range of the query text the label replaces.
    pub replace: Span,
}

const CLAUSE_WORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "UPDATE", "SET", "DELETE",
];

/// Proposals for `cursor`, a byte offset into the context's query text.
///
/// Returns nothing when the context has no parsed expression or the cursor
/// is outside the text.
pub fn proposals(context: &QueryContext<'_>, cursor: usize) -> Vec<Proposal> {
    let Some(expression) = context.expression() else {
        return Vec::new();
    };
    let text = expression.text();
    if cursor > text.len() || !text.is_char_boundary(cursor) {
        return Vec::new();
    }
    let tokens = tokenize(text);
    let (prefix, replace) = typed_prefix(text, &tokens, cursor);
    let before: Vec<&Token> = tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Eof && t.span.end <= replace.start)
        .collect();

    let scope = context.scope_for(Span::new(cursor, cursor));
    let mut out = Vec::new();
    match Position::of(text, &before) {
        Position::Path(segments) => {
            attribute_proposals(context, scope, &segments, prefix, replace, &mut out)
        }
        Position::Entity { after_join } => {
            if after_join {
                variable_proposals(context, scope, prefix, replace, &mut out);
            }
            entity_proposals(context, prefix, replace, &mut out);
        }
        Position::NewVariable => {}
        Position::Other => {
            variable_proposals(context, scope, prefix, replace, &mut out);
            identifier_proposals(context, prefix, replace, &mut out);
        }
    }
    debug!(cursor, prefix, proposals = out.len(), "content_assist.proposals");
    out
}

enum Position {
    Path(Vec<String>),
    Entity { after_join: bool },
    NewVariable,
    Other,
}

impl Position {
    fn of(text: &str, before: &[&Token]) -> Position {
        let Some(last) = before.last() else {
            return Position::Other;
        };
        match last.kind {
            TokenKind::Dot => match path_in_front(text, before) {
                Some(segments) => Position::Path(segments),
                None => Position::Other,
            },
            TokenKind::Comma if in_from_clause(text, before) => {
                Position::Entity { after_join: false }
            }
            TokenKind::Word => {
                let word = last.text(text);
                if word.eq_ignore_ascii_case("FROM") || word.eq_ignore_ascii_case("UPDATE") {
                    Position::Entity { after_join: false }
                } else if word.eq_ignore_ascii_case("JOIN") || word.eq_ignore_ascii_case("FETCH")
                {
                    Position::Entity { after_join: true }
                } else if word.eq_ignore_ascii_case("AS") {
                    Position::NewVariable
                } else {
                    Position::Other
                }
            }
            _ => Position::Other,
        }
    }
}

/// Word under the cursor up to the cursor, and the range it occupies.
fn typed_prefix<'t>(text: &'t str, tokens: &[Token], cursor: usize) -> (&'t str, Span) {
    tokens
        .iter()
        .find(|t| t.kind == TokenKind::Word && t.span.start < cursor && cursor <= t.span.end)
        .map(|t| {
            let span = Span::new(t.span.start, cursor);
            (&text[span.start..span.end], span)
        })
        .unwrap_or(("", Span::new(cursor, cursor)))
}

/// `ident(.ident)*.` ending the token list, root first.
fn path_in_front(text: &str, before: &[&Token]) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut idx = before.len().checked_sub(2)?;
    loop {
        let token = before.get(idx)?;
        if token.kind != TokenKind::Word {
            return None;
        }
        segments.push(token.text(text).to_string());
        let Some(dot) = idx.checked_sub(1) else {
            break;
        };
        if before[dot].kind != TokenKind::Dot {
            break;
        }
        idx = dot.checked_sub(1)?;
    }
    segments.reverse();
    Some(segments)
}

fn in_from_clause(text: &str, before: &[&Token]) -> bool {
    let mut depth = 0i32;
    for token in before.iter().rev() {
        match token.kind {
            TokenKind::RParen => depth += 1,
            TokenKind::LParen => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            TokenKind::Word if depth == 0 => {
                let word = token.text(text);
                if let Some(clause) = CLAUSE_WORDS
                    .iter()
                    .find(|c| word.eq_ignore_ascii_case(c))
                {
                    return *clause == "FROM";
                }
            }
            _ => {}
        }
    }
    false
}

fn matches_prefix(candidate: &str, prefix: &str) -> bool {
    candidate.len() >= prefix.len()
        && candidate.is_char_boundary(prefix.len())
        && candidate[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn attribute_proposals(
    context: &QueryContext<'_>,
    scope: ScopeId,
    segments: &[String],
    prefix: &str,
    replace: Span,
    out: &mut Vec<Proposal>,
) {
    let Some((root, rest)) = segments.split_first() else {
        return;
    };
    let provider = context.provider();
    let Some(mut type_name) = context.variable_type(scope, root).map(str::to_string) else {
        return;
    };
    for segment in rest {
        let Some(mapping) = provider.attribute(&type_name, segment) else {
            return;
        };
        type_name = mapping.target_type().to_string();
    }
    out.extend(
        provider
            .attribute_names(&type_name)
            .into_iter()
            .filter(|name| matches_prefix(name, prefix))
            .map(|name| Proposal {
                kind: ProposalKind::Attribute,
                label: name.to_string(),
                replace,
            }),
    );
}

fn entity_proposals(
    context: &QueryContext<'_>,
    prefix: &str,
    replace: Span,
    out: &mut Vec<Proposal>,
) {
    out.extend(
        context
            .provider()
            .entities()
            .into_iter()
            .filter_map(|ty| ty.entity_name())
            .filter(|name| matches_prefix(name, prefix))
            .map(|name| Proposal {
                kind: ProposalKind::Entity,
                label: name.to_string(),
                replace,
            }),
    );
}

fn variable_proposals(
    context: &QueryContext<'_>,
    scope: ScopeId,
    prefix: &str,
    replace: Span,
    out: &mut Vec<Proposal>,
) {
    let mut seen: Vec<String> = Vec::new();
    let mut current = context.scope(scope);
    while let Some(s) = current {
        for declaration in s.declarations() {
            let joined = declaration.joins().iter().filter_map(|j| j.variable.as_deref());
            for name in declaration.variable().into_iter().chain(joined) {
                let key = name.to_lowercase();
                if seen.contains(&key) || !matches_prefix(name, prefix) {
                    continue;
                }
                seen.push(key);
                out.push(Proposal {
                    kind: ProposalKind::IdentificationVariable,
                    label: name.to_string(),
                    replace,
                });
            }
        }
        current = s.parent.and_then(|p| context.scope(p));
    }
}

fn identifier_proposals(
    context: &QueryContext<'_>,
    prefix: &str,
    replace: Span,
    out: &mut Vec<Proposal>,
) {
    out.extend(
        context
            .grammar()
            .identifiers()
            .into_iter()
            .filter(|info| matches_prefix(info.identifier, prefix))
            .map(|info| Proposal {
                kind: ProposalKind::Identifier,
                label: info.identifier.to_string(),
                replace,
            }),
    );
}
