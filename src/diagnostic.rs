#![forbid(unsafe_code)]

//! Diagnostics collected by the tolerant parser and the validators.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::parser::Span;

/// Machine-readable diagnostic keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKey {
    /// Path ends with a dot (`e.`).
    IncompletePathExpression,
    /// Tokens could not be parsed and were replaced by a placeholder.
    UnexpectedToken,
    /// A placeholder node reached the grammar validator.
    IncompleteExpression,
    /// Identifier not defined by the grammar.
    IdentifierNotSupported,
    /// Function-style identifier has no expression factory in the grammar.
    ExpressionFactoryNotSupported,
    /// `JOIN FETCH path var` in a grammar that forbids the variable.
    JoinFetchIdentificationVariableNotAllowed,
    /// `JOIN FETCH ... ON`.
    JoinFetchOnNotAllowed,
    /// SELECT clause without items.
    SelectClauseEmpty,
    /// FROM clause without declarations.
    FromClauseEmpty,
    /// Range declaration without an identification variable.
    MissingIdentificationVariable,
    /// String literal without closing quote.
    StringLiteralUnterminated,
    /// Numeric literal that does not parse.
    NumericLiteralMalformed,
    /// Entity name unknown to the metadata provider.
    AbstractSchemaNameUnknown,
    /// Identification variable declared twice in one scope.
    IdentificationVariableDuplicate,
    /// Identification variable used but never declared.
    IdentificationVariableNotDeclared,
    /// Path segment has no mapping.
    PathNotResolvable,
    /// Collection-valued path used where a single value is required.
    StateFieldPathCollectionType,
    /// Single-valued path used where a collection is required.
    CollectionPathNotCollection,
    /// JOIN FETCH attached to a non-range declaration.
    JoinFetchNotInRangeDeclaration,
    /// Comparison operands of incompatible types.
    ComparisonTypeMismatch,
    /// LIKE applied to a non-string operand.
    LikeRequiresString,
    /// Arithmetic applied to a non-numeric operand.
    ArithmeticRequiresNumeric,
    /// Constructor class unknown to the metadata provider.
    ConstructorClassUnknown,
    /// Entity type literal unknown to the metadata provider.
    EntityTypeLiteralUnknown,
    /// Enum type exists but does not declare the constant.
    EnumConstantUnknown,
}

impl DiagnosticKey {
    /// Stable code, suitable for tooling and message catalogs.
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKey::IncompletePathExpression => "INCOMPLETE_PATH_EXPRESSION",
            DiagnosticKey::UnexpectedToken => "UNEXPECTED_TOKEN",
            DiagnosticKey::IncompleteExpression => "INCOMPLETE_EXPRESSION",
            DiagnosticKey::IdentifierNotSupported => "IDENTIFIER_NOT_SUPPORTED",
            DiagnosticKey::ExpressionFactoryNotSupported => "EXPRESSION_FACTORY_NOT_SUPPORTED",
            DiagnosticKey::JoinFetchIdentificationVariableNotAllowed => {
                "JOIN_FETCH_IDENTIFICATION_VARIABLE_NOT_ALLOWED"
            }
            DiagnosticKey::JoinFetchOnNotAllowed => "JOIN_FETCH_ON_NOT_ALLOWED",
            DiagnosticKey::SelectClauseEmpty => "SELECT_CLAUSE_EMPTY",
            DiagnosticKey::FromClauseEmpty => "FROM_CLAUSE_EMPTY",
            DiagnosticKey::MissingIdentificationVariable => "MISSING_IDENTIFICATION_VARIABLE",
            DiagnosticKey::StringLiteralUnterminated => "STRING_LITERAL_UNTERMINATED",
            DiagnosticKey::NumericLiteralMalformed => "NUMERIC_LITERAL_MALFORMED",
            DiagnosticKey::AbstractSchemaNameUnknown => "ABSTRACT_SCHEMA_NAME_UNKNOWN",
            DiagnosticKey::IdentificationVariableDuplicate => "IDENTIFICATION_VARIABLE_DUPLICATE",
            DiagnosticKey::IdentificationVariableNotDeclared => {
                "IDENTIFICATION_VARIABLE_NOT_DECLARED"
            }
            DiagnosticKey::PathNotResolvable => "PATH_NOT_RESOLVABLE",
            DiagnosticKey::StateFieldPathCollectionType => "STATE_FIELD_PATH_COLLECTION_TYPE",
            DiagnosticKey::CollectionPathNotCollection => "COLLECTION_PATH_NOT_COLLECTION",
            DiagnosticKey::JoinFetchNotInRangeDeclaration => "JOIN_FETCH_NOT_IN_RANGE_DECLARATION",
            DiagnosticKey::ComparisonTypeMismatch => "COMPARISON_TYPE_MISMATCH",
            DiagnosticKey::LikeRequiresString => "LIKE_REQUIRES_STRING",
            DiagnosticKey::ArithmeticRequiresNumeric => "ARITHMETIC_REQUIRES_NUMERIC",
            DiagnosticKey::ConstructorClassUnknown => "CONSTRUCTOR_CLASS_UNKNOWN",
            DiagnosticKey::EntityTypeLiteralUnknown => "ENTITY_TYPE_LITERAL_UNKNOWN",
            DiagnosticKey::EnumConstantUnknown => "ENUM_CONSTANT_UNKNOWN",
        }
    }
}

impl fmt::Display for DiagnosticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for DiagnosticKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The query is invalid.
    Error,
    /// The query is valid but suspicious.
    Warning,
}

/// One finding, positioned in the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Source range the diagnostic applies to.
    pub span: Span,
    /// Machine-readable key.
    pub key: DiagnosticKey,
    /// Human readable message.
    pub message: String,
    /// Severity.
    pub severity: Severity,
}

impl Diagnostic {
    /// Builds an error diagnostic.
    pub fn error(span: Span, key: DiagnosticKey, message: impl Into<String>) -> Self {
        Self {
            span,
            key,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Builds a warning diagnostic.
    pub fn warning(span: Span, key: DiagnosticKey, message: impl Into<String>) -> Self {
        Self {
            span,
            key,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}..{}: {}",
            self.key, self.span.start, self.span.end, self.message
        )
    }
}

/// Sorts diagnostics by source position, keeping discovery order for ties.
pub fn sort_by_position(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.span.start);
}
