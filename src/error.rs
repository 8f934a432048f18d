use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, JpqlError>;

/// Grammar-registry failures. These indicate a programming or configuration
/// mistake rather than bad query text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// The requested BNF rule is not defined by the grammar or its base chain.
    #[error("unknown BNF rule '{id}' in grammar {grammar}")]
    UnknownBnf {
        /// Requested rule identifier.
        id: String,
        /// Name of the grammar that was searched.
        grammar: String,
    },
    /// The requested JPQL identifier is not defined by the grammar.
    #[error("unknown JPQL identifier '{identifier}' in grammar {grammar}")]
    UnknownIdentifier {
        /// Requested identifier.
        identifier: String,
        /// Name of the grammar that was searched.
        grammar: String,
    },
    /// No grammar is registered under the supplied name.
    #[error("unknown grammar '{0}'")]
    UnknownGrammar(String),
}

/// Malformed input encountered by a strict (non-tolerant) parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at offset {position}: {message} (found {found})")]
pub struct ParseError {
    /// Byte offset of the offending token.
    pub position: usize,
    /// Text of the offending token, or `end of input`.
    pub found: String,
    /// Human readable description.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, found: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            position,
            found: found.into(),
            message: message.into(),
        }
    }
}

/// Top-level error type for the crate.
#[derive(Debug, Error)]
pub enum JpqlError {
    /// Grammar registry error.
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    /// Strict parse failure.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The operation is recognised but has no implementation.
    #[error("not yet implemented: {operation}")]
    NotImplemented {
        /// Operation that was requested.
        operation: &'static str,
    },
    /// Metadata could not be loaded or is inconsistent.
    #[error("metadata error: {0}")]
    Metadata(String),
    /// Invalid argument supplied by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// TOML deserialization error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl JpqlError {
    pub(crate) fn not_implemented(operation: &'static str) -> Self {
        JpqlError::NotImplemented { operation }
    }
}
