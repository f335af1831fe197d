//! Fatal error taxonomy for the Vague engine.
//!
//! Matches the error tags named in the external interface: lex/parse errors
//! carry a source location, generation-time errors carry the schema/field
//! context that triggered them. Recoverable problems are never represented
//! here — see [`crate::warning`] for those.

use thiserror::Error;

/// A fatal error that aborts the current `compile` call with no partial
/// dataset returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VagueError {
    #[error("{line}:{column}: {message}")]
    LexError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{line}:{column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("division by zero evaluating field '{field}' on schema '{schema}'")]
    DivisionByZero { schema: String, field: String },

    #[error("circular dependency among computed fields on schema '{schema}': {cycle}")]
    CircularDependency { schema: String, cycle: String },

    #[error("reference to undeclared schema '{0}'")]
    UnknownSchemaReference(String),

    #[error("unsupported expression in schema '{schema}', field '{field}': {message}")]
    UnsupportedExpression {
        schema: String,
        field: String,
        message: String,
    },

    #[error("{0}")]
    Fatal(String),
}

pub type VagueResult<T> = Result<T, VagueError>;
