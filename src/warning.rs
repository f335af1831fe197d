//! Structured, non-fatal warnings surfaced to the caller after `compile`.
//!
//! Grounded on `storage/error.rs`'s pattern of a closed, typed error enum
//! with `thiserror` messages, applied here to recoverable conditions instead
//! of fatal ones — the collector accumulates these instead of aborting.

use serde::Serialize;
use std::fmt;

/// One entry in the warning taxonomy (spec §6/§7).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Warning {
    UniqueValueExhaustion {
        schema: String,
        field: String,
        attempts: u32,
    },
    ConstraintRetryLimit {
        scope: String,
        attempts: u32,
        mode: ConstraintMode,
    },
    ConstraintEvaluationError {
        error_text: String,
    },
    MutationTargetNotFound {
        schema: String,
    },
    UnknownFieldInBase {
        schema: String,
        field: String,
        import_source: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ConstraintMode {
    Satisfying,
    Violating,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UniqueValueExhaustion {
                schema,
                field,
                attempts,
            } => write!(
                f,
                "unique pool exhausted for {schema}.{field} after {attempts} attempts; emitting a duplicate"
            ),
            Warning::ConstraintRetryLimit {
                scope,
                attempts,
                mode,
            } => write!(
                f,
                "constraint retry limit reached for {scope} after {attempts} attempts ({mode:?} mode); best-effort record returned"
            ),
            Warning::ConstraintEvaluationError { error_text } => {
                write!(f, "constraint evaluation error: {error_text}")
            }
            Warning::MutationTargetNotFound { schema } => {
                write!(f, "then-block mutation target not found for schema '{schema}'")
            }
            Warning::UnknownFieldInBase {
                schema,
                field,
                import_source,
            } => write!(
                f,
                "schema '{schema}' has no field '{field}' in base schema imported from '{import_source}'"
            ),
        }
    }
}

/// Accumulates warnings for a single `compile` call.
#[derive(Debug, Default, Clone)]
pub struct WarningCollector {
    warnings: Vec<Warning>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn as_slice(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.warnings
    }
}
