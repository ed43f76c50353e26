//! Error types for the listing-query crate.

use thiserror::Error;

use crate::whitelist::Usage;

/// Errors that can occur when validating or executing a list query.
///
/// Every variant is a deterministic input-validation failure. None of them
/// is retried or recovered inside the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// A field path is not queryable for this entity kind.
    #[error("field '{field}' cannot be used for {usage}")]
    InvalidField { field: String, usage: Usage },

    /// An operator was applied to an operand or value of the wrong type.
    #[error("operator '{op}' on field '{field}' expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    /// A cursor token could not be decoded or no longer fits the result set.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Page number or page size outside the allowed range.
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),
}

impl QueryError {
    pub(crate) fn invalid_field(field: impl Into<String>, usage: Usage) -> Self {
        QueryError::InvalidField {
            field: field.into(),
            usage,
        }
    }
}

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Filter,
    Search,
    Sort,
    Paginate,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Filter => "filter",
            Stage::Search => "search",
            Stage::Sort => "sort",
            Stage::Paginate => "paginate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A [`QueryError`] tagged with the pipeline stage that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: QueryError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: QueryError) -> Self {
        PipelineError { stage, source }
    }

    /// Returns the underlying query error.
    pub fn kind(&self) -> &QueryError {
        &self.source
    }
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
