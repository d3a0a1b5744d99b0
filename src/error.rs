//! Error types for the assessment pipeline.

use thiserror::Error;

use crate::analysis::InvalidScoreError;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the analytics and insight pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed request fields.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown student, classroom or assessment.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The text-generation service failed or replied with an unusable payload.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// The datastore could not read or write a record.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A record or payload could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn student_not_found(id: impl ToString) -> Self {
        Error::NotFound {
            kind: "student",
            id: id.to_string(),
        }
    }

    pub fn classroom_not_found(id: impl ToString) -> Self {
        Error::NotFound {
            kind: "classroom",
            id: id.to_string(),
        }
    }

    pub fn assessment_not_found(id: impl ToString) -> Self {
        Error::NotFound {
            kind: "assessment",
            id: id.to_string(),
        }
    }

    /// True for errors a batch treats as "skip this entry".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<InvalidScoreError> for Error {
    fn from(err: InvalidScoreError) -> Self {
        Error::Validation(err.to_string())
    }
}
