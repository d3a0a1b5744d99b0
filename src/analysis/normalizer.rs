//! Raw score to percentage conversion.

use thiserror::Error;

/// Rejected `(score, max_score)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid score {score}/{max_score}: max score must be positive and both values finite")]
pub struct InvalidScoreError {
    pub score: f64,
    pub max_score: f64,
}

/// Convert a raw score into a percentage of `max_score`.
///
/// Not clamped: scores above the maximum (extra credit) come out above 100.
pub fn normalize(score: f64, max_score: f64) -> Result<f64, InvalidScoreError> {
    if !score.is_finite() || !max_score.is_finite() || max_score <= 0.0 {
        return Err(InvalidScoreError { score, max_score });
    }

    Ok(score / max_score * 100.0)
}
