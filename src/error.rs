//! Error taxonomy for the depletion engine
//!
//! Only malformed input is ever surfaced to callers with its reason. Missing
//! history and oversized simulation counts are absorbed where they occur.

use thiserror::Error;

/// Message returned to callers for any failure that is not a validation error
pub const GENERIC_FAILURE_MESSAGE: &str = "Simulation failed";

#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed or out-of-range input parameter
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Internal fault during simulation or aggregation
    #[error("unexpected failure: {0}")]
    Unexpected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A fund record that could not be interpreted
    #[error("invalid fund record: {0}")]
    InvalidRecord(String),
}

impl ForecastError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        ForecastError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the failure was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ForecastError::Validation { .. } | ForecastError::Json(_)
        )
    }

    /// Message safe to hand back to an external caller
    pub fn public_message(&self) -> String {
        match self {
            ForecastError::Validation { .. } => self.to_string(),
            ForecastError::Json(e) => format!("invalid request body: {}", e),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = ForecastError::validation("currentBalance", "must not be negative");
        assert!(err.is_client_error());
        assert_eq!(err.public_message(), "invalid currentBalance: must not be negative");
    }

    #[test]
    fn test_unexpected_hides_details() {
        let err = ForecastError::Unexpected("thread pool exploded".to_string());
        assert!(!err.is_client_error());
        assert_eq!(err.public_message(), GENERIC_FAILURE_MESSAGE);
    }
}
