//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// This is the shape handed to whatever presentation layer sits on top of the
/// engine; engine-specific errors convert into it.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Conflict (e.g., document already posted).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Temporary infrastructure failure that survived all retries.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::BusinessRule(_) => 422,
            Self::Conflict(_) => 409,
            Self::Unavailable(_) => 503,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Process exit status for command-line callers. Temporary failures use
    /// `EX_TEMPFAIL` so schedulers know to rerun the job.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::NotFound(_) => 3,
            Self::BusinessRule(_) => 4,
            Self::Conflict(_) => 5,
            Self::Unavailable(_) => 75,
            Self::Database(_) | Self::Internal(_) => 1,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::NotFound(String::new()), 404, 3)]
    #[case(AppError::Validation(String::new()), 400, 2)]
    #[case(AppError::BusinessRule(String::new()), 422, 4)]
    #[case(AppError::Conflict(String::new()), 409, 5)]
    #[case(AppError::Unavailable(String::new()), 503, 75)]
    #[case(AppError::Database(String::new()), 500, 1)]
    #[case(AppError::Internal(String::new()), 500, 1)]
    fn test_status_and_exit_codes(#[case] err: AppError, #[case] status: u16, #[case] exit: i32) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.exit_code(), exit);
    }

    #[test]
    fn test_period_lock_reads_as_business_rule() {
        let err = AppError::BusinessRule("AP period 2024-03 is closed".into());
        assert_eq!(err.error_code(), "BUSINESS_RULE_VIOLATION");
        assert_eq!(
            err.to_string(),
            "Business rule violation: AP period 2024-03 is closed"
        );
    }
}
