//! Error types for the UPI ledger service.

/// Domain-level errors (value and business-rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Amount overflows the ledger range")]
    AmountOverflow,

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Credit limit exceeded: limit {limit}, would be {would_be}")]
    CreditLimitExceeded { limit: i64, would_be: i64 },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors. The full failure taxonomy of the transfer
/// engine; the HTTP adapter maps each variant to a status code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid receiver account")]
    InvalidReceiver,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid PIN")]
    InvalidCredential,

    #[error("Insufficient balance")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Credit limit exceeded. Unable to process payment.")]
    CreditLimitExceeded,

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Carries detail for the logs; callers only ever see a generic message.
    #[error("Internal server error")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientFunds {
                available,
                requested,
            } => AppError::InsufficientFunds {
                available,
                requested,
            },
            DomainError::CreditLimitExceeded { .. } => AppError::CreditLimitExceeded,
            DomainError::NegativeAmount | DomainError::AmountOverflow => {
                AppError::Validation(err.to_string())
            }
            DomainError::ValidationError(msg) => AppError::Validation(msg),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Conflict(msg) => AppError::Conflict(msg),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Crypto(e) => AppError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_maps_through_layers() {
        let repo_err = RepoError::Domain(DomainError::InsufficientFunds {
            available: 100,
            requested: 200,
        });
        let app_err: AppError = repo_err.into();
        assert!(matches!(app_err, AppError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_internal_error_message_is_generic() {
        let err = AppError::Internal("connection pool exhausted".into());
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn test_conflict_maps_to_conflict() {
        let app_err: AppError = RepoError::Conflict("already activated".into()).into();
        assert!(matches!(app_err, AppError::Conflict(_)));
    }
}
