use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("User not found.")]
    AccountNotFound,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid credentials.")]
    InvalidCredentials,

    /// Another writer committed a newer version of the account first.
    #[error("Account was modified concurrently")]
    StaleWrite,

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl LedgerError {
    /// Metric label for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound => "not_found",
            LedgerError::InvalidInput(_) => "invalid_input",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::InvalidCredentials => "invalid_credentials",
            LedgerError::StaleWrite => "stale_write",
            LedgerError::Store(_) => "store_error",
            LedgerError::Internal(_) => "internal_error",
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Store(anyhow::Error::new(err))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound => AppError::NotFound(anyhow::anyhow!("User not found.")),
            LedgerError::InvalidInput(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            e @ LedgerError::InsufficientFunds { .. } => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            LedgerError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            LedgerError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials."))
            }
            LedgerError::StaleWrite => AppError::DatabaseError(anyhow::anyhow!(
                "Account update retries exhausted"
            )),
            LedgerError::Store(e) => AppError::DatabaseError(e),
            LedgerError::Internal(e) => AppError::InternalError(e),
        }
    }
}
