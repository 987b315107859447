use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    // --- staking ---
    #[error("bet {0} not found")]
    BetNotFound(i64),

    #[error("bet {0} is not open")]
    BetNotOpen(i64),

    #[error("bet {0} is locked: end time has passed")]
    BetLocked(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("user {0} is not active")]
    UserNotActive(i64),

    #[error("stake amount must be a positive whole number of Neos")]
    InvalidAmount,

    #[error("insufficient balance: have {balance}, need {needed}")]
    InsufficientBalance { balance: i64, needed: i64 },

    #[error("already staked {existing} on this bet; switching sides is not supported")]
    SideConflict { existing: crate::types::Side },

    #[error("bet {0} has reached its participant limit")]
    ParticipantLimitReached(i64),

    // --- settlement ---
    #[error("fee must be between 0 and 10000 basis points, got {0}")]
    InvalidFee(i64),

    #[error("bet {0} cannot be settled from its current state")]
    InvalidState(i64),

    #[error("user {0} is not an admin")]
    NotAdmin(i64),

    // --- generic ---
    #[error("{0}")]
    Validation(String),

    #[error("write conflict, retry the operation: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Machine-readable kind, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BetNotFound(_) => "bet_not_found",
            AppError::BetNotOpen(_) => "bet_not_open",
            AppError::BetLocked(_) => "bet_locked",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::UserNotActive(_) => "user_not_active",
            AppError::InvalidAmount => "invalid_amount",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::SideConflict { .. } => "side_conflict",
            AppError::ParticipantLimitReached(_) => "participant_limit_reached",
            AppError::InvalidFee(_) => "invalid_fee",
            AppError::InvalidState(_) => "invalid_state",
            AppError::NotAdmin(_) => "not_admin",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Config(_) => "config",
            AppError::Database(_) => "database",
            AppError::Migration(_) => "migration",
            AppError::Io(_) => "io",
        }
    }

    /// Lock contention and timeouts are safe to retry; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BetNotFound(_) | AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppError::BetNotOpen(_)
            | AppError::BetLocked(_)
            | AppError::SideConflict { .. }
            | AppError::ParticipantLimitReached(_)
            | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::UserNotActive(_) | AppError::NotAdmin(_) => StatusCode::FORBIDDEN,
            AppError::InvalidAmount | AppError::InvalidFee(_) | AppError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::Conflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        // SQLITE_BUSY / SQLITE_LOCKED (and their extended codes) mean another
        // writer held the database past the busy timeout. The transaction
        // rolled back whole.
        if let sqlx::Error::Database(db) = &e {
            if matches!(
                db.code().as_deref(),
                Some("5") | Some("6") | Some("261") | Some("262") | Some("517") | Some("518")
            ) {
                return AppError::Conflict(db.message().to_string());
            }
        }
        AppError::Database(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = json!({ "kind": self.kind(), "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
