use crate::error::{AppError, Result};

/// Neos granted once when an account is activated.
pub const STARTER_GRANT: i64 = 500;

/// Fee ceiling: 10000 bps = 100% of the pot.
pub const MAX_FEE_BPS: i64 = 10_000;

/// Invite codes are 8 upper-hex characters (4 HMAC bytes).
pub const INVITE_CODE_BYTES: usize = 4;

/// How long a writer waits on the SQLite lock before the transaction
/// aborts and surfaces a retryable conflict.
pub const DB_BUSY_TIMEOUT_SECS: u64 = 5;

/// Ledger history page size cap.
pub const LEDGER_HISTORY_MAX: i64 = 500;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Shared secret for invite-code derivation (INVITE_SECRET).
    pub invite_secret: String,
    /// Account credited with retained fees, if any (TREASURY_USER_ID).
    /// Unset means retained Neos simply leave circulation.
    pub treasury_user_id: Option<i64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "neobet.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            invite_secret: std::env::var("INVITE_SECRET")
                .map_err(|_| AppError::Config("INVITE_SECRET must be set".to_string()))?,
            treasury_user_id: match std::env::var("TREASURY_USER_ID") {
                Ok(v) => Some(v.parse::<i64>().map_err(|_| {
                    AppError::Config("TREASURY_USER_ID must be a user id".to_string())
                })?),
                Err(_) => None,
            },
        })
    }
}
