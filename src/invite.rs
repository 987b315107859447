//! Access codes for private bets. Codes are derived from a shared secret and
//! the bet's rotation salt, so they are never stored — only recomputed.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::config::INVITE_CODE_BYTES;
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

pub struct InviteGate {
    pool: SqlitePool,
    secret: Vec<u8>,
}

impl InviteGate {
    pub fn new(pool: SqlitePool, secret: &str) -> Self {
        Self {
            pool,
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Current code for a bet: keyed hash of (bet id, rotation salt),
    /// truncated and hex-encoded to a short human-enterable string.
    pub async fn derive_code(&self, bet_id: i64) -> Result<String> {
        let salt = self.code_salt(bet_id).await?;
        self.derive(bet_id, salt)
    }

    /// Invalidate the current code by bumping the rotation salt, then
    /// return the replacement.
    pub async fn rotate(&self, bet_id: i64) -> Result<String> {
        let updated = sqlx::query("UPDATE bets SET code_salt = code_salt + 1 WHERE id = ?")
            .bind(bet_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(AppError::BetNotFound(bet_id));
        }
        self.derive_code(bet_id).await
    }

    /// Recompute the expected code and compare without early exit.
    pub async fn validate(&self, bet_id: i64, supplied: &str) -> Result<bool> {
        let expected = self.derive_code(bet_id).await?;
        Ok(constant_time_eq(
            expected.as_bytes(),
            supplied.trim().to_ascii_uppercase().as_bytes(),
        ))
    }

    async fn code_salt(&self, bet_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT code_salt FROM bets WHERE id = ?")
            .bind(bet_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::BetNotFound(bet_id))
    }

    fn derive(&self, bet_id: i64, salt: i64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AppError::Config("invite secret must not be empty".to_string()))?;
        mac.update(&bet_id.to_le_bytes());
        mac.update(&salt.to_le_bytes());
        let tag = mac.finalize().into_bytes();
        Ok(hex::encode_upper(&tag[..INVITE_CODE_BYTES]))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
