//! Append-only ledger, the sole source of truth for balances.
//!
//! A balance is always `SUM(amount)` over a user's entries. The `DashMap`
//! cache in front of that sum is refreshed only by writers after their
//! transaction commits (while they still hold the write lock), so it can
//! never disagree with committed history.

use dashmap::DashMap;
use sqlx::{SqliteConnection, SqlitePool};

use crate::config::LEDGER_HISTORY_MAX;
use crate::db::models::LedgerRow;
use crate::error::{AppError, Result};
use crate::types::{now_ts, EntryType, LedgerEntry};

pub struct Ledger {
    pool: SqlitePool,
    cache: DashMap<i64, i64>,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: DashMap::new(),
        }
    }

    /// Append one entry inside the caller's transaction. Rejects a zero
    /// amount; performs no balance check — overdraft prevention is the
    /// caller's job before appending a debit.
    pub async fn append(
        conn: &mut SqliteConnection,
        user_id: i64,
        amount: i64,
        entry_type: EntryType,
        bet_id: Option<i64>,
        metadata: Option<&str>,
    ) -> Result<i64> {
        if amount == 0 {
            return Err(AppError::Validation(
                "ledger entries must have a nonzero amount".to_string(),
            ));
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO ledger (user_id, amount, entry_type, bet_id, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(entry_type.to_string())
        .bind(bet_id)
        .bind(metadata)
        .bind(now_ts())
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    /// Sum of the user's committed entries inside an open transaction.
    /// Used for the balance check gating a stake debit.
    pub async fn balance_in(conn: &mut SqliteConnection, user_id: i64) -> Result<i64> {
        let sum = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(conn)
        .await?;
        Ok(sum)
    }

    /// Current balance: cache hit, else the ledger sum. A user with no
    /// entries has balance 0.
    pub async fn balance(&self, user_id: i64) -> Result<i64> {
        if let Some(cached) = self.cache.get(&user_id) {
            return Ok(*cached);
        }
        let sum = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }

    /// Recompute cached balances after a commit. Callers invoke this while
    /// still holding the write lock so no stale value survives it.
    pub async fn refresh(&self, user_ids: &[i64]) -> Result<()> {
        for &user_id in user_ids {
            let sum = sqlx::query_scalar::<_, i64>(
                "SELECT COALESCE(SUM(amount), 0) FROM ledger WHERE user_id = ?",
            )
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
            self.cache.insert(user_id, sum);
        }
        Ok(())
    }

    /// Most recent entries for a user, newest first.
    pub async fn history(&self, user_id: i64, limit: i64) -> Result<Vec<LedgerEntry>> {
        let limit = limit.clamp(1, LEDGER_HISTORY_MAX);
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT id, user_id, amount, entry_type, bet_id, metadata, created_at
            FROM ledger
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
