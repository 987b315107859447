//! Bet catalog: creation, lookup, moderation flag. Lifecycle transitions out
//! of OPEN belong to the settlement engine, never to this module.

use sqlx::{SqliteConnection, SqlitePool};

use crate::audit::AuditLog;
use crate::db::models::BetRow;
use crate::error::{AppError, Result};
use crate::types::{now_ts, Audience, Bet, Visibility};

pub struct NewBet {
    pub creator_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub end_at: i64,
    pub max_participants: Option<i64>,
    pub visibility: Visibility,
    pub audience: Audience,
}

pub struct BetRegistry {
    pool: SqlitePool,
}

impl BetRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewBet) -> Result<Bet> {
        if new.title.trim().is_empty() {
            return Err(AppError::Validation("bet title must not be empty".to_string()));
        }
        let now = now_ts();
        if new.end_at <= now {
            return Err(AppError::Validation(
                "bet end time must be in the future".to_string(),
            ));
        }
        if matches!(new.max_participants, Some(n) if n <= 0) {
            return Err(AppError::Validation(
                "participant limit must be positive when set".to_string(),
            ));
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO bets (creator_id, title, description, category, end_at,
                              max_participants, visibility, audience, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(new.creator_id)
        .bind(new.title.trim())
        .bind(&new.description)
        .bind(&new.category)
        .bind(new.end_at)
        .bind(new.max_participants)
        .bind(new.visibility.to_string())
        .bind(new.audience.to_string())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn get(&self, bet_id: i64) -> Result<Bet> {
        let row = sqlx::query_as::<_, BetRow>("SELECT * FROM bets WHERE id = ?")
            .bind(bet_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::BetNotFound(bet_id))?;
        Bet::try_from(row)
    }

    /// Lookup inside an open transaction, for the stake and settlement paths.
    pub async fn get_in(conn: &mut SqliteConnection, bet_id: i64) -> Result<Bet> {
        let row = sqlx::query_as::<_, BetRow>("SELECT * FROM bets WHERE id = ?")
            .bind(bet_id)
            .fetch_optional(conn)
            .await?
            .ok_or(AppError::BetNotFound(bet_id))?;
        Bet::try_from(row)
    }

    /// Moderation flag, orthogonal to lifecycle status. Audited.
    pub async fn set_hidden(&self, bet_id: i64, hidden: bool, admin_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE bets SET hidden = ? WHERE id = ?")
            .bind(hidden as i64)
            .bind(bet_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(AppError::BetNotFound(bet_id));
        }
        let action = if hidden { "hide" } else { "unhide" };
        AuditLog::record(&mut tx, admin_id, action, "bet", bet_id, None).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Open bets that are not hidden, newest first.
    pub async fn list_open(&self, limit: i64) -> Result<Vec<Bet>> {
        let rows = sqlx::query_as::<_, BetRow>(
            r#"
            SELECT * FROM bets
            WHERE status = 'open' AND hidden = 0
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Bet::try_from).collect()
    }
}
