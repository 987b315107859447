//! User lifecycle and privileged operations: signup shim, approval/ban with
//! the one-time starter grant, and manual fund grants. Every mutation here is
//! audited in the same transaction.

use std::sync::Arc;

use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::config::STARTER_GRANT;
use crate::db::models::UserRow;
use crate::error::{AppError, Result};
use crate::ledger::Ledger;
use crate::types::{now_ts, EntryType, User, UserStatus};

pub async fn get_user_in(conn: &mut SqliteConnection, user_id: i64) -> Result<User> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, status, is_admin, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::UserNotFound(user_id))?;
    User::try_from(row)
}

/// Caller must hold admin rights for privileged operations.
pub async fn require_admin(conn: &mut SqliteConnection, user_id: i64) -> Result<User> {
    let user = get_user_in(conn, user_id).await?;
    if !user.is_admin {
        return Err(AppError::NotAdmin(user_id));
    }
    Ok(user)
}

pub struct AdminOps {
    pool: SqlitePool,
    ledger: Arc<Ledger>,
    write_lock: Arc<Mutex<()>>,
}

impl AdminOps {
    pub fn new(pool: SqlitePool, ledger: Arc<Ledger>, write_lock: Arc<Mutex<()>>) -> Self {
        Self {
            pool,
            ledger,
            write_lock,
        }
    }

    /// Signup shim for the external identity provider. Accounts start
    /// pending and hold no Neos until approved.
    pub async fn create_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("username must not be empty".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&mut *tx)
            .await?;
        if taken > 0 {
            return Err(AppError::Validation(format!("username '{username}' is taken")));
        }

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, status, is_admin, created_at) VALUES (?, 'pending', 0, ?) RETURNING id",
        )
        .bind(username)
        .bind(now_ts())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut conn = self.pool.acquire().await?;
        get_user_in(&mut conn, id).await
    }

    /// Approve or ban. The first transition to active grants the starter
    /// bonus exactly once; re-activation after a ban never grants again.
    pub async fn set_user_status(
        &self,
        user_id: i64,
        status: UserStatus,
        admin_id: i64,
    ) -> Result<User> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        require_admin(&mut tx, admin_id).await?;
        let user = get_user_in(&mut tx, user_id).await?;

        sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let mut granted = false;
        if status == UserStatus::Active && user.status != UserStatus::Active {
            let prior_grants = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM ledger WHERE user_id = ? AND entry_type = 'starter'",
            )
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
            if prior_grants == 0 {
                Ledger::append(&mut tx, user_id, STARTER_GRANT, EntryType::Starter, None, None)
                    .await?;
                granted = true;
            }
        }

        let detail = serde_json::json!({ "status": status.to_string(), "starter_granted": granted });
        AuditLog::record(
            &mut tx,
            admin_id,
            "set_status",
            "user",
            user_id,
            Some(&detail.to_string()),
        )
        .await?;

        tx.commit().await?;
        self.ledger.refresh(&[user_id]).await?;
        info!(user_id, %status, granted, "user status changed");

        let mut conn = self.pool.acquire().await?;
        get_user_in(&mut conn, user_id).await
    }

    /// Manual ledger adjustment. Positive grants, negative corrections; the
    /// ledger layer rejects zero.
    pub async fn grant_funds(
        &self,
        target_user_id: i64,
        amount: i64,
        reason: &str,
        admin_id: i64,
    ) -> Result<i64> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        require_admin(&mut tx, admin_id).await?;
        get_user_in(&mut tx, target_user_id).await?;

        Ledger::append(
            &mut tx,
            target_user_id,
            amount,
            EntryType::AdminAdjustment,
            None,
            Some(reason),
        )
        .await?;

        let detail = serde_json::json!({ "amount": amount, "reason": reason });
        AuditLog::record(
            &mut tx,
            admin_id,
            "grant_funds",
            "user",
            target_user_id,
            Some(&detail.to_string()),
        )
        .await?;

        tx.commit().await?;
        self.ledger.refresh(&[target_user_id]).await?;
        info!(target_user_id, amount, admin_id, "funds granted");

        self.ledger.balance(target_user_id).await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        get_user_in(&mut conn, user_id).await
    }
}

/// First-run bootstrap: create an active admin account when none exists,
/// with the starter grant so the account can be exercised immediately.
pub async fn ensure_default_admin(pool: &SqlitePool) -> Result<()> {
    let admins = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE is_admin = 1")
        .fetch_one(pool)
        .await?;
    if admins > 0 {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, status, is_admin, created_at) VALUES ('admin', 'active', 1, ?) RETURNING id",
    )
    .bind(now_ts())
    .fetch_one(&mut *tx)
    .await?;
    Ledger::append(&mut tx, id, STARTER_GRANT, EntryType::Starter, None, None).await?;
    tx.commit().await?;

    warn!(user_id = id, "default admin account created; assign a real admin before production use");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
