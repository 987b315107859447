//! Append-only trail of privileged actions. Written inside the same
//! transaction as the operation it records, so a settlement and its audit
//! entry commit or roll back together.

use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::AdminActionRow;
use crate::error::Result;
use crate::types::now_ts;

pub struct AuditLog {
    pool: SqlitePool,
}

impl AuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record one privileged action inside the caller's transaction.
    pub async fn record(
        conn: &mut SqliteConnection,
        admin_id: i64,
        action: &str,
        target_type: &str,
        target_id: i64,
        detail: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_actions (admin_id, action, target_type, target_id, detail, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(admin_id)
        .bind(action)
        .bind(target_type)
        .bind(target_id)
        .bind(detail)
        .bind(now_ts())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Newest actions first, for the admin view.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AdminActionRow>> {
        let rows = sqlx::query_as::<_, AdminActionRow>(
            r#"
            SELECT id, admin_id, action, target_type, target_id, detail, created_at
            FROM admin_actions
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
