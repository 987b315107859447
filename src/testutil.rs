//! Shared seeding helpers for database tests.

use sqlx::SqlitePool;

/// Active user with an opening ledger credit (0 = no entry).
pub async fn seed_user(pool: &SqlitePool, name: &str, balance: i64) -> i64 {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, status, is_admin, created_at) VALUES (?, 'active', 0, 0) RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();
    if balance != 0 {
        sqlx::query(
            "INSERT INTO ledger (user_id, amount, entry_type, created_at) VALUES (?, ?, 'starter', 0)",
        )
        .bind(id)
        .bind(balance)
        .execute(pool)
        .await
        .unwrap();
    }
    id
}

pub async fn seed_admin(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, status, is_admin, created_at) VALUES (?, 'active', 1, 0) RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Open public bet ending at `end_at`.
pub async fn seed_bet(pool: &SqlitePool, creator_id: i64, end_at: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO bets (creator_id, title, end_at, created_at)
        VALUES (?, 'test bet', ?, 0)
        RETURNING id
        "#,
    )
    .bind(creator_id)
    .bind(end_at)
    .fetch_one(pool)
    .await
    .unwrap()
}
