//! Stake book: one position per (bet, user), staking preconditions, and the
//! atomic debit. The position upsert and the ledger entry commit together or
//! not at all — a crash between them would strand a deducted balance with no
//! recorded position.

use std::sync::Arc;

use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::info;

use crate::admin::get_user_in;
use crate::db::models::StakeRow;
use crate::error::{AppError, Result};
use crate::ledger::Ledger;
use crate::registry::BetRegistry;
use crate::types::{now_ts, BetStats, BetStatus, EntryType, Side, StakePosition, StakeResult, UserStatus};

pub struct StakeBook {
    pool: SqlitePool,
    ledger: Arc<Ledger>,
    write_lock: Arc<Mutex<()>>,
}

impl StakeBook {
    pub fn new(pool: SqlitePool, ledger: Arc<Ledger>, write_lock: Arc<Mutex<()>>) -> Self {
        Self {
            pool,
            ledger,
            write_lock,
        }
    }

    /// Place or increase a stake. Preconditions run in a fixed order and the
    /// first failure wins; nothing is written unless all of them pass.
    pub async fn place_stake(
        &self,
        bet_id: i64,
        user_id: i64,
        side: Side,
        amount: i64,
    ) -> Result<StakeResult> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let now = now_ts();

        let bet = BetRegistry::get_in(&mut tx, bet_id).await?;
        if bet.status != BetStatus::Open {
            return Err(AppError::BetNotOpen(bet_id));
        }
        if bet.is_locked(now) {
            return Err(AppError::BetLocked(bet_id));
        }

        let user = get_user_in(&mut tx, user_id).await?;
        if user.status != UserStatus::Active {
            return Err(AppError::UserNotActive(user_id));
        }

        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }

        let balance = Ledger::balance_in(&mut tx, user_id).await?;
        if amount > balance {
            return Err(AppError::InsufficientBalance {
                balance,
                needed: amount,
            });
        }

        let existing = Self::position_in(&mut tx, bet_id, user_id).await?;
        if let Some(ref pos) = existing {
            if pos.side != side {
                return Err(AppError::SideConflict { existing: pos.side });
            }
        } else if let Some(max) = bet.max_participants {
            let participants = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM stakes WHERE bet_id = ?",
            )
            .bind(bet_id)
            .fetch_one(&mut *tx)
            .await?;
            if participants >= max {
                return Err(AppError::ParticipantLimitReached(bet_id));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO stakes (bet_id, user_id, side, amount, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (bet_id, user_id) DO UPDATE SET
                amount = amount + excluded.amount,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(bet_id)
        .bind(user_id)
        .bind(side.to_string())
        .bind(amount)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        Ledger::append(&mut tx, user_id, -amount, EntryType::BetStake, Some(bet_id), None).await?;

        tx.commit().await?;
        self.ledger.refresh(&[user_id]).await?;

        let position = existing.map(|p| p.amount).unwrap_or(0) + amount;
        let new_balance = balance - amount;
        info!(
            bet_id,
            user_id,
            %side,
            amount,
            position,
            balance = new_balance,
            "stake placed"
        );

        Ok(StakeResult {
            position,
            side,
            balance: new_balance,
        })
    }

    /// Per-bet aggregates used by the bet page and the settlement engine.
    pub async fn bet_stats(&self, bet_id: i64) -> Result<BetStats> {
        // Existence check first so a missing bet is not an empty-stats bet.
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bets WHERE id = ?")
            .bind(bet_id)
            .fetch_one(&self.pool)
            .await?;
        if exists == 0 {
            return Err(AppError::BetNotFound(bet_id));
        }

        let (for_stake, against_stake, participant_count) =
            sqlx::query_as::<_, (i64, i64, i64)>(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN side = 'for' THEN amount END), 0),
                    COALESCE(SUM(CASE WHEN side = 'against' THEN amount END), 0),
                    COUNT(*)
                FROM stakes
                WHERE bet_id = ?
                "#,
            )
            .bind(bet_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(BetStats {
            total_pot: for_stake + against_stake,
            for_stake,
            against_stake,
            participant_count,
        })
    }

    /// All positions on a bet, inside the caller's transaction. The
    /// settlement engine aggregates these under its own snapshot.
    pub async fn stakes_in(conn: &mut SqliteConnection, bet_id: i64) -> Result<Vec<StakePosition>> {
        let rows = sqlx::query_as::<_, StakeRow>(
            "SELECT bet_id, user_id, side, amount FROM stakes WHERE bet_id = ? ORDER BY user_id",
        )
        .bind(bet_id)
        .fetch_all(conn)
        .await?;
        rows.into_iter().map(StakePosition::try_from).collect()
    }

    async fn position_in(
        conn: &mut SqliteConnection,
        bet_id: i64,
        user_id: i64,
    ) -> Result<Option<StakePosition>> {
        let row = sqlx::query_as::<_, StakeRow>(
            "SELECT bet_id, user_id, side, amount FROM stakes WHERE bet_id = ? AND user_id = ?",
        )
        .bind(bet_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
        row.map(StakePosition::try_from).transpose()
    }

    pub async fn position(&self, bet_id: i64, user_id: i64) -> Result<Option<StakePosition>> {
        let mut conn = self.pool.acquire().await?;
        Self::position_in(&mut conn, bet_id, user_id).await
    }

    pub async fn positions(&self, bet_id: i64) -> Result<Vec<StakePosition>> {
        let mut conn = self.pool.acquire().await?;
        Self::stakes_in(&mut conn, bet_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::testutil::{seed_bet, seed_user};

    async fn book(pool: &SqlitePool) -> StakeBook {
        StakeBook::new(
            pool.clone(),
            Arc::new(Ledger::new(pool.clone())),
            Arc::new(Mutex::new(())),
        )
    }

    #[tokio::test]
    async fn stake_debits_ledger_and_records_position() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;

        let result = book.place_stake(bet, alice, Side::For, 60).await.unwrap();
        assert_eq!(result.position, 60);
        assert_eq!(result.balance, 40);

        let stats = book.bet_stats(bet).await.unwrap();
        assert_eq!(stats.for_stake, 60);
        assert_eq!(stats.against_stake, 0);
        assert_eq!(stats.total_pot, 60);
        assert_eq!(stats.participant_count, 1);
    }

    #[tokio::test]
    async fn restaking_same_side_accumulates() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;

        book.place_stake(bet, alice, Side::For, 30).await.unwrap();
        let result = book.place_stake(bet, alice, Side::For, 20).await.unwrap();
        assert_eq!(result.position, 50);
        assert_eq!(result.balance, 50);

        // Still a single position row.
        let stats = book.bet_stats(bet).await.unwrap();
        assert_eq!(stats.participant_count, 1);
    }

    #[tokio::test]
    async fn switching_sides_is_rejected() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;

        book.place_stake(bet, alice, Side::For, 30).await.unwrap();
        let err = book
            .place_stake(bet, alice, Side::Against, 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "side_conflict");

        // Position and balance untouched by the rejected call.
        let pos = book.position(bet, alice).await.unwrap().unwrap();
        assert_eq!(pos.side, Side::For);
        assert_eq!(pos.amount, 30);
    }

    #[tokio::test]
    async fn insufficient_balance_writes_nothing() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 50).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;

        let err = book.place_stake(bet, alice, Side::For, 60).await.unwrap_err();
        assert_eq!(err.kind(), "insufficient_balance");

        let stake_entries = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM ledger WHERE entry_type = 'bet_stake'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(stake_entries, 0);
        assert!(book.position(bet, alice).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn locked_bet_rejects_stakes() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() - 1).await;

        let err = book.place_stake(bet, alice, Side::For, 10).await.unwrap_err();
        assert_eq!(err.kind(), "bet_locked");
    }

    #[tokio::test]
    async fn settled_bet_rejects_stakes() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;
        sqlx::query("UPDATE bets SET status = 'resolved', resolution = 1 WHERE id = ?")
            .bind(bet)
            .execute(&pool)
            .await
            .unwrap();

        let err = book.place_stake(bet, alice, Side::For, 10).await.unwrap_err();
        assert_eq!(err.kind(), "bet_not_open");
    }

    #[tokio::test]
    async fn pending_user_cannot_stake() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;
        let pending = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, status, is_admin, created_at) VALUES ('newbie', 'pending', 0, 0) RETURNING id",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        let err = book
            .place_stake(bet, pending, Side::For, 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "user_not_active");
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;

        for bad in [0, -5] {
            let err = book.place_stake(bet, alice, Side::For, bad).await.unwrap_err();
            assert_eq!(err.kind(), "invalid_amount");
        }
    }

    #[tokio::test]
    async fn participant_limit_blocks_new_entrants_only() {
        let pool = test_pool().await;
        let book = book(&pool).await;
        let alice = seed_user(&pool, "alice", 100).await;
        let bob = seed_user(&pool, "bob", 100).await;
        let carol = seed_user(&pool, "carol", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;
        sqlx::query("UPDATE bets SET max_participants = 2 WHERE id = ?")
            .bind(bet)
            .execute(&pool)
            .await
            .unwrap();

        book.place_stake(bet, alice, Side::For, 10).await.unwrap();
        book.place_stake(bet, bob, Side::Against, 10).await.unwrap();

        let err = book.place_stake(bet, carol, Side::For, 10).await.unwrap_err();
        assert_eq!(err.kind(), "participant_limit_reached");

        // Existing participants may still add to their position.
        let result = book.place_stake(bet, alice, Side::For, 5).await.unwrap();
        assert_eq!(result.position, 15);
    }

    #[tokio::test]
    async fn concurrent_stakes_serialize_and_debit_both() {
        let pool = test_pool().await;
        let book = Arc::new(book(&pool).await);
        let alice = seed_user(&pool, "alice", 100).await;
        let bet = seed_bet(&pool, alice, now_ts() + 3600).await;

        let b1 = Arc::clone(&book);
        let b2 = Arc::clone(&book);
        let (r1, r2) = tokio::join!(
            b1.place_stake(bet, alice, Side::For, 30),
            b2.place_stake(bet, alice, Side::For, 40),
        );
        r1.unwrap();
        r2.unwrap();

        // Both debits landed: no lost update, no double-charge.
        let ledger = Ledger::new(pool.clone());
        assert_eq!(ledger.balance(alice).await.unwrap(), 30);
        let pos = book.position(bet, alice).await.unwrap().unwrap();
        assert_eq!(pos.amount, 70);
    }
}
