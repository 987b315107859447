//! Settlement engine: moves a bet out of OPEN exactly once.
//!
//! Resolve pays winners their proportional share of the pot after the fee;
//! void refunds every staker in full. Both run as one transaction under the
//! shared write lock, with the settlements row as the idempotency marker and
//! its primary key as the second line of defense against a double-settle
//! race. A failed settlement rolls back whole and leaves the bet OPEN.

use std::sync::Arc;

use sqlx::{SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::admin::{get_user_in, require_admin};
use crate::audit::AuditLog;
use crate::config::MAX_FEE_BPS;
use crate::db::models::SettlementRow;
use crate::error::{AppError, Result};
use crate::ledger::Ledger;
use crate::registry::BetRegistry;
use crate::stake::StakeBook;
use crate::types::{
    now_ts, Bet, BetStatus, EntryType, SettlementKind, SettlementResult, Side, StakePosition,
};

pub struct SettlementEngine {
    pool: SqlitePool,
    ledger: Arc<Ledger>,
    write_lock: Arc<Mutex<()>>,
    treasury_user_id: Option<i64>,
}

impl SettlementEngine {
    pub fn new(
        pool: SqlitePool,
        ledger: Arc<Ledger>,
        write_lock: Arc<Mutex<()>>,
        treasury_user_id: Option<i64>,
    ) -> Self {
        Self {
            pool,
            ledger,
            write_lock,
            treasury_user_id,
        }
    }

    /// Resolve a bet: `true` means FOR wins. Falls back to a void-with-refund
    /// when nobody holds the winning side.
    pub async fn resolve(
        &self,
        bet_id: i64,
        outcome: bool,
        fee_bps: i64,
        admin_id: i64,
    ) -> Result<SettlementResult> {
        if !(0..=MAX_FEE_BPS).contains(&fee_bps) {
            return Err(AppError::InvalidFee(fee_bps));
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        require_admin(&mut tx, admin_id).await?;

        if let Some(prior) = settlement_in(&mut tx, bet_id).await? {
            info!(
                bet_id,
                kind = %prior.kind,
                outcome = ?prior.outcome,
                fee_bps = prior.fee_bps,
                settled_by = prior.settled_by_id,
                settled_at = prior.settled_at,
                "resolve no-op: bet already settled"
            );
            return Ok(already_settled(bet_id, &prior));
        }

        let bet = BetRegistry::get_in(&mut tx, bet_id).await?;
        if bet.status != BetStatus::Open {
            return Err(AppError::InvalidState(bet_id));
        }

        let stakes = StakeBook::stakes_in(&mut tx, bet_id).await?;
        let totals = SideTotals::of(&stakes);
        let winning_side = Side::winning(outcome);
        let winning_total = totals.on(winning_side);

        // Nobody staked the winning side: refund instead of dividing by zero.
        if winning_total == 0 {
            let result = self
                .apply_void(&mut tx, &bet, &stakes, admin_id, true, Some(outcome), fee_bps)
                .await?;
            let touched: Vec<i64> = stakes.iter().map(|s| s.user_id).collect();
            tx.commit().await?;
            self.ledger.refresh(&touched).await?;
            info!(bet_id, outcome, "resolve fell back to auto-void: winning side empty");
            return Ok(result);
        }

        let fee = fee_of(totals.pot(), fee_bps)?;
        let net_pot = totals.pot() - fee;
        let now = now_ts();

        let mut payout_count = 0i64;
        let mut disbursed = 0i64;
        let mut touched: Vec<i64> = Vec::with_capacity(stakes.len() + 1);
        for stake in stakes.iter().filter(|s| s.side == winning_side) {
            let payout = payout_share(stake.amount, net_pot, winning_total)?;
            // Flooring can zero out a dust stake; the remainder stays with
            // the platform alongside the rest of the rounding residual.
            if payout > 0 {
                Ledger::append(
                    &mut tx,
                    stake.user_id,
                    payout,
                    EntryType::BetPayout,
                    Some(bet_id),
                    None,
                )
                .await?;
                payout_count += 1;
                disbursed += payout;
                touched.push(stake.user_id);
            }
        }

        if fee > 0 {
            if let Some(treasury) = self.treasury_user_id {
                if get_user_in(&mut tx, treasury).await.is_ok() {
                    Ledger::append(
                        &mut tx,
                        treasury,
                        fee,
                        EntryType::Fee,
                        Some(bet_id),
                        None,
                    )
                    .await?;
                    touched.push(treasury);
                } else {
                    warn!(treasury, "treasury account missing; fee entry skipped");
                }
            }
        }

        sqlx::query(
            r#"
            UPDATE bets
            SET status = 'resolved', resolution = ?, resolved_by_id = ?, resolved_at = ?
            WHERE id = ?
            "#,
        )
        .bind(outcome as i64)
        .bind(admin_id)
        .bind(now)
        .bind(bet_id)
        .execute(&mut *tx)
        .await?;

        insert_settlement(
            &mut tx,
            bet_id,
            SettlementKind::Resolve,
            Some(outcome),
            fee_bps,
            false,
            admin_id,
            now,
        )
        .await?;

        let detail = serde_json::json!({
            "outcome": outcome,
            "fee_bps": fee_bps,
            "total_pot": totals.pot(),
            "net_pot": net_pot,
            "disbursed": disbursed,
            "payouts": payout_count,
        });
        AuditLog::record(&mut tx, admin_id, "resolve", "bet", bet_id, Some(&detail.to_string()))
            .await?;

        tx.commit().await?;
        self.ledger.refresh(&touched).await?;

        info!(
            bet_id,
            outcome,
            fee_bps,
            total_pot = totals.pot(),
            disbursed,
            residual = net_pot - disbursed,
            payout_count,
            "bet resolved"
        );

        Ok(SettlementResult {
            bet_id,
            kind: SettlementKind::Resolve,
            voided: false,
            already_settled: false,
            total_pot: totals.pot(),
            fee_retained: fee,
            payout_count,
        })
    }

    /// Void a bet: every staker gets their full stake back, no fee.
    pub async fn void(&self, bet_id: i64, admin_id: i64) -> Result<SettlementResult> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        require_admin(&mut tx, admin_id).await?;

        if let Some(prior) = settlement_in(&mut tx, bet_id).await? {
            info!(
                bet_id,
                kind = %prior.kind,
                settled_by = prior.settled_by_id,
                settled_at = prior.settled_at,
                "void no-op: bet already settled"
            );
            return Ok(already_settled(bet_id, &prior));
        }

        let bet = BetRegistry::get_in(&mut tx, bet_id).await?;
        if bet.status != BetStatus::Open {
            return Err(AppError::InvalidState(bet_id));
        }

        let stakes = StakeBook::stakes_in(&mut tx, bet_id).await?;
        let result = self
            .apply_void(&mut tx, &bet, &stakes, admin_id, false, None, 0)
            .await?;
        let touched: Vec<i64> = stakes.iter().map(|s| s.user_id).collect();
        tx.commit().await?;
        self.ledger.refresh(&touched).await?;

        info!(bet_id, refunds = result.payout_count, total_pot = result.total_pot, "bet voided");
        Ok(result)
    }

    /// Shared tail of admin void and auto-void: refunds, bet row update,
    /// settlement marker, audit entry. Caller commits.
    async fn apply_void(
        &self,
        tx: &mut Transaction<'_, sqlx::Sqlite>,
        bet: &Bet,
        stakes: &[StakePosition],
        admin_id: i64,
        auto: bool,
        attempted_outcome: Option<bool>,
        fee_bps: i64,
    ) -> Result<SettlementResult> {
        let now = now_ts();
        let mut total = 0i64;
        for stake in stakes {
            Ledger::append(
                tx,
                stake.user_id,
                stake.amount,
                EntryType::BetRefund,
                Some(bet.id),
                None,
            )
            .await?;
            total += stake.amount;
        }

        // `resolution` stays NULL: it is non-null only for RESOLVED bets.
        sqlx::query(
            "UPDATE bets SET status = 'void', resolved_by_id = ?, resolved_at = ? WHERE id = ?",
        )
        .bind(admin_id)
        .bind(now)
        .bind(bet.id)
        .execute(&mut **tx)
        .await?;

        insert_settlement(
            tx,
            bet.id,
            SettlementKind::Void,
            attempted_outcome,
            fee_bps,
            auto,
            admin_id,
            now,
        )
        .await?;

        let detail = serde_json::json!({
            "auto": auto,
            "refunds": stakes.len(),
            "total_pot": total,
        });
        AuditLog::record(tx, admin_id, "void", "bet", bet.id, Some(&detail.to_string())).await?;

        Ok(SettlementResult {
            bet_id: bet.id,
            kind: SettlementKind::Void,
            voided: true,
            already_settled: false,
            total_pot: total,
            fee_retained: 0,
            payout_count: stakes.len() as i64,
        })
    }
}

// ---------------------------------------------------------------------------
// Payout arithmetic — integer only, floor division throughout
// ---------------------------------------------------------------------------

/// Platform fee on the pot: `total_pot * fee_bps / 10000`, floored.
fn fee_of(total_pot: i64, fee_bps: i64) -> Result<i64> {
    let fee = (total_pot as i128)
        .checked_mul(fee_bps as i128)
        .map(|v| v / 10_000)
        .ok_or_else(|| AppError::Validation("fee computation overflow".to_string()))?;
    i64::try_from(fee).map_err(|_| AppError::Validation("fee computation overflow".to_string()))
}

/// A winner's share: `stake * net_pot / winning_total`, floored. The sum of
/// shares never exceeds `net_pot`; the difference is the retained residual.
fn payout_share(stake: i64, net_pot: i64, winning_total: i64) -> Result<i64> {
    let share = (stake as i128)
        .checked_mul(net_pot as i128)
        .map(|v| v / winning_total as i128)
        .ok_or_else(|| AppError::Validation("payout computation overflow".to_string()))?;
    i64::try_from(share).map_err(|_| AppError::Validation("payout computation overflow".to_string()))
}

struct SideTotals {
    for_total: i64,
    against_total: i64,
}

impl SideTotals {
    fn of(stakes: &[StakePosition]) -> Self {
        let mut totals = SideTotals {
            for_total: 0,
            against_total: 0,
        };
        for s in stakes {
            match s.side {
                Side::For => totals.for_total += s.amount,
                Side::Against => totals.against_total += s.amount,
            }
        }
        totals
    }

    fn on(&self, side: Side) -> i64 {
        match side {
            Side::For => self.for_total,
            Side::Against => self.against_total,
        }
    }

    fn pot(&self) -> i64 {
        self.for_total + self.against_total
    }
}

// ---------------------------------------------------------------------------
// Settlement marker
// ---------------------------------------------------------------------------

async fn settlement_in(conn: &mut SqliteConnection, bet_id: i64) -> Result<Option<SettlementRow>> {
    let row = sqlx::query_as::<_, SettlementRow>(
        "SELECT bet_id, kind, outcome, fee_bps, auto_void, settled_by_id, settled_at FROM settlements WHERE bet_id = ?",
    )
    .bind(bet_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

#[allow(clippy::too_many_arguments)]
async fn insert_settlement(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    bet_id: i64,
    kind: SettlementKind,
    outcome: Option<bool>,
    fee_bps: i64,
    auto: bool,
    admin_id: i64,
    now: i64,
) -> Result<()> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO settlements (bet_id, kind, outcome, fee_bps, auto_void, settled_by_id, settled_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(bet_id)
    .bind(kind.to_string())
    .bind(outcome.map(|o| o as i64))
    .bind(fee_bps)
    .bind(auto as i64)
    .bind(admin_id)
    .bind(now)
    .execute(&mut **tx)
    .await;

    match inserted {
        Ok(_) => Ok(()),
        // Unique hit means another settlement won a race we should have been
        // protected from; surface it as a retryable conflict so the caller
        // re-reads and gets the already-settled answer.
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AppError::Conflict(
            format!("bet {bet_id} settled concurrently"),
        )),
        Err(e) => Err(e.into()),
    }
}

fn already_settled(bet_id: i64, prior: &SettlementRow) -> SettlementResult {
    let kind = if prior.kind == "void" {
        SettlementKind::Void
    } else {
        SettlementKind::Resolve
    };
    SettlementResult {
        bet_id,
        kind,
        voided: kind == SettlementKind::Void,
        already_settled: true,
        total_pot: 0,
        fee_retained: 0,
        payout_count: 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::testutil::{seed_admin, seed_bet, seed_user};

    struct Fixture {
        pool: SqlitePool,
        book: StakeBook,
        engine: SettlementEngine,
        ledger: Ledger,
        admin: i64,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let ledger = Arc::new(Ledger::new(pool.clone()));
        let lock = Arc::new(Mutex::new(()));
        let book = StakeBook::new(pool.clone(), Arc::clone(&ledger), Arc::clone(&lock));
        let engine = SettlementEngine::new(pool.clone(), Arc::clone(&ledger), lock, None);
        let admin = seed_admin(&pool, "root").await;
        Fixture {
            ledger: Ledger::new(pool.clone()),
            pool,
            book,
            engine,
            admin,
        }
    }

    #[test]
    fn fee_and_share_floor() {
        assert_eq!(fee_of(100, 1000).unwrap(), 10);
        assert_eq!(fee_of(99, 1000).unwrap(), 9);
        assert_eq!(fee_of(100, 0).unwrap(), 0);
        assert_eq!(payout_share(60, 100, 60).unwrap(), 100);
        assert_eq!(payout_share(1, 4, 3).unwrap(), 1);
        assert_eq!(payout_share(1, 2, 6).unwrap(), 0);
    }

    #[tokio::test]
    async fn resolve_pays_winner_full_pot_without_fee() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let b = seed_user(&f.pool, "b", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        f.book.place_stake(bet, a, Side::For, 60).await.unwrap();
        f.book.place_stake(bet, b, Side::Against, 40).await.unwrap();

        let result = f.engine.resolve(bet, true, 0, f.admin).await.unwrap();
        assert!(!result.voided);
        assert!(!result.already_settled);
        assert_eq!(result.total_pot, 100);
        assert_eq!(result.payout_count, 1);

        // A staked 60, got the whole 100 pot back: 100 - 60 + 100 = 140.
        assert_eq!(f.ledger.balance(a).await.unwrap(), 140);
        // B lost the stake: 100 - 40 = 60.
        assert_eq!(f.ledger.balance(b).await.unwrap(), 60);

        let bet_row = BetRegistry::new(f.pool.clone()).get(bet).await.unwrap();
        assert_eq!(bet_row.status, BetStatus::Resolved);
        assert_eq!(bet_row.resolution, Some(true));
        assert_eq!(bet_row.resolved_by_id, Some(f.admin));
    }

    #[tokio::test]
    async fn resolve_applies_fee_in_basis_points() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let b = seed_user(&f.pool, "b", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        f.book.place_stake(bet, a, Side::For, 60).await.unwrap();
        f.book.place_stake(bet, b, Side::Against, 40).await.unwrap();

        // 10% fee: net pot 90, sole winner takes floor(60*90/60) = 90.
        let result = f.engine.resolve(bet, true, 1000, f.admin).await.unwrap();
        assert_eq!(result.fee_retained, 10);
        assert_eq!(f.ledger.balance(a).await.unwrap(), 130);
    }

    #[tokio::test]
    async fn resolve_with_empty_winning_side_auto_voids() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let b = seed_user(&f.pool, "b", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        f.book.place_stake(bet, a, Side::For, 30).await.unwrap();
        f.book.place_stake(bet, b, Side::For, 20).await.unwrap();

        // AGAINST wins but nobody staked it: full refunds instead.
        let result = f.engine.resolve(bet, false, 0, f.admin).await.unwrap();
        assert!(result.voided);
        assert_eq!(result.payout_count, 2);

        assert_eq!(f.ledger.balance(a).await.unwrap(), 100);
        assert_eq!(f.ledger.balance(b).await.unwrap(), 100);

        let bet_row = BetRegistry::new(f.pool.clone()).get(bet).await.unwrap();
        assert_eq!(bet_row.status, BetStatus::Void);
        assert_eq!(bet_row.resolution, None);

        let auto = sqlx::query_scalar::<_, i64>("SELECT auto_void FROM settlements WHERE bet_id = ?")
            .bind(bet)
            .fetch_one(&f.pool)
            .await
            .unwrap();
        assert_eq!(auto, 1);
    }

    #[tokio::test]
    async fn settlement_is_idempotent() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let b = seed_user(&f.pool, "b", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        f.book.place_stake(bet, a, Side::For, 60).await.unwrap();
        f.book.place_stake(bet, b, Side::Against, 40).await.unwrap();

        f.engine.resolve(bet, true, 0, f.admin).await.unwrap();
        let entries_after_first =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ledger")
                .fetch_one(&f.pool)
                .await
                .unwrap();

        // Second resolve and a late void are both success-no-ops.
        let again = f.engine.resolve(bet, true, 0, f.admin).await.unwrap();
        assert!(again.already_settled);
        let late_void = f.engine.void(bet, f.admin).await.unwrap();
        assert!(late_void.already_settled);

        let entries_after = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ledger")
            .fetch_one(&f.pool)
            .await
            .unwrap();
        assert_eq!(entries_after, entries_after_first);
        assert_eq!(f.ledger.balance(a).await.unwrap(), 140);
    }

    #[tokio::test]
    async fn void_refunds_every_stake_exactly() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let b = seed_user(&f.pool, "b", 100).await;
        let c = seed_user(&f.pool, "c", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        f.book.place_stake(bet, a, Side::For, 17).await.unwrap();
        f.book.place_stake(bet, b, Side::Against, 23).await.unwrap();
        f.book.place_stake(bet, c, Side::Against, 5).await.unwrap();

        let result = f.engine.void(bet, f.admin).await.unwrap();
        assert!(result.voided);
        assert!(!result.already_settled);
        assert_eq!(result.total_pot, 45);
        assert_eq!(result.payout_count, 3);

        for user in [a, b, c] {
            assert_eq!(f.ledger.balance(user).await.unwrap(), 100);
        }

        let refunded = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger WHERE bet_id = ? AND entry_type = 'bet_refund'",
        )
        .bind(bet)
        .fetch_one(&f.pool)
        .await
        .unwrap();
        assert_eq!(refunded, 45);
    }

    #[tokio::test]
    async fn rounding_residual_is_bounded_by_winner_count() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let b = seed_user(&f.pool, "b", 100).await;
        let c = seed_user(&f.pool, "c", 100).await;
        let d = seed_user(&f.pool, "d", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        for user in [a, b, c] {
            f.book.place_stake(bet, user, Side::For, 1).await.unwrap();
        }
        f.book.place_stake(bet, d, Side::Against, 1).await.unwrap();

        // Pot 4, three winners of stake 1: each gets floor(1*4/3) = 1.
        f.engine.resolve(bet, true, 0, f.admin).await.unwrap();

        let disbursed = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger WHERE bet_id = ? AND entry_type = 'bet_payout'",
        )
        .bind(bet)
        .fetch_one(&f.pool)
        .await
        .unwrap();
        assert_eq!(disbursed, 3);
        // Residual 1 Neo, strictly less than the 3 winners.
        assert!(4 - disbursed < 3);
    }

    #[tokio::test]
    async fn dust_stake_floored_to_zero_gets_no_entry() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let b = seed_user(&f.pool, "b", 100).await;
        let c = seed_user(&f.pool, "c", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        f.book.place_stake(bet, a, Side::For, 1).await.unwrap();
        f.book.place_stake(bet, b, Side::For, 5).await.unwrap();
        f.book.place_stake(bet, c, Side::Against, 6).await.unwrap();

        // Pot 12, 90% fee: net 2. a: floor(1*2/6) = 0, b: floor(5*2/6) = 1.
        let result = f.engine.resolve(bet, true, 9000, f.admin).await.unwrap();
        assert_eq!(result.payout_count, 1);

        let a_payouts = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM ledger WHERE user_id = ? AND entry_type = 'bet_payout'",
        )
        .bind(a)
        .fetch_one(&f.pool)
        .await
        .unwrap();
        assert_eq!(a_payouts, 0);
        assert_eq!(f.ledger.balance(b).await.unwrap(), 96);
    }

    #[tokio::test]
    async fn fee_entry_goes_to_treasury_when_configured() {
        let pool = test_pool().await;
        let treasury = seed_user(&pool, "treasury", 0).await;
        let ledger = Arc::new(Ledger::new(pool.clone()));
        let lock = Arc::new(Mutex::new(()));
        let book = StakeBook::new(pool.clone(), Arc::clone(&ledger), Arc::clone(&lock));
        let engine = SettlementEngine::new(pool.clone(), Arc::clone(&ledger), lock, Some(treasury));
        let admin = seed_admin(&pool, "root").await;

        let a = seed_user(&pool, "a", 100).await;
        let b = seed_user(&pool, "b", 100).await;
        let bet = seed_bet(&pool, a, now_ts() + 3600).await;
        book.place_stake(bet, a, Side::For, 60).await.unwrap();
        book.place_stake(bet, b, Side::Against, 40).await.unwrap();

        engine.resolve(bet, true, 1000, admin).await.unwrap();
        assert_eq!(ledger.balance(treasury).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn out_of_range_fee_is_rejected_before_any_work() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        for bad in [-1, 10_001] {
            let err = f.engine.resolve(bet, true, bad, f.admin).await.unwrap_err();
            assert_eq!(err.kind(), "invalid_fee");
        }
        let bet_row = BetRegistry::new(f.pool.clone()).get(bet).await.unwrap();
        assert_eq!(bet_row.status, BetStatus::Open);
    }

    #[tokio::test]
    async fn only_admins_settle() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        let err = f.engine.resolve(bet, true, 0, a).await.unwrap_err();
        assert_eq!(err.kind(), "not_admin");
        let err = f.engine.void(bet, a).await.unwrap_err();
        assert_eq!(err.kind(), "not_admin");
    }

    #[tokio::test]
    async fn unknown_bet_is_not_found() {
        let f = fixture().await;
        let err = f.engine.resolve(404, true, 0, f.admin).await.unwrap_err();
        assert_eq!(err.kind(), "bet_not_found");
    }

    #[tokio::test]
    async fn zero_stake_bet_auto_voids_cleanly() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;

        let result = f.engine.resolve(bet, true, 0, f.admin).await.unwrap();
        assert!(result.voided);
        assert_eq!(result.payout_count, 0);
        assert_eq!(result.total_pot, 0);
    }

    #[tokio::test]
    async fn settlement_is_audited() {
        let f = fixture().await;
        let a = seed_user(&f.pool, "a", 100).await;
        let b = seed_user(&f.pool, "b", 100).await;
        let bet = seed_bet(&f.pool, a, now_ts() + 3600).await;
        f.book.place_stake(bet, a, Side::For, 10).await.unwrap();
        f.book.place_stake(bet, b, Side::Against, 10).await.unwrap();

        f.engine.resolve(bet, true, 0, f.admin).await.unwrap();

        let audit = AuditLog::new(f.pool.clone());
        let actions = audit.recent(5).await.unwrap();
        assert_eq!(actions[0].action, "resolve");
        assert_eq!(actions[0].target_type, "bet");
        assert_eq!(actions[0].target_id, bet);
    }
}
