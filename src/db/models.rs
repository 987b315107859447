//! Database row types matching migrations/0001_init.sql.
//! Used by sqlx for typed queries; converted into domain types at the edge.

use crate::error::AppError;
use crate::types::{
    Audience, Bet, BetStatus, EntryType, LedgerEntry, Side, StakePosition, User, UserStatus,
    Visibility,
};

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub status: String,
    pub is_admin: i64,
    pub created_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(r: UserRow) -> Result<Self, AppError> {
        let status = UserStatus::parse(&r.status)
            .ok_or_else(|| AppError::Validation(format!("bad user status '{}'", r.status)))?;
        Ok(User {
            id: r.id,
            username: r.username,
            status,
            is_admin: r.is_admin != 0,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct BetRow {
    pub id: i64,
    pub creator_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub end_at: i64,
    pub max_participants: Option<i64>,
    pub visibility: String,
    pub audience: String,
    pub status: String,
    pub resolution: Option<i64>,
    pub resolved_by_id: Option<i64>,
    pub resolved_at: Option<i64>,
    pub hidden: i64,
    pub code_salt: i64,
    pub created_at: i64,
}

impl TryFrom<BetRow> for Bet {
    type Error = AppError;

    fn try_from(r: BetRow) -> Result<Self, AppError> {
        let status = BetStatus::parse(&r.status)
            .ok_or_else(|| AppError::Validation(format!("bad bet status '{}'", r.status)))?;
        let visibility = Visibility::parse(&r.visibility)
            .ok_or_else(|| AppError::Validation(format!("bad visibility '{}'", r.visibility)))?;
        let audience = Audience::parse(&r.audience)
            .ok_or_else(|| AppError::Validation(format!("bad audience '{}'", r.audience)))?;
        Ok(Bet {
            id: r.id,
            creator_id: r.creator_id,
            title: r.title,
            description: r.description,
            category: r.category,
            end_at: r.end_at,
            max_participants: r.max_participants,
            visibility,
            audience,
            status,
            resolution: r.resolution.map(|v| v != 0),
            resolved_by_id: r.resolved_by_id,
            resolved_at: r.resolved_at,
            hidden: r.hidden != 0,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct StakeRow {
    pub bet_id: i64,
    pub user_id: i64,
    pub side: String,
    pub amount: i64,
}

impl TryFrom<StakeRow> for StakePosition {
    type Error = AppError;

    fn try_from(r: StakeRow) -> Result<Self, AppError> {
        let side = Side::parse(&r.side)
            .ok_or_else(|| AppError::Validation(format!("bad stake side '{}'", r.side)))?;
        Ok(StakePosition {
            bet_id: r.bet_id,
            user_id: r.user_id,
            side,
            amount: r.amount,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct LedgerRow {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub entry_type: String,
    pub bet_id: Option<i64>,
    pub metadata: Option<String>,
    pub created_at: i64,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(r: LedgerRow) -> Result<Self, AppError> {
        let entry_type = EntryType::parse(&r.entry_type)
            .ok_or_else(|| AppError::Validation(format!("bad entry type '{}'", r.entry_type)))?;
        Ok(LedgerEntry {
            id: r.id,
            user_id: r.user_id,
            amount: r.amount,
            entry_type,
            bet_id: r.bet_id,
            metadata: r.metadata,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SettlementRow {
    pub bet_id: i64,
    pub kind: String,
    pub outcome: Option<i64>,
    pub fee_bps: i64,
    pub auto_void: i64,
    pub settled_by_id: i64,
    pub settled_at: i64,
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct AdminActionRow {
    pub id: i64,
    pub admin_id: i64,
    pub action: String,
    pub target_type: String,
    pub target_id: i64,
    pub detail: Option<String>,
    pub created_at: i64,
}
