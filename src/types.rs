use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Signed up, not yet approved. Cannot stake.
    Pending,
    Active,
    Banned,
}

impl UserStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(UserStatus::Pending),
            "active" => Some(UserStatus::Active),
            "banned" => Some(UserStatus::Banned),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Banned => "banned",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub status: UserStatus,
    pub is_admin: bool,
    pub created_at: i64,
}

// ---------------------------------------------------------------------------
// Bet lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Open,
    Resolved,
    Void,
}

impl BetStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(BetStatus::Open),
            "resolved" => Some(BetStatus::Resolved),
            "void" => Some(BetStatus::Void),
            _ => None,
        }
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BetStatus::Open => "open",
            BetStatus::Resolved => "resolved",
            BetStatus::Void => "void",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Who a bet is offered to. Stored and served for the platform layer;
/// the engine itself only enforces the invite gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Everyone,
    Friends,
    Group,
    InviteOnly,
}

impl Audience {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "everyone" => Some(Audience::Everyone),
            "friends" => Some(Audience::Friends),
            "group" => Some(Audience::Group),
            "invite_only" => Some(Audience::InviteOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Audience::Everyone => "everyone",
            Audience::Friends => "friends",
            Audience::Group => "group",
            Audience::InviteOnly => "invite_only",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bet {
    pub id: i64,
    pub creator_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub end_at: i64,
    pub max_participants: Option<i64>,
    pub visibility: Visibility,
    pub audience: Audience,
    pub status: BetStatus,
    /// `Some(true)` = FOR won, `Some(false)` = AGAINST won. Non-null iff resolved.
    pub resolution: Option<bool>,
    pub resolved_by_id: Option<i64>,
    pub resolved_at: Option<i64>,
    pub hidden: bool,
    pub created_at: i64,
}

impl Bet {
    /// End time passed while still open: no new stakes, not yet settled.
    pub fn is_locked(&self, now: i64) -> bool {
        self.status == BetStatus::Open && now >= self.end_at
    }
}

// ---------------------------------------------------------------------------
// Stakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    For,
    Against,
}

impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "for" => Some(Side::For),
            "against" => Some(Side::Against),
            _ => None,
        }
    }

    /// Winning side for a resolution outcome (`true` = FOR wins).
    pub fn winning(outcome: bool) -> Self {
        if outcome {
            Side::For
        } else {
            Side::Against
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::For => write!(f, "for"),
            Side::Against => write!(f, "against"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StakePosition {
    pub bet_id: i64,
    pub user_id: i64,
    pub side: Side,
    pub amount: i64,
}

/// Returned by a successful stake placement.
#[derive(Debug, Clone, Serialize)]
pub struct StakeResult {
    /// Total now staked by the user on their side.
    pub position: i64,
    pub side: Side,
    pub balance: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BetStats {
    pub total_pot: i64,
    pub for_stake: i64,
    pub against_stake: i64,
    pub participant_count: i64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// One-time grant on account activation.
    Starter,
    /// Stake debit (negative amount, tagged with the bet).
    BetStake,
    /// Winner's share of a resolved pot.
    BetPayout,
    /// Full stake returned on void.
    BetRefund,
    /// Platform retention, credited to the treasury account when configured.
    Fee,
    /// Manual admin grant or correction.
    AdminAdjustment,
}

impl EntryType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starter" => Some(EntryType::Starter),
            "bet_stake" => Some(EntryType::BetStake),
            "bet_payout" => Some(EntryType::BetPayout),
            "bet_refund" => Some(EntryType::BetRefund),
            "fee" => Some(EntryType::Fee),
            "admin_adjustment" => Some(EntryType::AdminAdjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryType::Starter => "starter",
            EntryType::BetStake => "bet_stake",
            EntryType::BetPayout => "bet_payout",
            EntryType::BetRefund => "bet_refund",
            EntryType::Fee => "fee",
            EntryType::AdminAdjustment => "admin_adjustment",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub entry_type: EntryType,
    pub bet_id: Option<i64>,
    pub metadata: Option<String>,
    pub created_at: i64,
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    Resolve,
    Void,
}

impl std::fmt::Display for SettlementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementKind::Resolve => write!(f, "resolve"),
            SettlementKind::Void => write!(f, "void"),
        }
    }
}

/// Outcome of a resolve or void call. `already_settled` means a prior
/// settlement stood and this call was a no-op, which callers treat as success.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementResult {
    pub bet_id: i64,
    pub kind: SettlementKind,
    /// True when resolve fell back to a refund because nobody held the
    /// winning side.
    pub voided: bool,
    pub already_settled: bool,
    pub total_pot: i64,
    pub fee_retained: i64,
    pub payout_count: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Unix seconds.
pub fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_rejects_unknown() {
        assert_eq!(UserStatus::parse("active"), Some(UserStatus::Active));
        assert_eq!(UserStatus::parse("ACTIVE"), None);
        assert_eq!(BetStatus::parse("settled"), None);
    }

    #[test]
    fn winning_side_follows_outcome() {
        assert_eq!(Side::winning(true), Side::For);
        assert_eq!(Side::winning(false), Side::Against);
    }

    #[test]
    fn locked_only_when_open_and_past_end() {
        let mut bet = Bet {
            id: 1,
            creator_id: 1,
            title: "t".to_string(),
            description: String::new(),
            category: "general".to_string(),
            end_at: 100,
            max_participants: None,
            visibility: Visibility::Public,
            audience: Audience::Everyone,
            status: BetStatus::Open,
            resolution: None,
            resolved_by_id: None,
            resolved_at: None,
            hidden: false,
            created_at: 0,
        };
        assert!(!bet.is_locked(99));
        assert!(bet.is_locked(100));
        bet.status = BetStatus::Resolved;
        assert!(!bet.is_locked(100));
    }
}
