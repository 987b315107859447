use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminOps;
use crate::audit::AuditLog;
use crate::db::models::AdminActionRow;
use crate::error::AppError;
use crate::invite::InviteGate;
use crate::ledger::Ledger;
use crate::registry::{BetRegistry, NewBet};
use crate::settlement::SettlementEngine;
use crate::stake::StakeBook;
use crate::types::{
    Audience, Bet, BetStats, LedgerEntry, SettlementResult, Side, StakePosition, StakeResult,
    User, UserStatus, Visibility,
};

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<BetRegistry>,
    pub stake_book: Arc<StakeBook>,
    pub settlement: Arc<SettlementEngine>,
    pub invite: Arc<InviteGate>,
    pub ledger: Arc<Ledger>,
    pub admin_ops: Arc<AdminOps>,
    pub audit: Arc<AuditLog>,
    pub pool: sqlx::SqlitePool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id/status", post(set_user_status))
        .route("/users/:id/balance", get(get_balance))
        .route("/users/:id/ledger", get(get_ledger_history))
        .route("/bets", post(create_bet).get(list_open_bets))
        .route("/bets/:id", get(get_bet))
        .route("/bets/:id/stats", get(get_bet_stats))
        .route("/bets/:id/positions", get(get_positions))
        .route("/bets/:id/positions/:user_id", get(get_position))
        .route("/bets/:id/stake", post(place_stake))
        .route("/bets/:id/resolve", post(resolve_bet))
        .route("/bets/:id/void", post(void_bet))
        .route("/bets/:id/hide", post(set_hidden))
        .route("/bets/:id/code", get(get_invite_code))
        .route("/bets/:id/code/rotate", post(rotate_invite_code))
        .route("/bets/:id/code/validate", post(validate_invite_code))
        .route("/admin/grants", post(grant_funds))
        .route("/admin/actions", get(get_admin_actions))
        .route("/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: UserStatus,
    pub admin_id: i64,
}

#[derive(Deserialize)]
pub struct CreateBetRequest {
    pub creator_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub end_at: i64,
    pub max_participants: Option<i64>,
    pub visibility: Option<Visibility>,
    pub audience: Option<Audience>,
}

#[derive(Deserialize)]
pub struct PlaceStakeRequest {
    pub user_id: i64,
    pub side: Side,
    pub amount: i64,
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub outcome: bool,
    #[serde(default)]
    pub fee_bps: i64,
    pub admin_id: i64,
}

#[derive(Deserialize)]
pub struct VoidRequest {
    pub admin_id: i64,
}

#[derive(Deserialize)]
pub struct HideRequest {
    pub hidden: bool,
    pub admin_id: i64,
}

#[derive(Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct GrantRequest {
    pub target_user_id: i64,
    pub amount: i64,
    #[serde(default)]
    pub reason: String,
    pub admin_id: i64,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub balance: i64,
}

#[derive(Serialize)]
pub struct CodeResponse {
    pub bet_id: i64,
    pub code: String,
}

#[derive(Serialize)]
pub struct ValidResponse {
    pub valid: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Lock-contention retries for the write operations. The engine maps SQLite
/// busy timeouts to a retryable conflict; anything else surfaces immediately.
const WRITE_RETRIES: usize = 2;

async fn create_user(
    State(state): State<ApiState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    let user = state.admin_ops.create_user(&req.username).await?;
    Ok(Json(user))
}

async fn set_user_status(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .admin_ops
        .set_user_status(user_id, req.status, req.admin_id)
        .await?;
    Ok(Json(user))
}

async fn get_balance(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<BalanceResponse>, AppError> {
    // Missing users read as empty ledgers; 404 them explicitly.
    state.admin_ops.get_user(user_id).await?;
    let balance = state.ledger.balance(user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

async fn get_ledger_history(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    state.admin_ops.get_user(user_id).await?;
    let entries = state.ledger.history(user_id, q.limit.unwrap_or(50)).await?;
    Ok(Json(entries))
}

async fn create_bet(
    State(state): State<ApiState>,
    Json(req): Json<CreateBetRequest>,
) -> Result<Json<Bet>, AppError> {
    let bet = state
        .registry
        .create(NewBet {
            creator_id: req.creator_id,
            title: req.title,
            description: req.description,
            category: req.category.unwrap_or_else(|| "general".to_string()),
            end_at: req.end_at,
            max_participants: req.max_participants,
            visibility: req.visibility.unwrap_or(Visibility::Public),
            audience: req.audience.unwrap_or(Audience::Everyone),
        })
        .await?;
    Ok(Json(bet))
}

async fn get_bet(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
) -> Result<Json<Bet>, AppError> {
    Ok(Json(state.registry.get(bet_id).await?))
}

async fn get_bet_stats(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
) -> Result<Json<BetStats>, AppError> {
    Ok(Json(state.stake_book.bet_stats(bet_id).await?))
}

async fn get_position(
    State(state): State<ApiState>,
    Path((bet_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<Option<StakePosition>>, AppError> {
    Ok(Json(state.stake_book.position(bet_id, user_id).await?))
}

async fn get_positions(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
) -> Result<Json<Vec<StakePosition>>, AppError> {
    Ok(Json(state.stake_book.positions(bet_id).await?))
}

async fn list_open_bets(
    State(state): State<ApiState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<Bet>>, AppError> {
    Ok(Json(state.registry.list_open(q.limit.unwrap_or(50)).await?))
}

async fn place_stake(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
    Json(req): Json<PlaceStakeRequest>,
) -> Result<Json<StakeResult>, AppError> {
    let mut attempt = 0;
    let result = loop {
        match state
            .stake_book
            .place_stake(bet_id, req.user_id, req.side, req.amount)
            .await
        {
            Err(e) if e.is_retryable() && attempt < WRITE_RETRIES => attempt += 1,
            other => break other?,
        }
    };
    Ok(Json(result))
}

async fn resolve_bet(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<SettlementResult>, AppError> {
    let mut attempt = 0;
    let result = loop {
        match state
            .settlement
            .resolve(bet_id, req.outcome, req.fee_bps, req.admin_id)
            .await
        {
            Err(e) if e.is_retryable() && attempt < WRITE_RETRIES => attempt += 1,
            other => break other?,
        }
    };
    Ok(Json(result))
}

async fn void_bet(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
    Json(req): Json<VoidRequest>,
) -> Result<Json<SettlementResult>, AppError> {
    let mut attempt = 0;
    let result = loop {
        match state.settlement.void(bet_id, req.admin_id).await {
            Err(e) if e.is_retryable() && attempt < WRITE_RETRIES => attempt += 1,
            other => break other?,
        }
    };
    Ok(Json(result))
}

async fn set_hidden(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
    Json(req): Json<HideRequest>,
) -> Result<Json<Bet>, AppError> {
    state
        .registry
        .set_hidden(bet_id, req.hidden, req.admin_id)
        .await?;
    Ok(Json(state.registry.get(bet_id).await?))
}

async fn get_invite_code(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
) -> Result<Json<CodeResponse>, AppError> {
    let code = state.invite.derive_code(bet_id).await?;
    Ok(Json(CodeResponse { bet_id, code }))
}

async fn rotate_invite_code(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
) -> Result<Json<CodeResponse>, AppError> {
    let code = state.invite.rotate(bet_id).await?;
    Ok(Json(CodeResponse { bet_id, code }))
}

async fn validate_invite_code(
    State(state): State<ApiState>,
    Path(bet_id): Path<i64>,
    Json(req): Json<ValidateCodeRequest>,
) -> Result<Json<ValidResponse>, AppError> {
    let valid = state.invite.validate(bet_id, &req.code).await?;
    Ok(Json(ValidResponse { valid }))
}

async fn grant_funds(
    State(state): State<ApiState>,
    Json(req): Json<GrantRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state
        .admin_ops
        .grant_funds(req.target_user_id, req.amount, &req.reason, req.admin_id)
        .await?;
    Ok(Json(BalanceResponse {
        user_id: req.target_user_id,
        balance,
    }))
}

async fn get_admin_actions(
    State(state): State<ApiState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<AdminActionRow>>, AppError> {
    Ok(Json(state.audit.recent(q.limit.unwrap_or(100)).await?))
}

async fn health(State(state): State<ApiState>) -> Result<Json<serde_json::Value>, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
