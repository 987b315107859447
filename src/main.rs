mod admin;
mod api;
mod audit;
mod config;
mod db;
mod error;
mod invite;
mod ledger;
mod registry;
mod settlement;
mod stake;
#[cfg(test)]
mod testutil;
mod types;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::admin::{ensure_default_admin, AdminOps};
use crate::api::routes::{router, ApiState};
use crate::audit::AuditLog;
use crate::config::Config;
use crate::error::Result;
use crate::invite::InviteGate;
use crate::ledger::Ledger;
use crate::registry::BetRegistry;
use crate::settlement::SettlementEngine;
use crate::stake::StakeBook;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);
    ensure_default_admin(&pool).await?;

    // One write lock serializes every mutating transaction; SQLite is
    // single-writer anyway, and this keeps stake/settle ordering exact.
    let write_lock = Arc::new(Mutex::new(()));
    let ledger = Arc::new(Ledger::new(pool.clone()));

    let state = ApiState {
        registry: Arc::new(BetRegistry::new(pool.clone())),
        stake_book: Arc::new(StakeBook::new(
            pool.clone(),
            Arc::clone(&ledger),
            Arc::clone(&write_lock),
        )),
        settlement: Arc::new(SettlementEngine::new(
            pool.clone(),
            Arc::clone(&ledger),
            Arc::clone(&write_lock),
            cfg.treasury_user_id,
        )),
        invite: Arc::new(InviteGate::new(pool.clone(), &cfg.invite_secret)),
        ledger: Arc::clone(&ledger),
        admin_ops: Arc::new(AdminOps::new(
            pool.clone(),
            Arc::clone(&ledger),
            Arc::clone(&write_lock),
        )),
        audit: Arc::new(AuditLog::new(pool.clone())),
        pool: pool.clone(),
    };

    // --- HTTP API server ---
    let app = router(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
