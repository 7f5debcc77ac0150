//! Marketplace Backend Library
//!
//! Order lifecycle for the grocery, ecommerce, taxi and porter verticals:
//! OTP-gated handoffs, the rider assignment ledger and the status sync
//! between the two.

pub mod assignment;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod order;
pub mod otp;
pub mod routes;
pub mod state;
pub mod store;

use std::sync::Arc;

use assignment::AssignmentLedger;
use auth::AuthService;
use config::Config;
use order::LifecycleService;
use state::AppState;
use store::OrderStore;

/// Wire services over `store` according to `config`
pub fn build_state(config: &Config, store: Arc<dyn OrderStore>) -> AppState {
    let ledger = AssignmentLedger::new(store.clone(), config.rider_earnings_percent);
    let lifecycle = LifecycleService::new(
        store.clone(),
        ledger.clone(),
        config.otp_policies.clone(),
        config.default_delivery_fee,
    );
    let auth_service = AuthService::new(
        config.jwt_secret.clone(),
        config.jwt_access_token_ttl_seconds,
    )
    .with_dev_tokens(config.dev_auth_enabled && !config.environment.is_production());

    AppState::new(
        Arc::new(lifecycle),
        Arc::new(ledger),
        Arc::new(auth_service),
        store,
    )
}
