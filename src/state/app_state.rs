//! Application state shared across handlers

use std::sync::Arc;

use crate::assignment::AssignmentLedger;
use crate::auth::AuthService;
use crate::order::LifecycleService;
use crate::store::OrderStore;

use axum::extract::FromRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleService>,
    pub ledger: Arc<AssignmentLedger>,
    pub auth_service: Arc<AuthService>,
    pub store: Arc<dyn OrderStore>,
}

impl AppState {
    pub fn new(
        lifecycle: Arc<LifecycleService>,
        ledger: Arc<AssignmentLedger>,
        auth_service: Arc<AuthService>,
        store: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            lifecycle,
            ledger,
            auth_service,
            store,
        }
    }
}

impl FromRef<AppState> for Arc<LifecycleService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.lifecycle.clone()
    }
}

impl FromRef<AppState> for Arc<AssignmentLedger> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ledger.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn OrderStore> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}
