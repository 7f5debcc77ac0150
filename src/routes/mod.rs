//! Route definitions for the marketplace API

mod assignments;
mod orders;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;

use crate::middleware;
use crate::order::ALL_VERTICALS;
use crate::state::AppState;

pub use assignments::assignment_routes;
pub use orders::order_routes;

/// Full application router: every vertical, assignments, health
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(assignment_routes());

    for vertical in ALL_VERTICALS {
        router = router.merge(order_routes(vertical));
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::request_tracing))
            .layer(axum::middleware::from_fn(middleware::security_headers)),
    )
}

async fn root() -> &'static str {
    "Marketplace API Server"
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: String,
    version: &'static str,
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, database) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "unhealthy",
                "unavailable".to_string(),
            )
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
