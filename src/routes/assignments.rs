//! Assignment route definitions

use axum::{
    routing::{get, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/assignments/:id", get(get_assignment))
        .route(
            "/api/assignments/order/:order_type/:order_id",
            get(get_assignment_by_order),
        )
        .route("/api/assignments/:id/accept", put(accept_assignment))
        .route("/api/assignments/:id/reject", put(reject_assignment))
        .route("/api/assignments/:id/status", put(update_assignment_status))
}
