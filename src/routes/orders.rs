//! Per-vertical order route definitions

use axum::{
    routing::{get, post, put},
    Extension, Router,
};

use crate::handlers::*;
use crate::order::Vertical;
use crate::state::AppState;

/// Routes for one vertical, mounted at `/api/{vertical}-orders`
pub fn order_routes(vertical: Vertical) -> Router<AppState> {
    let routes = Router::new()
        .route("/", get(list_my_orders).post(create_order))
        .route("/admin/all", get(admin_list_orders))
        .route("/admin/:id/status", put(admin_update_status))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_status))
        .route("/:id/cancel", put(cancel_order))
        .route("/:id/rate", put(rate_order))
        .route("/:id/otp/resend", post(resend_otp))
        .route("/:id/otp/verify", post(verify_otp))
        .layer(Extension(vertical));

    Router::new().nest(&format!("/api/{}-orders", vertical.as_str()), routes)
}
