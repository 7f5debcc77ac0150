//! Rider assignment handlers

use axum::{extract::State, Json};
use std::sync::Arc;
use uuid::Uuid;

use super::{ApiJson, ApiPath, AuthenticatedUser, RiderUser};
use crate::assignment::{
    Assignment, AssignmentLedger, RejectAssignmentRequest, UpdateAssignmentStatusRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::models::ApiResponse;
use crate::order::Vertical;

type AssignmentResponse = ApiResult<Json<ApiResponse<Assignment>>>;

pub async fn get_assignment(
    State(ledger): State<Arc<AssignmentLedger>>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AssignmentResponse {
    let assignment = ledger.get(id).await?;
    ledger.authorize_view(&assignment, &user).await?;
    Ok(Json(ApiResponse::ok(assignment)))
}

pub async fn get_assignment_by_order(
    State(ledger): State<Arc<AssignmentLedger>>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath((order_type, order_id)): ApiPath<(String, Uuid)>,
) -> AssignmentResponse {
    let order_type: Vertical = order_type.parse().map_err(ApiError::BadRequest)?;
    let assignment = ledger
        .find_by_order(order_id, order_type)
        .await?
        .ok_or_else(|| ApiError::NotFound("Assignment not found".to_string()))?;
    ledger.authorize_view(&assignment, &user).await?;
    Ok(Json(ApiResponse::ok(assignment)))
}

pub async fn accept_assignment(
    State(ledger): State<Arc<AssignmentLedger>>,
    RiderUser(rider): RiderUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AssignmentResponse {
    let assignment = ledger.accept(id, rider.id).await?;
    Ok(Json(
        ApiResponse::ok(assignment).with_message("Assignment accepted"),
    ))
}

pub async fn reject_assignment(
    State(ledger): State<Arc<AssignmentLedger>>,
    RiderUser(rider): RiderUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<ApiJson<RejectAssignmentRequest>>,
) -> AssignmentResponse {
    let reason = body.and_then(|ApiJson(b)| b.reason);
    let assignment = ledger.reject(id, rider.id, reason).await?;
    Ok(Json(
        ApiResponse::ok(assignment).with_message("Assignment rejected"),
    ))
}

/// Rider progress updates, or admin corrections
pub async fn update_assignment_status(
    State(ledger): State<Arc<AssignmentLedger>>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateAssignmentStatusRequest>,
) -> AssignmentResponse {
    let assignment = ledger.set_status_as(id, &user, request.status).await?;
    Ok(Json(
        ApiResponse::ok(assignment).with_message("Assignment status updated"),
    ))
}
