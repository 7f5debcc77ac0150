//! Order handlers, shared by every vertical
//!
//! Each vertical's router injects its [`Vertical`] as an extension.

use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use uuid::Uuid;

use super::{AdminUser, ApiJson, ApiPath, ApiQuery, AuthenticatedUser};
use crate::error::ApiResult;
use crate::models::{ApiResponse, Pagination};
use crate::order::{
    AdminOrdersQuery, CancelOrderRequest, CreateOrderRequest, IssuedOtp, LifecycleService,
    OrderView, OtpExposure, RateOrderRequest, ResendOtpRequest, UpdateStatusRequest,
    VerifyOtpRequest, Vertical,
};

type OrderResponse = ApiResult<Json<ApiResponse<OrderView>>>;

/// List the caller's orders, newest first
pub async fn list_my_orders(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<Vec<OrderView>>>> {
    let orders = service.list_my_orders(vertical, &user).await?;
    let views = orders
        .into_iter()
        .map(|o| OrderView::new(o, OtpExposure::Hidden))
        .collect();

    Ok(Json(ApiResponse::ok(views)))
}

pub async fn create_order(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<OrderView>>)> {
    let order = service.create_order(vertical, &user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::ok(OrderView::new(order, OtpExposure::Created))
                .with_message("Order placed successfully"),
        ),
    ))
}

pub async fn get_order(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> OrderResponse {
    let order = service.get_order(vertical, &user, id).await?;
    Ok(Json(ApiResponse::ok(OrderView::new(order, OtpExposure::Detail))))
}

pub async fn update_status(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> OrderResponse {
    let order = service
        .update_status(vertical, &user, id, request.status)
        .await?;
    Ok(Json(
        ApiResponse::ok(OrderView::new(order, OtpExposure::Hidden))
            .with_message("Order status updated"),
    ))
}

pub async fn cancel_order(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<ApiJson<CancelOrderRequest>>,
) -> OrderResponse {
    let reason = body.and_then(|ApiJson(b)| b.cancellation_reason);
    let order = service.cancel(vertical, &user, id, reason).await?;
    Ok(Json(
        ApiResponse::ok(OrderView::new(order, OtpExposure::Hidden))
            .with_message("Order cancelled successfully"),
    ))
}

pub async fn rate_order(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RateOrderRequest>,
) -> OrderResponse {
    let order = service.rate(vertical, &user, id, request).await?;
    Ok(Json(
        ApiResponse::ok(OrderView::new(order, OtpExposure::Hidden))
            .with_message("Thanks for rating your order"),
    ))
}

pub async fn resend_otp(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<ApiJson<ResendOtpRequest>>,
) -> ApiResult<Json<ApiResponse<IssuedOtp>>> {
    let kind = body.map(|ApiJson(b)| b.kind).unwrap_or_default();
    let issued = service.resend_otp(vertical, &user, id, kind).await?;
    Ok(Json(ApiResponse::ok(issued).with_message("OTP sent")))
}

pub async fn verify_otp(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<VerifyOtpRequest>,
) -> OrderResponse {
    let order = service
        .verify_otp(vertical, &user, id, request.kind, request.code.trim())
        .await?;
    Ok(Json(
        ApiResponse::ok(OrderView::new(order, OtpExposure::Hidden))
            .with_message("OTP verified"),
    ))
}

/// Paginated, filtered listing for the vertical's admins
pub async fn admin_list_orders(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AdminUser(admin): AdminUser,
    ApiQuery(query): ApiQuery<AdminOrdersQuery>,
) -> ApiResult<Json<ApiResponse<Vec<OrderView>>>> {
    let (orders, total) = service.admin_list_orders(vertical, &admin, &query).await?;
    let views = orders
        .into_iter()
        .map(|o| OrderView::new(o, OtpExposure::Hidden))
        .collect();

    Ok(Json(ApiResponse::ok(views).with_pagination(Pagination::new(
        query.page(),
        query.limit(),
        total,
    ))))
}

pub async fn admin_update_status(
    State(service): State<Arc<LifecycleService>>,
    Extension(vertical): Extension<Vertical>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> OrderResponse {
    let order = service
        .admin_update_status(vertical, &admin, id, request.status)
        .await?;
    Ok(Json(
        ApiResponse::ok(OrderView::new(order, OtpExposure::Hidden))
            .with_message("Order status updated"),
    ))
}
