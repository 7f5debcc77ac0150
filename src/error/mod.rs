//! Centralized API error handling
//!
//! This module provides a unified error type for API responses with proper
//! HTTP status code mapping and JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::assignment::LedgerError;
use crate::order::{LifecycleError, StatusError};
use crate::otp::OtpError;
use crate::store::StoreError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// A well-formed request the current order state does not allow
    #[error("{message}")]
    InvalidState { code: &'static str, message: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: String,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidState { code, .. } => *code,
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidState { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn invalid_state(code: &'static str, err: impl ToString) -> Self {
        ApiError::InvalidState {
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Server-side detail stays in the logs
        let message = match &self {
            ApiError::InternalError(_) | ApiError::ServiceUnavailable(_) => {
                tracing::error!(error = %self, code = %error_code, "Server error occurred");
                "Internal server error".to_string()
            }
            _ => {
                tracing::debug!(error = %self, code = %error_code, "Client error occurred");
                self.to_string()
            }
        };

        let body = ErrorResponse {
            success: false,
            message,
            error: error_code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

// Conversions from the domain layers

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleOrder | StoreError::StaleAssignment => {
                ApiError::Conflict("Resource was modified by another request, please retry".into())
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        let code = match err {
            StatusError::UnknownStatus { .. } => "UNKNOWN_STATUS",
            StatusError::AlreadyCancelled => "ALREADY_CANCELLED",
            StatusError::AlreadyShippedOrDelivered => "ALREADY_SHIPPED_OR_DELIVERED",
            StatusError::Terminal(_) => "ORDER_CLOSED",
            StatusError::Backward { .. } => "INVALID_TRANSITION",
        };
        ApiError::invalid_state(code, err)
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        let code = match err {
            OtpError::ResendLimitExceeded => "OTP_RESEND_LIMIT_EXCEEDED",
            OtpError::Expired => "OTP_EXPIRED",
            OtpError::Mismatch { .. } => "OTP_MISMATCH",
            OtpError::AttemptsExhausted => "OTP_ATTEMPTS_EXHAUSTED",
            OtpError::AlreadyConsumed => "OTP_ALREADY_USED",
            OtpError::NotIssued => "OTP_NOT_ISSUED",
        };
        ApiError::invalid_state(code, err)
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(msg) => ApiError::ValidationError(msg),
            LifecycleError::NotFound => ApiError::NotFound(err.to_string()),
            LifecycleError::Forbidden(msg) => ApiError::Forbidden(msg),
            LifecycleError::Status(e) => e.into(),
            LifecycleError::NotDelivered => ApiError::invalid_state("NOT_DELIVERED", err),
            LifecycleError::AlreadyRated => ApiError::invalid_state("ALREADY_RATED", err),
            LifecycleError::Otp(e) => e.into(),
            LifecycleError::Conflict => ApiError::Conflict(err.to_string()),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound => ApiError::NotFound(err.to_string()),
            LedgerError::NotYourAssignment | LedgerError::Forbidden => {
                ApiError::Forbidden(err.to_string())
            }
            LedgerError::Transition(e) => ApiError::invalid_state("INVALID_TRANSITION", e),
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderStatus, Vertical};

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("test".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::InternalError("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_lifecycle_mapping() {
        let err: ApiError = LifecycleError::Status(StatusError::AlreadyCancelled).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "ALREADY_CANCELLED");
        assert_eq!(err.to_string(), "Order is already cancelled");

        let err: ApiError = LifecycleError::Status(StatusError::UnknownStatus {
            vertical: Vertical::Taxi,
            status: OrderStatus::Shipped,
        })
        .into();
        assert_eq!(err.error_code(), "UNKNOWN_STATUS");

        let err: ApiError = LifecycleError::Conflict.into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = LifecycleError::Otp(OtpError::Mismatch { attempts_left: 2 }).into();
        assert_eq!(err.error_code(), "OTP_MISMATCH");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_errors() {
        let err: ApiError = StoreError::StaleOrder.into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = StoreError::DuplicateAssignment.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_internal_error_body_is_generic() {
        let response = ApiError::InternalError("connection refused on 10.0.0.5".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["error"], "INTERNAL_ERROR");
    }
}
