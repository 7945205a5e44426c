/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - 認可拒否 (401/403) とデータエラー (400/500) を区別して返す
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::permissions::DenyReason;
use crate::services::operations::{DispatchError, ResolverError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "authentication required".into(),
            ),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, "FORBIDDEN", message),
            AppError::NotImplemented(operation) => (
                StatusCode::NOT_IMPLEMENTED,
                "NOT_IMPLEMENTED",
                format!("operation '{operation}' is not available"),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            // Anonymous callers get 401 unless no rule could ever admit them.
            DispatchError::Denied {
                reason: DenyReason::Unauthenticated,
                ..
            } => AppError::Unauthenticated,
            DispatchError::Denied {
                operation, reason, ..
            } => AppError::Forbidden(format!("{} ({})", operation, reason.as_str())),
            DispatchError::NoResolver(operation) => AppError::NotImplemented(operation),
            DispatchError::Resolver(ResolverError::InvalidInput(message)) => {
                AppError::bad_request("INVALID_INPUT", message)
            }
            DispatchError::Resolver(ResolverError::Internal(message)) => {
                tracing::error!(error = %message, "resolver failed");
                AppError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_for_anonymous_is_401() {
        let err = AppError::from(DispatchError::Denied {
            operation: "users".into(),
            reason: DenyReason::Unauthenticated,
            authenticated: false,
        });

        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unmapped_operation_is_403_even_when_anonymous() {
        let err = AppError::from(DispatchError::Denied {
            operation: "dropEverything".into(),
            reason: DenyReason::NoRule,
            authenticated: false,
        });

        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn resolver_errors_are_not_authorization_errors() {
        let err = AppError::from(DispatchError::Resolver(ResolverError::InvalidInput(
            "bio too long".into(),
        )));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = AppError::from(DispatchError::Resolver(ResolverError::Internal("db".into())));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::from(DispatchError::NoResolver("users".into()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_IMPLEMENTED);
    }
}
