//! API error types with structured JSON responses.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::{self, AuthError};
use crate::core_state::CoreError;
use crate::error::ServiceError;
use crate::validation::ValidationError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Access denied")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(ValidationError),
    #[error("{0}")]
    Auth(AuthError),
    /// Sign-in failure that does not say which credential was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<&'static str>) {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                auth::error_message("unauthenticated").to_string(),
                None,
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "permission-denied",
                auth::error_message("permission-denied").to_string(),
                None,
            ),
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "not-found",
                auth::error_message("not-found").to_string(),
                None,
            ),
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                "invalid-argument",
                err.message.clone(),
                Some(err.field),
            ),
            ApiError::Auth(err) => {
                let code = err.code();
                (auth_status(err), code, auth::error_message(code).to_string(), None)
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "auth/invalid-credentials",
                auth::INVALID_CREDENTIALS_MESSAGE.to_string(),
                None,
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate-limited",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
                None,
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "invalid-argument",
                detail.clone(),
                None,
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        }
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::UserNotFound | AuthError::WrongPassword | AuthError::Unauthenticated => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::EmailAlreadyInUse => StatusCode::CONFLICT,
        AuthError::WeakPassword | AuthError::InvalidEmail | AuthError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        AuthError::UserDisabled => StatusCode::FORBIDDEN,
        AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        AuthError::LockPoisoned | AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, field) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                field,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(v) => ApiError::Validation(v),
            ServiceError::NotFound(entity) => ApiError::NotFound(entity),
            ServiceError::Forbidden => ApiError::Forbidden,
            ServiceError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(v) => ApiError::Validation(v),
            AuthError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            AuthError::Database(e) => ApiError::Internal(e.to_string()),
            other => ApiError::Auth(other),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ServiceError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "unauthenticated");
        assert!(json["error"].get("field").is_none());
    }

    #[tokio::test]
    async fn forbidden_uses_access_denied_message() {
        let response = ApiError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "permission-denied");
        assert_eq!(json["error"]["message"], "Access denied");
    }

    #[tokio::test]
    async fn validation_names_the_field() {
        let err = ValidationError::new("email", "Please enter a valid email address");
        let response = ApiError::Validation(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "invalid-argument");
        assert_eq!(json["error"]["field"], "email");
        assert_eq!(json["error"]["message"], "Please enter a valid email address");
    }

    #[tokio::test]
    async fn auth_errors_keep_their_codes() {
        let response = ApiError::from(AuthError::EmailAlreadyInUse).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "auth/email-already-in-use");

        let response = ApiError::from(AuthError::UserDisabled).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(
            json["error"]["message"],
            "Account is deactivated. Please contact administrator."
        );
    }

    #[tokio::test]
    async fn invalid_credentials_hides_which_part_failed() {
        let response = ApiError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
    }

    #[tokio::test]
    async fn internal_returns_500_without_detail() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn service_errors_map_to_api_errors() {
        assert!(matches!(ApiError::from(ServiceError::Forbidden), ApiError::Forbidden));
        assert!(matches!(
            ApiError::from(ServiceError::not_found("patient")),
            ApiError::NotFound(ref e) if e == "patient"
        ));
        let db_err = crate::db::DatabaseError::not_found("doctor", "d-1");
        assert!(matches!(ApiError::from(db_err), ApiError::NotFound(_)));
    }
}
