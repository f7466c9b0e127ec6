use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    gateway::GatewayError,
    state::{AbortError, ApplyError, PlanError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Missing or invalid bearer token.
    #[error("{0}")]
    Unauthorized(String),
    /// Request body is not valid JSON.
    #[error("{0}")]
    InvalidInput(String),
    /// Request body is JSON but breaks the field rules.
    #[error("Invalid input")]
    Validation(#[from] ValidationErrors),
    /// Operation cannot be performed in the current state.
    #[error("{0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("{0}")]
    NotFound(String),
    /// The LLM gateway throttled the request.
    #[error("Rate limit exceeded. Please try again later.")]
    UpstreamRateLimited,
    /// The LLM gateway account ran out of credits.
    #[error("AI credits exhausted. Please add credits.")]
    UpstreamQuotaExhausted,
    /// Any other LLM gateway failure.
    #[error("{0}")]
    Upstream(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::RateLimited => ServiceError::UpstreamRateLimited,
            GatewayError::QuotaExhausted => ServiceError::UpstreamQuotaExhausted,
            other => ServiceError::Upstream(other.to_string()),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{message}")]
    BadRequest {
        /// Top-level error message.
        message: String,
        /// Field-level details, when available.
        details: Option<Value>,
    },
    /// Unauthorized access attempt.
    #[error("{0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("{0}")]
    Conflict(String),
    /// Upstream credits exhausted.
    #[error("{0}")]
    PaymentRequired(String),
    /// Upstream rate limit reached.
    #[error("{0}")]
    TooManyRequests(String),
    /// Service unavailable or degraded.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Build a 400 response without details.
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status matching the error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest {
            message: "Invalid input".into(),
            details: serde_json::to_value(&err).ok(),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::bad_request(message),
            ServiceError::Validation(errors) => errors.into(),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            err @ ServiceError::UpstreamRateLimited => AppError::TooManyRequests(err.to_string()),
            err @ ServiceError::UpstreamQuotaExhausted => {
                AppError::PaymentRequired(err.to_string())
            }
            ServiceError::Upstream(message) => AppError::Internal(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

/// JSON error body: `{ "error": ..., "details": ... }`.
#[derive(Serialize)]
pub struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = match self {
            AppError::BadRequest { message, details } => ErrorBody {
                error: message,
                details,
            },
            other => ErrorBody {
                error: other.to_string(),
                details: None,
            },
        };

        (status, Json(payload)).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("session transition already pending".into())
            }
            PlanError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.to_string())
            }
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::InvalidState(format!(
                "session changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::VersionMismatch { expected, actual } => {
                ServiceError::InvalidState(format!(
                    "session version mismatch during transition (expected {expected}, got {actual})"
                ))
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use validator::ValidationError;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn upstream_errors_keep_their_status_codes() {
        let (status, body) = body_of(ServiceError::UpstreamRateLimited.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded. Please try again later.");

        let (status, body) = body_of(ServiceError::UpstreamQuotaExhausted.into()).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"], "AI credits exhausted. Please add credits.");
    }

    #[tokio::test]
    async fn validation_errors_carry_details() {
        let mut errors = ValidationErrors::new();
        errors.add("count", ValidationError::new("range"));

        let (status, body) = body_of(ServiceError::Validation(errors).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid input");
        assert!(body["details"]["count"].is_array());
    }

    #[tokio::test]
    async fn plain_bad_request_omits_details() {
        let (status, body) = body_of(AppError::bad_request("Invalid JSON body")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "Invalid JSON body" }));
    }
}
