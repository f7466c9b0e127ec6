use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    auth::AuthUser,
    dto::{
        challenges::{ChallengesFailure, GenerateChallengesRequest, GenerateChallengesResponse},
        lesson::{GenerateLessonRequest, GenerateLessonResponse},
    },
    error::AppError,
    services::{lesson_service, question_service},
    state::SharedState,
};

/// LLM-backed content generation endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/functions/generate-challenges",
            post(generate_challenges).options(preflight),
        )
        .route(
            "/functions/generate-lesson",
            post(generate_lesson).options(preflight),
        )
}

/// Answer CORS preflights with an empty body.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Decode a JSON body in two steps so syntax errors and schema errors get
/// distinct messages, then apply the field rules.
fn parse_body<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Validate,
{
    let value: Value =
        serde_json::from_slice(body).map_err(|_| AppError::bad_request("Invalid JSON body"))?;
    let request: T = serde_json::from_value(value).map_err(schema_error)?;
    request.validate()?;
    Ok(request)
}

fn schema_error(err: serde_json::Error) -> AppError {
    let mut error = ValidationError::new("schema");
    error.message = Some(err.to_string().into());
    let mut errors = ValidationErrors::new();
    errors.add("body", error);
    errors.into()
}

/// Generate multiple-choice questions for a subject.
#[utoipa::path(
    post,
    path = "/functions/generate-challenges",
    tag = "functions",
    request_body = GenerateChallengesRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Generated or fallback questions", body = GenerateChallengesResponse),
        (status = 400, description = "Invalid JSON body or invalid input"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Gateway failure", body = ChallengesFailure)
    )
)]
pub async fn generate_challenges(
    user: AuthUser,
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: GenerateChallengesRequest = parse_body(&body)?;
    match question_service::generate_challenges(&state, request).await {
        Ok(response) => Ok(Json(response).into_response()),
        Err(err) => {
            error!(user_id = %user.user_id, error = %err, "challenge generation failed");
            let failure = ChallengesFailure {
                error: err.to_string(),
                questions: Vec::new(),
            };
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(failure)).into_response())
        }
    }
}

/// Generate a slide-based lesson about a topic.
#[utoipa::path(
    post,
    path = "/functions/generate-lesson",
    tag = "functions",
    request_body = GenerateLessonRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Generated lesson", body = GenerateLessonResponse),
        (status = 400, description = "Invalid JSON body or invalid input"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 402, description = "AI credits exhausted"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Gateway failure")
    )
)]
pub async fn generate_lesson(
    user: AuthUser,
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<GenerateLessonResponse>, AppError> {
    let request: GenerateLessonRequest = parse_body(&body)?;
    let response = lesson_service::generate_lesson(&state, request)
        .await
        .inspect_err(|err| error!(user_id = %user.user_id, error = %err, "lesson generation failed"))?;
    Ok(Json(response))
}
