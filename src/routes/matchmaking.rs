use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    dao::models::Difficulty,
    dto::matchmaking::JoinResponse,
    error::AppError,
    services::matchmaking_service,
    state::SharedState,
};

/// Waiting room endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matchmaking/{subject_id}/{difficulty}/join", post(join))
        .route("/matchmaking/sessions/{id}/participant", delete(leave))
}

/// Join the oldest waiting session of a pool, creating one when none exists.
#[utoipa::path(
    post,
    path = "/matchmaking/{subject_id}/{difficulty}/join",
    tag = "matchmaking",
    security(("bearer" = [])),
    params(
        ("subject_id" = Uuid, Path, description = "Subject to play"),
        ("difficulty" = String, Path, description = "basic, intermediate or advanced")
    ),
    responses(
        (status = 200, description = "Seat in a waiting session", body = JoinResponse),
        (status = 400, description = "Unknown difficulty"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Unknown subject")
    )
)]
pub async fn join(
    user: AuthUser,
    State(state): State<SharedState>,
    Path((subject_id, difficulty)): Path<(Uuid, String)>,
) -> Result<Json<JoinResponse>, AppError> {
    let difficulty = difficulty
        .parse::<Difficulty>()
        .map_err(|err| AppError::bad_request(err.to_string()))?;
    let response = matchmaking_service::join(&state, user, subject_id, difficulty).await?;
    Ok(Json(response))
}

/// Leave a session that is still waiting for players.
#[utoipa::path(
    delete,
    path = "/matchmaking/sessions/{id}/participant",
    tag = "matchmaking",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Session to leave")),
    responses(
        (status = 204, description = "Seat released"),
        (status = 404, description = "Caller is not seated in the session"),
        (status = 409, description = "Session already left the waiting room")
    )
)]
pub async fn leave(
    user: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    matchmaking_service::leave(&state, user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
