use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    dto::game::{AnswerRequest, AnswerResponse, ResultsResponse, RoundSnapshot},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Live game endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/{session_id}/play", post(play))
        .route("/game/{session_id}/answer", post(answer))
        .route("/game/{session_id}/round", get(round))
        .route("/game/{session_id}/results", get(results))
}

/// Enter the game and start the caller's round. Idempotent while the round runs.
#[utoipa::path(
    post,
    path = "/game/{session_id}/play",
    tag = "game",
    security(("bearer" = [])),
    params(("session_id" = Uuid, Path, description = "Session to play")),
    responses(
        (status = 200, description = "Current round", body = RoundSnapshot),
        (status = 404, description = "Unknown session or caller not seated"),
        (status = 409, description = "Session not startable")
    )
)]
pub async fn play(
    user: AuthUser,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<RoundSnapshot>, AppError> {
    let snapshot = game_service::play(&state, user, session_id).await?;
    Ok(Json(snapshot))
}

/// Lock an answer on the current question.
#[utoipa::path(
    post,
    path = "/game/{session_id}/answer",
    tag = "game",
    security(("bearer" = [])),
    request_body = AnswerRequest,
    params(("session_id" = Uuid, Path, description = "Session being played")),
    responses(
        (status = 200, description = "Answer outcome", body = AnswerResponse),
        (status = 400, description = "Invalid answer"),
        (status = 409, description = "No round running or question already answered")
    )
)]
pub async fn answer(
    user: AuthUser,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    payload.validate()?;
    let outcome = game_service::answer(&state, user, session_id, payload).await?;
    Ok(Json(outcome))
}

/// Current round of the caller.
#[utoipa::path(
    get,
    path = "/game/{session_id}/round",
    tag = "game",
    security(("bearer" = [])),
    params(("session_id" = Uuid, Path, description = "Session being played")),
    responses(
        (status = 200, description = "Round snapshot", body = RoundSnapshot),
        (status = 409, description = "Round not started")
    )
)]
pub async fn round(
    user: AuthUser,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<RoundSnapshot>, AppError> {
    let snapshot = game_service::round_snapshot(&state, user, session_id).await?;
    Ok(Json(snapshot))
}

/// Participants ranked by score.
#[utoipa::path(
    get,
    path = "/game/{session_id}/results",
    tag = "game",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Standings", body = ResultsResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn results(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ResultsResponse>, AppError> {
    let results = game_service::results(&state, session_id).await?;
    Ok(Json(results))
}
