use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::matchmaking::SessionSnapshot,
    error::AppError,
    services::{matchmaking_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
/// Status, lobby clock and participants of a session.
pub async fn session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = matchmaking_service::session_snapshot(&state, id).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session SSE stream, opened by a snapshot", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown session")
    )
)]
/// Stream lobby, participant and round events of a session.
pub async fn session_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, first) = sse_service::subscribe_session(&state, id).await?;
    info!(session_id = %id, "new session SSE connection");
    Ok(sse_service::to_sse_stream(receiver, first, id))
}

/// Session snapshot and event stream endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sessions/{id}", get(session))
        .route("/sessions/{id}/events", get(session_events))
}
