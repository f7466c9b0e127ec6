use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    auth::MaybeAuthUser,
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse},
    error::AppError,
    services::leaderboard_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Top profiles and the caller's rank", body = LeaderboardResponse),
        (status = 400, description = "Limit outside 1..=100")
    )
)]
/// Top players by cumulative points.
pub async fn leaderboard(
    MaybeAuthUser(caller): MaybeAuthUser,
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<LeaderboardQuery>>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let response = leaderboard_service::leaderboard(&state, caller, query).await?;
    Ok(Json(response))
}

/// Configure the leaderboard route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/leaderboard", get(leaderboard))
}
