use axum::Router;

use crate::state::SharedState;

/// Subjects and profile.
pub mod catalog;
/// Swagger UI.
pub mod docs;
/// LLM-backed server functions.
pub mod functions;
/// Live rounds and results.
pub mod game;
/// Health check.
pub mod health;
/// Global ranking.
pub mod leaderboard;
/// Waiting room.
pub mod matchmaking;
/// Session snapshots and event streams.
pub mod sessions;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(functions::router())
        .merge(matchmaking::router())
        .merge(sessions::router())
        .merge(game::router())
        .merge(leaderboard::router())
        .merge(catalog::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
