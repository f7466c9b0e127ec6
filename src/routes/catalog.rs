use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    dto::catalog::{ProfileResponse, SubjectDetail, SubjectSummary},
    error::AppError,
    services::catalog_service,
    state::SharedState,
};

/// Subjects and profile endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/subjects", get(list_subjects))
        .route("/subjects/{id}", get(subject_detail))
        .route("/profile", get(profile))
}

/// Every subject.
#[utoipa::path(
    get,
    path = "/subjects",
    tag = "catalog",
    responses((status = 200, description = "Subjects", body = [SubjectSummary]))
)]
pub async fn list_subjects(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SubjectSummary>>, AppError> {
    Ok(Json(catalog_service::list_subjects(&state).await?))
}

/// A subject with the caller's progress per difficulty.
#[utoipa::path(
    get,
    path = "/subjects/{id}",
    tag = "catalog",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Subject identifier")),
    responses(
        (status = 200, description = "Subject detail", body = SubjectDetail),
        (status = 404, description = "Unknown subject")
    )
)]
pub async fn subject_detail(
    user: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubjectDetail>, AppError> {
    Ok(Json(catalog_service::subject_detail(&state, user, id).await?))
}

/// Profile of the caller.
#[utoipa::path(
    get,
    path = "/profile",
    tag = "catalog",
    security(("bearer" = [])),
    responses((status = 200, description = "Profile and badges", body = ProfileResponse))
)]
pub async fn profile(
    user: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(catalog_service::profile(&state, user).await?))
}
