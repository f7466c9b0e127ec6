use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Path of the Swagger UI.
pub const SWAGGER_PATH: &str = "/docs";
/// Path of the raw OpenAPI document consumed by the UI and client generators.
pub const OPENAPI_PATH: &str = "/api-doc/openapi.json";

/// Swagger UI plus the trivia arena OpenAPI document.
pub fn router(state: SharedState) -> Router<SharedState> {
    let swagger: Router<SharedState> = SwaggerUi::new(SWAGGER_PATH)
        .url(OPENAPI_PATH, ApiDoc::openapi())
        .into();

    swagger.with_state(state)
}
