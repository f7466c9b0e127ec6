use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Registers the bearer scheme referenced by authenticated routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Trivia Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::functions::generate_challenges,
        crate::routes::functions::generate_lesson,
        crate::routes::matchmaking::join,
        crate::routes::matchmaking::leave,
        crate::routes::sessions::session,
        crate::routes::sessions::session_events,
        crate::routes::game::play,
        crate::routes::game::answer,
        crate::routes::game::round,
        crate::routes::game::results,
        crate::routes::leaderboard::leaderboard,
        crate::routes::catalog::list_subjects,
        crate::routes::catalog::subject_detail,
        crate::routes::catalog::profile,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::challenges::GenerateChallengesRequest,
            crate::dto::challenges::GenerateChallengesResponse,
            crate::dto::challenges::ChallengesFailure,
            crate::dto::challenges::Question,
            crate::dto::lesson::GenerateLessonRequest,
            crate::dto::lesson::GenerateLessonResponse,
            crate::dto::lesson::Lesson,
            crate::dto::lesson::Slide,
            crate::dto::matchmaking::JoinResponse,
            crate::dto::matchmaking::SessionSnapshot,
            crate::dto::game::AnswerRequest,
            crate::dto::game::AnswerResponse,
            crate::dto::game::RoundSnapshot,
            crate::dto::game::ResultsResponse,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::catalog::SubjectSummary,
            crate::dto::catalog::SubjectDetail,
            crate::dto::catalog::ProfileResponse,
            crate::dto::sse::ParticipantChangedEvent,
            crate::dto::sse::LobbyCountdownEvent,
            crate::dto::sse::LobbyCycleEvent,
            crate::dto::sse::SessionStatusEvent,
            crate::dto::sse::SessionHandoffEvent,
            crate::dto::sse::RoundQuestionEvent,
            crate::dto::sse::RoundTickEvent,
            crate::dto::sse::RoundRevealedEvent,
            crate::dto::sse::RoundCompletedEvent,
            crate::dao::models::Difficulty,
            crate::dao::models::SessionStatus,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "functions", description = "LLM-backed question and lesson generation"),
        (name = "matchmaking", description = "Waiting room operations"),
        (name = "sessions", description = "Session snapshots"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "game", description = "Live rounds and results"),
        (name = "leaderboard", description = "Global ranking"),
        (name = "catalog", description = "Subjects and profiles"),
    )
)]
pub struct ApiDoc;
