/// Subjects, profiles and subject seeding.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Live rounds, simulated opponents and session completion.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Global ranking.
pub mod leaderboard_service;
/// Slide-based lesson generation.
pub mod lesson_service;
/// Waiting room and lobby driver.
pub mod matchmaking_service;
/// Question generation and repair.
pub mod question_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events subscription service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
