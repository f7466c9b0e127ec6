use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Subjects and profiles.
pub mod catalog;
/// Question generation payloads.
pub mod challenges;
/// Shapes shared by several endpoints.
pub mod common;
/// Rounds, answers and results.
pub mod game;
/// Health check payload.
pub mod health;
/// Leaderboard query and response.
pub mod leaderboard;
/// Lesson generation payloads.
pub mod lesson;
/// Join responses and session snapshots.
pub mod matchmaking;
/// Server-sent event payloads.
pub mod sse;
/// Custom validators.
pub mod validation;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
