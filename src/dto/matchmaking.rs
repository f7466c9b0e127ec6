use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{Difficulty, GameSessionEntity, SessionStatus},
    dto::{common::ParticipantSummary, format_system_time},
};

/// Returned by `POST /matchmaking/{subject_id}/{difficulty}/join`.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub session_id: Uuid,
    pub participant_id: Uuid,
    /// False when the caller was already seated in this session.
    pub created: bool,
}

/// Waiting-room clock.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct LobbySnapshot {
    pub cycle: u32,
    pub max_cycles: u32,
    pub remaining_secs: u32,
}

/// Full view of a session returned by `GET /sessions/{id}` and sent first on its event stream.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub difficulty: Difficulty,
    pub status: SessionStatus,
    /// Present while the session waits for players.
    pub lobby: Option<LobbySnapshot>,
    pub question_count: usize,
    pub participants: Vec<ParticipantSummary>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

impl SessionSnapshot {
    pub fn new(
        session: &GameSessionEntity,
        lobby: Option<LobbySnapshot>,
        participants: Vec<ParticipantSummary>,
    ) -> Self {
        Self {
            id: session.id,
            subject_id: session.subject_id,
            difficulty: session.difficulty,
            status: session.status,
            lobby: lobby.filter(|_| session.status == SessionStatus::Waiting),
            question_count: session.questions.len(),
            participants,
            created_at: format_system_time(session.created_at),
            started_at: session.started_at.map(format_system_time),
            ended_at: session.ended_at.map(format_system_time),
        }
    }
}
