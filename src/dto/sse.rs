use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::SessionStatus,
    dto::common::{ParticipantSummary, PublicQuestion},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// `participant.inserted`, `participant.updated` and `participant.deleted`.
pub struct ParticipantChangedEvent {
    pub participant: ParticipantSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// `lobby.countdown`: one second elapsed in the waiting room.
pub struct LobbyCountdownEvent {
    pub session_id: Uuid,
    pub cycle: u32,
    pub remaining_secs: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// `lobby.cycle`: the countdown restarted.
pub struct LobbyCycleEvent {
    pub session_id: Uuid,
    pub cycle: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// `session.status`: the persisted status moved forward.
pub struct SessionStatusEvent {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize, ToSchema)]
/// `session.handoff`: players should call `play` now.
pub struct SessionHandoffEvent {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// `round.question`: a player moved to a new question.
pub struct RoundQuestionEvent {
    pub participant_id: Uuid,
    pub index: usize,
    pub total: usize,
    pub time_left: u32,
    pub question: PublicQuestion,
}

#[derive(Debug, Serialize, ToSchema)]
/// `round.tick`: one second elapsed on a player's question.
pub struct RoundTickEvent {
    pub participant_id: Uuid,
    pub index: usize,
    pub time_left: u32,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
/// `round.revealed`: a player's question locked.
pub struct RoundRevealedEvent {
    pub participant_id: Uuid,
    pub index: usize,
    pub answer: Option<String>,
    pub correct: bool,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub points: u32,
    pub score: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// `round.completed`: a player finished every question.
pub struct RoundCompletedEvent {
    pub participant_id: Uuid,
    pub score: u32,
    pub rank: usize,
}
