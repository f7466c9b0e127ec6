use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{ChallengeEntity, ParticipantEntity},
    dto::format_system_time,
};

/// Public projection of a participant exposed to REST/SSE clients.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Option<Uuid>,
    pub is_ai: bool,
    /// AI name, or the username of a human player when known.
    pub display_name: String,
    pub score: u32,
    /// Number of questions already answered.
    pub answered: usize,
    pub joined_at: String,
    pub completed_at: Option<String>,
}

impl ParticipantSummary {
    /// Project a row, naming humans with `username` when one is known.
    pub fn from_entity(participant: &ParticipantEntity, username: Option<&str>) -> Self {
        let display_name = match (&participant.ai_name, username) {
            (Some(name), _) if participant.is_ai => name.clone(),
            (_, Some(username)) => username.to_string(),
            _ => "Player".to_string(),
        };

        Self {
            id: participant.id,
            session_id: participant.session_id,
            user_id: participant.user_id,
            is_ai: participant.is_ai,
            display_name,
            score: participant.score,
            answered: participant.answers.len(),
            joined_at: format_system_time(participant.created_at),
            completed_at: participant.completed_at.map(format_system_time),
        }
    }
}

impl From<&ParticipantEntity> for ParticipantSummary {
    fn from(participant: &ParticipantEntity) -> Self {
        Self::from_entity(participant, None)
    }
}

/// Question as shown while it can still be answered: no correct option.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PublicQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
}

impl From<&ChallengeEntity> for PublicQuestion {
    fn from(challenge: &ChallengeEntity) -> Self {
        Self {
            id: challenge.id.clone(),
            question: challenge.question.clone(),
            options: challenge.options.clone(),
        }
    }
}
