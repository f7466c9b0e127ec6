use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{AnswerRecordEntity, SessionStatus},
    dto::common::{ParticipantSummary, PublicQuestion},
    state::round::{AnswerOutcome, RoundPhase, RoundView},
};

/// Body of `POST /game/{session_id}/answer`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    /// Selected option, as displayed.
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
}

/// Feedback returned after an answer locks.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResponse {
    pub correct: bool,
    pub correct_answer: String,
    pub points: u32,
    pub score: u32,
}

impl From<AnswerOutcome> for AnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        Self {
            correct: outcome.correct,
            correct_answer: outcome.correct_answer,
            points: outcome.points,
            score: outcome.score,
        }
    }
}

/// Phase of a player's round as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhaseDto {
    Answering,
    Revealed,
    Finished,
}

impl From<RoundPhase> for RoundPhaseDto {
    fn from(phase: RoundPhase) -> Self {
        match phase {
            RoundPhase::Answering => RoundPhaseDto::Answering,
            RoundPhase::Revealed => RoundPhaseDto::Revealed,
            RoundPhase::Finished => RoundPhaseDto::Finished,
        }
    }
}

/// Last locked answer, shown once revealed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RevealedAnswer {
    pub question_id: String,
    pub answer: Option<String>,
    pub correct: bool,
    pub points: u32,
}

impl From<&AnswerRecordEntity> for RevealedAnswer {
    fn from(record: &AnswerRecordEntity) -> Self {
        Self {
            question_id: record.question_id.clone(),
            answer: record.answer.clone(),
            correct: record.correct,
            points: record.points,
        }
    }
}

/// State of the caller's round, returned by `play` and `GET /game/{session_id}/round`.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundSnapshot {
    pub session_id: Uuid,
    pub participant_id: Uuid,
    pub phase: RoundPhaseDto,
    /// Zero-based question index.
    pub index: usize,
    pub total: usize,
    pub time_left: u32,
    pub score: u32,
    pub question: Option<PublicQuestion>,
    /// Correct option, only once the question is revealed.
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
    pub last_answer: Option<RevealedAnswer>,
}

impl RoundSnapshot {
    pub fn new(session_id: Uuid, participant_id: Uuid, view: &RoundView) -> Self {
        let revealed = view.phase == RoundPhase::Revealed;
        Self {
            session_id,
            participant_id,
            phase: view.phase.into(),
            index: view.index,
            total: view.total,
            time_left: view.time_left,
            score: view.score,
            question: view.question.as_ref().map(PublicQuestion::from),
            correct_answer: view
                .question
                .as_ref()
                .filter(|_| revealed)
                .map(|question| question.correct_answer.clone()),
            explanation: view
                .question
                .as_ref()
                .filter(|_| revealed)
                .and_then(|question| question.explanation.clone()),
            last_answer: view.last.as_ref().map(RevealedAnswer::from),
        }
    }
}

/// Ranked line of the results table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Standing {
    pub rank: usize,
    pub participant: ParticipantSummary,
}

/// Returned by `GET /game/{session_id}/results`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultsResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub standings: Vec<Standing>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{ChallengeEntity, Difficulty},
        state::round::PlayerRound,
    };

    fn question() -> ChallengeEntity {
        ChallengeEntity {
            id: "1".into(),
            subject_id: Uuid::nil(),
            difficulty: Difficulty::Basic,
            question: "2 + 2?".into(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_answer: "4".into(),
            explanation: Some("Counting.".into()),
        }
    }

    #[test]
    fn correct_answer_is_hidden_until_revealed() {
        let mut round = PlayerRound::new(vec![question(), question()], 15);
        let snapshot = RoundSnapshot::new(Uuid::nil(), Uuid::nil(), &round.view());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "answering");
        assert!(json.get("correct_answer").is_none());
        assert!(json["question"].get("correct_answer").is_none());

        round.answer("4").unwrap();
        let snapshot = RoundSnapshot::new(Uuid::nil(), Uuid::nil(), &round.view());
        assert_eq!(snapshot.correct_answer.as_deref(), Some("4"));
        assert_eq!(snapshot.explanation.as_deref(), Some("Counting."));
        assert_eq!(snapshot.last_answer.map(|last| last.points), Some(175));
    }
}
