use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Difficulty tier partitioning content and matchmaking pools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Beginner-level content.
    Basic,
    /// Middle-school level content.
    Intermediate,
    /// High-school level content.
    Advanced,
}

impl Difficulty {
    /// Every tier, in ascending order.
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Basic,
        Difficulty::Intermediate,
        Difficulty::Advanced,
    ];

    /// Stable lowercase identifier used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Basic => "basic",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a difficulty tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("difficulty must be basic, intermediate, or advanced (got `{0}`)")]
pub struct UnknownDifficulty(pub String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "basic" => Ok(Difficulty::Basic),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(UnknownDifficulty(other.to_string())),
        }
    }
}

/// Persisted lifecycle status of a game session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting participants.
    Waiting,
    /// Enough participants joined; players are getting ready.
    Starting,
    /// At least one round is being played.
    InProgress,
    /// A player finished the last question.
    Completed,
}

impl SessionStatus {
    /// Lowercase identifier used in storage filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Starting => "starting",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

/// Immutable reference data describing a quiz subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectEntity {
    /// Stable identifier for the subject.
    pub id: Uuid,
    /// Display name (e.g. "Math").
    pub name: String,
    /// Icon glyph shown next to the name.
    pub icon: String,
    /// Color tag used by the UI.
    pub color: String,
    /// Optional short description.
    pub description: Option<String>,
}

/// A multiple-choice question bound to a subject and difficulty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeEntity {
    /// Identifier of the question inside its generated set ("1", "2", ...).
    pub id: String,
    /// Subject the question belongs to.
    pub subject_id: Uuid,
    /// Difficulty tier of the question.
    pub difficulty: Difficulty,
    /// Question text.
    pub question: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Value of the correct option.
    pub correct_answer: String,
    /// Optional explanation revealed after answering.
    pub explanation: Option<String>,
}

/// One matchmade game instance for a (subject, difficulty) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Subject being played.
    pub subject_id: Uuid,
    /// Difficulty tier being played.
    pub difficulty: Difficulty,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Creation timestamp, used to pick the oldest waiting session.
    pub created_at: SystemTime,
    /// Set when the session leaves the waiting room.
    pub started_at: Option<SystemTime>,
    /// Set when the session completes.
    pub ended_at: Option<SystemTime>,
    /// Questions shared by every participant, attached once on first play.
    pub questions: Vec<ChallengeEntity>,
}

impl GameSessionEntity {
    /// Build a fresh waiting session.
    pub fn waiting(subject_id: Uuid, difficulty: Difficulty) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            difficulty,
            status: SessionStatus::Waiting,
            created_at: SystemTime::now(),
            started_at: None,
            ended_at: None,
            questions: Vec::new(),
        }
    }
}

/// Per-question answer checkpoint stored on a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRecordEntity {
    /// Identifier of the answered question.
    pub question_id: String,
    /// Selected option, `None` when the timer ran out.
    pub answer: Option<String>,
    /// Whether the answer matched the correct option.
    pub correct: bool,
    /// Points earned for this question.
    pub points: u32,
    /// Seconds left on the question timer when the answer locked.
    pub time_left: u32,
}

/// One seat in a session, human or simulated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Primary key of the participant row.
    pub id: Uuid,
    /// Session the participant belongs to.
    pub session_id: Uuid,
    /// Owning user for human players, `None` for AI opponents.
    pub user_id: Option<Uuid>,
    /// True for simulated opponents.
    pub is_ai: bool,
    /// Display name of an AI opponent.
    pub ai_name: Option<String>,
    /// Running score in points.
    pub score: u32,
    /// Answer log, one entry per finished question.
    pub answers: Vec<AnswerRecordEntity>,
    /// Join timestamp.
    pub created_at: SystemTime,
    /// Set once the participant finished every question.
    pub completed_at: Option<SystemTime>,
}

impl ParticipantEntity {
    /// Build a human participant row for `user_id`.
    pub fn human(session_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            user_id: Some(user_id),
            is_ai: false,
            ai_name: None,
            score: 0,
            answers: Vec::new(),
            created_at: SystemTime::now(),
            completed_at: None,
        }
    }

    /// Build a simulated opponent row.
    pub fn ai(session_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            user_id: None,
            is_ai: true,
            ai_name: Some(name.into()),
            score: 0,
            answers: Vec::new(),
            created_at: SystemTime::now(),
            completed_at: None,
        }
    }
}

/// Public profile of a user, holding the cumulative score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileEntity {
    /// Owning user.
    pub user_id: Uuid,
    /// Display name chosen at sign-up.
    pub username: Option<String>,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Points accumulated over every completed session.
    pub total_points: u64,
}

impl ProfileEntity {
    /// Empty profile for a user the auth provider has not described yet.
    pub fn blank(user_id: Uuid) -> Self {
        Self {
            user_id,
            username: None,
            avatar_url: None,
            total_points: 0,
        }
    }
}

/// Achievement definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BadgeEntity {
    /// Primary key of the badge.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Icon glyph.
    pub icon: String,
    /// Free-form category of the badge.
    pub badge_type: String,
    /// Subject the badge is tied to, if any.
    pub subject_id: Option<Uuid>,
    /// Difficulty the badge is tied to, if any.
    pub difficulty: Option<Difficulty>,
}

/// Badge unlocked by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EarnedBadgeEntity {
    /// Badge definition.
    pub badge: BadgeEntity,
    /// Unlock timestamp.
    pub earned_at: SystemTime,
}

/// Progress of a user on a (subject, difficulty) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProgressEntity {
    /// Owning user.
    pub user_id: Uuid,
    /// Subject played.
    pub subject_id: Uuid,
    /// Difficulty played.
    pub difficulty: Difficulty,
    /// Whether the user finished at least one session.
    pub completed: bool,
    /// Number of sessions won (ranked first).
    pub wins: u32,
    /// Last update.
    pub updated_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_parses_known_tiers_only() {
        for tier in Difficulty::ALL {
            assert_eq!(tier.as_str().parse::<Difficulty>(), Ok(tier));
        }
        assert!("expert".parse::<Difficulty>().is_err());
        assert!("Basic".parse::<Difficulty>().is_err());
    }

    #[test]
    fn session_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
