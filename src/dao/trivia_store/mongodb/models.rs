//! BSON document shapes. Identifiers are stored as hyphenated strings.

use mongodb::bson::{Bson, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    AnswerRecordEntity, BadgeEntity, ChallengeEntity, Difficulty, GameSessionEntity,
    ParticipantEntity, ProfileEntity, SessionStatus, SubjectEntity, UserProgressEntity,
};

use super::error::{MongoDaoError, MongoResult};

pub fn parse_id(raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::Malformed {
        id: raw.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_optional_id(raw: Option<&str>) -> MongoResult<Option<Uuid>> {
    raw.map(parse_id).transpose()
}

pub fn doc_id(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSubjectDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub description: Option<String>,
}

impl From<SubjectEntity> for MongoSubjectDocument {
    fn from(value: SubjectEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            icon: value.icon,
            color: value.color,
            description: value.description,
        }
    }
}

impl TryFrom<MongoSubjectDocument> for SubjectEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSubjectDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(&value.id)?,
            name: value.name,
            icon: value.icon,
            color: value.color,
            description: value.description,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoChallengeDocument {
    pub id: String,
    pub subject_id: String,
    pub difficulty: Difficulty,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl From<ChallengeEntity> for MongoChallengeDocument {
    fn from(value: ChallengeEntity) -> Self {
        Self {
            id: value.id,
            subject_id: value.subject_id.to_string(),
            difficulty: value.difficulty,
            question: value.question,
            options: value.options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        }
    }
}

impl TryFrom<MongoChallengeDocument> for ChallengeEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoChallengeDocument) -> MongoResult<Self> {
        Ok(Self {
            id: value.id,
            subject_id: parse_id(&value.subject_id)?,
            difficulty: value.difficulty,
            question: value.question,
            options: value.options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        })
    }
}

impl MongoChallengeDocument {
    /// Raw form used inside `$set` updates.
    pub fn to_document(&self) -> Document {
        doc! {
            "id": &self.id,
            "subject_id": &self.subject_id,
            "difficulty": self.difficulty.as_str(),
            "question": &self.question,
            "options": self.options.clone(),
            "correct_answer": &self.correct_answer,
            "explanation": self.explanation.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub subject_id: String,
    pub difficulty: Difficulty,
    pub status: SessionStatus,
    pub created_at: DateTime,
    pub started_at: Option<DateTime>,
    pub ended_at: Option<DateTime>,
    #[serde(default)]
    pub questions: Vec<MongoChallengeDocument>,
}

impl From<GameSessionEntity> for MongoSessionDocument {
    fn from(value: GameSessionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            subject_id: value.subject_id.to_string(),
            difficulty: value.difficulty,
            status: value.status,
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            ended_at: value.ended_at.map(DateTime::from_system_time),
            questions: value.questions.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<MongoSessionDocument> for GameSessionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSessionDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(&value.id)?,
            subject_id: parse_id(&value.subject_id)?,
            difficulty: value.difficulty,
            status: value.status,
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(DateTime::to_system_time),
            ended_at: value.ended_at.map(DateTime::to_system_time),
            questions: value
                .questions
                .into_iter()
                .map(ChallengeEntity::try_from)
                .collect::<MongoResult<_>>()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    pub question_id: String,
    pub answer: Option<String>,
    pub correct: bool,
    pub points: i64,
    pub time_left: i64,
}

impl MongoAnswerDocument {
    pub fn to_document(&self) -> Document {
        doc! {
            "question_id": &self.question_id,
            "answer": self.answer.clone(),
            "correct": self.correct,
            "points": self.points,
            "time_left": self.time_left,
        }
    }
}

impl From<AnswerRecordEntity> for MongoAnswerDocument {
    fn from(value: AnswerRecordEntity) -> Self {
        Self {
            question_id: value.question_id,
            answer: value.answer,
            correct: value.correct,
            points: i64::from(value.points),
            time_left: i64::from(value.time_left),
        }
    }
}

impl From<MongoAnswerDocument> for AnswerRecordEntity {
    fn from(value: MongoAnswerDocument) -> Self {
        Self {
            question_id: value.question_id,
            answer: value.answer,
            correct: value.correct,
            points: to_count(value.points),
            time_left: to_count(value.time_left),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub is_ai: bool,
    pub ai_name: Option<String>,
    pub score: i64,
    #[serde(default)]
    pub answers: Vec<MongoAnswerDocument>,
    pub created_at: DateTime,
    pub completed_at: Option<DateTime>,
}

impl MongoParticipantDocument {
    /// Fields written by `$setOnInsert`, excluding the (session, user) key.
    pub fn insert_fields(&self) -> Document {
        doc! {
            "_id": &self.id,
            "is_ai": self.is_ai,
            "ai_name": self.ai_name.clone(),
            "score": self.score,
            "answers": Bson::Array(Vec::new()),
            "created_at": self.created_at,
            "completed_at": Bson::Null,
        }
    }
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id.to_string(),
            session_id: value.session_id.to_string(),
            user_id: value.user_id.map(|id| id.to_string()),
            is_ai: value.is_ai,
            ai_name: value.ai_name,
            score: i64::from(value.score),
            answers: value.answers.into_iter().map(Into::into).collect(),
            created_at: DateTime::from_system_time(value.created_at),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoParticipantDocument> for ParticipantEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoParticipantDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(&value.id)?,
            session_id: parse_id(&value.session_id)?,
            user_id: parse_optional_id(value.user_id.as_deref())?,
            is_ai: value.is_ai,
            ai_name: value.ai_name,
            score: to_count(value.score),
            answers: value.answers.into_iter().map(Into::into).collect(),
            created_at: value.created_at.to_system_time(),
            completed_at: value.completed_at.map(DateTime::to_system_time),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProfileDocument {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub total_points: i64,
}

impl From<ProfileEntity> for MongoProfileDocument {
    fn from(value: ProfileEntity) -> Self {
        Self {
            user_id: value.user_id.to_string(),
            username: value.username,
            avatar_url: value.avatar_url,
            total_points: i64::try_from(value.total_points).unwrap_or(i64::MAX),
        }
    }
}

impl TryFrom<MongoProfileDocument> for ProfileEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoProfileDocument) -> MongoResult<Self> {
        Ok(Self {
            user_id: parse_id(&value.user_id)?,
            username: value.username,
            avatar_url: value.avatar_url,
            total_points: u64::try_from(value.total_points).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBadgeDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: String,
    pub badge_type: String,
    pub subject_id: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl TryFrom<MongoBadgeDocument> for BadgeEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoBadgeDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(&value.id)?,
            name: value.name,
            description: value.description,
            icon: value.icon,
            badge_type: value.badge_type,
            subject_id: parse_optional_id(value.subject_id.as_deref())?,
            difficulty: value.difficulty,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserBadgeDocument {
    pub user_id: String,
    pub badge_id: String,
    pub earned_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProgressDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub subject_id: String,
    pub difficulty: Difficulty,
    pub completed: bool,
    #[serde(default)]
    pub wins: i64,
    pub updated_at: DateTime,
}

impl MongoProgressDocument {
    /// Composite key of a (user, subject, difficulty) progress row.
    pub fn key(user_id: Uuid, subject_id: Uuid, difficulty: Difficulty) -> String {
        format!("{user_id}:{subject_id}:{difficulty}")
    }
}

impl TryFrom<MongoProgressDocument> for UserProgressEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoProgressDocument) -> MongoResult<Self> {
        Ok(Self {
            user_id: parse_id(&value.user_id)?,
            subject_id: parse_id(&value.subject_id)?,
            difficulty: value.difficulty,
            completed: value.completed,
            wins: to_count(value.wins),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_document_keeps_ids_as_strings() {
        let session = GameSessionEntity::waiting(Uuid::from_u128(3), Difficulty::Advanced);
        let document: MongoSessionDocument = session.clone().into();
        assert_eq!(document.id, session.id.to_string());

        let back = GameSessionEntity::try_from(document).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.subject_id, session.subject_id);
    }

    #[test]
    fn malformed_ids_are_reported() {
        let document = MongoSubjectDocument {
            id: "not-a-uuid".into(),
            name: "Math".into(),
            icon: "+".into(),
            color: "blue".into(),
            description: None,
        };
        let err = SubjectEntity::try_from(document).unwrap_err();
        assert!(matches!(err, MongoDaoError::Malformed { .. }));
    }

    #[test]
    fn progress_key_is_stable() {
        let key = MongoProgressDocument::key(
            Uuid::from_u128(1),
            Uuid::from_u128(2),
            Difficulty::Intermediate,
        );
        assert!(key.ends_with(":intermediate"));
    }
}
