use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::ChallengeEntity,
    dto::validation::{validate_difficulty, validate_uuid},
};

fn default_count() -> i64 {
    5
}

/// Body of `POST /functions/generate-challenges`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateChallengesRequest {
    /// Subject the questions are about.
    #[validate(custom(function = "validate_uuid"))]
    pub subject_id: String,
    /// `basic`, `intermediate` or `advanced`.
    #[validate(custom(function = "validate_difficulty"))]
    pub difficulty: String,
    /// Number of questions, 1 to 10.
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 10))]
    pub count: i64,
}

/// One generated question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    /// Identifier, unique within the set.
    pub id: String,
    /// Question text.
    pub question: String,
    /// Exactly four options.
    pub options: Vec<String>,
    /// One of `options`.
    pub correct_answer: String,
    /// Short explanation, possibly empty.
    pub explanation: String,
}

impl From<&ChallengeEntity> for Question {
    fn from(challenge: &ChallengeEntity) -> Self {
        Self {
            id: challenge.id.clone(),
            question: challenge.question.clone(),
            options: challenge.options.clone(),
            correct_answer: challenge.correct_answer.clone(),
            explanation: challenge.explanation.clone().unwrap_or_default(),
        }
    }
}

/// Response of `POST /functions/generate-challenges`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateChallengesResponse {
    /// Generated or fallback questions.
    pub questions: Vec<Question>,
}

/// 500 body of `POST /functions/generate-challenges`: the message plus an empty list.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengesFailure {
    /// Failure message.
    pub error: String,
    /// Always empty.
    pub questions: Vec<Question>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_defaults_to_five() {
        let request: GenerateChallengesRequest = serde_json::from_value(serde_json::json!({
            "subjectId": "6f1c1c1e-36b1-4c8f-9d6e-4f9b1b7a0c11",
            "difficulty": "basic"
        }))
        .unwrap();
        assert_eq!(request.count, 5);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn every_broken_field_is_reported() {
        let request = GenerateChallengesRequest {
            subject_id: "nope".into(),
            difficulty: "expert".into(),
            count: 11,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("subject_id"));
        assert!(fields.contains_key("difficulty"));
        assert!(fields.contains_key("count"));
    }
}
