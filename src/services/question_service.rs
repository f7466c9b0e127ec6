//! Question generation through the LLM gateway, with schema repair and
//! canned fallbacks.

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::SampleQuestion,
    dao::models::{ChallengeEntity, Difficulty, GameSessionEntity},
    dto::challenges::{GenerateChallengesRequest, GenerateChallengesResponse, Question},
    error::ServiceError,
    gateway::{ChatMessage, ChatRequest},
    state::SharedState,
};

const GENERAL_KNOWLEDGE: &str = "General Knowledge";
const OPTION_COUNT: usize = 4;
const SYSTEM_PROMPT: &str = "You are an educational content generator. Generate engaging and accurate quiz questions. Always respond with valid JSON only, no markdown formatting.";

/// Audience description used in the prompt.
pub fn difficulty_description(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Basic => "simple, beginner-level questions suitable for elementary students",
        Difficulty::Intermediate => "moderate difficulty questions for middle school level",
        Difficulty::Advanced => "challenging questions for high school students",
    }
}

/// User prompt asking for `count` questions about `subject_name`.
pub fn build_prompt(subject_name: &str, difficulty: Difficulty, count: u8) -> String {
    format!(
        r#"Generate {count} multiple choice questions about {subject_name}.
These should be {description}.

For each question, provide:
1. A clear question
2. Exactly 4 options (A, B, C, D)
3. The correct answer
4. A brief explanation

Return ONLY valid JSON in this exact format, no markdown:
{{
  "questions": [
    {{
      "id": "1",
      "question": "The question text here?",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct_answer": "Option A",
      "explanation": "Brief explanation"
    }}
  ]
}}"#,
        description = difficulty_description(difficulty)
    )
}

/// Remove markdown code fences and surrounding whitespace.
pub fn strip_fences(content: &str) -> String {
    content
        .replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Canned set served when the model output cannot be used.
pub fn fallback_questions(subject_name: &str) -> Vec<Question> {
    let rows: [(String, [&str; 4], &str); 5] = [
        (
            format!("What is a key concept in {subject_name}?"),
            ["Option A", "Option B", "Option C", "Option D"],
            "This is the correct answer.",
        ),
        (
            format!("Which of these relates to {subject_name}?"),
            ["Choice 1", "Choice 2", "Choice 3", "Choice 4"],
            "This is correct.",
        ),
        (
            format!("In {subject_name}, what is important?"),
            ["Answer A", "Answer B", "Answer C", "Answer D"],
            "This is why.",
        ),
        (
            format!("What principle applies to {subject_name}?"),
            ["First", "Second", "Third", "Fourth"],
            "Explanation here.",
        ),
        (
            format!("Which statement about {subject_name} is true?"),
            ["True A", "True B", "True C", "True D"],
            "Because...",
        ),
    ];

    rows.into_iter()
        .enumerate()
        .map(|(index, (question, options, explanation))| Question {
            id: (index + 1).to_string(),
            question,
            correct_answer: options[0].to_string(),
            options: options.into_iter().map(String::from).collect(),
            explanation: explanation.to_string(),
        })
        .collect()
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Coerce parsed model output into well-formed questions.
///
/// Accepts `{ "questions": [...] }` or a bare array. Items without a question,
/// without exactly four options, or whose correct answer is not an option are
/// dropped. Missing ids are renumbered and missing explanations become empty.
pub fn repair(value: &Value) -> Vec<Question> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("questions") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let mut questions = Vec::with_capacity(items.len());
    for item in items {
        let Some(question) = item.get("question").and_then(text) else {
            continue;
        };
        let options: Vec<String> = match item.get("options") {
            Some(Value::Array(options)) => options.iter().filter_map(text).collect(),
            _ => continue,
        };
        if options.len() != OPTION_COUNT {
            continue;
        }
        let Some(correct_answer) = item
            .get("correct_answer")
            .and_then(text)
            .filter(|answer| options.contains(answer))
        else {
            continue;
        };

        let id = item
            .get("id")
            .and_then(text)
            .unwrap_or_else(|| (questions.len() + 1).to_string());
        let explanation = item.get("explanation").and_then(text).unwrap_or_default();

        questions.push(Question {
            id,
            question,
            options,
            correct_answer,
            explanation,
        });
    }
    questions
}

/// Parse raw model content, falling back to the canned set.
pub fn parse_questions(content: &str, subject_name: &str) -> Vec<Question> {
    let cleaned = strip_fences(content);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => {
            let questions = repair(&value);
            if questions.is_empty() {
                warn!(subject = subject_name, "model output held no usable question");
                fallback_questions(subject_name)
            } else {
                questions
            }
        }
        Err(err) => {
            warn!(subject = subject_name, error = %err, "model output is not JSON");
            fallback_questions(subject_name)
        }
    }
}

async fn subject_name(state: &SharedState, subject_id: Uuid) -> String {
    let Some(store) = state.store().await else {
        return GENERAL_KNOWLEDGE.to_string();
    };
    match store.find_subject(subject_id).await {
        Ok(Some(subject)) => subject.name,
        Ok(None) => GENERAL_KNOWLEDGE.to_string(),
        Err(err) => {
            warn!(subject_id = %subject_id, error = %err, "subject lookup failed");
            GENERAL_KNOWLEDGE.to_string()
        }
    }
}

async fn generate(
    state: &SharedState,
    subject_id: Uuid,
    difficulty: Difficulty,
    count: u8,
) -> Result<Vec<Question>, ServiceError> {
    let name = subject_name(state, subject_id).await;
    info!(subject = %name, difficulty = %difficulty, count, "generating questions");

    let request = ChatRequest {
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(&name, difficulty, count)),
        ],
        temperature: Some(state.config().gateway().question_temperature),
    };
    let content = state.gateway().complete(request).await?;
    Ok(parse_questions(&content, &name))
}

/// Handle a validated generate-challenges request.
pub async fn generate_challenges(
    state: &SharedState,
    request: GenerateChallengesRequest,
) -> Result<GenerateChallengesResponse, ServiceError> {
    let subject_id = Uuid::parse_str(&request.subject_id)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let difficulty = request
        .difficulty
        .parse::<Difficulty>()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let count = u8::try_from(request.count)
        .map_err(|_| ServiceError::InvalidInput("count out of range".into()))?;

    let questions = generate(state, subject_id, difficulty, count).await?;
    Ok(GenerateChallengesResponse { questions })
}

/// Convert a question into a challenge of `session`.
fn to_challenge(question: Question, session: &GameSessionEntity) -> ChallengeEntity {
    ChallengeEntity {
        id: question.id,
        subject_id: session.subject_id,
        difficulty: session.difficulty,
        question: question.question,
        options: question.options,
        correct_answer: question.correct_answer,
        explanation: Some(question.explanation).filter(|text| !text.is_empty()),
    }
}

/// Arithmetic sample set bound to `session`.
pub fn sample_challenges(samples: &[SampleQuestion], session: &GameSessionEntity) -> Vec<ChallengeEntity> {
    samples
        .iter()
        .enumerate()
        .map(|(index, sample)| ChallengeEntity {
            id: (index + 1).to_string(),
            subject_id: session.subject_id,
            difficulty: session.difficulty,
            question: sample.question.clone(),
            options: sample.options.clone(),
            correct_answer: sample.correct_answer.clone(),
            explanation: sample.explanation.clone(),
        })
        .collect()
}

/// Question set for a session: generated when possible, sample set otherwise.
pub async fn questions_for_session(
    state: &SharedState,
    session: &GameSessionEntity,
) -> Vec<ChallengeEntity> {
    let count = state.config().game().questions_per_session;
    match generate(state, session.subject_id, session.difficulty, count).await {
        Ok(questions) => questions
            .into_iter()
            .map(|question| to_challenge(question, session))
            .collect(),
        Err(err) => {
            warn!(
                session_id = %session.id,
                error = %err,
                "question generation failed; using the sample set"
            );
            sample_challenges(state.config().sample_questions(), session)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn fences_are_removed() {
        let raw = "```json\n{\"questions\": []}\n```\n";
        assert_eq!(strip_fences(raw), "{\"questions\": []}");
        assert_eq!(strip_fences("  ```[1]```  "), "[1]");
    }

    #[test]
    fn prompt_names_subject_count_and_level() {
        let prompt = build_prompt("History", Difficulty::Advanced, 7);
        assert!(prompt.starts_with("Generate 7 multiple choice questions about History."));
        assert!(prompt.contains("challenging questions for high school students"));
        assert!(prompt.contains("\"correct_answer\": \"Option A\""));
    }

    #[test]
    fn non_json_output_yields_five_fallback_questions() {
        let questions = parse_questions("Sorry, I cannot help with that.", "Science");
        assert_eq!(questions.len(), 5);
        assert!(questions.iter().all(|q| q.question.contains("Science")));
        assert!(questions.iter().all(|q| q.options.contains(&q.correct_answer)));
    }

    #[test]
    fn repair_drops_broken_items_and_fills_gaps() {
        let value = json!({
            "questions": [
                { "question": "Capital of France?", "options": ["Paris", "Rome", "Oslo", "Bern"],
                  "correct_answer": "Paris" },
                { "id": "x", "question": "Three options?", "options": ["a", "b", "c"],
                  "correct_answer": "a", "explanation": "no" },
                { "id": 9, "question": "Wrong key?", "options": ["a", "b", "c", "d"],
                  "correct_answer": "e" },
                { "id": 4, "question": "2 + 2?", "options": [1, 2, 3, 4],
                  "correct_answer": "4", "explanation": "Addition" }
            ]
        });

        let questions = repair(&value);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id, "1");
        assert_eq!(questions[0].explanation, "");
        assert_eq!(questions[1].id, "4");
        assert_eq!(questions[1].correct_answer, "4");
    }

    #[test]
    fn empty_repair_falls_back() {
        let questions = parse_questions(r#"{"questions": [{"question": ""}]}"#, "Math");
        assert_eq!(questions.len(), 5);
        assert!(questions[0].question.contains("Math"));
    }

    #[test]
    fn bare_arrays_are_accepted() {
        let questions = parse_questions(
            r#"[{"id":"1","question":"Q?","options":["a","b","c","d"],"correct_answer":"b","explanation":"e"}]"#,
            "Math",
        );
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer, "b");
    }
}
