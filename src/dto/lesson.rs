use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::validation::{validate_difficulty, validate_not_blank};

fn default_difficulty() -> String {
    "basic".into()
}

/// Body of `POST /functions/generate-lesson`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct GenerateLessonRequest {
    /// Free-text topic, 1 to 200 characters.
    #[validate(
        length(min = 1, max = 200),
        custom(function = "validate_not_blank")
    )]
    pub topic: String,
    /// Level of the explanations; defaults to `basic`.
    #[serde(default = "default_difficulty")]
    #[validate(custom(function = "validate_difficulty"))]
    pub difficulty: String,
}

/// Explanatory slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContentSlide {
    /// Position in the deck, from 1.
    #[serde(default)]
    pub slide_number: u32,
    /// Slide heading.
    #[serde(default)]
    pub title: String,
    /// Main explanation.
    #[serde(default)]
    pub content: String,
    /// Practical example.
    #[serde(default)]
    pub example: String,
    /// Description of a supporting image.
    #[serde(default)]
    pub visual_description: String,
    /// Takeaways.
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// Micro-quiz slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuizSlide {
    /// Position in the deck, from 1.
    #[serde(default)]
    pub slide_number: u32,
    /// Slide heading.
    #[serde(default)]
    pub title: String,
    /// Quiz question.
    #[serde(default)]
    pub question: String,
    /// Answer options.
    #[serde(default)]
    pub options: Vec<String>,
    /// Expected option.
    #[serde(default)]
    pub correct_answer: String,
    /// Why the answer is correct.
    #[serde(default)]
    pub explanation: String,
}

/// A lesson slide, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Slide {
    /// `type: "content"`.
    Content(ContentSlide),
    /// `type: "quiz"`.
    Quiz(QuizSlide),
}

/// Generated lesson deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Lesson {
    /// Topic title.
    pub title: String,
    /// Slides in order.
    pub slides: Vec<Slide>,
}

/// Response of `POST /functions/generate-lesson`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateLessonResponse {
    /// The generated deck.
    pub lesson: Lesson,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slides_are_tagged_by_type() {
        let lesson: Lesson = serde_json::from_value(serde_json::json!({
            "title": "Volcanoes",
            "slides": [
                { "slide_number": 1, "type": "content", "title": "Magma", "content": "Hot rock",
                  "example": "Etna", "visual_description": "A cone", "key_points": ["heat"] },
                { "slide_number": 2, "type": "quiz", "title": "Quick Check", "question": "Hot?",
                  "options": ["yes", "no"], "correct_answer": "yes", "explanation": "It is." }
            ]
        }))
        .unwrap();

        assert!(matches!(lesson.slides[0], Slide::Content(_)));
        assert!(matches!(lesson.slides[1], Slide::Quiz(_)));

        let back = serde_json::to_value(&lesson).unwrap();
        assert_eq!(back["slides"][1]["type"], "quiz");
    }

    #[test]
    fn topic_bounds_are_enforced() {
        let ok = GenerateLessonRequest {
            topic: "Volcanoes".into(),
            difficulty: default_difficulty(),
        };
        assert!(ok.validate().is_ok());

        let long = GenerateLessonRequest {
            topic: "x".repeat(201),
            difficulty: default_difficulty(),
        };
        assert!(long.validate().is_err());

        let blank = GenerateLessonRequest {
            topic: "  ".into(),
            difficulty: "expert".into(),
        };
        let errors = blank.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("topic"));
        assert!(errors.field_errors().contains_key("difficulty"));
    }
}
