use tracing::{info, warn};

use crate::{
    dto::lesson::{ContentSlide, GenerateLessonRequest, GenerateLessonResponse, Lesson, Slide},
    error::ServiceError,
    gateway::{ChatMessage, ChatRequest},
    state::SharedState,
};

const FALLBACK_BODY_CHARS: usize = 500;

fn system_prompt(difficulty: &str) -> String {
    format!(
        r#"You are an AI Teaching Engine. Generate a teaching module in slide format for the given topic.

Rules:
- Use simple explanations appropriate for {difficulty} level
- Break topics into 5-7 slides
- Include a micro-quiz slide after every 2-3 content slides
- Ensure correctness and avoid repetition
- Output ONLY valid JSON

Return a JSON object with this exact structure:
{{
  "title": "Main topic title",
  "slides": [
    {{
      "slide_number": 1,
      "type": "content",
      "title": "Slide title",
      "content": "Main explanation (2-3 paragraphs)",
      "example": "Practical example",
      "visual_description": "Description of supporting image",
      "key_points": ["point 1", "point 2"]
    }},
    {{
      "slide_number": 2,
      "type": "quiz",
      "title": "Quick Check",
      "question": "Quiz question",
      "options": ["A", "B", "C", "D"],
      "correct_answer": "A",
      "explanation": "Why this is correct"
    }}
  ]
}}"#
    )
}

fn fenced<'a>(content: &'a str, opener: &str) -> Option<&'a str> {
    let start = content.find(opener)? + opener.len();
    let rest = &content[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// JSON candidate inside model output: a ```` ```json ```` block, else a plain
/// ```` ``` ```` block, else the whole text.
pub fn extract_json(content: &str) -> &str {
    fenced(content, "```json")
        .or_else(|| fenced(content, "```"))
        .filter(|inner| !inner.is_empty())
        .unwrap_or_else(|| content.trim())
}

/// Single-slide lesson wrapping the raw model text.
pub fn fallback_lesson(topic: &str, content: &str) -> Lesson {
    Lesson {
        title: topic.to_string(),
        slides: vec![Slide::Content(ContentSlide {
            slide_number: 1,
            title: format!("Introduction to {topic}"),
            content: content.chars().take(FALLBACK_BODY_CHARS).collect(),
            example: "See the content above for details.".into(),
            visual_description: format!("An educational diagram about {topic}"),
            key_points: vec![
                "Understanding the basics".into(),
                "Key concepts explained".into(),
            ],
        })],
    }
}

/// Parse model content into a lesson, falling back to a single slide.
pub fn parse_lesson(topic: &str, content: &str) -> Lesson {
    match serde_json::from_str::<Lesson>(extract_json(content)) {
        Ok(lesson) => lesson,
        Err(err) => {
            warn!(topic, error = %err, "lesson output is not valid JSON; using fallback");
            fallback_lesson(topic, content)
        }
    }
}

/// Handle a validated generate-lesson request.
pub async fn generate_lesson(
    state: &SharedState,
    request: GenerateLessonRequest,
) -> Result<GenerateLessonResponse, ServiceError> {
    let topic = request.topic.trim();
    let difficulty = request.difficulty.as_str();
    info!(topic, difficulty, "generating lesson");

    let chat = ChatRequest {
        messages: vec![
            ChatMessage::system(system_prompt(difficulty)),
            ChatMessage::user(format!(
                "Create a {difficulty} level teaching module about: {topic}"
            )),
        ],
        temperature: None,
    };
    let content = state.gateway().complete(chat).await?;
    if content.trim().is_empty() {
        return Err(ServiceError::Upstream("No content in AI response".into()));
    }

    let lesson = parse_lesson(topic, &content);
    info!(topic, slides = lesson.slides.len(), "generated lesson");
    Ok(GenerateLessonResponse { lesson })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fence_wins_over_plain_fence() {
        let content = "Here you go:\n```json\n{\"a\": 1}\n```\nand ```other```";
        assert_eq!(extract_json(content), "{\"a\": 1}");

        let plain = "```\n{\"b\": 2}\n```";
        assert_eq!(extract_json(plain), "{\"b\": 2}");

        assert_eq!(extract_json("  {\"c\": 3}  "), "{\"c\": 3}");
    }

    #[test]
    fn fenced_lesson_parses() {
        let content = r#"```json
{"title": "Rain", "slides": [{"slide_number": 1, "type": "content", "title": "Clouds",
 "content": "Water", "example": "Storm", "visual_description": "Sky", "key_points": ["wet"]}]}
```"#;
        let lesson = parse_lesson("Rain", content);
        assert_eq!(lesson.title, "Rain");
        assert_eq!(lesson.slides.len(), 1);
    }

    #[test]
    fn fallback_truncates_to_500_chars() {
        let content = "é".repeat(800);
        let lesson = parse_lesson("Volcanoes", &content);
        assert_eq!(lesson.title, "Volcanoes");
        match &lesson.slides[0] {
            Slide::Content(slide) => {
                assert_eq!(slide.title, "Introduction to Volcanoes");
                assert_eq!(slide.content.chars().count(), 500);
                assert_eq!(slide.example, "See the content above for details.");
                assert_eq!(slide.visual_description, "An educational diagram about Volcanoes");
                assert_eq!(slide.key_points.len(), 2);
            }
            other => panic!("unexpected slide {other:?}"),
        }
    }
}
