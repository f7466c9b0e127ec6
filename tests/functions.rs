mod common;

use axum::http::{Method, StatusCode};
use common::Harness;
use trivia_arena_back::gateway::GatewayError;
use uuid::Uuid;

const CHALLENGES: &str = "/functions/generate-challenges";
const LESSON: &str = "/functions/generate-lesson";

fn challenge_body(harness: &Harness, difficulty: &str, count: &str) -> String {
    format!(
        r#"{{"subjectId": "{}", "difficulty": "{difficulty}", "count": {count}}}"#,
        harness.subject_id()
    )
}

#[tokio::test]
async fn missing_token_is_rejected_before_the_gateway() {
    let harness = Harness::new().await;
    let body = challenge_body(&harness, "basic", "5");
    let (status, payload) = harness
        .send(Method::POST, CHALLENGES, None, Some(&body))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(payload["error"].is_string());
    assert_eq!(harness.gateway.calls(), 0);
}

#[tokio::test]
async fn malformed_bodies_never_reach_the_gateway() {
    let harness = Harness::new().await;
    let token = harness.token(Uuid::new_v4());

    let (status, payload) = harness
        .send(Method::POST, CHALLENGES, Some(&token), Some("{not json"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"], "Invalid JSON body");

    for body in [
        challenge_body(&harness, "expert", "5"),
        challenge_body(&harness, "basic", "11"),
        challenge_body(&harness, "basic", "2.5"),
        r#"{"subjectId": "not-a-uuid", "difficulty": "basic"}"#.to_string(),
    ] {
        let (status, payload) = harness
            .send(Method::POST, CHALLENGES, Some(&token), Some(&body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(payload["error"], "Invalid input");
        assert!(payload["details"].is_object());
    }

    let (status, _) = harness
        .send(Method::POST, LESSON, Some(&token), Some(r#"{"topic": "   "}"#))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(harness.gateway.calls(), 0);
}

#[tokio::test]
async fn unusable_model_output_serves_the_fallback_set() {
    let harness = Harness::new().await;
    harness.gateway.push(Ok("I'd rather not.".into()));
    let token = harness.token(Uuid::new_v4());

    let body = format!(r#"{{"subjectId": "{}", "difficulty": "basic"}}"#, harness.subject_id());
    let (status, payload) = harness
        .send(Method::POST, CHALLENGES, Some(&token), Some(&body))
        .await;

    assert_eq!(status, StatusCode::OK);
    let questions = payload["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 5);
    assert!(
        questions
            .iter()
            .all(|q| q["question"].as_str().unwrap().contains("Mathematics"))
    );
}

#[tokio::test]
async fn fenced_model_output_is_repaired() {
    let harness = Harness::new().await;
    harness.gateway.push(Ok(r#"```json
{"questions": [
  {"question": "2 + 3?", "options": ["4", "5", "6", "7"], "correct_answer": "5"},
  {"question": "Broken", "options": ["a", "b"], "correct_answer": "a"}
]}
```"#
        .into()));
    let token = harness.token(Uuid::new_v4());

    let body = challenge_body(&harness, "intermediate", "2");
    let (status, payload) = harness
        .send(Method::POST, CHALLENGES, Some(&token), Some(&body))
        .await;

    assert_eq!(status, StatusCode::OK);
    let questions = payload["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["id"], "1");
    assert_eq!(questions[0]["correct_answer"], "5");
    assert_eq!(questions[0]["explanation"], "");
}

#[tokio::test]
async fn gateway_failure_returns_an_empty_question_list() {
    let harness = Harness::new().await;
    let token = harness.token(Uuid::new_v4());

    let body = challenge_body(&harness, "advanced", "3");
    let (status, payload) = harness
        .send(Method::POST, CHALLENGES, Some(&token), Some(&body))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(payload["error"].is_string());
    assert_eq!(payload["questions"].as_array().unwrap().len(), 0);
    assert_eq!(harness.gateway.calls(), 1);
}

#[tokio::test]
async fn lesson_upstream_limits_map_to_their_status() {
    let harness = Harness::new().await;
    let token = harness.token(Uuid::new_v4());
    let body = r#"{"topic": "Photosynthesis", "difficulty": "basic"}"#;

    harness.gateway.push(Err(GatewayError::RateLimited));
    let (status, payload) = harness
        .send(Method::POST, LESSON, Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(payload["error"], "Rate limit exceeded. Please try again later.");

    harness.gateway.push(Err(GatewayError::QuotaExhausted));
    let (status, payload) = harness
        .send(Method::POST, LESSON, Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(payload["error"], "AI credits exhausted. Please add credits.");

    harness.gateway.push(Ok(String::new()));
    let (status, _) = harness
        .send(Method::POST, LESSON, Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn lesson_falls_back_to_a_single_slide() {
    let harness = Harness::new().await;
    harness.gateway.push(Ok("Plants turn light into sugar.".into()));
    let token = harness.token(Uuid::new_v4());

    let (status, payload) = harness
        .send(
            Method::POST,
            LESSON,
            Some(&token),
            Some(r#"{"topic": "Photosynthesis"}"#),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["lesson"]["title"], "Photosynthesis");
    let slides = payload["lesson"]["slides"].as_array().unwrap();
    assert_eq!(slides.len(), 1);
    assert_eq!(slides[0]["type"], "content");
    assert_eq!(slides[0]["title"], "Introduction to Photosynthesis");
}

#[tokio::test]
async fn preflight_requests_get_no_content() {
    let harness = Harness::new().await;
    for uri in [CHALLENGES, LESSON] {
        let (status, payload) = harness.send(Method::OPTIONS, uri, None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(payload.is_null());
    }
}
