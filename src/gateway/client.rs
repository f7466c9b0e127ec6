use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{ChatGateway, ChatMessage, ChatRequest, GatewayError};
use crate::config::GatewaySettings;

/// reqwest-backed [`ChatGateway`] speaking the OpenAI chat completions dialect.
#[derive(Clone)]
pub struct HttpChatGateway {
    client: Client,
    url: Arc<str>,
    model: Arc<str>,
    api_key: Option<Arc<str>>,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl HttpChatGateway {
    /// Build a gateway client from the configured settings.
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|source| GatewayError::ClientBuilder { source })?;

        Ok(Self {
            client,
            url: Arc::from(settings.url.as_str()),
            model: Arc::from(settings.model.as_str()),
            api_key: settings.api_key.as_deref().map(Arc::from),
        })
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_ref().ok_or(GatewayError::MissingApiKey)?;
        let body = CompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.url.as_ref())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| GatewayError::Send { source })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "AI gateway returned an error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited,
                StatusCode::PAYMENT_REQUIRED => GatewayError::QuotaExhausted,
                status => GatewayError::Status { status, body: text },
            });
        }

        let payload: CompletionResponse = response
            .json()
            .await
            .map_err(|source| GatewayError::Decode { source })?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        debug!(chars = content.len(), "AI gateway responded");
        Ok(content)
    }
}

impl ChatGateway for HttpChatGateway {
    fn complete(&self, request: ChatRequest) -> BoxFuture<'static, Result<String, GatewayError>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.complete(request).await })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{Json, Router, http::HeaderMap, routing::post};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1/chat/completions")
    }

    fn gateway(url: String, api_key: Option<&str>) -> HttpChatGateway {
        HttpChatGateway::new(&GatewaySettings {
            url,
            model: "test-model".into(),
            question_temperature: 0.7,
            timeout: Duration::from_secs(5),
            api_key: api_key.map(String::from),
        })
        .unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: Some(0.7),
        }
    }

    #[tokio::test]
    async fn returns_first_choice_and_sends_model_and_key() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer secret");
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["messages"][0]["role"], "system");
                Json(json!({ "choices": [ { "message": { "content": "hello" } } ] }))
            }),
        );
        let url = serve(router).await;

        let content = gateway(url, Some("secret")).complete(request()).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn maps_throttling_and_credit_statuses() {
        let router = Router::new()
            .route(
                "/v1/chat/completions",
                post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
            )
            .route(
                "/credits/v1/chat/completions",
                post(|| async { (StatusCode::PAYMENT_REQUIRED, "pay") }),
            );
        let url = serve(router).await;
        let credits_url = url.replace("/v1/", "/credits/v1/");

        let err = gateway(url, Some("k")).complete(request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited));

        let err = gateway(credits_url, Some("k"))
            .complete(request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::QuotaExhausted));
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_out() {
        let err = gateway("http://127.0.0.1:9/unused".into(), None)
            .complete(request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MissingApiKey));
    }
}
