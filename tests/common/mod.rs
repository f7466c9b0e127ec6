#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use futures::future::BoxFuture;
use serde_json::Value;
use tower::ServiceExt;
use trivia_arena_back::{
    auth::issue_token,
    config::{AppConfig, AuthSettings, GameSettings},
    dao::trivia_store::{TriviaStore, memory::MemoryTriviaStore},
    gateway::{ChatGateway, ChatRequest, GatewayError},
    routes,
    services::catalog_service,
    state::{AppState, SharedState},
};
use uuid::Uuid;

const SECRET: &str = "integration-secret";

/// Gateway replaying queued replies; an empty queue behaves like a missing key.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn push(&self, reply: Result<String, GatewayError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatGateway for ScriptedGateway {
    fn complete(&self, _request: ChatRequest) -> BoxFuture<'static, Result<String, GatewayError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::MissingApiKey));
        Box::pin(async move { reply })
    }
}

pub struct Harness {
    pub state: SharedState,
    pub store: Arc<MemoryTriviaStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub router: Router,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_game(GameSettings::default()).await
    }

    pub async fn with_game(game: GameSettings) -> Self {
        let config = AppConfig::default().with_game(game).with_auth(AuthSettings {
            jwt_secret: Some(SECRET.into()),
            jwt_audience: None,
        });
        let gateway = Arc::new(ScriptedGateway::default());
        let state = AppState::new(config, gateway.clone());

        let store = Arc::new(MemoryTriviaStore::new());
        let dyn_store: Arc<dyn TriviaStore> = store.clone();
        catalog_service::seed_subjects(&dyn_store, state.config().subjects())
            .await
            .unwrap();
        state.install_store(dyn_store).await;

        let router = routes::router(state.clone());
        Self {
            state,
            store,
            gateway,
            router,
        }
    }

    pub fn subject_id(&self) -> Uuid {
        self.state.config().subjects()[0].id
    }

    pub fn token(&self, user_id: Uuid) -> String {
        issue_token(user_id, self.state.config().auth(), 3_600).unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(body.map_or_else(Body::empty, |body| Body::from(body.to_owned())))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn join(&self, user_id: Uuid, difficulty: &str) -> Value {
        let uri = format!("/matchmaking/{}/{difficulty}/join", self.subject_id());
        let (status, body) = self
            .send(Method::POST, &uri, Some(&self.token(user_id)), None)
            .await;
        assert_eq!(status, StatusCode::OK, "join failed: {body}");
        body
    }
}
