/// Waiting-room countdown and start decision.
pub mod lobby;
/// Per-player round model.
pub mod round;
/// Per-session runtime.
pub mod session;
mod sse;
/// Session status state machine.
pub mod state_machine;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        models::{Difficulty, GameSessionEntity},
        trivia_store::TriviaStore,
    },
    error::ServiceError,
    gateway::ChatGateway,
};

pub use self::session::SessionRuntime;
pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::state_machine::SessionPhase;

/// Application state shared by handlers and background tasks.
pub type SharedState = Arc<AppState>;
/// Upper bound on the side effect of one status transition.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state: configuration, storage handle, LLM gateway
/// and the live runtimes of every session this process drives.
pub struct AppState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn TriviaStore>>>,
    gateway: Arc<dyn ChatGateway>,
    sessions: DashMap<Uuid, Arc<SessionRuntime>>,
    pools: DashMap<(Uuid, Difficulty), Arc<Mutex<()>>>,
    degraded: watch::Sender<bool>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, gateway: Arc<dyn ChatGateway>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            store: RwLock::new(None),
            gateway,
            sessions: DashMap::new(),
            pools: DashMap::new(),
            degraded: degraded_tx,
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// LLM gateway client.
    pub fn gateway(&self) -> Arc<dyn ChatGateway> {
        self.gateway.clone()
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn TriviaStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn TriviaStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn TriviaStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub(crate) fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Runtime of `session`, created from its persisted state when missing.
    ///
    /// The boolean is `true` when the runtime was created by this call.
    pub async fn runtime_for(
        &self,
        session: &GameSessionEntity,
    ) -> Result<(Arc<SessionRuntime>, bool), ServiceError> {
        if let Some(runtime) = self.sessions.get(&session.id) {
            return Ok((runtime.clone(), false));
        }

        let participants = self
            .require_store()
            .await?
            .list_participants(session.id)
            .await?;
        let game = self.config.game();
        let candidate = Arc::new(SessionRuntime::new(
            session.id,
            SessionPhase::from_status(session.status),
            game.max_cycles,
            game.countdown_secs,
            participants,
            self.transition_timeout,
        ));

        let entry = self.sessions.entry(session.id).or_insert(candidate.clone());
        let runtime = entry.value().clone();
        drop(entry);
        let created = Arc::ptr_eq(&runtime, &candidate);
        Ok((runtime, created))
    }

    /// Runtime of a session already driven by this process.
    pub fn runtime(&self, session_id: Uuid) -> Option<Arc<SessionRuntime>> {
        self.sessions.get(&session_id).map(|entry| entry.value().clone())
    }

    /// Number of sessions driven by this process.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Forget the runtime of a finished session.
    pub fn release_runtime(&self, session_id: Uuid) -> Option<Arc<SessionRuntime>> {
        self.sessions.remove(&session_id).map(|(_, runtime)| runtime)
    }

    /// Gate serializing find-or-create and start decisions on one matchmaking pool.
    pub fn pool_gate(&self, subject_id: Uuid, difficulty: Difficulty) -> Arc<Mutex<()>> {
        self.pools
            .entry((subject_id, difficulty))
            .or_default()
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        dao::{models::SessionStatus, trivia_store::memory::MemoryTriviaStore},
        gateway::{ChatRequest, GatewayError},
    };

    struct Offline;

    impl ChatGateway for Offline {
        fn complete(&self, _: ChatRequest) -> BoxFuture<'static, Result<String, GatewayError>> {
            Box::pin(async { Err(GatewayError::MissingApiKey) })
        }
    }

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default(), Arc::new(Offline));
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_store(Arc::new(MemoryTriviaStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn runtime_is_created_once_per_session() {
        let state = AppState::new(AppConfig::default(), Arc::new(Offline));
        state
            .install_store(Arc::new(MemoryTriviaStore::new()))
            .await;
        let mut session = GameSessionEntity::waiting(Uuid::new_v4(), Difficulty::Basic);
        session.status = SessionStatus::Starting;

        let (first, created) = state.runtime_for(&session).await.unwrap();
        assert!(created);
        assert_eq!(first.phase().await, SessionPhase::Starting);

        let (second, created) = state.runtime_for(&session).await.unwrap();
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));

        assert!(state.release_runtime(session.id).is_some());
        assert!(state.runtime(session.id).is_none());
    }
}
