use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    dao::{storage::StorageError, trivia_store::TriviaStore},
    services::catalog_service,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, seed it, then watch its health.
///
/// The shared state stays in degraded mode while no healthy store is installed.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn TriviaStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                if let Err(err) = catalog_service::seed_subjects(&store, state.config().subjects()).await {
                    error!(error = %err, "failed to seed subjects");
                }
                state.install_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_health(&state, &store).await;
                state.clear_store().await;

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it fails and cannot be reconnected.
async fn watch_health(state: &SharedState, store: &Arc<dyn TriviaStore>) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        if reconnect(state, store).await {
            state.update_degraded(false);
            sleep(HEALTH_POLL_INTERVAL).await;
        } else {
            warn!("exhausted storage reconnect attempts; staying in degraded mode");
            return;
        }
    }
}

async fn reconnect(state: &SharedState, store: &Arc<dyn TriviaStore>) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::trivia_store::memory::MemoryTriviaStore,
        gateway::{ChatGateway, ChatRequest, GatewayError},
        state::AppState,
    };

    struct Offline;

    impl ChatGateway for Offline {
        fn complete(
            &self,
            _request: ChatRequest,
        ) -> futures::future::BoxFuture<'static, Result<String, GatewayError>> {
            Box::pin(async { Err(GatewayError::MissingApiKey) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn installs_and_seeds_after_a_failed_attempt() {
        let state = AppState::new(AppConfig::default(), Arc::new(Offline));
        let mut attempts = 0;
        let supervisor = tokio::spawn(run(state.clone(), move || {
            attempts += 1;
            let failing = attempts == 1;
            async move {
                if failing {
                    Err(StorageError::unavailable(
                        "not yet".into(),
                        std::io::Error::other("connection refused"),
                    ))
                } else {
                    Ok(Arc::new(MemoryTriviaStore::new()) as Arc<dyn TriviaStore>)
                }
            }
        }));

        let mut watcher = state.degraded_watcher();
        tokio::time::timeout(Duration::from_secs(30), watcher.wait_for(|degraded| !degraded))
            .await
            .unwrap()
            .unwrap();

        let store = state.require_store().await.unwrap();
        assert_eq!(
            store.list_subjects().await.unwrap().len(),
            state.config().subjects().len()
        );
        supervisor.abort();
    }
}
