//! Trivia Arena Back binary entrypoint wiring REST, SSE, the LLM gateway and storage.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trivia_arena_back::{
    config::AppConfig,
    dao::{
        storage::StorageError,
        trivia_store::{TriviaStore, memory::MemoryTriviaStore},
    },
    gateway::HttpChatGateway,
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let gateway =
        HttpChatGateway::new(config.gateway()).context("building the AI gateway client")?;
    let app_state = AppState::new(config, Arc::new(gateway));

    spawn_storage(app_state.clone());
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor: MongoDB when `MONGO_URI` is set, memory otherwise.
fn spawn_storage(state: SharedState) {
    #[cfg(feature = "mongo-store")]
    if let Some(uri) = env::var("MONGO_URI").ok().filter(|uri| !uri.trim().is_empty()) {
        use trivia_arena_back::dao::trivia_store::mongodb::{MongoConfig, MongoTriviaStore};

        let db_name = env::var("MONGO_DB").ok();
        info!("using MongoDB storage");
        tokio::spawn(storage_supervisor::run(state, move || {
            let uri = uri.clone();
            let db_name = db_name.clone();
            async move {
                let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                let store = MongoTriviaStore::connect(config).await?;
                Ok(Arc::new(store) as Arc<dyn TriviaStore>)
            }
        }));
        return;
    }

    info!("MONGO_URI not set; using in-memory storage");
    tokio::spawn(storage_supervisor::run(state, || async {
        Ok::<_, StorageError>(Arc::new(MemoryTriviaStore::new()) as Arc<dyn TriviaStore>)
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
