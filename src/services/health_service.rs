use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Report storage health and the number of live sessions.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let healthy = match state.store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => !state.is_degraded(),
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    HealthResponse {
        status: if healthy {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        },
        live_sessions: state.live_sessions(),
    }
}
