use serde::Serialize;
use utoipa::ToSchema;

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Storage reachable.
    Ok,
    /// No storage backend, or its health check failed.
    Degraded,
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: HealthStatus,
    /// Sessions currently driven by this process.
    pub live_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let body = serde_json::to_value(HealthResponse {
            status: HealthStatus::Degraded,
            live_sessions: 0,
        })
        .unwrap();
        assert_eq!(body["status"], "degraded");
    }
}
