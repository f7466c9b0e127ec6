use tracing::debug;

use crate::{
    auth::AuthUser,
    dto::leaderboard::{LeaderboardEntry, LeaderboardQuery, LeaderboardResponse},
    error::ServiceError,
    state::SharedState,
};

const MAX_LIMIT: usize = 100;

/// Top profiles by cumulative points, plus the caller's own rank when known.
pub async fn leaderboard(
    state: &SharedState,
    caller: Option<AuthUser>,
    query: LeaderboardQuery,
) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_store().await?;
    let limit = effective_limit(query.limit, state.config().leaderboard_limit());
    let profiles = store.leaderboard(limit).await?;
    let entries = profiles
        .into_iter()
        .zip(1u64..)
        .map(|(profile, rank)| LeaderboardEntry::new(rank, profile))
        .collect::<Vec<_>>();

    let my_rank = match caller {
        Some(user) => match store.find_profile(user.user_id).await? {
            Some(profile) => Some(store.count_profiles_above(profile.total_points).await? + 1),
            None => None,
        },
        None => None,
    };

    debug!(entries = entries.len(), ?my_rank, "leaderboard served");
    Ok(LeaderboardResponse { entries, my_rank })
}

/// Requested limit, else the configured default, never above 100.
pub fn effective_limit(requested: Option<usize>, configured: usize) -> usize {
    requested.unwrap_or(configured).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::ProfileEntity,
            trivia_store::{TriviaStore, memory::MemoryTriviaStore},
        },
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

    fn profile(points: u64, name: &str) -> ProfileEntity {
        ProfileEntity {
            user_id: Uuid::new_v4(),
            username: Some(name.into()),
            avatar_url: None,
            total_points: points,
        }
    }

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(effective_limit(None, 100), 100);
        assert_eq!(effective_limit(Some(5), 100), 5);
        assert_eq!(effective_limit(None, 500), 100);
    }

    #[tokio::test]
    async fn ranks_entries_and_caller() {
        let state = AppState::new(AppConfig::default(), Arc::new(Offline));
        let store = Arc::new(MemoryTriviaStore::new());
        let ada = profile(900, "ada");
        let bob = profile(400, "bob");
        let cy = profile(650, "cy");
        for row in [&ada, &bob, &cy] {
            store.save_profile(row.clone()).await.unwrap();
        }
        state.install_store(store).await;

        let caller = AuthUser {
            user_id: bob.user_id,
        };
        let response = leaderboard(&state, Some(caller), LeaderboardQuery { limit: Some(2) })
            .await
            .unwrap();

        assert_eq!(response.entries.len(), 2);
        assert_eq!(response.entries[0].username.as_deref(), Some("ada"));
        assert_eq!(response.entries[1].rank, 2);
        assert_eq!(response.my_rank, Some(3));
    }
}
