use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::ProfileEntity;

/// Query of `GET /leaderboard`.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of entries, 1 to 100 (default 100).
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

/// One line of the leaderboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub total_points: u64,
}

impl LeaderboardEntry {
    pub fn new(rank: u64, profile: ProfileEntity) -> Self {
        Self {
            rank,
            user_id: profile.user_id,
            username: profile.username,
            avatar_url: profile.avatar_url,
            total_points: profile.total_points,
        }
    }
}

/// Returned by `GET /leaderboard`.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    /// Rank of the authenticated caller, when a profile exists.
    pub my_rank: Option<u64>,
}
