use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{Difficulty, EarnedBadgeEntity, ProfileEntity, SubjectEntity, UserProgressEntity},
    dto::format_system_time,
};

/// Subject as listed on the dashboard.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubjectSummary {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub description: Option<String>,
}

impl From<SubjectEntity> for SubjectSummary {
    fn from(subject: SubjectEntity) -> Self {
        Self {
            id: subject.id,
            name: subject.name,
            icon: subject.icon,
            color: subject.color,
            description: subject.description,
        }
    }
}

/// Progress of the caller on one difficulty.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgressSummary {
    pub difficulty: Difficulty,
    pub completed: bool,
    pub wins: u32,
}

impl ProgressSummary {
    /// One line per difficulty, defaulting to no progress.
    pub fn per_difficulty(entries: &[UserProgressEntity]) -> Vec<Self> {
        Difficulty::ALL
            .iter()
            .map(|difficulty| {
                let entry = entries.iter().find(|entry| entry.difficulty == *difficulty);
                Self {
                    difficulty: *difficulty,
                    completed: entry.is_some_and(|entry| entry.completed),
                    wins: entry.map_or(0, |entry| entry.wins),
                }
            })
            .collect()
    }
}

/// Returned by `GET /subjects/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubjectDetail {
    pub subject: SubjectSummary,
    pub progress: Vec<ProgressSummary>,
}

/// Badge unlocked by the caller.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BadgeSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub icon: String,
    pub badge_type: String,
    pub earned_at: String,
}

impl From<EarnedBadgeEntity> for BadgeSummary {
    fn from(earned: EarnedBadgeEntity) -> Self {
        Self {
            id: earned.badge.id,
            name: earned.badge.name,
            description: earned.badge.description,
            icon: earned.badge.icon,
            badge_type: earned.badge.badge_type,
            earned_at: format_system_time(earned.earned_at),
        }
    }
}

/// Returned by `GET /profile`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub total_points: u64,
    pub badges: Vec<BadgeSummary>,
}

impl ProfileResponse {
    pub fn new(profile: ProfileEntity, badges: Vec<EarnedBadgeEntity>) -> Self {
        Self {
            user_id: profile.user_id,
            username: profile.username,
            avatar_url: profile.avatar_url,
            total_points: profile.total_points,
            badges: badges.into_iter().map(BadgeSummary::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn progress_lists_every_difficulty() {
        let entries = vec![UserProgressEntity {
            user_id: Uuid::nil(),
            subject_id: Uuid::nil(),
            difficulty: Difficulty::Intermediate,
            completed: true,
            wins: 2,
            updated_at: SystemTime::now(),
        }];

        let progress = ProgressSummary::per_difficulty(&entries);
        assert_eq!(progress.len(), 3);
        assert!(!progress[0].completed);
        assert!(progress[1].completed);
        assert_eq!(progress[1].wins, 2);
        assert_eq!(progress[2].wins, 0);
    }
}
