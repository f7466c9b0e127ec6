use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    config::SubjectSeed,
    dao::{
        models::{ProfileEntity, SubjectEntity},
        storage::StorageError,
        trivia_store::TriviaStore,
    },
    dto::catalog::{ProfileResponse, ProgressSummary, SubjectDetail, SubjectSummary},
    error::ServiceError,
    state::SharedState,
};

/// Every subject, sorted by name.
pub async fn list_subjects(state: &SharedState) -> Result<Vec<SubjectSummary>, ServiceError> {
    let store = state.require_store().await?;
    let mut subjects = store.list_subjects().await?;
    subjects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(subjects.into_iter().map(SubjectSummary::from).collect())
}

/// One subject with the caller's progress on each difficulty.
pub async fn subject_detail(
    state: &SharedState,
    user: AuthUser,
    subject_id: Uuid,
) -> Result<SubjectDetail, ServiceError> {
    let store = state.require_store().await?;
    let subject = store
        .find_subject(subject_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("subject {subject_id} not found")))?;
    let progress = store.list_user_progress(user.user_id, subject_id).await?;

    Ok(SubjectDetail {
        subject: subject.into(),
        progress: ProgressSummary::per_difficulty(&progress),
    })
}

/// Profile of the caller with unlocked badges. Unknown users get a blank profile.
pub async fn profile(state: &SharedState, user: AuthUser) -> Result<ProfileResponse, ServiceError> {
    let store = state.require_store().await?;
    let profile = store
        .find_profile(user.user_id)
        .await?
        .unwrap_or_else(|| ProfileEntity::blank(user.user_id));
    let badges = store.list_user_badges(user.user_id).await?;
    Ok(ProfileResponse::new(profile, badges))
}

/// Insert configured subjects missing from the store.
pub async fn seed_subjects(
    store: &Arc<dyn TriviaStore>,
    seeds: &[SubjectSeed],
) -> Result<usize, StorageError> {
    let mut inserted = 0;
    for seed in seeds {
        if store.find_subject(seed.id).await?.is_some() {
            continue;
        }
        store
            .save_subject(SubjectEntity {
                id: seed.id,
                name: seed.name.clone(),
                icon: seed.icon.clone(),
                color: seed.color.clone(),
                description: seed.description.clone(),
            })
            .await?;
        inserted += 1;
    }
    if inserted > 0 {
        info!(inserted, "seeded subjects");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::trivia_store::memory::MemoryTriviaStore};

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store: Arc<dyn TriviaStore> = Arc::new(MemoryTriviaStore::new());
        let config = AppConfig::default();
        let first = seed_subjects(&store, config.subjects()).await.unwrap();
        assert_eq!(first, config.subjects().len());
        assert_eq!(seed_subjects(&store, config.subjects()).await.unwrap(), 0);
        assert_eq!(store.list_subjects().await.unwrap().len(), first);
    }
}
