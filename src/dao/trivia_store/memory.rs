//! Process-local store used when no database is configured and by the test suite.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{
        AnswerRecordEntity, BadgeEntity, ChallengeEntity, Difficulty, EarnedBadgeEntity,
        GameSessionEntity, ParticipantEntity, ProfileEntity, SessionStatus, SubjectEntity,
        UserProgressEntity,
    },
    storage::StorageResult,
};

use super::TriviaStore;

/// In-memory [`TriviaStore`] backed by a single lock, which makes every
/// compare-and-swap trivially atomic.
#[derive(Clone, Default)]
pub struct MemoryTriviaStore {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    subjects: IndexMap<Uuid, SubjectEntity>,
    sessions: IndexMap<Uuid, GameSessionEntity>,
    participants: IndexMap<Uuid, ParticipantEntity>,
    profiles: IndexMap<Uuid, ProfileEntity>,
    badges: HashMap<Uuid, BadgeEntity>,
    user_badges: Vec<(Uuid, Uuid, SystemTime)>,
    progress: IndexMap<(Uuid, Uuid, Difficulty), UserProgressEntity>,
}

impl MemoryTriviaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a badge definition.
    pub async fn insert_badge(&self, badge: BadgeEntity) {
        self.tables.write().await.badges.insert(badge.id, badge);
    }

    /// Unlock a badge for a user.
    pub async fn award_badge(&self, user_id: Uuid, badge_id: Uuid, earned_at: SystemTime) {
        self.tables
            .write()
            .await
            .user_badges
            .push((user_id, badge_id, earned_at));
    }
}

impl TriviaStore for MemoryTriviaStore {
    fn list_subjects(&self) -> BoxFuture<'static, StorageResult<Vec<SubjectEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.read().await.subjects.values().cloned().collect()) })
    }

    fn find_subject(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SubjectEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.read().await.subjects.get(&id).cloned()) })
    }

    fn save_subject(&self, subject: SubjectEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            tables.write().await.subjects.insert(subject.id, subject);
            Ok(())
        })
    }

    fn find_waiting_session(
        &self,
        subject_id: Uuid,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            Ok(guard
                .sessions
                .values()
                .filter(|session| {
                    session.subject_id == subject_id
                        && session.difficulty == difficulty
                        && session.status == SessionStatus::Waiting
                })
                .min_by_key(|session| session.created_at)
                .cloned())
        })
    }

    fn insert_session(&self, session: GameSessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            tables.write().await.sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.read().await.sessions.get(&id).cloned()) })
    }

    fn transition_session(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let Some(session) = guard.sessions.get_mut(&id) else {
                return Ok(false);
            };
            if session.status != from {
                return Ok(false);
            }
            session.status = to;
            match to {
                SessionStatus::Starting => session.started_at = Some(at),
                SessionStatus::Completed => session.ended_at = Some(at),
                SessionStatus::Waiting | SessionStatus::InProgress => {}
            }
            Ok(true)
        })
    }

    fn attach_questions(
        &self,
        id: Uuid,
        questions: Vec<ChallengeEntity>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let Some(session) = guard.sessions.get_mut(&id) else {
                return Ok(Vec::new());
            };
            if session.questions.is_empty() {
                session.questions = questions;
            }
            Ok(session.questions.clone())
        })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            Ok(guard
                .participants
                .values()
                .filter(|participant| participant.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            if let Some(user_id) = participant.user_id {
                let existing = guard.participants.values().find(|row| {
                    row.session_id == participant.session_id && row.user_id == Some(user_id)
                });
                if let Some(existing) = existing {
                    return Ok(existing.clone());
                }
            }
            guard
                .participants
                .insert(participant.id, participant.clone());
            Ok(participant)
        })
    }

    fn delete_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let id = guard
                .participants
                .values()
                .find(|row| row.session_id == session_id && row.user_id == Some(user_id))
                .map(|row| row.id);
            Ok(id.and_then(|id| guard.participants.shift_remove(&id)))
        })
    }

    fn update_participant_score(
        &self,
        participant_id: Uuid,
        score: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            Ok(guard.participants.get_mut(&participant_id).map(|row| {
                row.score = row.score.max(score);
                row.clone()
            }))
        })
    }

    fn record_answer(
        &self,
        participant_id: Uuid,
        answer: AnswerRecordEntity,
        score: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            Ok(guard.participants.get_mut(&participant_id).map(|row| {
                row.answers.push(answer);
                row.score = row.score.max(score);
                row.clone()
            }))
        })
    }

    fn complete_participant(
        &self,
        participant_id: Uuid,
        score: u32,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            match guard.participants.get_mut(&participant_id) {
                Some(row) if row.completed_at.is_none() => {
                    row.score = row.score.max(score);
                    row.completed_at = Some(at);
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn find_profile(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.read().await.profiles.get(&user_id).cloned()) })
    }

    fn save_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            tables.write().await.profiles.insert(profile.user_id, profile);
            Ok(())
        })
    }

    fn add_profile_points(
        &self,
        user_id: Uuid,
        points: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let profile = guard
                .profiles
                .entry(user_id)
                .or_insert_with(|| ProfileEntity::blank(user_id));
            profile.total_points = profile.total_points.saturating_add(points);
            Ok(())
        })
    }

    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            let mut profiles: Vec<ProfileEntity> = guard.profiles.values().cloned().collect();
            profiles.sort_by(|a, b| b.total_points.cmp(&a.total_points));
            profiles.truncate(limit);
            Ok(profiles)
        })
    }

    fn count_profiles_above(&self, points: u64) -> BoxFuture<'static, StorageResult<u64>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            Ok(guard
                .profiles
                .values()
                .filter(|profile| profile.total_points > points)
                .count() as u64)
        })
    }

    fn list_user_badges(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<EarnedBadgeEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            Ok(guard
                .user_badges
                .iter()
                .filter(|(owner, _, _)| *owner == user_id)
                .filter_map(|(_, badge_id, earned_at)| {
                    guard.badges.get(badge_id).map(|badge| EarnedBadgeEntity {
                        badge: badge.clone(),
                        earned_at: *earned_at,
                    })
                })
                .collect())
        })
    }

    fn list_user_progress(
        &self,
        user_id: Uuid,
        subject_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserProgressEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            Ok(guard
                .progress
                .values()
                .filter(|entry| entry.user_id == user_id && entry.subject_id == subject_id)
                .cloned()
                .collect())
        })
    }

    fn record_progress(
        &self,
        user_id: Uuid,
        subject_id: Uuid,
        difficulty: Difficulty,
        won: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let now = SystemTime::now();
            let entry = guard
                .progress
                .entry((user_id, subject_id, difficulty))
                .or_insert_with(|| UserProgressEntity {
                    user_id,
                    subject_id,
                    difficulty,
                    completed: false,
                    wins: 0,
                    updated_at: now,
                });
            entry.completed = true;
            if won {
                entry.wins += 1;
            }
            entry.updated_at = now;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject_id() -> Uuid {
        Uuid::from_u128(7)
    }

    #[tokio::test]
    async fn waiting_session_lookup_prefers_oldest() {
        let store = MemoryTriviaStore::new();
        let mut older = GameSessionEntity::waiting(subject_id(), Difficulty::Basic);
        older.created_at = SystemTime::UNIX_EPOCH;
        let newer = GameSessionEntity::waiting(subject_id(), Difficulty::Basic);
        store.insert_session(newer).await.unwrap();
        store.insert_session(older.clone()).await.unwrap();

        let found = store
            .find_waiting_session(subject_id(), Difficulty::Basic)
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.id), Some(older.id));

        let other_tier = store
            .find_waiting_session(subject_id(), Difficulty::Advanced)
            .await
            .unwrap();
        assert!(other_tier.is_none());
    }

    #[tokio::test]
    async fn transition_is_compare_and_swap() {
        let store = MemoryTriviaStore::new();
        let session = GameSessionEntity::waiting(subject_id(), Difficulty::Basic);
        store.insert_session(session.clone()).await.unwrap();

        let now = SystemTime::now();
        assert!(
            store
                .transition_session(session.id, SessionStatus::Waiting, SessionStatus::Starting, now)
                .await
                .unwrap()
        );
        assert!(
            !store
                .transition_session(session.id, SessionStatus::Waiting, SessionStatus::Starting, now)
                .await
                .unwrap()
        );

        let stored = store.find_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Starting);
        assert_eq!(stored.started_at, Some(now));
    }

    #[tokio::test]
    async fn human_participant_is_inserted_once() {
        let store = MemoryTriviaStore::new();
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let first = store
            .insert_participant(ParticipantEntity::human(session_id, user_id))
            .await
            .unwrap();
        let second = store
            .insert_participant(ParticipantEntity::human(session_id, user_id))
            .await
            .unwrap();
        store
            .insert_participant(ParticipantEntity::ai(session_id, "QuizWiz"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let rows = store.list_participants(session_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first.id);
    }

    #[tokio::test]
    async fn scores_never_decrease_and_completion_happens_once() {
        let store = MemoryTriviaStore::new();
        let row = store
            .insert_participant(ParticipantEntity::ai(Uuid::new_v4(), "SmartBot"))
            .await
            .unwrap();

        store.update_participant_score(row.id, 300).await.unwrap();
        let lowered = store.update_participant_score(row.id, 100).await.unwrap();
        assert_eq!(lowered.map(|p| p.score), Some(300));

        let now = SystemTime::now();
        assert!(store.complete_participant(row.id, 300, now).await.unwrap());
        assert!(!store.complete_participant(row.id, 300, now).await.unwrap());
    }

    #[tokio::test]
    async fn leaderboard_orders_by_points_and_counts_strictly_above() {
        let store = MemoryTriviaStore::new();
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for (user, points) in users.iter().zip([50_u64, 400, 200, 200]) {
            store.add_profile_points(*user, points).await.unwrap();
        }

        let top = store.leaderboard(3).await.unwrap();
        let points: Vec<u64> = top.iter().map(|p| p.total_points).collect();
        assert_eq!(points, vec![400, 200, 200]);
        assert_eq!(store.count_profiles_above(200).await.unwrap(), 1);
        assert_eq!(store.count_profiles_above(10).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn progress_tracks_wins() {
        let store = MemoryTriviaStore::new();
        let user = Uuid::new_v4();
        store
            .record_progress(user, subject_id(), Difficulty::Basic, true)
            .await
            .unwrap();
        store
            .record_progress(user, subject_id(), Difficulty::Basic, false)
            .await
            .unwrap();

        let entries = store.list_user_progress(user, subject_id()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].completed);
        assert_eq!(entries[0].wins, 1);
    }

    #[tokio::test]
    async fn earned_badges_join_definitions() {
        let store = MemoryTriviaStore::new();
        let user = Uuid::new_v4();
        let badge = BadgeEntity {
            id: Uuid::new_v4(),
            name: "First Win".into(),
            description: None,
            icon: "*".into(),
            badge_type: "wins".into(),
            subject_id: None,
            difficulty: None,
        };
        store.insert_badge(badge.clone()).await;
        store.award_badge(user, badge.id, SystemTime::UNIX_EPOCH).await;

        let earned = store.list_user_badges(user).await.unwrap();
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].badge, badge);
    }
}
