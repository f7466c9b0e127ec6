/// In-process backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{
        AnswerRecordEntity, ChallengeEntity, Difficulty, EarnedBadgeEntity, GameSessionEntity,
        ParticipantEntity, ProfileEntity, SessionStatus, SubjectEntity, UserProgressEntity,
    },
    storage::StorageResult,
};

/// Abstraction over the persistence layer holding subjects, sessions,
/// participants, profiles and progress.
///
/// Every mutation touches a single record. Status changes go through
/// [`TriviaStore::transition_session`], a compare-and-swap on the current
/// status, so concurrent writers cannot move a session backwards.
pub trait TriviaStore: Send + Sync {
    /// List every subject.
    fn list_subjects(&self) -> BoxFuture<'static, StorageResult<Vec<SubjectEntity>>>;
    /// Fetch a subject by id.
    fn find_subject(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SubjectEntity>>>;
    /// Insert or replace a subject.
    fn save_subject(&self, subject: SubjectEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Oldest session still waiting for players on (subject, difficulty).
    fn find_waiting_session(
        &self,
        subject_id: Uuid,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    /// Insert a new session.
    fn insert_session(&self, session: GameSessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a session by id.
    fn find_session(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    /// Move a session from `from` to `to`, stamping `started_at` or `ended_at`.
    ///
    /// Returns `false` when the stored status is not `from`.
    fn transition_session(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Attach the question set to a session unless one is already attached.
    ///
    /// Returns the questions stored after the call (first writer wins).
    fn attach_questions(
        &self,
        id: Uuid,
        questions: Vec<ChallengeEntity>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>>;

    /// Participants of a session in join order.
    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Insert a participant.
    ///
    /// Human participants are unique per (session, user): when a row already
    /// exists it is returned unchanged and nothing is inserted.
    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>>;
    /// Delete the participant row of `user_id` in a session.
    fn delete_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// Raise a participant score. Lower values are ignored.
    fn update_participant_score(
        &self,
        participant_id: Uuid,
        score: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// Append an answer checkpoint and store the new running score.
    fn record_answer(
        &self,
        participant_id: Uuid,
        answer: AnswerRecordEntity,
        score: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// Mark a participant completed with its final score.
    ///
    /// Returns `false` when the participant was already completed.
    fn complete_participant(
        &self,
        participant_id: Uuid,
        score: u32,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Fetch a profile by user id.
    fn find_profile(&self, user_id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>>;
    /// Insert or replace a profile.
    fn save_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Add `points` to a profile total, creating a blank profile when missing.
    fn add_profile_points(&self, user_id: Uuid, points: u64)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Top profiles ordered by total points descending.
    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>>;
    /// Number of profiles holding strictly more than `points`.
    fn count_profiles_above(&self, points: u64) -> BoxFuture<'static, StorageResult<u64>>;
    /// Badges unlocked by a user.
    fn list_user_badges(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<EarnedBadgeEntity>>>;

    /// Progress entries of a user on one subject.
    fn list_user_progress(
        &self,
        user_id: Uuid,
        subject_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserProgressEntity>>>;
    /// Record a finished session: sets `completed` and bumps `wins` when `won`.
    fn record_progress(
        &self,
        user_id: Uuid,
        subject_id: Uuid,
        difficulty: Difficulty,
        won: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Probe the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
