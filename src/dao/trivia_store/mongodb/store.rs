use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoAnswerDocument, MongoBadgeDocument, MongoChallengeDocument, MongoParticipantDocument,
        MongoProfileDocument, MongoProgressDocument, MongoSessionDocument, MongoSubjectDocument,
        MongoUserBadgeDocument, doc_id, parse_id,
    },
};
use crate::dao::{
    models::{
        AnswerRecordEntity, BadgeEntity, ChallengeEntity, Difficulty, EarnedBadgeEntity,
        GameSessionEntity, ParticipantEntity, ProfileEntity, SessionStatus, SubjectEntity,
        UserProgressEntity,
    },
    storage::StorageResult,
    trivia_store::TriviaStore,
};

const SUBJECTS: &str = "subjects";
const SESSIONS: &str = "game_sessions";
const PARTICIPANTS: &str = "game_participants";
const PROFILES: &str = "profiles";
const BADGES: &str = "badges";
const USER_BADGES: &str = "user_badges";
const PROGRESS: &str = "user_progress";

/// MongoDB-backed [`TriviaStore`].
#[derive(Clone)]
pub struct MongoTriviaStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn index(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().name(Some(name.to_owned())).build())
        .build()
}

impl MongoTriviaStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;
        info!(database = %config.database_name, "connected to MongoDB");

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let ensure = |name: &'static str, index_name: &'static str, model: IndexModel| {
            let collection = database.collection::<Document>(name);
            async move {
                collection
                    .create_index(model)
                    .await
                    .map(|_| ())
                    .map_err(|source| MongoDaoError::EnsureIndex {
                        collection: name,
                        index: index_name,
                        source,
                    })
            }
        };

        ensure(
            SESSIONS,
            "session_pool_idx",
            index(
                doc! { "subject_id": 1, "difficulty": 1, "status": 1, "created_at": 1 },
                "session_pool_idx",
            ),
        )
        .await?;
        ensure(
            PARTICIPANTS,
            "participant_session_idx",
            index(
                doc! { "session_id": 1, "created_at": 1 },
                "participant_session_idx",
            ),
        )
        .await?;
        ensure(
            PARTICIPANTS,
            "participant_user_idx",
            IndexModel::builder()
                .keys(doc! { "session_id": 1, "user_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name(Some("participant_user_idx".to_owned()))
                        .unique(Some(true))
                        .partial_filter_expression(Some(doc! { "user_id": { "$type": "string" } }))
                        .build(),
                )
                .build(),
        )
        .await?;
        ensure(
            PROFILES,
            "profile_points_idx",
            index(doc! { "total_points": -1, "_id": 1 }, "profile_points_idx"),
        )
        .await?;
        ensure(
            USER_BADGES,
            "user_badge_idx",
            index(doc! { "user_id": 1 }, "user_badge_idx"),
        )
        .await?;
        ensure(
            PROGRESS,
            "progress_user_idx",
            index(doc! { "user_id": 1, "subject_id": 1 }, "progress_user_idx"),
        )
        .await?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database().await.collection::<T>(name)
    }

    async fn find_many<T>(
        &self,
        collection: &str,
        filter: Document,
        sort: Document,
        limit: Option<i64>,
        operation: &'static str,
    ) -> MongoResult<Vec<T>>
    where
        T: DeserializeOwned + Serialize + Send + Sync + Unpin,
    {
        let collection = self.collection::<T>(collection).await;
        let mut action = collection.find(filter).sort(sort);
        if let Some(limit) = limit {
            action = action.limit(limit);
        }
        action
            .await
            .map_err(MongoDaoError::operation(operation))?
            .try_collect()
            .await
            .map_err(MongoDaoError::operation(operation))
    }

    async fn list_subjects(&self) -> MongoResult<Vec<SubjectEntity>> {
        let documents: Vec<MongoSubjectDocument> = self
            .find_many(SUBJECTS, doc! {}, doc! { "name": 1 }, None, "list_subjects")
            .await?;
        documents.into_iter().map(SubjectEntity::try_from).collect()
    }

    async fn find_subject(&self, id: Uuid) -> MongoResult<Option<SubjectEntity>> {
        self.collection::<MongoSubjectDocument>(SUBJECTS)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(MongoDaoError::operation("find_subject"))?
            .map(SubjectEntity::try_from)
            .transpose()
    }

    async fn save_subject(&self, subject: SubjectEntity) -> MongoResult<()> {
        let id = subject.id;
        let document: MongoSubjectDocument = subject.into();
        self.collection::<MongoSubjectDocument>(SUBJECTS)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(MongoDaoError::operation("save_subject"))?;
        Ok(())
    }

    async fn find_waiting_session(
        &self,
        subject_id: Uuid,
        difficulty: Difficulty,
    ) -> MongoResult<Option<GameSessionEntity>> {
        self.collection::<MongoSessionDocument>(SESSIONS)
            .await
            .find_one(doc! {
                "subject_id": subject_id.to_string(),
                "difficulty": difficulty.as_str(),
                "status": SessionStatus::Waiting.as_str(),
            })
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(MongoDaoError::operation("find_waiting_session"))?
            .map(GameSessionEntity::try_from)
            .transpose()
    }

    async fn insert_session(&self, session: GameSessionEntity) -> MongoResult<()> {
        let document: MongoSessionDocument = session.into();
        self.collection::<MongoSessionDocument>(SESSIONS)
            .await
            .insert_one(&document)
            .await
            .map_err(MongoDaoError::operation("insert_session"))?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> MongoResult<Option<GameSessionEntity>> {
        self.collection::<MongoSessionDocument>(SESSIONS)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(MongoDaoError::operation("find_session"))?
            .map(GameSessionEntity::try_from)
            .transpose()
    }

    async fn transition_session(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
        at: SystemTime,
    ) -> MongoResult<bool> {
        let mut set = doc! { "status": to.as_str() };
        match to {
            SessionStatus::Starting => {
                set.insert("started_at", DateTime::from_system_time(at));
            }
            SessionStatus::Completed => {
                set.insert("ended_at", DateTime::from_system_time(at));
            }
            SessionStatus::Waiting | SessionStatus::InProgress => {}
        }

        let result = self
            .collection::<Document>(SESSIONS)
            .await
            .update_one(
                doc! { "_id": id.to_string(), "status": from.as_str() },
                doc! { "$set": set },
            )
            .await
            .map_err(MongoDaoError::operation("transition_session"))?;
        Ok(result.modified_count > 0)
    }

    async fn attach_questions(
        &self,
        id: Uuid,
        questions: Vec<ChallengeEntity>,
    ) -> MongoResult<Vec<ChallengeEntity>> {
        let encoded: Vec<Bson> = questions
            .into_iter()
            .map(|question| Bson::Document(MongoChallengeDocument::from(question).to_document()))
            .collect();

        self.collection::<Document>(SESSIONS)
            .await
            .update_one(
                doc! { "_id": id.to_string(), "questions": { "$size": 0 } },
                doc! { "$set": { "questions": encoded } },
            )
            .await
            .map_err(MongoDaoError::operation("attach_questions"))?;

        Ok(self
            .find_session(id)
            .await?
            .map(|session| session.questions)
            .unwrap_or_default())
    }

    async fn list_participants(&self, session_id: Uuid) -> MongoResult<Vec<ParticipantEntity>> {
        let documents: Vec<MongoParticipantDocument> = self
            .find_many(
                PARTICIPANTS,
                doc! { "session_id": session_id.to_string() },
                doc! { "created_at": 1 },
                None,
                "list_participants",
            )
            .await?;
        documents
            .into_iter()
            .map(ParticipantEntity::try_from)
            .collect()
    }

    async fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> MongoResult<ParticipantEntity> {
        let document: MongoParticipantDocument = participant.clone().into();
        let Some(user_id) = document.user_id.clone() else {
            self.collection::<MongoParticipantDocument>(PARTICIPANTS)
                .await
                .insert_one(&document)
                .await
                .map_err(MongoDaoError::operation("insert_participant"))?;
            return Ok(participant);
        };

        let stored = self
            .collection::<MongoParticipantDocument>(PARTICIPANTS)
            .await
            .find_one_and_update(
                doc! { "session_id": &document.session_id, "user_id": &user_id },
                doc! { "$setOnInsert": document.insert_fields() },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(MongoDaoError::operation("insert_participant"))?;

        match stored {
            Some(stored) => ParticipantEntity::try_from(stored),
            None => Ok(participant),
        }
    }

    async fn delete_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> MongoResult<Option<ParticipantEntity>> {
        self.collection::<MongoParticipantDocument>(PARTICIPANTS)
            .await
            .find_one_and_delete(doc! {
                "session_id": session_id.to_string(),
                "user_id": user_id.to_string(),
            })
            .await
            .map_err(MongoDaoError::operation("delete_participant"))?
            .map(ParticipantEntity::try_from)
            .transpose()
    }

    async fn update_participant(
        &self,
        participant_id: Uuid,
        update: Document,
        operation: &'static str,
    ) -> MongoResult<Option<ParticipantEntity>> {
        self.collection::<MongoParticipantDocument>(PARTICIPANTS)
            .await
            .find_one_and_update(doc_id(participant_id), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(MongoDaoError::operation(operation))?
            .map(ParticipantEntity::try_from)
            .transpose()
    }

    async fn complete_participant(
        &self,
        participant_id: Uuid,
        score: u32,
        at: SystemTime,
    ) -> MongoResult<bool> {
        let result = self
            .collection::<Document>(PARTICIPANTS)
            .await
            .update_one(
                doc! { "_id": participant_id.to_string(), "completed_at": Bson::Null },
                doc! {
                    "$set": { "completed_at": DateTime::from_system_time(at) },
                    "$max": { "score": i64::from(score) },
                },
            )
            .await
            .map_err(MongoDaoError::operation("complete_participant"))?;
        Ok(result.matched_count > 0)
    }

    async fn find_profile(&self, user_id: Uuid) -> MongoResult<Option<ProfileEntity>> {
        self.collection::<MongoProfileDocument>(PROFILES)
            .await
            .find_one(doc_id(user_id))
            .await
            .map_err(MongoDaoError::operation("find_profile"))?
            .map(ProfileEntity::try_from)
            .transpose()
    }

    async fn save_profile(&self, profile: ProfileEntity) -> MongoResult<()> {
        let id = profile.user_id;
        let document: MongoProfileDocument = profile.into();
        self.collection::<MongoProfileDocument>(PROFILES)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(MongoDaoError::operation("save_profile"))?;
        Ok(())
    }

    async fn add_profile_points(&self, user_id: Uuid, points: u64) -> MongoResult<()> {
        let points = i64::try_from(points).unwrap_or(i64::MAX);
        self.collection::<Document>(PROFILES)
            .await
            .update_one(
                doc_id(user_id),
                doc! {
                    "$inc": { "total_points": points },
                    "$setOnInsert": { "username": Bson::Null, "avatar_url": Bson::Null },
                },
            )
            .upsert(true)
            .await
            .map_err(MongoDaoError::operation("add_profile_points"))?;
        Ok(())
    }

    async fn leaderboard(&self, limit: usize) -> MongoResult<Vec<ProfileEntity>> {
        let documents: Vec<MongoProfileDocument> = self
            .find_many(
                PROFILES,
                doc! {},
                doc! { "total_points": -1, "_id": 1 },
                Some(i64::try_from(limit).unwrap_or(i64::MAX)),
                "leaderboard",
            )
            .await?;
        documents.into_iter().map(ProfileEntity::try_from).collect()
    }

    async fn count_profiles_above(&self, points: u64) -> MongoResult<u64> {
        let points = i64::try_from(points).unwrap_or(i64::MAX);
        self.collection::<Document>(PROFILES)
            .await
            .count_documents(doc! { "total_points": { "$gt": points } })
            .await
            .map_err(MongoDaoError::operation("count_profiles_above"))
    }

    async fn list_user_badges(&self, user_id: Uuid) -> MongoResult<Vec<EarnedBadgeEntity>> {
        let earned: Vec<MongoUserBadgeDocument> = self
            .find_many(
                USER_BADGES,
                doc! { "user_id": user_id.to_string() },
                doc! { "earned_at": 1 },
                None,
                "list_user_badges",
            )
            .await?;
        if earned.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = earned.iter().map(|row| row.badge_id.as_str()).collect();
        let definitions: Vec<MongoBadgeDocument> = self
            .find_many(
                BADGES,
                doc! { "_id": { "$in": ids } },
                doc! {},
                None,
                "list_user_badges",
            )
            .await?;
        let definitions: HashMap<Uuid, BadgeEntity> = definitions
            .into_iter()
            .map(|document| BadgeEntity::try_from(document).map(|badge| (badge.id, badge)))
            .collect::<MongoResult<_>>()?;

        earned
            .into_iter()
            .filter_map(|row| match parse_id(&row.badge_id) {
                Ok(id) => definitions.get(&id).map(|badge| {
                    Ok(EarnedBadgeEntity {
                        badge: badge.clone(),
                        earned_at: row.earned_at.to_system_time(),
                    })
                }),
                Err(err) => Some(Err(err)),
            })
            .collect()
    }

    async fn list_user_progress(
        &self,
        user_id: Uuid,
        subject_id: Uuid,
    ) -> MongoResult<Vec<UserProgressEntity>> {
        let documents: Vec<MongoProgressDocument> = self
            .find_many(
                PROGRESS,
                doc! { "user_id": user_id.to_string(), "subject_id": subject_id.to_string() },
                doc! { "difficulty": 1 },
                None,
                "list_user_progress",
            )
            .await?;
        documents
            .into_iter()
            .map(UserProgressEntity::try_from)
            .collect()
    }

    async fn record_progress(
        &self,
        user_id: Uuid,
        subject_id: Uuid,
        difficulty: Difficulty,
        won: bool,
    ) -> MongoResult<()> {
        let key = MongoProgressDocument::key(user_id, subject_id, difficulty);
        self.collection::<Document>(PROGRESS)
            .await
            .update_one(
                doc! { "_id": key },
                doc! {
                    "$set": {
                        "user_id": user_id.to_string(),
                        "subject_id": subject_id.to_string(),
                        "difficulty": difficulty.as_str(),
                        "completed": true,
                        "updated_at": DateTime::now(),
                    },
                    "$inc": { "wins": if won { 1_i64 } else { 0_i64 } },
                },
            )
            .upsert(true)
            .await
            .map_err(MongoDaoError::operation("record_progress"))?;
        Ok(())
    }
}

impl TriviaStore for MongoTriviaStore {
    fn list_subjects(&self) -> BoxFuture<'static, StorageResult<Vec<SubjectEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_subjects().await.map_err(Into::into) })
    }

    fn find_subject(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SubjectEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_subject(id).await.map_err(Into::into) })
    }

    fn save_subject(&self, subject: SubjectEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_subject(subject).await.map_err(Into::into) })
    }

    fn find_waiting_session(
        &self,
        subject_id: Uuid,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_waiting_session(subject_id, difficulty)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_session(&self, session: GameSessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session(session).await.map_err(Into::into) })
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn transition_session(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .transition_session(id, from, to, at)
                .await
                .map_err(Into::into)
        })
    }

    fn attach_questions(
        &self,
        id: Uuid,
        questions: Vec<ChallengeEntity>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .attach_questions(id, questions)
                .await
                .map_err(Into::into)
        })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_participants(session_id).await.map_err(Into::into) })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_participant(participant)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_participant(session_id, user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn update_participant_score(
        &self,
        participant_id: Uuid,
        score: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_participant(
                    participant_id,
                    doc! { "$max": { "score": i64::from(score) } },
                    "update_participant_score",
                )
                .await
                .map_err(Into::into)
        })
    }

    fn record_answer(
        &self,
        participant_id: Uuid,
        answer: AnswerRecordEntity,
        score: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        let answer = MongoAnswerDocument::from(answer).to_document();
        Box::pin(async move {
            store
                .update_participant(
                    participant_id,
                    doc! {
                        "$push": { "answers": answer },
                        "$max": { "score": i64::from(score) },
                    },
                    "record_answer",
                )
                .await
                .map_err(Into::into)
        })
    }

    fn complete_participant(
        &self,
        participant_id: Uuid,
        score: u32,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .complete_participant(participant_id, score, at)
                .await
                .map_err(Into::into)
        })
    }

    fn find_profile(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_profile(user_id).await.map_err(Into::into) })
    }

    fn save_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_profile(profile).await.map_err(Into::into) })
    }

    fn add_profile_points(
        &self,
        user_id: Uuid,
        points: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .add_profile_points(user_id, points)
                .await
                .map_err(Into::into)
        })
    }

    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.leaderboard(limit).await.map_err(Into::into) })
    }

    fn count_profiles_above(&self, points: u64) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_profiles_above(points).await.map_err(Into::into) })
    }

    fn list_user_badges(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<EarnedBadgeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_user_badges(user_id).await.map_err(Into::into) })
    }

    fn list_user_progress(
        &self,
        user_id: Uuid,
        subject_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserProgressEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_user_progress(user_id, subject_id)
                .await
                .map_err(Into::into)
        })
    }

    fn record_progress(
        &self,
        user_id: Uuid,
        subject_id: Uuid,
        difficulty: Difficulty,
        won: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_progress(user_id, subject_id, difficulty, won)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
