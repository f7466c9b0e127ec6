use std::{future::Future, time::Duration};

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::{
    sync::{Mutex, OnceCell, RwLock, mpsc, oneshot, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{ChallengeEntity, ParticipantEntity},
    error::ServiceError,
    state::{
        SseHub,
        lobby::Countdown,
        round::{AnswerOutcome, RoundError, RoundView},
        state_machine::{
            AbortError, ApplyError, Plan, PlanError, PlanId, SessionEvent, SessionPhase,
            SessionStateMachine,
        },
    },
};

const SESSION_SSE_CAPACITY: usize = 64;

/// Change applied to the participant list of a session.
#[derive(Debug, Clone)]
pub enum ParticipantChange {
    /// A participant joined.
    Inserted(ParticipantEntity),
    /// A participant row changed (score, answers, completion).
    Updated(ParticipantEntity),
    /// A participant left.
    Deleted(ParticipantEntity),
}

impl ParticipantChange {
    /// SSE event name of the change.
    pub fn event_name(&self) -> &'static str {
        match self {
            ParticipantChange::Inserted(_) => "participant.inserted",
            ParticipantChange::Updated(_) => "participant.updated",
            ParticipantChange::Deleted(_) => "participant.deleted",
        }
    }

    /// Row carried by the change.
    pub fn participant(&self) -> &ParticipantEntity {
        match self {
            ParticipantChange::Inserted(row)
            | ParticipantChange::Updated(row)
            | ParticipantChange::Deleted(row) => row,
        }
    }
}

/// Message sent to a running round driver.
pub enum RoundCommand {
    /// Lock an answer on the current question.
    Answer {
        /// Selected option.
        answer: String,
        /// Channel receiving the outcome.
        reply: oneshot::Sender<Result<AnswerOutcome, RoundError>>,
    },
}

/// Handle on the round driver of one player.
pub struct RoundHandle {
    /// Participant row played by the driver.
    pub participant_id: Uuid,
    /// Command channel of the driver.
    pub commands: mpsc::Sender<RoundCommand>,
    /// Latest view published by the driver.
    pub view: watch::Receiver<RoundView>,
    /// Driver task.
    pub task: JoinHandle<()>,
}

impl RoundHandle {
    /// Whether the driver still runs.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[derive(Default)]
struct SessionTasks {
    lobby: Option<JoinHandle<()>>,
    ai: Option<JoinHandle<()>>,
}

/// Live, in-process companion of one persisted game session.
///
/// Owns the status state machine, the participant reducer fed by store
/// writes, the session event hub and the timer tasks.
pub struct SessionRuntime {
    id: Uuid,
    machine: RwLock<SessionStateMachine>,
    gate: Mutex<()>,
    transition_timeout: Option<Duration>,
    hub: SseHub,
    participants: RwLock<IndexMap<Uuid, ParticipantEntity>>,
    countdown: RwLock<Countdown>,
    questions: OnceCell<Vec<ChallengeEntity>>,
    tasks: Mutex<SessionTasks>,
    rounds: DashMap<Uuid, RoundHandle>,
}

impl SessionRuntime {
    /// Runtime positioned at `phase`, seeded with the stored participants.
    pub fn new(
        id: Uuid,
        phase: SessionPhase,
        max_cycles: u32,
        countdown_secs: u32,
        participants: Vec<ParticipantEntity>,
        transition_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            machine: RwLock::new(SessionStateMachine::resume(phase, max_cycles)),
            gate: Mutex::new(()),
            transition_timeout,
            hub: SseHub::new(SESSION_SSE_CAPACITY),
            participants: RwLock::new(
                participants
                    .into_iter()
                    .map(|participant| (participant.id, participant))
                    .collect(),
            ),
            countdown: RwLock::new(Countdown::new(countdown_secs)),
            questions: OnceCell::new(),
            tasks: Mutex::new(SessionTasks::default()),
            rounds: DashMap::new(),
        }
    }

    /// Identifier of the session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Event hub of the session stream.
    pub fn hub(&self) -> &SseHub {
        &self.hub
    }

    /// Current phase.
    pub async fn phase(&self) -> SessionPhase {
        self.machine.read().await.phase()
    }

    /// Lobby clock.
    pub fn countdown(&self) -> &RwLock<Countdown> {
        &self.countdown
    }

    /// Question set shared by every player, loaded once.
    pub fn questions(&self) -> &OnceCell<Vec<ChallengeEntity>> {
        &self.questions
    }

    /// Round drivers keyed by user id.
    pub fn rounds(&self) -> &DashMap<Uuid, RoundHandle> {
        &self.rounds
    }

    /// Participants in join order.
    pub async fn participants(&self) -> Vec<ParticipantEntity> {
        self.participants.read().await.values().cloned().collect()
    }

    /// Fold a participant change into the reducer.
    ///
    /// Updates never lower a score already seen.
    pub async fn reduce(&self, change: &ParticipantChange) {
        let mut participants = self.participants.write().await;
        match change {
            ParticipantChange::Inserted(row) | ParticipantChange::Updated(row) => {
                match participants.get_mut(&row.id) {
                    Some(existing) => {
                        let score = existing.score.max(row.score);
                        *existing = row.clone();
                        existing.score = score;
                    }
                    None => {
                        participants.insert(row.id, row.clone());
                    }
                }
            }
            ParticipantChange::Deleted(row) => {
                participants.shift_remove(&row.id);
            }
        }
    }

    /// Start the lobby driver unless one is already running.
    pub async fn ensure_lobby<F>(&self, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut tasks = self.tasks.lock().await;
        if tasks.lobby.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        tasks.lobby = Some(spawn());
        true
    }

    /// Start the AI ticker unless one is already running.
    pub async fn ensure_ai_ticker<F>(&self, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut tasks = self.tasks.lock().await;
        if tasks.ai.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        tasks.ai = Some(spawn());
        true
    }

    /// Abort the AI ticker.
    pub async fn stop_ai_ticker(&self) {
        if let Some(task) = self.tasks.lock().await.ai.take() {
            task.abort();
        }
    }

    /// Whether any round driver is still running.
    pub fn has_running_rounds(&self) -> bool {
        self.rounds.iter().any(|entry| entry.value().is_running())
    }

    /// Abort every timer task of the session.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for task in [tasks.lobby.take(), tasks.ai.take()].into_iter().flatten() {
            task.abort();
        }
        for entry in self.rounds.iter() {
            entry.value().task.abort();
        }
    }

    async fn plan_transition(&self, event: SessionEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Plan `event`, run `work` (the matching store write), then apply the
    /// plan on success or abort it on failure or timeout.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: SessionEvent,
        work: F,
    ) -> Result<(T, SessionPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            session_id = %self.id,
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        session_id = %self.id,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut();
        for task in [tasks.lobby.take(), tasks.ai.take()].into_iter().flatten() {
            task.abort();
        }
        for entry in self.rounds.iter() {
            entry.value().task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dao::models::SessionStatus;

    use super::*;

    fn runtime(phase: SessionPhase) -> SessionRuntime {
        SessionRuntime::new(
            Uuid::new_v4(),
            phase,
            3,
            20,
            Vec::new(),
            Some(Duration::from_millis(50)),
        )
    }

    #[tokio::test]
    async fn reducer_keeps_join_order_and_best_score() {
        let rt = runtime(SessionPhase::Waiting { cycle: 1 });
        let mut first = ParticipantEntity::human(rt.id(), Uuid::new_v4());
        let second = ParticipantEntity::ai(rt.id(), "QuizWiz");

        rt.reduce(&ParticipantChange::Inserted(first.clone())).await;
        rt.reduce(&ParticipantChange::Inserted(second.clone())).await;

        first.score = 200;
        rt.reduce(&ParticipantChange::Updated(first.clone())).await;
        first.score = 100;
        rt.reduce(&ParticipantChange::Updated(first.clone())).await;

        let rows = rt.participants().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[0].score, 200);

        rt.reduce(&ParticipantChange::Deleted(second)).await;
        assert_eq!(rt.participants().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_work_leaves_phase_untouched() {
        let rt = runtime(SessionPhase::Waiting { cycle: 1 });
        let result = rt
            .run_transition(SessionEvent::Start, || async {
                Err::<(), _>(ServiceError::InvalidState("lost race".into()))
            })
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
        assert_eq!(rt.phase().await, SessionPhase::Waiting { cycle: 1 });

        let (_, next) = rt
            .run_transition(SessionEvent::Start, || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(next.status(), SessionStatus::Starting);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_work_times_out_and_aborts() {
        let rt = runtime(SessionPhase::Starting);
        let result = rt
            .run_transition(SessionEvent::BeginRound, || async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Timeout)));
        assert_eq!(rt.phase().await, SessionPhase::Starting);
    }

    #[tokio::test]
    async fn lobby_driver_starts_once() {
        let rt = runtime(SessionPhase::Waiting { cycle: 1 });
        let started = rt
            .ensure_lobby(|| tokio::spawn(std::future::pending()))
            .await;
        assert!(started);
        let again = rt
            .ensure_lobby(|| tokio::spawn(std::future::pending()))
            .await;
        assert!(!again);
        rt.shutdown().await;
    }
}
