//! Waiting room: join/leave, the per-session lobby driver and AI injection.

use std::{sync::Arc, time::SystemTime};

use rand::{Rng, seq::IndexedRandom};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    config::GameSettings,
    dao::{
        models::{Difficulty, GameSessionEntity, ParticipantEntity, SessionStatus},
        trivia_store::TriviaStore,
    },
    dto::{
        common::ParticipantSummary,
        matchmaking::{JoinResponse, LobbySnapshot, SessionSnapshot},
    },
    error::ServiceError,
    services::sse_events::{
        broadcast_handoff, broadcast_lobby_countdown, broadcast_lobby_cycle,
        broadcast_participant_change, broadcast_session_status,
    },
    state::{
        SessionRuntime, SharedState,
        lobby::{self, LobbyDecision, LobbyTick},
        session::ParticipantChange,
        state_machine::{SessionEvent, SessionPhase},
    },
};

/// Seat the caller in the oldest waiting session of the pool, creating one when none exists.
pub async fn join(
    state: &SharedState,
    user: AuthUser,
    subject_id: Uuid,
    difficulty: Difficulty,
) -> Result<JoinResponse, ServiceError> {
    join_inner(state, user, subject_id, difficulty)
        .await
        .inspect_err(|err| {
            error!(
                user_id = %user.user_id,
                subject_id = %subject_id,
                difficulty = %difficulty,
                error = %err,
                "matchmaking join failed"
            )
        })
}

async fn join_inner(
    state: &SharedState,
    user: AuthUser,
    subject_id: Uuid,
    difficulty: Difficulty,
) -> Result<JoinResponse, ServiceError> {
    let store = state.require_store().await?;
    if store.find_subject(subject_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!(
            "subject {subject_id} not found"
        )));
    }

    let gate = state.pool_gate(subject_id, difficulty);
    let guard = gate.lock().await;

    let session = match store.find_waiting_session(subject_id, difficulty).await? {
        Some(session) => session,
        None => {
            let session = GameSessionEntity::waiting(subject_id, difficulty);
            store.insert_session(session.clone()).await?;
            info!(session_id = %session.id, subject_id = %subject_id, difficulty = %difficulty, "created waiting session");
            session
        }
    };

    let candidate = ParticipantEntity::human(session.id, user.user_id);
    let candidate_id = candidate.id;
    let participant = store.insert_participant(candidate).await?;
    let created = participant.id == candidate_id;

    let (runtime, _) = state.runtime_for(&session).await?;
    if created {
        let username = username_of(&store, &participant).await?;
        broadcast_participant_change(
            &runtime,
            ParticipantChange::Inserted(participant.clone()),
            username.as_deref(),
        )
        .await;
        info!(session_id = %session.id, user_id = %user.user_id, "player joined waiting room");
    } else {
        debug!(session_id = %session.id, user_id = %user.user_id, "player already seated");
    }
    drop(guard);

    ensure_lobby_driver(state, &runtime, &session).await;

    Ok(JoinResponse {
        session_id: session.id,
        participant_id: participant.id,
        created,
    })
}

/// Remove the caller from a session that has not started yet.
pub async fn leave(state: &SharedState, user: AuthUser, session_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let session = find_session(&store, session_id).await?;

    let gate = state.pool_gate(session.subject_id, session.difficulty);
    let _guard = gate.lock().await;

    // Re-read under the gate: the lobby may have started the session meanwhile.
    let session = find_session(&store, session_id).await?;
    if session.status != SessionStatus::Waiting {
        return Err(ServiceError::InvalidState(
            "session already started; leaving is no longer possible".into(),
        ));
    }

    let removed = store
        .delete_participant(session_id, user.user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("not a participant of this session".into()))?;

    if let Some(runtime) = state.runtime(session_id) {
        broadcast_participant_change(&runtime, ParticipantChange::Deleted(removed), None).await;
    }
    info!(session_id = %session_id, user_id = %user.user_id, "player left waiting room");
    Ok(())
}

/// Snapshot of a session as stored, plus the lobby clock when this process drives it.
pub async fn session_snapshot(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionSnapshot, ServiceError> {
    let store = state.require_store().await?;
    let session = find_session(&store, session_id).await?;
    match state.runtime(session_id) {
        Some(runtime) => snapshot_of(state, &runtime, &session).await,
        None => {
            let participants = store.list_participants(session_id).await?;
            let summaries = summarize(&store, &participants).await?;
            Ok(SessionSnapshot::new(&session, None, summaries))
        }
    }
}

/// Snapshot of `session` using the clock of `runtime`.
pub async fn snapshot_of(
    state: &SharedState,
    runtime: &SessionRuntime,
    session: &GameSessionEntity,
) -> Result<SessionSnapshot, ServiceError> {
    let store = state.require_store().await?;
    let participants = store.list_participants(session.id).await?;
    let summaries = summarize(&store, &participants).await?;
    let lobby = match runtime.phase().await {
        SessionPhase::Waiting { cycle } => Some(LobbySnapshot {
            cycle,
            max_cycles: state.config().game().max_cycles,
            remaining_secs: runtime.countdown().read().await.remaining(),
        }),
        _ => None,
    };
    Ok(SessionSnapshot::new(session, lobby, summaries))
}

pub(crate) async fn find_session(
    store: &Arc<dyn TriviaStore>,
    session_id: Uuid,
) -> Result<GameSessionEntity, ServiceError> {
    store
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session {session_id} not found")))
}

pub(crate) async fn username_of(
    store: &Arc<dyn TriviaStore>,
    participant: &ParticipantEntity,
) -> Result<Option<String>, ServiceError> {
    match participant.user_id {
        Some(user_id) if !participant.is_ai => Ok(store
            .find_profile(user_id)
            .await?
            .and_then(|profile| profile.username)),
        _ => Ok(None),
    }
}

pub(crate) async fn summarize(
    store: &Arc<dyn TriviaStore>,
    participants: &[ParticipantEntity],
) -> Result<Vec<ParticipantSummary>, ServiceError> {
    let mut summaries = Vec::with_capacity(participants.len());
    for participant in participants {
        let username = username_of(store, participant).await?;
        summaries.push(ParticipantSummary::from_entity(
            participant,
            username.as_deref(),
        ));
    }
    Ok(summaries)
}

async fn ensure_lobby_driver(
    state: &SharedState,
    runtime: &Arc<SessionRuntime>,
    session: &GameSessionEntity,
) {
    if !matches!(runtime.phase().await, SessionPhase::Waiting { .. }) {
        return;
    }

    let task_state = state.clone();
    let task_runtime = runtime.clone();
    let task_session = session.clone();
    let started = runtime
        .ensure_lobby(move || tokio::spawn(run_lobby(task_state, task_runtime, task_session)))
        .await;
    if started {
        debug!(session_id = %session.id, "lobby driver started");
    }
}

/// Pick how many AI opponents join and their names. Names may repeat.
pub fn pick_opponents<R: Rng + ?Sized>(
    rng: &mut R,
    names: &[String],
    min: usize,
    max: usize,
) -> Vec<String> {
    let count = rng.random_range(min..=max.max(min));
    (0..count)
        .filter_map(|_| names.choose(rng).cloned())
        .collect()
}

/// Server-side host of a waiting session: ticks the countdown, then starts,
/// injects AI opponents or opens another cycle.
async fn run_lobby(state: SharedState, runtime: Arc<SessionRuntime>, session: GameSessionEntity) {
    let game = state.config().game().clone();
    let mut ticker = interval(game.lobby_tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    if let SessionPhase::Waiting { cycle } = runtime.phase().await {
        let remaining = runtime.countdown().read().await.remaining();
        broadcast_lobby_countdown(&runtime, cycle, remaining);
    }

    loop {
        ticker.tick().await;
        let SessionPhase::Waiting { cycle } = runtime.phase().await else {
            break;
        };

        let tick = runtime.countdown().write().await.tick();
        match tick {
            LobbyTick::Counting(remaining) => broadcast_lobby_countdown(&runtime, cycle, remaining),
            LobbyTick::Elapsed => {
                broadcast_lobby_countdown(&runtime, cycle, 0);
                match on_countdown_elapsed(&state, &runtime, &session, cycle, &game).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => {
                        error!(session_id = %session.id, cycle, error = %err, "lobby decision failed");
                        runtime.countdown().write().await.reset();
                        break;
                    }
                }
            }
        }
    }

    debug!(session_id = %session.id, "lobby driver stopped");
}

/// Returns `true` when the lobby keeps counting.
async fn on_countdown_elapsed(
    state: &SharedState,
    runtime: &Arc<SessionRuntime>,
    session: &GameSessionEntity,
    cycle: u32,
    game: &GameSettings,
) -> Result<bool, ServiceError> {
    let store = state.require_store().await?;
    let gate = state.pool_gate(session.subject_id, session.difficulty);
    let guard = gate.lock().await;

    let participants = store.list_participants(session.id).await?;
    let humans = participants.iter().filter(|p| !p.is_ai).count();
    let decision = lobby::decide(cycle, game.max_cycles, humans, participants.len());
    debug!(session_id = %session.id, cycle, humans, total = participants.len(), ?decision, "lobby countdown elapsed");

    match decision {
        LobbyDecision::Start => {
            start_session(&store, runtime, session.id).await?;
            drop(guard);
            hand_off(runtime, game).await;
            Ok(false)
        }
        LobbyDecision::InjectAi => {
            inject_ai(state, &store, runtime, session.id).await?;
            drop(guard);
            sleep(game.ai_start_delay).await;

            let restart_guard = gate.lock().await;
            let participants = store.list_participants(session.id).await?;
            if participants.iter().all(|p| p.is_ai) {
                info!(session_id = %session.id, "every player left before the AI start");
                reset_lobby(runtime).await?;
                return Ok(false);
            }
            start_session(&store, runtime, session.id).await?;
            drop(restart_guard);
            hand_off(runtime, game).await;
            Ok(false)
        }
        LobbyDecision::NextCycle => {
            runtime
                .run_transition(SessionEvent::CycleElapsed, || async { Ok(()) })
                .await?;
            runtime.countdown().write().await.reset();
            broadcast_lobby_cycle(runtime, cycle + 1);
            Ok(true)
        }
        LobbyDecision::Abandon => {
            info!(session_id = %session.id, "waiting room is empty; pausing lobby");
            reset_lobby(runtime).await?;
            Ok(false)
        }
    }
}

async fn reset_lobby(runtime: &SessionRuntime) -> Result<(), ServiceError> {
    runtime
        .run_transition(SessionEvent::LobbyEmptied, || async { Ok(()) })
        .await?;
    runtime.countdown().write().await.reset();
    Ok(())
}

async fn inject_ai(
    state: &SharedState,
    store: &Arc<dyn TriviaStore>,
    runtime: &SessionRuntime,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    let game = state.config().game();
    let names = {
        let mut rng = rand::rng();
        pick_opponents(
            &mut rng,
            state.config().ai_names(),
            game.ai_opponents_min,
            game.ai_opponents_max,
        )
    };

    for name in names {
        let participant = store
            .insert_participant(ParticipantEntity::ai(session_id, name.clone()))
            .await?;
        broadcast_participant_change(runtime, ParticipantChange::Inserted(participant), None).await;
        info!(session_id = %session_id, ai_name = %name, "AI opponent joined");
    }
    Ok(())
}

async fn start_session(
    store: &Arc<dyn TriviaStore>,
    runtime: &SessionRuntime,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    let store = store.clone();
    let now = SystemTime::now();
    runtime
        .run_transition(SessionEvent::Start, || async move {
            if store
                .transition_session(session_id, SessionStatus::Waiting, SessionStatus::Starting, now)
                .await?
            {
                Ok(())
            } else {
                Err(ServiceError::InvalidState(
                    "session already left the waiting room".into(),
                ))
            }
        })
        .await?;

    broadcast_session_status(runtime, SessionStatus::Starting);
    info!(session_id = %session_id, "session starting");
    Ok(())
}

async fn hand_off(runtime: &SessionRuntime, game: &GameSettings) {
    sleep(game.start_delay).await;
    broadcast_handoff(runtime);
    if runtime.hub().receiver_count() == 0 {
        warn!(session_id = %runtime.id(), "handoff sent with no connected client");
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn opponents_come_from_the_pool_within_bounds() {
        let names: Vec<String> = ["AlphaBot", "BrainMaster", "QuizWiz"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let picked = pick_opponents(&mut rng, &names, 1, 2);
            assert!((1..=2).contains(&picked.len()));
            assert!(picked.iter().all(|name| names.contains(name)));
        }
    }

    #[test]
    fn inverted_bounds_use_the_minimum() {
        let names = vec!["SmartBot".to_string()];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_opponents(&mut rng, &names, 2, 1).len(), 2);
    }
}
