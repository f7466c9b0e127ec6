//! Live game engine: per-player round drivers, simulated opponents and
//! session completion.

use std::{sync::Arc, time::SystemTime};

use dashmap::mapref::entry::Entry;
use rand::{Rng, seq::IndexedRandom};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Duration, Instant, MissedTickBehavior, interval_at, sleep},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    dao::{
        models::{AnswerRecordEntity, ChallengeEntity, GameSessionEntity, ParticipantEntity, SessionStatus},
        trivia_store::TriviaStore,
    },
    dto::game::{AnswerRequest, AnswerResponse, ResultsResponse, RoundSnapshot, Standing},
    error::ServiceError,
    services::{
        matchmaking_service::{find_session, summarize, username_of},
        question_service,
        sse_events::{
            broadcast_participant_change, broadcast_round_completed, broadcast_round_question,
            broadcast_round_revealed, broadcast_round_tick, broadcast_session_status,
        },
    },
    state::{
        SessionRuntime, SharedState,
        round::{BASE_POINTS, PlayerRound, RoundError, RoundPhase, RoundView, Tick},
        session::{ParticipantChange, RoundCommand, RoundHandle},
        state_machine::{SessionEvent, SessionPhase},
    },
};

const ROUND_COMMAND_CAPACITY: usize = 8;

/// Everything a round driver needs to know about its player.
#[derive(Clone)]
struct Seat {
    session: GameSessionEntity,
    participant_id: Uuid,
    user_id: Uuid,
    username: Option<String>,
}

/// Enter the game: begin the session if needed and start the caller's round.
///
/// Calling it again while the round runs returns the live round.
pub async fn play(
    state: &SharedState,
    user: AuthUser,
    session_id: Uuid,
) -> Result<RoundSnapshot, ServiceError> {
    let store = state.require_store().await?;
    let session = find_session(&store, session_id).await?;
    let participant = human_seat(&store, session_id, user.user_id).await?;

    if let Some(snapshot) = live_round(state, session_id, user.user_id) {
        return Ok(snapshot);
    }
    if session.status == SessionStatus::Waiting {
        return Err(ServiceError::InvalidState(
            "session is still in the waiting room".into(),
        ));
    }
    if participant.completed_at.is_some() {
        return Err(ServiceError::InvalidState("round already finished".into()));
    }

    // A completed session still lets unfinished players play or resume.
    let (runtime, _) = state.runtime_for(&session).await?;
    let questions = load_questions(state, &runtime, &session).await?;
    begin_round(&store, &runtime, session_id).await?;
    if session.status != SessionStatus::Completed {
        ensure_ai_ticker(state, &runtime, questions.len()).await;
    }

    let game = state.config().game();
    let round = PlayerRound::resume(questions, game.question_secs, &participant.answers);
    let seat = Seat {
        username: username_of(&store, &participant).await?,
        session,
        participant_id: participant.id,
        user_id: user.user_id,
    };

    let view = round.view();
    if round.phase() == RoundPhase::Finished {
        finalize(state, &runtime, &seat, round.score()).await?;
        return Ok(RoundSnapshot::new(session_id, seat.participant_id, &view));
    }

    let participant_id = seat.participant_id;
    {
        let entry = runtime.rounds().entry(user.user_id);
        if let Entry::Occupied(existing) = &entry {
            if existing.get().is_running() {
                let view = existing.get().view.borrow().clone();
                return Ok(RoundSnapshot::new(session_id, participant_id, &view));
            }
        }

        let (commands, receiver) = mpsc::channel(ROUND_COMMAND_CAPACITY);
        let (view_tx, view_rx) = watch::channel(view.clone());
        let task = tokio::spawn(drive_round(
            state.clone(),
            runtime.clone(),
            seat,
            round,
            receiver,
            view_tx,
        ));
        entry.insert(RoundHandle {
            participant_id,
            commands,
            view: view_rx,
            task,
        });
    }

    info!(session_id = %session_id, user_id = %user.user_id, "round started");
    Ok(RoundSnapshot::new(session_id, participant_id, &view))
}

/// Submit an answer to the caller's current question.
pub async fn answer(
    state: &SharedState,
    user: AuthUser,
    session_id: Uuid,
    request: AnswerRequest,
) -> Result<AnswerResponse, ServiceError> {
    let store = state.require_store().await?;
    find_session(&store, session_id).await?;

    let commands = state
        .runtime(session_id)
        .and_then(|runtime| {
            runtime
                .rounds()
                .get(&user.user_id)
                .filter(|handle| handle.is_running())
                .map(|handle| handle.commands.clone())
        })
        .ok_or_else(|| ServiceError::InvalidState("no round is running for this player".into()))?;

    let (reply, outcome) = oneshot::channel();
    commands
        .send(RoundCommand::Answer {
            answer: request.answer,
            reply,
        })
        .await
        .map_err(|_| ServiceError::InvalidState(RoundError::Finished.to_string()))?;
    let outcome = outcome
        .await
        .map_err(|_| ServiceError::InvalidState(RoundError::Finished.to_string()))?;

    outcome
        .map(AnswerResponse::from)
        .map_err(|err| ServiceError::InvalidState(err.to_string()))
}

/// Current round of the caller, or the finished round once completed.
pub async fn round_snapshot(
    state: &SharedState,
    user: AuthUser,
    session_id: Uuid,
) -> Result<RoundSnapshot, ServiceError> {
    let store = state.require_store().await?;
    let session = find_session(&store, session_id).await?;
    let participant = human_seat(&store, session_id, user.user_id).await?;

    if let Some(snapshot) = live_round(state, session_id, user.user_id) {
        return Ok(snapshot);
    }
    if participant.completed_at.is_none() {
        return Err(ServiceError::InvalidState(
            "round not started; call play first".into(),
        ));
    }

    let round = PlayerRound::resume(
        session.questions,
        state.config().game().question_secs,
        &participant.answers,
    );
    Ok(RoundSnapshot::new(session_id, participant.id, &round.view()))
}

/// Participants ranked by score.
pub async fn results(state: &SharedState, session_id: Uuid) -> Result<ResultsResponse, ServiceError> {
    let store = state.require_store().await?;
    let session = find_session(&store, session_id).await?;
    let participants = ranked(store.list_participants(session_id).await?);
    let summaries = summarize(&store, &participants).await?;

    Ok(ResultsResponse {
        session_id,
        status: session.status,
        standings: summaries
            .into_iter()
            .enumerate()
            .map(|(index, participant)| Standing {
                rank: index + 1,
                participant,
            })
            .collect(),
    })
}

/// Sort by descending score, keeping join order among ties.
pub fn ranked(mut participants: Vec<ParticipantEntity>) -> Vec<ParticipantEntity> {
    participants.sort_by(|a, b| b.score.cmp(&a.score));
    participants
}

/// Roll one simulated scoring attempt.
pub fn roll_ai_gain<R: Rng + ?Sized>(rng: &mut R, chance: f64, points: &[u32]) -> Option<u32> {
    if rng.random_bool(chance.clamp(0.0, 1.0)) {
        points.choose(rng).copied()
    } else {
        None
    }
}

/// Next AI score, never above `cap` and never below `current`.
pub fn next_ai_score(current: u32, gained: u32, cap: u32) -> u32 {
    current.saturating_add(gained).min(cap).max(current)
}

async fn human_seat(
    store: &Arc<dyn TriviaStore>,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<ParticipantEntity, ServiceError> {
    store
        .list_participants(session_id)
        .await?
        .into_iter()
        .find(|participant| !participant.is_ai && participant.user_id == Some(user_id))
        .ok_or_else(|| ServiceError::NotFound("not a participant of this session".into()))
}

fn live_round(state: &SharedState, session_id: Uuid, user_id: Uuid) -> Option<RoundSnapshot> {
    let runtime = state.runtime(session_id)?;
    let handle = runtime.rounds().get(&user_id)?;
    if !handle.is_running() {
        return None;
    }
    let view = handle.view.borrow().clone();
    Some(RoundSnapshot::new(session_id, handle.participant_id, &view))
}

async fn load_questions(
    state: &SharedState,
    runtime: &SessionRuntime,
    session: &GameSessionEntity,
) -> Result<Vec<ChallengeEntity>, ServiceError> {
    let questions = runtime
        .questions()
        .get_or_try_init(|| async {
            if !session.questions.is_empty() {
                return Ok(session.questions.clone());
            }
            let generated = question_service::questions_for_session(state, session).await;
            let store = state.require_store().await?;
            let attached = store.attach_questions(session.id, generated).await?;
            info!(session_id = %session.id, count = attached.len(), "questions attached");
            Ok::<_, ServiceError>(attached)
        })
        .await?;

    if questions.is_empty() {
        return Err(ServiceError::InvalidState("no questions available".into()));
    }
    Ok(questions.clone())
}

async fn begin_round(
    store: &Arc<dyn TriviaStore>,
    runtime: &SessionRuntime,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    if runtime.phase().await != SessionPhase::Starting {
        return Ok(());
    }

    let task_store = store.clone();
    let now = SystemTime::now();
    let result = runtime
        .run_transition(SessionEvent::BeginRound, || async move {
            if task_store
                .transition_session(session_id, SessionStatus::Starting, SessionStatus::InProgress, now)
                .await?
            {
                return Ok(());
            }
            match task_store.find_session(session_id).await? {
                Some(session) if session.status == SessionStatus::InProgress => Ok(()),
                _ => Err(ServiceError::InvalidState("session cannot begin".into())),
            }
        })
        .await;

    match result {
        Ok(_) => {
            broadcast_session_status(runtime, SessionStatus::InProgress);
            info!(session_id = %session_id, "session in progress");
            Ok(())
        }
        // another player began the session first
        Err(ServiceError::InvalidState(_)) if runtime.phase().await == SessionPhase::InProgress => {
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn ensure_ai_ticker(state: &SharedState, runtime: &Arc<SessionRuntime>, question_count: usize) {
    let task_state = state.clone();
    let task_runtime = runtime.clone();
    let started = runtime
        .ensure_ai_ticker(move || {
            tokio::spawn(run_ai_ticker(task_state, task_runtime, question_count))
        })
        .await;
    if started {
        debug!(session_id = %runtime.id(), "AI ticker started");
    }
}

/// Advance simulated opponents until the session completes.
async fn run_ai_ticker(state: SharedState, runtime: Arc<SessionRuntime>, question_count: usize) {
    let game = state.config().game().clone();
    let cap = u32::try_from(question_count)
        .unwrap_or(u32::MAX)
        .saturating_mul(BASE_POINTS);
    let mut ticker = interval_at(Instant::now() + game.ai_tick, game.ai_tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if runtime.phase().await == SessionPhase::Completed {
            break;
        }

        let opponents: Vec<ParticipantEntity> = runtime
            .participants()
            .await
            .into_iter()
            .filter(|participant| participant.is_ai)
            .collect();
        if opponents.is_empty() {
            continue;
        }
        let gains: Vec<(ParticipantEntity, u32)> = {
            let mut rng = rand::rng();
            opponents
                .into_iter()
                .filter_map(|ai| {
                    roll_ai_gain(&mut rng, game.ai_score_chance, &game.ai_points)
                        .map(|gained| (ai, gained))
                })
                .collect()
        };

        let store = match state.require_store().await {
            Ok(store) => store,
            Err(err) => {
                warn!(session_id = %runtime.id(), error = %err, "AI tick skipped");
                continue;
            }
        };
        for (ai, gained) in gains {
            let next = next_ai_score(ai.score, gained, cap);
            if next <= ai.score {
                continue;
            }
            match store.update_participant_score(ai.id, next).await {
                Ok(Some(row)) => {
                    broadcast_participant_change(&runtime, ParticipantChange::Updated(row), None)
                        .await
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(session_id = %runtime.id(), participant_id = %ai.id, error = %err, "failed to persist AI score")
                }
            }
        }
    }

    debug!(session_id = %runtime.id(), "AI ticker stopped");
}

/// Drive one player's round from its current question to completion.
async fn drive_round(
    state: SharedState,
    runtime: Arc<SessionRuntime>,
    seat: Seat,
    mut round: PlayerRound,
    mut commands: mpsc::Receiver<RoundCommand>,
    view: watch::Sender<RoundView>,
) {
    let game = state.config().game().clone();

    loop {
        broadcast_round_question(&runtime, seat.participant_id, &round);
        view.send_replace(round.view());

        let Some(record) =
            answer_window(&runtime, &seat, &mut round, &mut commands, &view, game.round_tick).await
        else {
            warn!(session_id = %seat.session.id, user_id = %seat.user_id, "round commands closed");
            return;
        };
        view.send_replace(round.view());
        checkpoint(&state, &runtime, &seat, record.clone(), round.score()).await;
        broadcast_round_revealed(&runtime, seat.participant_id, &round, &record);

        reveal_pause(&mut commands, game.reveal_delay).await;
        if !round.advance() {
            break;
        }
    }

    view.send_replace(round.view());
    if let Err(err) = finalize(&state, &runtime, &seat, round.score()).await {
        error!(
            session_id = %seat.session.id,
            user_id = %seat.user_id,
            error = %err,
            "failed to finalize round"
        );
    }
}

/// Wait for an answer or the timeout on the current question.
async fn answer_window(
    runtime: &SessionRuntime,
    seat: &Seat,
    round: &mut PlayerRound,
    commands: &mut mpsc::Receiver<RoundCommand>,
    view: &watch::Sender<RoundView>,
    tick: Duration,
) -> Option<AnswerRecordEntity> {
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => match round.tick()? {
                Tick::Running(_) => {
                    broadcast_round_tick(runtime, seat.participant_id, round);
                    view.send_replace(round.view());
                }
                Tick::TimedOut(record) => return Some(record),
            },
            command = commands.recv() => match command? {
                RoundCommand::Answer { answer, reply } => match round.answer(&answer) {
                    Ok((record, outcome)) => {
                        let _ = reply.send(Ok(outcome));
                        return Some(record);
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                },
            },
        }
    }
}

/// Hold the reveal on screen, refusing further answers.
async fn reveal_pause(commands: &mut mpsc::Receiver<RoundCommand>, delay: Duration) {
    let pause = sleep(delay);
    tokio::pin!(pause);

    loop {
        tokio::select! {
            _ = &mut pause => return,
            command = commands.recv() => match command {
                Some(RoundCommand::Answer { reply, .. }) => {
                    let _ = reply.send(Err(RoundError::AlreadyAnswered));
                }
                None => {
                    (&mut pause).await;
                    return;
                }
            },
        }
    }
}

async fn checkpoint(
    state: &SharedState,
    runtime: &SessionRuntime,
    seat: &Seat,
    record: AnswerRecordEntity,
    score: u32,
) {
    let result = async {
        let store = state.require_store().await?;
        Ok::<_, ServiceError>(store.record_answer(seat.participant_id, record, score).await?)
    }
    .await;

    match result {
        Ok(Some(row)) => {
            broadcast_participant_change(
                runtime,
                ParticipantChange::Updated(row),
                seat.username.as_deref(),
            )
            .await
        }
        Ok(None) => warn!(participant_id = %seat.participant_id, "participant vanished before checkpoint"),
        Err(err) => error!(
            session_id = %seat.session.id,
            participant_id = %seat.participant_id,
            error = %err,
            "failed to checkpoint answer"
        ),
    }
}

/// Close a finished round: complete the participant, the session on first
/// finish, then award points and progress exactly once.
async fn finalize(
    state: &SharedState,
    runtime: &SessionRuntime,
    seat: &Seat,
    score: u32,
) -> Result<usize, ServiceError> {
    let store = state.require_store().await?;
    let now = SystemTime::now();
    let first_completion = store
        .complete_participant(seat.participant_id, score, now)
        .await?;
    complete_session(&store, runtime, seat.session.id, now).await?;

    let participants = ranked(store.list_participants(seat.session.id).await?);
    let rank = participants
        .iter()
        .position(|participant| participant.id == seat.participant_id)
        .map_or(participants.len(), |index| index + 1);

    if first_completion {
        if score > 0 {
            store.add_profile_points(seat.user_id, u64::from(score)).await?;
        }
        store
            .record_progress(
                seat.user_id,
                seat.session.subject_id,
                seat.session.difficulty,
                rank == 1,
            )
            .await?;
        info!(
            session_id = %seat.session.id,
            user_id = %seat.user_id,
            score,
            rank,
            "round completed"
        );
    }

    if let Some(row) = participants
        .into_iter()
        .find(|participant| participant.id == seat.participant_id)
    {
        broadcast_participant_change(
            runtime,
            ParticipantChange::Updated(row),
            seat.username.as_deref(),
        )
        .await;
    }
    broadcast_round_completed(runtime, seat.participant_id, score, rank);
    runtime.stop_ai_ticker().await;

    let others_running = runtime
        .rounds()
        .iter()
        .any(|entry| *entry.key() != seat.user_id && entry.value().is_running());
    if !others_running {
        state.release_runtime(seat.session.id);
        debug!(session_id = %seat.session.id, "session runtime released");
    }
    Ok(rank)
}

async fn complete_session(
    store: &Arc<dyn TriviaStore>,
    runtime: &SessionRuntime,
    session_id: Uuid,
    now: SystemTime,
) -> Result<(), ServiceError> {
    if runtime.phase().await != SessionPhase::InProgress {
        return Ok(());
    }

    let task_store = store.clone();
    let result = runtime
        .run_transition(SessionEvent::Complete, || async move {
            task_store
                .transition_session(session_id, SessionStatus::InProgress, SessionStatus::Completed, now)
                .await?;
            Ok(())
        })
        .await;

    match result {
        Ok(_) => {
            broadcast_session_status(runtime, SessionStatus::Completed);
            info!(session_id = %session_id, "session completed");
            Ok(())
        }
        // another finisher completed the session first
        Err(ServiceError::InvalidState(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn participant(score: u32) -> ParticipantEntity {
        let mut row = ParticipantEntity::ai(Uuid::new_v4(), "Bot");
        row.score = score;
        row
    }

    #[test]
    fn ai_score_is_capped_and_monotonic() {
        assert_eq!(next_ai_score(0, 20, 500), 20);
        assert_eq!(next_ai_score(490, 30, 500), 500);
        assert_eq!(next_ai_score(500, 10, 500), 500);
        assert_eq!(next_ai_score(600, 10, 500), 600);
    }

    #[test]
    fn ai_rolls_follow_the_chance() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = crate::config::GameSettings::default().ai_points;
        assert_eq!(points, [80, 100]);
        for _ in 0..50 {
            assert_eq!(roll_ai_gain(&mut rng, 0.0, &points), None);
            let gained = roll_ai_gain(&mut rng, 1.0, &points);
            assert!(gained.is_some_and(|value| points.contains(&value)));
        }
        assert_eq!(roll_ai_gain(&mut rng, 1.0, &[]), None);
    }

    #[test]
    fn ranking_is_stable_among_ties() {
        let rows = vec![participant(100), participant(300), participant(100)];
        let first_tie = rows[0].id;
        let sorted = ranked(rows);
        assert_eq!(sorted[0].score, 300);
        assert_eq!(sorted[1].id, first_tie);
    }
}
