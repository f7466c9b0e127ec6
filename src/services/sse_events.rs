use uuid::Uuid;

use crate::{
    dao::models::{AnswerRecordEntity, SessionStatus},
    dto::{
        common::{ParticipantSummary, PublicQuestion},
        sse::{
            LobbyCountdownEvent, LobbyCycleEvent, ParticipantChangedEvent, RoundCompletedEvent,
            RoundQuestionEvent, RoundRevealedEvent, RoundTickEvent, SessionHandoffEvent,
            SessionStatusEvent,
        },
    },
    state::{SessionRuntime, round::PlayerRound, session::ParticipantChange},
};

const EVENT_LOBBY_COUNTDOWN: &str = "lobby.countdown";
const EVENT_LOBBY_CYCLE: &str = "lobby.cycle";
const EVENT_SESSION_STATUS: &str = "session.status";
const EVENT_SESSION_HANDOFF: &str = "session.handoff";
const EVENT_ROUND_QUESTION: &str = "round.question";
const EVENT_ROUND_TICK: &str = "round.tick";
const EVENT_ROUND_REVEALED: &str = "round.revealed";
const EVENT_ROUND_COMPLETED: &str = "round.completed";
/// Name of the event opening every session stream.
pub const EVENT_SESSION_SNAPSHOT: &str = "session.snapshot";

/// Fold a participant change into the session reducer, then broadcast it.
pub async fn broadcast_participant_change(
    runtime: &SessionRuntime,
    change: ParticipantChange,
    username: Option<&str>,
) {
    runtime.reduce(&change).await;
    let payload = ParticipantChangedEvent {
        participant: ParticipantSummary::from_entity(change.participant(), username),
    };
    runtime.hub().publish(change.event_name(), &payload);
}

/// Broadcast one second of the waiting-room countdown.
pub fn broadcast_lobby_countdown(runtime: &SessionRuntime, cycle: u32, remaining_secs: u32) {
    let payload = LobbyCountdownEvent {
        session_id: runtime.id(),
        cycle,
        remaining_secs,
    };
    runtime.hub().publish(EVENT_LOBBY_COUNTDOWN, &payload);
}

/// Broadcast the start of a new waiting cycle.
pub fn broadcast_lobby_cycle(runtime: &SessionRuntime, cycle: u32) {
    let payload = LobbyCycleEvent {
        session_id: runtime.id(),
        cycle,
    };
    runtime.hub().publish(EVENT_LOBBY_CYCLE, &payload);
}

/// Broadcast a persisted status change.
pub fn broadcast_session_status(runtime: &SessionRuntime, status: SessionStatus) {
    let payload = SessionStatusEvent {
        session_id: runtime.id(),
        status,
    };
    runtime.hub().publish(EVENT_SESSION_STATUS, &payload);
}

/// Tell waiting clients to move to the game.
pub fn broadcast_handoff(runtime: &SessionRuntime) {
    let payload = SessionHandoffEvent {
        session_id: runtime.id(),
    };
    runtime.hub().publish(EVENT_SESSION_HANDOFF, &payload);
}

/// Broadcast the question a player is now facing.
pub fn broadcast_round_question(runtime: &SessionRuntime, participant_id: Uuid, round: &PlayerRound) {
    let Some(question) = round.current() else {
        return;
    };
    let payload = RoundQuestionEvent {
        participant_id,
        index: round.index(),
        total: round.total(),
        time_left: round.time_left(),
        question: PublicQuestion::from(question),
    };
    runtime.hub().publish(EVENT_ROUND_QUESTION, &payload);
}

/// Broadcast one second of a player's question timer.
pub fn broadcast_round_tick(runtime: &SessionRuntime, participant_id: Uuid, round: &PlayerRound) {
    let payload = RoundTickEvent {
        participant_id,
        index: round.index(),
        time_left: round.time_left(),
    };
    runtime.hub().publish(EVENT_ROUND_TICK, &payload);
}

/// Broadcast a locked answer together with the correct option.
pub fn broadcast_round_revealed(
    runtime: &SessionRuntime,
    participant_id: Uuid,
    round: &PlayerRound,
    record: &AnswerRecordEntity,
) {
    let question = round.current();
    let payload = RoundRevealedEvent {
        participant_id,
        index: round.index(),
        answer: record.answer.clone(),
        correct: record.correct,
        correct_answer: question
            .map(|question| question.correct_answer.clone())
            .unwrap_or_default(),
        explanation: question.and_then(|question| question.explanation.clone()),
        points: record.points,
        score: round.score(),
    };
    runtime.hub().publish(EVENT_ROUND_REVEALED, &payload);
}

/// Broadcast a player's final score and rank.
pub fn broadcast_round_completed(
    runtime: &SessionRuntime,
    participant_id: Uuid,
    score: u32,
    rank: usize,
) {
    let payload = RoundCompletedEvent {
        participant_id,
        score,
        rank,
    };
    runtime.hub().publish(EVENT_ROUND_COMPLETED, &payload);
}
