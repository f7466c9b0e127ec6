use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::SessionStatus;

/// Lifecycle phases of one game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Lobby is counting down; `cycle` starts at 1.
    Waiting {
        /// Current countdown cycle.
        cycle: u32,
    },
    /// Enough participants joined; players are getting ready.
    Starting,
    /// At least one player is answering questions.
    InProgress,
    /// A player finished the last question.
    Completed,
}

impl SessionPhase {
    /// Persisted status matching this phase.
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionPhase::Waiting { .. } => SessionStatus::Waiting,
            SessionPhase::Starting => SessionStatus::Starting,
            SessionPhase::InProgress => SessionStatus::InProgress,
            SessionPhase::Completed => SessionStatus::Completed,
        }
    }

    /// Phase reconstructed from a persisted status.
    pub fn from_status(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Waiting => SessionPhase::Waiting { cycle: 1 },
            SessionStatus::Starting => SessionPhase::Starting,
            SessionStatus::InProgress => SessionPhase::InProgress,
            SessionStatus::Completed => SessionPhase::Completed,
        }
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The lobby countdown ran out without a start decision.
    CycleElapsed,
    /// Every human left the waiting room; the next player starts from cycle one.
    LobbyEmptied,
    /// The lobby decided to start the session.
    Start,
    /// The first player began answering.
    BeginRound,
    /// A player answered the last question.
    Complete,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SessionPhase,
        /// Current phase.
        actual: SessionPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: SessionPhase,
    /// Phase the state machine will transition to.
    pub to: SessionPhase,
    /// Event that triggered this transition.
    pub event: SessionEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SessionPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SessionPhase>,
}

/// Forward-only session lifecycle.
///
/// Transitions are planned first, the matching store write runs, and the plan
/// is then applied or aborted so the in-memory phase never runs ahead of the
/// persisted status.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    max_cycles: u32,
    version: usize,
    pending: Option<Plan>,
}

impl SessionStateMachine {
    /// Create a machine in the first waiting cycle.
    pub fn new(max_cycles: u32) -> Self {
        Self::resume(SessionPhase::Waiting { cycle: 1 }, max_cycles)
    }

    /// Create a machine positioned at an already persisted phase.
    pub fn resume(phase: SessionPhase, max_cycles: u32) -> Self {
        Self {
            phase,
            max_cycles: max_cycles.max(1),
            version: 0,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, returning the new phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Waiting { cycle }, SessionEvent::CycleElapsed)
                if cycle < self.max_cycles =>
            {
                SessionPhase::Waiting { cycle: cycle + 1 }
            }
            (SessionPhase::Waiting { .. }, SessionEvent::LobbyEmptied) => {
                SessionPhase::Waiting { cycle: 1 }
            }
            (SessionPhase::Waiting { .. }, SessionEvent::Start) => SessionPhase::Starting,
            (SessionPhase::Starting, SessionEvent::BeginRound) => SessionPhase::InProgress,
            (SessionPhase::InProgress, SessionEvent::Complete) => SessionPhase::Completed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent) -> SessionPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_first_waiting_cycle() {
        let sm = SessionStateMachine::new(3);
        assert_eq!(sm.phase(), SessionPhase::Waiting { cycle: 1 });
    }

    #[test]
    fn full_happy_path_through_session() {
        let mut sm = SessionStateMachine::new(3);

        assert_eq!(
            apply(&mut sm, SessionEvent::CycleElapsed),
            SessionPhase::Waiting { cycle: 2 }
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::CycleElapsed),
            SessionPhase::Waiting { cycle: 3 }
        );
        assert_eq!(apply(&mut sm, SessionEvent::Start), SessionPhase::Starting);
        assert_eq!(
            apply(&mut sm, SessionEvent::BeginRound),
            SessionPhase::InProgress
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::Complete),
            SessionPhase::Completed
        );
        assert_eq!(sm.snapshot().version, 5);
    }

    #[test]
    fn cycles_stop_at_the_configured_maximum() {
        let mut sm = SessionStateMachine::new(2);
        apply(&mut sm, SessionEvent::CycleElapsed);
        let err = sm.plan(SessionEvent::CycleElapsed).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition(_)));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        let mut sm = SessionStateMachine::resume(SessionPhase::Completed, 3);
        for event in [
            SessionEvent::CycleElapsed,
            SessionEvent::LobbyEmptied,
            SessionEvent::Start,
            SessionEvent::BeginRound,
            SessionEvent::Complete,
        ] {
            match sm.plan(event).unwrap_err() {
                PlanError::InvalidTransition(invalid) => {
                    assert_eq!(invalid.from, SessionPhase::Completed);
                    assert_eq!(invalid.event, event);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let mut sm = SessionStateMachine::resume(SessionPhase::InProgress, 3);
        assert!(sm.plan(SessionEvent::Start).is_err());
    }

    #[test]
    fn emptied_lobby_restarts_at_the_first_cycle() {
        let mut sm = SessionStateMachine::new(3);
        apply(&mut sm, SessionEvent::CycleElapsed);
        apply(&mut sm, SessionEvent::CycleElapsed);
        assert_eq!(sm.phase(), SessionPhase::Waiting { cycle: 3 });

        assert_eq!(
            apply(&mut sm, SessionEvent::LobbyEmptied),
            SessionPhase::Waiting { cycle: 1 }
        );
        apply(&mut sm, SessionEvent::CycleElapsed);
        assert_eq!(sm.phase(), SessionPhase::Waiting { cycle: 2 });

        let mut sm = SessionStateMachine::resume(SessionPhase::Starting, 3);
        assert!(sm.plan(SessionEvent::LobbyEmptied).is_err());
    }

    #[test]
    fn second_plan_waits_for_the_first() {
        let mut sm = SessionStateMachine::new(3);
        let plan = sm.plan(SessionEvent::Start).unwrap();
        assert_eq!(
            sm.plan(SessionEvent::CycleElapsed).unwrap_err(),
            PlanError::AlreadyPending
        );
        assert_eq!(sm.snapshot().pending, Some(SessionPhase::Starting));
        sm.apply(plan.id).unwrap();
        assert!(sm.snapshot().pending.is_none());
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = SessionStateMachine::new(3);
        let plan = sm.plan(SessionEvent::Start).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), SessionPhase::Waiting { cycle: 1 });
    }

    #[test]
    fn status_round_trips_through_phase() {
        for status in [
            SessionStatus::Waiting,
            SessionStatus::Starting,
            SessionStatus::InProgress,
            SessionStatus::Completed,
        ] {
            assert_eq!(SessionPhase::from_status(status).status(), status);
        }
    }
}
