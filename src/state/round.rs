//! Per-player question loop: countdown, answer lock, reveal and advance.

use thiserror::Error;

use crate::dao::models::{AnswerRecordEntity, ChallengeEntity};

/// Points for any correct answer.
pub const BASE_POINTS: u32 = 100;
/// Bonus per second left on the clock.
pub const POINTS_PER_SECOND: u32 = 5;

/// Points awarded for an answer locked with `time_left` seconds remaining.
pub fn points_for(correct: bool, time_left: u32) -> u32 {
    if correct {
        BASE_POINTS + time_left * POINTS_PER_SECOND
    } else {
        0
    }
}

/// Where the player stands on the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Timer running, answer accepted.
    Answering,
    /// Answer locked, correct option visible.
    Revealed,
    /// Every question answered.
    Finished,
}

/// Rejected answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    /// The current question is already locked.
    #[error("question already answered")]
    AlreadyAnswered,
    /// No question is left.
    #[error("round is finished")]
    Finished,
}

/// Result of one timer tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Seconds still left.
    Running(u32),
    /// The clock ran out and the question was locked with no answer.
    TimedOut(AnswerRecordEntity),
}

/// Feedback returned to the player after an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// Whether the answer was correct.
    pub correct: bool,
    /// The correct option.
    pub correct_answer: String,
    /// Points earned on this question.
    pub points: u32,
    /// Running score after this question.
    pub score: u32,
}

/// Read-only view of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundView {
    /// Zero-based index of the current question.
    pub index: usize,
    /// Number of questions in the round.
    pub total: usize,
    /// Current phase.
    pub phase: RoundPhase,
    /// Seconds left on the current question.
    pub time_left: u32,
    /// Running score.
    pub score: u32,
    /// Current question, absent once finished.
    pub question: Option<ChallengeEntity>,
    /// Last locked answer.
    pub last: Option<AnswerRecordEntity>,
}

/// Question loop of one player.
#[derive(Debug, Clone)]
pub struct PlayerRound {
    questions: Vec<ChallengeEntity>,
    question_secs: u32,
    index: usize,
    time_left: u32,
    phase: RoundPhase,
    score: u32,
    last: Option<AnswerRecordEntity>,
}

impl PlayerRound {
    /// Start a fresh round.
    pub fn new(questions: Vec<ChallengeEntity>, question_secs: u32) -> Self {
        Self::resume(questions, question_secs, &[])
    }

    /// Continue after the answers already checkpointed.
    pub fn resume(
        questions: Vec<ChallengeEntity>,
        question_secs: u32,
        checkpoint: &[AnswerRecordEntity],
    ) -> Self {
        let index = checkpoint.len().min(questions.len());
        let score = checkpoint
            .iter()
            .fold(0u32, |acc, record| acc.saturating_add(record.points));
        let phase = if index >= questions.len() {
            RoundPhase::Finished
        } else {
            RoundPhase::Answering
        };

        Self {
            questions,
            question_secs,
            index,
            time_left: question_secs,
            phase,
            score,
            last: checkpoint.last().cloned(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Zero-based question index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of questions.
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Seconds left on the current question.
    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    /// Running score.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Question being played, if any.
    pub fn current(&self) -> Option<&ChallengeEntity> {
        match self.phase {
            RoundPhase::Finished => None,
            _ => self.questions.get(self.index),
        }
    }

    /// Remove one second from the clock. `None` unless answering.
    pub fn tick(&mut self) -> Option<Tick> {
        if self.phase != RoundPhase::Answering {
            return None;
        }

        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.lock(None).map(Tick::TimedOut)
        } else {
            Some(Tick::Running(self.time_left))
        }
    }

    /// Lock `answer` for the current question.
    pub fn answer(
        &mut self,
        answer: &str,
    ) -> Result<(AnswerRecordEntity, AnswerOutcome), RoundError> {
        match self.phase {
            RoundPhase::Answering => {}
            RoundPhase::Revealed => return Err(RoundError::AlreadyAnswered),
            RoundPhase::Finished => return Err(RoundError::Finished),
        }

        let record = self
            .lock(Some(answer.to_string()))
            .ok_or(RoundError::Finished)?;
        let outcome = AnswerOutcome {
            correct: record.correct,
            correct_answer: self
                .questions
                .get(self.index)
                .map(|question| question.correct_answer.clone())
                .unwrap_or_default(),
            points: record.points,
            score: self.score,
        };
        Ok((record, outcome))
    }

    /// Move past a revealed question. Returns `false` once the round is finished.
    pub fn advance(&mut self) -> bool {
        if self.phase != RoundPhase::Revealed {
            return self.phase == RoundPhase::Answering;
        }

        self.index += 1;
        if self.index >= self.questions.len() {
            self.phase = RoundPhase::Finished;
            false
        } else {
            self.phase = RoundPhase::Answering;
            self.time_left = self.question_secs;
            true
        }
    }

    /// Snapshot of the round.
    pub fn view(&self) -> RoundView {
        RoundView {
            index: self.index,
            total: self.questions.len(),
            phase: self.phase,
            time_left: self.time_left,
            score: self.score,
            question: self.current().cloned(),
            last: self.last.clone(),
        }
    }

    fn lock(&mut self, answer: Option<String>) -> Option<AnswerRecordEntity> {
        let question = self.questions.get(self.index)?;
        let correct = answer.as_deref() == Some(question.correct_answer.as_str());
        let points = points_for(correct, self.time_left);
        let record = AnswerRecordEntity {
            question_id: question.id.clone(),
            answer,
            correct,
            points,
            time_left: self.time_left,
        };

        self.score = self.score.saturating_add(points);
        self.phase = RoundPhase::Revealed;
        self.last = Some(record.clone());
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::dao::models::Difficulty;

    fn questions(count: usize) -> Vec<ChallengeEntity> {
        (1..=count)
            .map(|n| ChallengeEntity {
                id: n.to_string(),
                subject_id: Uuid::nil(),
                difficulty: Difficulty::Basic,
                question: format!("{n} + {n}?"),
                options: vec!["a".into(), "b".into(), "c".into(), (n * 2).to_string()],
                correct_answer: (n * 2).to_string(),
                explanation: None,
            })
            .collect()
    }

    #[test]
    fn scoring_rewards_speed() {
        assert_eq!(points_for(true, 10), 150);
        assert_eq!(points_for(true, 0), 100);
        assert_eq!(points_for(true, 15), 175);
        assert_eq!(points_for(false, 10), 0);
    }

    #[test]
    fn correct_answer_after_five_seconds() {
        let mut round = PlayerRound::new(questions(2), 15);
        for _ in 0..5 {
            round.tick();
        }
        assert_eq!(round.time_left(), 10);

        let (record, outcome) = round.answer("2").unwrap();
        assert!(record.correct);
        assert_eq!(outcome.points, 150);
        assert_eq!(outcome.score, 150);
        assert_eq!(outcome.correct_answer, "2");
        assert_eq!(round.phase(), RoundPhase::Revealed);
    }

    #[test]
    fn second_answer_is_rejected() {
        let mut round = PlayerRound::new(questions(1), 15);
        round.answer("a").unwrap();
        assert_eq!(round.answer("2").unwrap_err(), RoundError::AlreadyAnswered);
        assert_eq!(round.score(), 0);
    }

    #[test]
    fn timeout_locks_with_zero_points() {
        let mut round = PlayerRound::new(questions(1), 3);
        assert_eq!(round.tick(), Some(Tick::Running(2)));
        assert_eq!(round.tick(), Some(Tick::Running(1)));
        match round.tick() {
            Some(Tick::TimedOut(record)) => {
                assert_eq!(record.answer, None);
                assert!(!record.correct);
                assert_eq!(record.points, 0);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(round.tick(), None);
    }

    #[test]
    fn advance_walks_to_the_end() {
        let mut round = PlayerRound::new(questions(2), 15);
        round.answer("2").unwrap();
        assert!(round.advance());
        assert_eq!(round.index(), 1);
        assert_eq!(round.time_left(), 15);

        round.answer("4").unwrap();
        assert!(!round.advance());
        assert_eq!(round.phase(), RoundPhase::Finished);
        assert!(round.current().is_none());
        assert_eq!(round.answer("4").unwrap_err(), RoundError::Finished);
    }

    #[test]
    fn resume_skips_checkpointed_questions() {
        let checkpoint = vec![AnswerRecordEntity {
            question_id: "1".into(),
            answer: Some("2".into()),
            correct: true,
            points: 160,
            time_left: 12,
        }];
        let round = PlayerRound::resume(questions(3), 15, &checkpoint);
        assert_eq!(round.index(), 1);
        assert_eq!(round.score(), 160);
        assert_eq!(round.phase(), RoundPhase::Answering);
        assert_eq!(round.current().map(|q| q.id.as_str()), Some("2"));

        let done = PlayerRound::resume(questions(1), 15, &checkpoint);
        assert_eq!(done.phase(), RoundPhase::Finished);
    }
}
