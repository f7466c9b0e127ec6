//! Waiting-room countdown and start decision.

/// Outcome of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyTick {
    /// Seconds still on the clock.
    Counting(u32),
    /// The clock reached zero.
    Elapsed,
}

/// What the lobby does when the countdown reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyDecision {
    /// Two or more participants: start right away.
    Start,
    /// Last cycle with a lone player: add AI opponents, then start.
    InjectAi,
    /// Restart the countdown for another cycle.
    NextCycle,
    /// Every human left; stop driving the lobby.
    Abandon,
}

/// Countdown clock of one waiting cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    total: u32,
    remaining: u32,
}

impl Countdown {
    /// Full clock of `total` seconds.
    pub fn new(total: u32) -> Self {
        let total = total.max(1);
        Self {
            total,
            remaining: total,
        }
    }

    /// Seconds left in the current cycle.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Remove one second.
    pub fn tick(&mut self) -> LobbyTick {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            LobbyTick::Elapsed
        } else {
            LobbyTick::Counting(self.remaining)
        }
    }

    /// Put the full duration back on the clock.
    pub fn reset(&mut self) {
        self.remaining = self.total;
    }
}

/// Decide what to do once the countdown of `cycle` elapsed.
///
/// `total` counts every participant, AI included.
pub fn decide(cycle: u32, max_cycles: u32, humans: usize, total: usize) -> LobbyDecision {
    if humans == 0 {
        LobbyDecision::Abandon
    } else if total >= 2 {
        LobbyDecision::Start
    } else if cycle >= max_cycles {
        LobbyDecision::InjectAi
    } else {
        LobbyDecision::NextCycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_elapses_after_total_ticks() {
        let mut clock = Countdown::new(3);
        assert_eq!(clock.tick(), LobbyTick::Counting(2));
        assert_eq!(clock.tick(), LobbyTick::Counting(1));
        assert_eq!(clock.tick(), LobbyTick::Elapsed);
        assert_eq!(clock.tick(), LobbyTick::Elapsed);

        clock.reset();
        assert_eq!(clock.remaining(), 3);
    }

    #[test]
    fn two_participants_start_in_any_cycle() {
        assert_eq!(decide(1, 3, 2, 2), LobbyDecision::Start);
        assert_eq!(decide(1, 3, 1, 2), LobbyDecision::Start);
        assert_eq!(decide(3, 3, 4, 4), LobbyDecision::Start);
    }

    #[test]
    fn lone_player_waits_then_gets_ai() {
        assert_eq!(decide(1, 3, 1, 1), LobbyDecision::NextCycle);
        assert_eq!(decide(2, 3, 1, 1), LobbyDecision::NextCycle);
        assert_eq!(decide(3, 3, 1, 1), LobbyDecision::InjectAi);
    }

    #[test]
    fn empty_lobby_is_abandoned() {
        assert_eq!(decide(1, 3, 0, 0), LobbyDecision::Abandon);
        assert_eq!(decide(3, 3, 0, 2), LobbyDecision::Abandon);
    }
}
