//! Turn state machine.
//!
//! ```text
//! Idle -> Initiating -> DirectResult -------------> Finished
//!                    \-> StreamOpen -> Animating -> Finished
//!                                   \-------------> Finished   (one-shot body)
//! any non-terminal state -> Aborted | Errored
//! ```
//!
//! The terminal transition goes through a [`FinishLatch`], so only the first
//! path that tries to finish a turn wins.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnPhase {
    #[default]
    Idle,
    Initiating,
    DirectResult,
    StreamOpen,
    Animating,
    Finished,
    Aborted,
    Errored,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnPhase::Finished | TurnPhase::Aborted | TurnPhase::Errored
        )
    }

    pub fn can_advance_to(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Aborted | Errored) => true,
            (Idle, Initiating) => true,
            (Initiating, DirectResult | StreamOpen) => true,
            (StreamOpen, Animating) => true,
            (DirectResult | StreamOpen | Animating, Finished) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Initiating => "initiating",
            TurnPhase::DirectResult => "direct-result",
            TurnPhase::StreamOpen => "stream-open",
            TurnPhase::Animating => "animating",
            TurnPhase::Finished => "finished",
            TurnPhase::Aborted => "aborted",
            TurnPhase::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed,
}

impl TurnOutcome {
    pub fn terminal_phase(self) -> TurnPhase {
        match self {
            TurnOutcome::Completed => TurnPhase::Finished,
            TurnOutcome::Cancelled => TurnPhase::Aborted,
            TurnOutcome::Failed => TurnPhase::Errored,
        }
    }
}

/// One-shot flag shared by every path that may end a turn.
#[derive(Debug, Clone, Default)]
pub struct FinishLatch {
    finished: Arc<AtomicBool>,
}

impl FinishLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for exactly one caller across all clones.
    pub fn try_finish(&self) -> bool {
        self.finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
pub struct TurnLifecycle {
    phase: TurnPhase,
    latch: FinishLatch,
}

impl TurnLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn latch(&self) -> FinishLatch {
        self.latch.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.latch.is_finished()
    }

    /// Move to a non-terminal phase. Invalid moves are logged and ignored.
    pub fn advance(&mut self, next: TurnPhase) -> bool {
        if next.is_terminal() {
            warn!(from = %self.phase, to = %next, "Terminal phases are reached through finish()");
            return false;
        }
        if !self.phase.can_advance_to(next) || self.latch.is_finished() {
            warn!(from = %self.phase, to = %next, "Ignoring invalid turn transition");
            return false;
        }
        debug!(from = %self.phase, to = %next, "Turn phase change");
        self.phase = next;
        true
    }

    /// Enter the terminal phase for `outcome`. Only the first call wins; the
    /// caller must deliver its completion callback only when this returns true.
    pub fn finish(&mut self, outcome: TurnOutcome) -> bool {
        let next = outcome.terminal_phase();
        if !self.phase.can_advance_to(next) {
            return false;
        }
        if !self.latch.try_finish() {
            return false;
        }
        debug!(from = %self.phase, to = %next, "Turn finished");
        self.phase = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_path_reaches_finished() {
        let mut lifecycle = TurnLifecycle::new();
        assert!(lifecycle.advance(TurnPhase::Initiating));
        assert!(lifecycle.advance(TurnPhase::StreamOpen));
        assert!(lifecycle.advance(TurnPhase::Animating));
        assert!(lifecycle.finish(TurnOutcome::Completed));
        assert_eq!(lifecycle.phase(), TurnPhase::Finished);
    }

    #[test]
    fn finish_only_succeeds_once() {
        let mut lifecycle = TurnLifecycle::new();
        lifecycle.advance(TurnPhase::Initiating);
        lifecycle.advance(TurnPhase::DirectResult);
        assert!(lifecycle.finish(TurnOutcome::Completed));
        assert!(!lifecycle.finish(TurnOutcome::Cancelled));
        assert!(!lifecycle.finish(TurnOutcome::Failed));
        assert_eq!(lifecycle.phase(), TurnPhase::Finished);
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let mut lifecycle = TurnLifecycle::new();
        assert!(!lifecycle.advance(TurnPhase::Animating));
        assert!(!lifecycle.advance(TurnPhase::Finished));
        assert!(!lifecycle.finish(TurnOutcome::Completed), "idle cannot complete");
        assert_eq!(lifecycle.phase(), TurnPhase::Idle);
        assert!(lifecycle.finish(TurnOutcome::Cancelled), "idle can abort");
        assert!(!lifecycle.advance(TurnPhase::Initiating));
    }

    #[test]
    fn abort_and_error_reachable_from_any_live_phase() {
        for phase in [
            TurnPhase::Idle,
            TurnPhase::Initiating,
            TurnPhase::DirectResult,
            TurnPhase::StreamOpen,
            TurnPhase::Animating,
        ] {
            assert!(phase.can_advance_to(TurnPhase::Aborted));
            assert!(phase.can_advance_to(TurnPhase::Errored));
        }
        assert!(!TurnPhase::Finished.can_advance_to(TurnPhase::Aborted));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn latch_admits_a_single_winner_under_contention() {
        let latch = FinishLatch::new();
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let latch = latch.clone();
            tasks.push(tokio::spawn(async move { latch.try_finish() }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.expect("task panicked") {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(latch.is_finished());
    }
}
