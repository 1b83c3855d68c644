use thiserror::Error;

/// Monotonically increasing identifier of an authoritative refresh cycle.
pub type CycleId = u64;

/// Lifecycle of the authoritative refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No fetch in flight.
    Idle,
    /// A fetch for the given cycle is in flight.
    Refreshing(CycleId),
    /// The last cycle failed and the failure has not been surfaced yet.
    Failed(CycleId),
}

/// Result of asking for a new refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    /// A new cycle started; the caller must run the fetch.
    Started(CycleId),
    /// A cycle is already in flight; a follow-up has been queued.
    Deferred,
}

/// Error returned when a transition is requested from the wrong phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: cannot {action} while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the machine was in.
    pub from: SyncPhase,
    /// Attempted action.
    pub action: &'static str,
}

/// Errors returned when a fetch reports back for a cycle the machine no longer waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CycleError {
    /// No cycle is in flight.
    #[error("no refresh cycle in flight (got {got})")]
    NotRefreshing {
        /// Cycle that reported back.
        got: CycleId,
    },
    /// A newer cycle is in flight.
    #[error("stale refresh cycle {got}, expected {expected}")]
    Stale {
        /// Cycle currently in flight.
        expected: CycleId,
        /// Cycle that reported back.
        got: CycleId,
    },
}

/// Snapshot of the machine for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSnapshot {
    /// Current phase.
    pub phase: SyncPhase,
    /// Last cycle id handed out.
    pub cycle: CycleId,
    /// Whether a follow-up refresh is queued.
    pub pending_refresh: bool,
}

/// Single-flight refresh state machine.
///
/// At most one cycle is in flight; requests arriving meanwhile collapse into a single
/// pending flag that is consumed when the in-flight cycle settles.
#[derive(Debug, Clone)]
pub struct SyncMachine {
    phase: SyncPhase,
    cycle: CycleId,
    pending_refresh: bool,
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            cycle: 0,
            pending_refresh: false,
        }
    }
}

impl SyncMachine {
    /// Create a machine in the idle phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// True while a fetch is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(self.phase, SyncPhase::Refreshing(_))
    }

    /// Create a snapshot of the machine.
    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            phase: self.phase,
            cycle: self.cycle,
            pending_refresh: self.pending_refresh,
        }
    }

    /// Start a cycle when idle, otherwise queue a single follow-up.
    pub fn request_refresh(&mut self) -> RefreshRequest {
        match self.phase {
            SyncPhase::Idle => RefreshRequest::Started(self.begin()),
            SyncPhase::Refreshing(_) | SyncPhase::Failed(_) => {
                self.pending_refresh = true;
                RefreshRequest::Deferred
            }
        }
    }

    /// Mark `cycle` as successfully completed and return to idle.
    pub fn complete(&mut self, cycle: CycleId) -> Result<(), CycleError> {
        self.ensure_current(cycle)?;
        self.phase = SyncPhase::Idle;
        Ok(())
    }

    /// Mark `cycle` as failed; the failure must then be surfaced with [`Self::recover`].
    pub fn fail(&mut self, cycle: CycleId) -> Result<(), CycleError> {
        self.ensure_current(cycle)?;
        self.phase = SyncPhase::Failed(cycle);
        Ok(())
    }

    /// Return to idle once a failure has been surfaced.
    pub fn recover(&mut self) -> Result<(), InvalidTransition> {
        match self.phase {
            SyncPhase::Failed(_) => {
                self.phase = SyncPhase::Idle;
                Ok(())
            }
            from => Err(InvalidTransition {
                from,
                action: "recover",
            }),
        }
    }

    /// Start the queued follow-up cycle, if one was requested and the machine is idle.
    pub fn start_pending(&mut self) -> Option<CycleId> {
        if self.phase != SyncPhase::Idle || !self.pending_refresh {
            return None;
        }
        Some(self.begin())
    }

    fn begin(&mut self) -> CycleId {
        self.cycle += 1;
        self.phase = SyncPhase::Refreshing(self.cycle);
        self.pending_refresh = false;
        self.cycle
    }

    fn ensure_current(&self, cycle: CycleId) -> Result<(), CycleError> {
        match self.phase {
            SyncPhase::Refreshing(current) if current == cycle => Ok(()),
            SyncPhase::Refreshing(current) => Err(CycleError::Stale {
                expected: current,
                got: cycle,
            }),
            SyncPhase::Idle | SyncPhase::Failed(_) => Err(CycleError::NotRefreshing { got: cycle }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(request: RefreshRequest) -> CycleId {
        match request {
            RefreshRequest::Started(cycle) => cycle,
            other => panic!("expected a started cycle, got {other:?}"),
        }
    }

    #[test]
    fn initial_state_is_idle() {
        let machine = SyncMachine::new();
        assert_eq!(machine.phase(), SyncPhase::Idle);
        assert_eq!(machine.snapshot().cycle, 0);
    }

    #[test]
    fn successful_cycle_returns_to_idle() {
        let mut machine = SyncMachine::new();
        let cycle = started(machine.request_refresh());
        assert_eq!(machine.phase(), SyncPhase::Refreshing(cycle));

        machine.complete(cycle).unwrap();
        assert_eq!(machine.phase(), SyncPhase::Idle);
    }

    #[test]
    fn failed_cycle_recovers_to_idle() {
        let mut machine = SyncMachine::new();
        let cycle = started(machine.request_refresh());
        machine.fail(cycle).unwrap();
        assert_eq!(machine.phase(), SyncPhase::Failed(cycle));

        machine.recover().unwrap();
        assert_eq!(machine.phase(), SyncPhase::Idle);
    }

    #[test]
    fn recover_outside_failure_is_rejected() {
        let mut machine = SyncMachine::new();
        let err = machine.recover().unwrap_err();
        assert_eq!(err.from, SyncPhase::Idle);
    }

    #[test]
    fn requests_during_refresh_collapse_into_one_follow_up() {
        let mut machine = SyncMachine::new();
        let first = started(machine.request_refresh());

        for _ in 0..3 {
            assert_eq!(machine.request_refresh(), RefreshRequest::Deferred);
        }
        assert!(machine.snapshot().pending_refresh);
        assert_eq!(machine.start_pending(), None);

        machine.complete(first).unwrap();
        let second = machine.start_pending().unwrap();
        assert_eq!(second, first + 1);
        assert!(!machine.snapshot().pending_refresh);

        machine.complete(second).unwrap();
        assert_eq!(machine.start_pending(), None);
    }

    #[test]
    fn follow_up_runs_after_failure_too() {
        let mut machine = SyncMachine::new();
        let first = started(machine.request_refresh());
        machine.request_refresh();

        machine.fail(first).unwrap();
        machine.recover().unwrap();
        assert_eq!(machine.start_pending(), Some(first + 1));
    }

    #[test]
    fn stale_cycle_is_rejected() {
        let mut machine = SyncMachine::new();
        let first = started(machine.request_refresh());
        machine.fail(first).unwrap();
        machine.recover().unwrap();

        assert_eq!(
            machine.complete(first),
            Err(CycleError::NotRefreshing { got: first })
        );

        let second = started(machine.request_refresh());
        assert_eq!(
            machine.complete(first),
            Err(CycleError::Stale {
                expected: second,
                got: first
            })
        );
        assert_eq!(machine.phase(), SyncPhase::Refreshing(second));
    }
}
