use std::sync::atomic::{AtomicU8, Ordering};

/// Process-wide capture lifecycle. `Idle` is the only state in which a new
/// `/start` may succeed; every other state rejects a concurrent start or
/// stop by reporting itself, without mutating anything — the same
/// fail-closed CAS discipline the ring-decomposed channel uses for
/// producer registration, just over five states instead of a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Failed = 4,
}

impl CaptureState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CaptureState::Idle,
            1 => CaptureState::Starting,
            2 => CaptureState::Running,
            3 => CaptureState::Stopping,
            4 => CaptureState::Failed,
            _ => unreachable!("invalid CaptureState discriminant {v}"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Idle => "Idle",
            CaptureState::Starting => "Starting",
            CaptureState::Running => "Running",
            CaptureState::Stopping => "Stopping",
            CaptureState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder for [`CaptureState`] with CAS-gated transitions.
///
/// Reads are relaxed (mirroring the teacher's relaxed `producer_count` load
/// before a registration CAS); every write is a release so producers and
/// the attachment pump observe the fully published session by the time
/// they see `Running`.
pub struct AtomicCaptureState {
    inner: AtomicU8,
}

impl AtomicCaptureState {
    pub fn new(state: CaptureState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    /// Acquire-ordered: pairs with every release-store transition so a
    /// thread that observes `Running` also observes the session data the
    /// start orchestrator published just before the `Starting -> Running`
    /// transition. (§5 requires this pairing explicitly; the weaker
    /// "relaxed read" phrasing elsewhere describes the common case where a
    /// thread is polling its own already-synchronized state, not the first
    /// observation of a transition.)
    #[inline]
    pub fn load(&self) -> CaptureState {
        CaptureState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Attempts `from -> to`. Returns the observed state on failure (which
    /// may equal `from` under a lost race, or any other state).
    pub fn try_transition(&self, from: CaptureState, to: CaptureState) -> Result<(), CaptureState> {
        match self.inner.compare_exchange(
            from as u8,
            to as u8,
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            Ok(_) => Ok(()),
            Err(observed) => Err(CaptureState::from_u8(observed)),
        }
    }

    /// Unconditional transition, used by rollback and stop paths that
    /// already hold exclusive control (they got there via a prior
    /// successful CAS and are the only writer until the next publish).
    pub fn force(&self, to: CaptureState) {
        self.inner.store(to as u8, Ordering::Release);
    }
}

impl Default for AtomicCaptureState {
    fn default() -> Self {
        Self::new(CaptureState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_starting_succeeds_once() {
        let state = AtomicCaptureState::new(CaptureState::Idle);
        assert!(state.try_transition(CaptureState::Idle, CaptureState::Starting).is_ok());
        assert_eq!(state.load(), CaptureState::Starting);

        let err = state
            .try_transition(CaptureState::Idle, CaptureState::Starting)
            .unwrap_err();
        assert_eq!(err, CaptureState::Starting);
    }

    #[test]
    fn concurrent_start_reports_current_state_without_mutating() {
        let state = AtomicCaptureState::new(CaptureState::Running);
        let err = state
            .try_transition(CaptureState::Idle, CaptureState::Starting)
            .unwrap_err();
        assert_eq!(err, CaptureState::Running);
        assert_eq!(state.load(), CaptureState::Running);
    }

    #[test]
    fn force_is_unconditional() {
        let state = AtomicCaptureState::new(CaptureState::Starting);
        state.force(CaptureState::Failed);
        assert_eq!(state.load(), CaptureState::Failed);
    }
}
