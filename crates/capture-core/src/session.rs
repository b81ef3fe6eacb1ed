//! The process-wide capture session: an owned value guarded by the
//! [`CaptureState`] CAS rather than ambient global mutable state. Only the
//! start orchestrator ever writes `data`; the stop orchestrator clears it;
//! everything else (the attachment pump, the stats reporter) takes a brief
//! read lock to clone out an `Arc` and then operates lock-free against the
//! Ring it points at.

use crate::device::LinearNegotiated;
use crate::source::Source;
use crate::state::{AtomicCaptureState, CaptureState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub struct SessionData {
    pub raw_sources: Vec<Arc<Source>>,
    pub linear: Arc<Source>,
    pub linear_negotiated: LinearNegotiated,
}

pub struct CaptureSession {
    state: AtomicCaptureState,
    data: RwLock<Option<SessionData>>,
    overflow_counter: AtomicU64,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            state: AtomicCaptureState::new(CaptureState::Idle),
            data: RwLock::new(None),
            overflow_counter: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> &AtomicCaptureState {
        &self.state
    }

    pub fn overflow_counter(&self) -> &AtomicU64 {
        &self.overflow_counter
    }

    pub fn record_overflow(&self) {
        self.overflow_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_counter.load(Ordering::Relaxed)
    }

    /// Publishes the fully-assembled session data. Called once by the
    /// start orchestrator immediately before the `Starting -> Running` CAS,
    /// so every reader that observes `Running` also observes this data
    /// (release-ordered by the state transition that follows).
    pub fn publish(&self, data: SessionData) {
        *self.data.write().expect("session lock poisoned") = Some(data);
    }

    /// Clears the session data. Called by the stop orchestrator after all
    /// producers are joined and all consumers detached, immediately before
    /// the `Stopping -> Idle` transition.
    pub fn clear(&self) {
        *self.data.write().expect("session lock poisoned") = None;
        self.overflow_counter.store(0, Ordering::Relaxed);
    }

    pub fn raw_source(&self, index: u32) -> Option<Arc<Source>> {
        let guard = self.data.read().expect("session lock poisoned");
        guard
            .as_ref()
            .and_then(|d| d.raw_sources.get(index as usize))
            .cloned()
    }

    pub fn linear_source(&self) -> Option<Arc<Source>> {
        let guard = self.data.read().expect("session lock poisoned");
        guard.as_ref().map(|d| Arc::clone(&d.linear))
    }

    pub fn raw_source_count(&self) -> usize {
        let guard = self.data.read().expect("session lock poisoned");
        guard.as_ref().map_or(0, |d| d.raw_sources.len())
    }

    pub fn linear_negotiated(&self) -> Option<LinearNegotiated> {
        let guard = self.data.read().expect("session lock poisoned");
        guard.as_ref().map(|d| d.linear_negotiated.clone())
    }

    /// All sources (raw, then linear), for the stats reporter and for stop.
    pub fn all_sources(&self) -> Vec<Arc<Source>> {
        let guard = self.data.read().expect("session lock poisoned");
        match guard.as_ref() {
            None => Vec::new(),
            Some(d) => {
                let mut v: Vec<Arc<Source>> = d.raw_sources.clone();
                v.push(Arc::clone(&d.linear));
                v
            }
        }
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}
