//! A capture source: a Ring plus the bookkeeping needed to enforce
//! exactly-one-attachment and to name/label the source for logs and stats.

use capture_ring::ByteRing;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// A process-local, non-zero, per-thread token. `0` means unattached;
    /// this is the concrete realization of the design note's "atomic
    /// `Option<ThreadId>`" — `ThreadId` itself has no stable null value, so
    /// we mint our own.
    static THREAD_TOKEN: u64 = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
}

fn current_thread_token() -> u64 {
    THREAD_TOKEN.with(|t| *t)
}

/// One capture source: its Ring and the consumer-thread cell that
/// serializes attachment. The cell lives outside `CaptureState`: an
/// attachment attempt against an idle source is rejected by the cell
/// itself once the pump notices the state never reaches `Running`.
pub struct Source {
    pub ring: Arc<ByteRing>,
    pub label: String,
    consumer_cell: AtomicU64,
}

impl Source {
    pub fn new(ring: ByteRing, label: impl Into<String>) -> Self {
        Self {
            ring: Arc::new(ring),
            label: label.into(),
            consumer_cell: AtomicU64::new(0),
        }
    }

    /// Attempts to become the sole consumer of this source. Returns `None`
    /// if another thread already holds the cell.
    pub fn try_attach(self: &Arc<Self>) -> Option<AttachGuard> {
        let token = current_thread_token();
        self.consumer_cell
            .compare_exchange(0, token, Ordering::AcqRel, Ordering::Relaxed)
            .ok()
            .map(|_| AttachGuard {
                source: Arc::clone(self),
            })
    }

    /// `true` while some thread holds the consumer cell.
    pub fn is_attached(&self) -> bool {
        self.consumer_cell.load(Ordering::Acquire) != 0
    }
}

/// RAII handle for an attachment pump's hold on a source's consumer cell.
/// Clears the cell back to `0` on drop, including on early return or panic
/// unwind, so a crashed pump never wedges the source shut.
pub struct AttachGuard {
    source: Arc<Source>,
}

impl AttachGuard {
    pub fn ring(&self) -> &Arc<ByteRing> {
        &self.source.ring
    }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        self.source.consumer_cell.store(0, Ordering::Release);
    }
}
