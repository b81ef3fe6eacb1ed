use crate::alloc::RingMemory;
use crate::error::AllocError;
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_monotonic, debug_assert_no_wrap,
    debug_assert_read_not_past_written, debug_assert_readable_range,
};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Wrapper type that ensures 128-byte alignment to prevent prefetcher-induced
/// false sharing between the producer's and consumer's hot cursors.
#[repr(align(128))]
struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// A snapshot of ring occupancy, used by the stats endpoint and by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStats {
    pub read: u64,
    pub written: u64,
    pub capacity: usize,
    pub outstanding: u64,
}

impl RingStats {
    /// Outstanding bytes as a percentage of capacity, `0.0..=100.0`.
    pub fn occupancy_pct(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.outstanding as f64 / self.capacity as f64) * 100.0
    }
}

/// Lock-free single-producer/single-consumer byte ring buffer.
///
/// Unlike a slot-typed ring, producers and consumers exchange raw byte
/// counts: a producer hands a `read(2)` (or `snd_pcm_readi`) call a
/// contiguous scratch region of up to `capacity - outstanding` bytes, and
/// commits however many bytes the call actually returned. This makes the
/// ring capacity an arbitrary byte count rather than a power-of-two slot
/// count, since the daemon this is modeled on sizes its rings in bytes
/// (one gibibyte per raw source, a few tens of mebibytes for the linear
/// source) rather than to the nearest power of two.
///
/// Memory ordering mirrors the classic SPSC discipline: the write cursor is
/// published with `Release` and observed with `Acquire`; the read cursor
/// likewise. Each side keeps an `UnsafeCell` cache of the other's cursor to
/// avoid a cross-core atomic load on every call when there is already
/// enough slack.
pub struct ByteRing {
    // === PRODUCER HOT ===
    written: CacheAligned<AtomicU64>,
    cached_read: CacheAligned<UnsafeCell<u64>>,

    // === CONSUMER HOT ===
    read: CacheAligned<AtomicU64>,
    cached_written: CacheAligned<UnsafeCell<u64>>,

    // === COLD ===
    capacity: usize,
    memory: RingMemory,
}

// SAFETY: all cross-thread access to `memory` is mediated by the
// Acquire/Release protocol on `read`/`written`; the `UnsafeCell` caches are
// single-writer (producer writes `cached_read`, consumer writes
// `cached_written`).
unsafe impl Send for ByteRing {}
unsafe impl Sync for ByteRing {}

impl ByteRing {
    /// Allocates a new ring of `capacity` bytes, huge-page backed where the
    /// kernel allows it.
    pub fn new(capacity: usize) -> Result<Self, AllocError> {
        let memory = RingMemory::allocate(capacity)?;
        Ok(Self {
            written: CacheAligned::new(AtomicU64::new(0)),
            cached_read: CacheAligned::new(UnsafeCell::new(0)),
            read: CacheAligned::new(AtomicU64::new(0)),
            cached_written: CacheAligned::new(UnsafeCell::new(0)),
            capacity,
            memory,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Outstanding (unread) byte count.
    ///
    /// Samples `read` before `written` so a consumer that advances between
    /// the two loads can only make the snapshot look *more* caught-up, never
    /// underflow it; the result is still clamped to `capacity` for the rare
    /// case a stalled producer's `written` overtakes a snapshot `read` by
    /// more than a full buffer between the two loads.
    #[inline]
    pub fn len(&self) -> u64 {
        let read = self.read.load(Ordering::Relaxed);
        let written = self.written.load(Ordering::Relaxed);
        written.saturating_sub(read).min(self.capacity as u64)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() as usize >= self.capacity
    }

    pub fn stats(&self) -> RingStats {
        let read = self.read.load(Ordering::Relaxed);
        let written = self.written.load(Ordering::Relaxed);
        RingStats {
            read,
            written,
            capacity: self.capacity,
            outstanding: written.saturating_sub(read).min(self.capacity as u64),
        }
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Returns the next contiguous scratch region a producer may fill.
    ///
    /// The returned slice may be shorter than the full free space when the
    /// free region wraps past the end of the backing allocation — producers
    /// are expected to call this again after committing to pick up the rest.
    /// An empty slice means the ring is full; callers should back off and
    /// retry (recording an overflow) rather than treat it as an error.
    #[allow(clippy::mut_from_ref)]
    pub fn write_region(&self) -> &mut [u8] {
        let written = self.written.load(Ordering::Relaxed);

        // SAFETY: cached_read is only ever written by the producer.
        let mut cached_read = unsafe { *self.cached_read.get() };
        let mut free = self.capacity as u64 - written.wrapping_sub(cached_read);

        if free == 0 {
            let read = self.read.load(Ordering::Acquire);
            // SAFETY: cached_read is only ever written by the producer; the
            // Acquire load above synchronizes with the consumer's Release.
            unsafe {
                *self.cached_read.get() = read;
            }
            cached_read = read;
            free = self.capacity as u64 - written.wrapping_sub(cached_read);
        }

        debug_assert_bounded_count!(written.wrapping_sub(cached_read), self.capacity as u64);

        if free == 0 {
            return &mut [];
        }

        let idx = (written as usize) % self.capacity;
        let contiguous = free.min((self.capacity - idx) as u64) as usize;

        // SAFETY: [idx, idx+contiguous) lies strictly ahead of the
        // consumer's read cursor (free > 0 guarantees no overlap), and only
        // the producer writes to this region until it commits.
        unsafe { &mut self.memory.as_mut_slice()[idx..idx + contiguous] }
    }

    /// Publishes `n` bytes written into the region returned by
    /// [`Self::write_region`].
    pub fn commit_write(&self, n: usize) {
        if n == 0 {
            return;
        }
        let written = self.written.load(Ordering::Relaxed);
        let new_written = written.wrapping_add(n as u64);
        debug_assert_monotonic!("written", written, new_written);
        debug_assert_no_wrap!("written", written, new_written);
        self.written.store(new_written, Ordering::Release);
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Returns the next contiguous region of unread bytes.
    ///
    /// An empty slice means the ring is currently empty.
    pub fn read_region(&self) -> &[u8] {
        let read = self.read.load(Ordering::Relaxed);

        // SAFETY: cached_written is only ever written by the consumer.
        let mut cached_written = unsafe { *self.cached_written.get() };
        let mut avail = cached_written.wrapping_sub(read);

        if avail == 0 {
            let written = self.written.load(Ordering::Acquire);
            // SAFETY: cached_written is only ever written by the consumer;
            // the Acquire load synchronizes with the producer's Release.
            unsafe {
                *self.cached_written.get() = written;
            }
            cached_written = written;
            avail = cached_written.wrapping_sub(read);
            if avail == 0 {
                return &[];
            }
        }

        let idx = (read as usize) % self.capacity;
        let contiguous = avail.min((self.capacity - idx) as u64) as usize;
        debug_assert_readable_range!(read, read, cached_written);

        // SAFETY: [idx, idx+contiguous) lies within [read, written), which
        // was fully initialized by the producer before the Release store
        // observed above.
        unsafe { &self.memory.as_mut_slice()[idx..idx + contiguous] }
    }

    /// Marks `n` bytes returned by [`Self::read_region`] as consumed.
    pub fn commit_read(&self, n: usize) {
        if n == 0 {
            return;
        }
        let read = self.read.load(Ordering::Relaxed);
        let written = self.written.load(Ordering::Relaxed);
        let new_read = read.wrapping_add(n as u64);
        debug_assert_read_not_past_written!(new_read, written);
        debug_assert_monotonic!("read", read, new_read);
        self.read.store(new_read, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trip() {
        let ring = ByteRing::new(64).unwrap();

        let region = ring.write_region();
        assert_eq!(region.len(), 64);
        region[..5].copy_from_slice(b"hello");
        ring.commit_write(5);

        assert_eq!(ring.len(), 5);

        let region = ring.read_region();
        assert_eq!(&region[..5], b"hello");
        ring.commit_read(5);

        assert!(ring.is_empty());
    }

    #[test]
    fn write_region_wraps_at_end_of_buffer() {
        let ring = ByteRing::new(16).unwrap();

        // Fill to 12, drain it, then write 8 more: the write must wrap.
        ring.commit_write(ring.write_region().len().min(12));
        ring.commit_read(12);

        let region = ring.write_region();
        // Contiguous region from offset 12 to end is only 4 bytes.
        assert_eq!(region.len(), 4);
    }

    #[test]
    fn full_ring_yields_empty_write_region() {
        let ring = ByteRing::new(8).unwrap();
        ring.commit_write(8);
        assert!(ring.is_full());
        assert!(ring.write_region().is_empty());
    }

    #[test]
    fn empty_ring_yields_empty_read_region() {
        let ring = ByteRing::new(8).unwrap();
        assert!(ring.read_region().is_empty());
    }

    #[test]
    fn stats_report_outstanding_and_occupancy() {
        let ring = ByteRing::new(100).unwrap();
        ring.commit_write(25);
        let stats = ring.stats();
        assert_eq!(stats.outstanding, 25);
        assert!((stats.occupancy_pct() - 25.0).abs() < f64::EPSILON);
    }
}
