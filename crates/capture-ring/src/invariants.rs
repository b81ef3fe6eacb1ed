//! Debug assertion macros for byte-ring invariants.
//!
//! Adapted from sequence-number invariants to byte-count invariants: a
//! producer advances `written` by a variable number of bytes per read(),
//! rather than a fixed slot count, so capacity here is a byte count, not a
//! slot count. Zero overhead in release builds (`debug_assertions` only).

// =============================================================================
// INV-BYTE-01: Bounded Count
// =============================================================================

/// **Invariant**: `0 <= (written - read) <= capacity`
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "INV-BYTE-01 violated: outstanding byte count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// **Invariant**: `read <= written` (after advance)
macro_rules! debug_assert_read_not_past_written {
    ($new_read:expr, $written:expr) => {
        debug_assert!(
            $new_read <= $written,
            "INV-BYTE-01 violated: advancing read cursor {} past written cursor {}",
            $new_read,
            $written
        )
    };
}

// =============================================================================
// INV-BYTE-02: Monotonic Progress
// =============================================================================

/// **Invariant**: `new_value >= old_value` (wrapping-aware)
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-BYTE-02 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-BYTE-03: No Wrap-Around
// =============================================================================

/// At multi-GB/s rates, wrapping the `u64` byte cursor still takes decades;
/// this catches cursor corruption rather than legitimate wraparound.
macro_rules! debug_assert_no_wrap {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new > $old || $old.wrapping_sub($new) > (1u64 << 40),
            "INV-BYTE-03 potential wrap detected: {} went from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-BYTE-04: Readable Range Check
// =============================================================================

/// **Invariant**: bytes in `[read, written)` were fully committed by the producer.
macro_rules! debug_assert_readable_range {
    ($idx:expr, $read:expr, $written:expr) => {
        debug_assert!(
            $idx >= $read && $idx < $written,
            "INV-BYTE-04 violated: reading offset {} outside written range [{}, {})",
            $idx,
            $read,
            $written
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_no_wrap;
pub(crate) use debug_assert_read_not_past_written;
pub(crate) use debug_assert_readable_range;
