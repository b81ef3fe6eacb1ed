//! Monotonic-raw clock readings, used to timestamp the start sequence so
//! callers can measure residual skew between the linear source's start
//! instant and each raw device's open instant.

/// Nanoseconds since an unspecified epoch, `CLOCK_MONOTONIC_RAW` (immune to
/// NTP slew, unlike `CLOCK_MONOTONIC`) — the same clock the linear device's
/// software timestamp mode is configured against, so the two are
/// comparable.
pub fn monotonic_raw_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid out-pointer for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut ts) };
    if rc != 0 {
        log::warn!(
            "clock_gettime(CLOCK_MONOTONIC_RAW) failed: {}",
            std::io::Error::last_os_error()
        );
        return 0;
    }
    (ts.tv_sec as u64).saturating_mul(1_000_000_000).saturating_add(ts.tv_nsec as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic_across_two_calls() {
        let a = monotonic_raw_ns();
        let b = monotonic_raw_ns();
        assert!(b >= a);
    }
}
