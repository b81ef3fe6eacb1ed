//! JSON response bodies for the control endpoints (§4.7, §6). Building
//! these here keeps the wire shape next to the session/state types they
//! summarize; `capture-http` only serializes what we hand it.

use crate::error::StartError;
use crate::session::CaptureSession;
use crate::state::CaptureState;
use capture_ring::RingStats;
use serde_json::{json, Value};

fn ring_stats_json(stats: RingStats) -> Value {
    json!({
        "read": stats.read,
        "written": stats.written,
        "difference": stats.outstanding,
        "difference_pct": stats.occupancy_pct(),
    })
}

/// `{"state": "<current>"}` — used whenever `/start` or `/stop` loses its
/// CAS race, and as the base case for `/stats` when not `Running`.
pub fn state_only(state: CaptureState) -> Value {
    json!({ "state": state.as_str() })
}

/// `/start` success body.
pub fn start_success(linear_ns: u64, cxadc_ns: u64, rate: u32, channels: u8, format: &str) -> Value {
    json!({
        "state": "Running",
        "linear_ns": linear_ns,
        "cxadc_ns": cxadc_ns,
        "linear_rate": rate,
        "linear_channels": channels,
        "linear_format": format,
    })
}

/// `/start` failure body, after rollback has returned the state to `Idle`.
pub fn start_failure(err: &StartError) -> Value {
    json!({
        "state": "Failed",
        "fail_reason": err.fail_reason(),
    })
}

/// `/stop` success body.
pub fn stop_success(overflows: u64) -> Value {
    json!({
        "state": "Idle",
        "overflows": overflows,
    })
}

/// `/stats` body: `{"state": "<non-Running>"}` when idle/transitional,
/// otherwise the full telemetry shape with per-source ring counters.
pub fn stats(session: &CaptureSession) -> Value {
    let state = session.state().load();
    if state != CaptureState::Running {
        return state_only(state);
    }

    let data_present = session.raw_source_count() > 0 || session.linear_negotiated().is_some();
    if !data_present && session.linear_source().is_none() {
        return state_only(state);
    }

    let cxadc: Vec<Value> = (0..session.raw_source_count())
        .filter_map(|i| session.raw_source(i as u32))
        .map(|source| ring_stats_json(source.ring.stats()))
        .collect();

    let linear = session
        .linear_source()
        .map(|source| ring_stats_json(source.ring.stats()))
        .unwrap_or(Value::Null);

    json!({
        "state": "Running",
        "overflows": session.overflow_count(),
        "linear": linear,
        "cxadc": cxadc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_only_shape() {
        let v = state_only(CaptureState::Idle);
        assert_eq!(v["state"], "Idle");
        assert_eq!(v.as_object().unwrap().len(), 1);
    }

    #[test]
    fn stats_reports_state_only_when_idle() {
        let session = CaptureSession::new();
        let v = stats(&session);
        assert_eq!(v["state"], "Idle");
    }
}
