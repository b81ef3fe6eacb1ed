//! Attachment pump (§4.6): binds one HTTP response socket to one source's
//! Ring for the lifetime of the response, draining it to the socket. The
//! shape mirrors `capture_core::producer`'s loop exactly, just with the
//! roles of device and ring reversed — read from the ring, write to the
//! socket.

use capture_core::state::CaptureState;
use capture_core::{CaptureSession, Source};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SPIN_SLEEP: Duration = Duration::from_micros(1);

/// Drains `source`'s ring into `out` until the capture stops or the client
/// disconnects. Returns without writing anything if another pump already
/// holds the source's consumer cell — the caller should close the
/// connection with an empty body in that case.
pub fn run<W: Write>(session: &CaptureSession, source: &Arc<Source>, out: &mut W) {
    let Some(guard) = source.try_attach() else {
        log::debug!("attachment to {} rejected: already attached", source.label);
        return;
    };

    loop {
        match session.state().load() {
            CaptureState::Running | CaptureState::Stopping => break,
            _ => thread::sleep(SPIN_SLEEP),
        }
    }

    loop {
        let stopping = session.state().load() == CaptureState::Stopping;
        let region = guard.ring().read_region();
        if region.is_empty() {
            if stopping {
                break;
            }
            thread::sleep(SPIN_SLEEP);
            continue;
        }

        match out.write(region) {
            Ok(0) => {
                thread::sleep(SPIN_SLEEP);
                continue;
            }
            Ok(n) => guard.ring().commit_read(n),
            Err(e) => {
                log::debug!("{}: client gone, pump exiting: {e}", source.label);
                break;
            }
        }
    }

    drop(guard);
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_core::state::CaptureState;
    use capture_ring::ByteRing;

    #[test]
    fn pump_drains_whatever_was_written_before_stopping() {
        let session = CaptureSession::new();
        session
            .state()
            .try_transition(CaptureState::Idle, CaptureState::Starting)
            .unwrap();
        session
            .state()
            .try_transition(CaptureState::Starting, CaptureState::Running)
            .unwrap();

        let source = Arc::new(Source::new(ByteRing::new(4096).unwrap(), "cxadc0"));
        {
            let region = source.ring.write_region();
            region[..5].copy_from_slice(b"hello");
            source.ring.commit_write(5);
        }
        session
            .state()
            .try_transition(CaptureState::Running, CaptureState::Stopping)
            .unwrap();

        let mut out = Vec::new();
        run(&session, &source, &mut out);
        assert_eq!(out, b"hello");
        assert!(!source.is_attached());
    }

    #[test]
    fn second_attachment_is_rejected_while_first_holds_the_cell() {
        let session = CaptureSession::new();
        session
            .state()
            .try_transition(CaptureState::Idle, CaptureState::Starting)
            .unwrap();
        session
            .state()
            .try_transition(CaptureState::Starting, CaptureState::Running)
            .unwrap();

        let source = Arc::new(Source::new(ByteRing::new(4096).unwrap(), "cxadc0"));
        let _first_guard = source.try_attach().unwrap();

        let mut out = Vec::new();
        run(&session, &source, &mut out);
        assert!(out.is_empty());
    }
}
