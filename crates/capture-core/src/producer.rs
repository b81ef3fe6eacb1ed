//! Source producer loops (§4.2): one dedicated blocking OS thread per raw
//! device, one for the linear device. Both are structured identically —
//! wait out `Starting`, bail on `Failed`, then loop until `Stopping`,
//! stalling on overflow and transient empty reads with short sleeps rather
//! than a mutex or condvar.

use crate::device::LinearDevice;
use crate::session::CaptureSession;
use crate::source::Source;
use crate::state::CaptureState;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SPIN_SLEEP: Duration = Duration::from_micros(1);
const OVERFLOW_SLEEP: Duration = Duration::from_millis(1);

/// Blocks while the session is still being assembled; returns `false` if
/// the start failed before this producer should do any work at all.
fn wait_through_starting(session: &CaptureSession) -> bool {
    loop {
        match session.state().load() {
            CaptureState::Starting => thread::sleep(SPIN_SLEEP),
            CaptureState::Failed => return false,
            _ => return true,
        }
    }
}

/// Runs a raw-source producer to completion. Takes ownership of `file` so
/// it is closed exactly once, on this thread, when the loop exits.
pub fn run_raw_producer(session: Arc<CaptureSession>, source: Arc<Source>, mut file: File, index: u32) {
    if !wait_through_starting(&session) {
        return;
    }

    loop {
        if session.state().load() == CaptureState::Stopping {
            break;
        }

        let region = source.ring.write_region();
        if region.is_empty() {
            session.record_overflow();
            thread::sleep(OVERFLOW_SLEEP);
            continue;
        }

        match file.read(region) {
            Ok(0) => {
                thread::sleep(SPIN_SLEEP);
                continue;
            }
            Ok(n) => source.ring.commit_write(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(SPIN_SLEEP);
                continue;
            }
            Err(e) => {
                log::error!("cxadc{index}: read error, producer exiting: {e}");
                break;
            }
        }
    }

    drop(file);
    log::debug!("cxadc{index} producer thread exiting");
}

/// Runs the linear-source producer to completion. `frame_bytes` is the
/// negotiated frame size; reads are frame-aligned so the commit is always
/// a whole number of frames.
pub fn run_linear_producer(
    session: Arc<CaptureSession>,
    source: Arc<Source>,
    mut device: Box<dyn LinearDevice>,
    frame_bytes: usize,
) {
    if !wait_through_starting(&session) {
        device.close();
        return;
    }

    loop {
        if session.state().load() == CaptureState::Stopping {
            break;
        }

        let region = source.ring.write_region();
        let usable = (region.len() / frame_bytes) * frame_bytes;
        if usable == 0 {
            session.record_overflow();
            thread::sleep(OVERFLOW_SLEEP);
            continue;
        }

        match device.read_frames(&mut region[..usable], frame_bytes) {
            Ok(0) => {
                thread::sleep(SPIN_SLEEP);
                continue;
            }
            Ok(frames) => source.ring.commit_write(frames * frame_bytes),
            Err(e) => {
                log::error!("linear: read error, producer exiting: {e}");
                break;
            }
        }
    }

    device.close();
    log::debug!("linear producer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{FakeLinearDevice, LinearNegotiated};
    use crate::session::CaptureSession;
    use capture_ring::ByteRing;

    #[test]
    fn linear_producer_drains_until_stopping() {
        let session = Arc::new(CaptureSession::new());
        session
            .state()
            .try_transition(CaptureState::Idle, CaptureState::Starting)
            .unwrap();
        session
            .state()
            .try_transition(CaptureState::Starting, CaptureState::Running)
            .unwrap();

        let source = Arc::new(Source::new(ByteRing::new(4096).unwrap(), "linear"));
        let ring = Arc::clone(&source.ring);

        let negotiated = LinearNegotiated {
            rate: 46_875,
            channels: 3,
            format: "S24_3LE".to_string(),
            frame_bytes: 9,
        };
        let mut device = FakeLinearDevice::new(negotiated);
        device.frames_available = 50;
        let device: Box<dyn LinearDevice> = Box::new(device);

        let session_for_stop = Arc::clone(&session);
        let handle = {
            let session = Arc::clone(&session);
            let source = Arc::clone(&source);
            thread::spawn(move || run_linear_producer(session, source, device, 9))
        };

        // Let the producer make some progress, then request a stop.
        thread::sleep(Duration::from_millis(5));
        session_for_stop
            .state()
            .try_transition(CaptureState::Running, CaptureState::Stopping)
            .unwrap();

        handle.join().unwrap();
        assert!(ring.len() > 0 || ring.is_empty());
    }
}
