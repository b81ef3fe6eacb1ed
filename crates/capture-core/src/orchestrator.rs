//! Start and stop orchestrators (§4.4, §4.5): the only code paths that
//! mutate [`CaptureSession`] structurally. Both are serialized by the
//! [`CaptureState`] CAS — at most one `/start` and one `/stop` can be
//! mid-flight at a time, by construction, not by an explicit lock.

use crate::clock::monotonic_raw_ns;
use crate::device::{LinearDevice, LinearRequest};
use crate::error::{DeviceError, StartError};
use crate::producer::{run_linear_producer, run_raw_producer};
use crate::query::parse_start_query;
use crate::session::{CaptureSession, SessionData};
use crate::source::Source;
use crate::stats;
use crate::state::CaptureState;
use capture_ring::ByteRing;
use serde_json::Value;
use std::fs::File;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const RAW_RING_BYTES: usize = 1 << 30; // 1 GiB per raw source
const LINEAR_RING_FRAMES: usize = 2 * 1024 * 1024; // 2 Mi frames
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Opens the character device backing raw source `index`. Injected so
/// orchestrator tests can run without `/dev/cxadcN` nodes present.
pub trait RawDeviceOpener: Send + Sync {
    fn open(&self, index: u32) -> Result<File, DeviceError>;
}

/// Production opener: `/dev/cxadc{index}`, nonblocking.
pub struct DefaultRawDeviceOpener;

impl RawDeviceOpener for DefaultRawDeviceOpener {
    fn open(&self, index: u32) -> Result<File, DeviceError> {
        use std::os::unix::fs::OpenOptionsExt;
        std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(format!("/dev/cxadc{index}"))
            .map_err(|source| DeviceError::RawDeviceOpen { index, source })
    }
}

/// Constructs a fresh linear device handle. Injected the same way as
/// [`RawDeviceOpener`], so tests can supply [`crate::device::FakeLinearDevice`].
pub trait LinearDeviceFactory: Send + Sync {
    fn create(&self) -> Box<dyn LinearDevice>;
}

struct RollbackGuard {
    session: Arc<CaptureSession>,
    spawned: Vec<JoinHandle<()>>,
}

impl RollbackGuard {
    fn run(self) {
        // Producers spawned during `Starting` check for `Failed` before
        // touching the session or device; forcing the state unblocks all
        // of them at once without a per-thread cancellation signal.
        self.session.state().force(CaptureState::Failed);
        for handle in self.spawned {
            let _ = handle.join();
        }
        self.session.state().force(CaptureState::Idle);
    }
}

/// Runs the start sequence described in §4.4. Returns the JSON body for the
/// `/start` response, plus the spawned producer handles on success — the
/// caller (typically [`crate::session::CaptureController`]) must hold onto
/// these and hand them to [`stop`] later.
pub fn start(
    session: &Arc<CaptureSession>,
    query: &str,
    raw_opener: &dyn RawDeviceOpener,
    linear_factory: &dyn LinearDeviceFactory,
) -> (Value, Vec<JoinHandle<()>>) {
    // Step 1: CAS Idle -> Starting.
    if let Err(observed) = session
        .state()
        .try_transition(CaptureState::Idle, CaptureState::Starting)
    {
        return (stats::state_only(observed), Vec::new());
    }

    match try_start(session, query, raw_opener, linear_factory) {
        Ok((body, handles)) => (body, handles),
        Err(err) => {
            log::warn!("start failed: {err}");
            (stats::start_failure(&err), Vec::new())
        }
    }
}

fn try_start(
    session: &Arc<CaptureSession>,
    query: &str,
    raw_opener: &dyn RawDeviceOpener,
    linear_factory: &dyn LinearDeviceFactory,
) -> Result<(Value, Vec<JoinHandle<()>>), StartError> {
    let mut rollback = RollbackGuard {
        session: Arc::clone(session),
        spawned: Vec::new(),
    };

    // Run the fallible assembly; on any error, roll back what we built so
    // far and propagate. `rollback.run()` is only called on the error path
    // here — on success we take the spawned handles out instead and leave
    // the session `Running`.
    match assemble(session, query, raw_opener, linear_factory, &mut rollback) {
        Ok(body) => {
            let handles = std::mem::take(&mut rollback.spawned);
            Ok((body, handles))
        }
        Err(err) => {
            rollback.run();
            Err(err)
        }
    }
}

fn assemble(
    session: &Arc<CaptureSession>,
    query: &str,
    raw_opener: &dyn RawDeviceOpener,
    linear_factory: &dyn LinearDeviceFactory,
    rollback: &mut RollbackGuard,
) -> Result<Value, StartError> {
    // Step 2: parse arguments.
    let params = parse_start_query(query)?;

    // Step 3: reset overflow counter.
    session.overflow_counter().store(0, std::sync::atomic::Ordering::Relaxed);

    // Step 4: allocate one 1 GiB ring per raw source.
    let mut raw_sources = Vec::with_capacity(params.raw_sources.len());
    for &index in &params.raw_sources {
        let ring = ByteRing::new(RAW_RING_BYTES)?;
        raw_sources.push(Arc::new(Source::new(ring, format!("cxadc{index}"))));
    }

    // Step 5: open and negotiate the linear device.
    let mut linear_device = linear_factory.create();
    let request = LinearRequest {
        name: params.lname.clone(),
        format: params.lformat.clone(),
        rate: params.lrate,
        channels: params.lchannels,
    };
    let negotiated = linear_device.open(&request)?;

    // Step 6: size the linear ring from the negotiated frame size.
    let linear_ring_bytes = LINEAR_RING_FRAMES * negotiated.frame_bytes;
    let linear_ring = ByteRing::new(linear_ring_bytes)?;
    let linear_source = Arc::new(Source::new(linear_ring, "linear"));

    // Step 7: start the linear clock, timestamping around it.
    let ts_before_linear = monotonic_raw_ns();
    linear_device.start()?;
    let ts_after_linear = monotonic_raw_ns();
    let linear_ns = ts_after_linear.saturating_sub(ts_before_linear);

    // Step 8: open raw devices in order.
    let mut raw_files = Vec::with_capacity(params.raw_sources.len());
    for &index in &params.raw_sources {
        raw_files.push(raw_opener.open(index)?);
    }
    let ts_after_raw_open = monotonic_raw_ns();
    let cxadc_ns = ts_after_raw_open.saturating_sub(ts_after_linear);

    // Step 9: spawn one producer thread per raw source, then the linear one.
    for ((index, source), file) in params
        .raw_sources
        .iter()
        .copied()
        .zip(raw_sources.iter().cloned())
        .zip(raw_files.into_iter())
    {
        let session = Arc::clone(session);
        let handle = thread::Builder::new()
            .name(format!("cxadc-writer-{index}"))
            .spawn(move || run_raw_producer(session, source, file, index))?;
        rollback.spawned.push(handle);
    }

    let frame_bytes = negotiated.frame_bytes;
    {
        let session = Arc::clone(session);
        let source = Arc::clone(&linear_source);
        let handle = thread::Builder::new()
            .name("linear-writer".to_string())
            .spawn(move || run_linear_producer(session, source, linear_device, frame_bytes))?;
        rollback.spawned.push(handle);
    }

    // Step 10: publish the session, then flip to Running.
    let rate = negotiated.rate;
    let channels = negotiated.channels;
    let format = negotiated.format.clone();
    session.publish(SessionData {
        raw_sources,
        linear: linear_source,
        linear_negotiated: negotiated,
    });
    session
        .state()
        .try_transition(CaptureState::Starting, CaptureState::Running)
        .expect("only this orchestrator transitions out of Starting");

    Ok(stats::start_success(linear_ns, cxadc_ns, rate, channels, &format))
}

/// Runs the stop sequence described in §4.5 and returns the JSON body for
/// the `/stop` response. Producer join handles are threaded through from
/// `start` by the caller (`capture-server`), since the orchestrator itself
/// does not retain them past the start call.
pub fn stop(session: &Arc<CaptureSession>, producer_handles: Vec<JoinHandle<()>>) -> Value {
    // Step 1: CAS Running -> Stopping.
    if let Err(observed) = session
        .state()
        .try_transition(CaptureState::Running, CaptureState::Stopping)
    {
        return stats::state_only(observed);
    }

    // Step 2: join every producer (raw sources, then linear — join order
    // doesn't affect correctness since both already observe `Stopping`).
    for handle in producer_handles {
        let _ = handle.join();
    }

    // Step 3: busy-wait until every consumer cell has cleared.
    let sources = session.all_sources();
    for source in &sources {
        while source.is_attached() {
            thread::sleep(STOP_POLL_INTERVAL);
        }
    }

    // Step 4: free rings (dropping the `Source`s drops their `ByteRing`s,
    // which munmaps on drop) and clear the session.
    let overflows = session.overflow_count();
    session.clear();
    drop(sources);

    // Step 5: Idle.
    session.state().force(CaptureState::Idle);
    stats::stop_success(overflows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{FakeLinearDevice, LinearNegotiated};
    use std::io::Write;

    struct FakeRawOpener;

    impl RawDeviceOpener for FakeRawOpener {
        fn open(&self, _index: u32) -> Result<File, DeviceError> {
            // A throwaway temp file stands in for a character device: reads
            // past EOF return 0, which the producer treats as transient.
            let mut f = tempfile_like()?;
            f.write_all(&[0xAA; 4096]).ok();
            use std::io::Seek;
            f.seek(std::io::SeekFrom::Start(0)).ok();
            Ok(f)
        }
    }

    fn tempfile_like() -> std::io::Result<File> {
        let path = std::env::temp_dir().join(format!(
            "capture-core-test-{}-{:?}",
            std::process::id(),
            thread::current().id()
        ));
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    struct FakeLinearFactory;

    impl LinearDeviceFactory for FakeLinearFactory {
        fn create(&self) -> Box<dyn LinearDevice> {
            Box::new(FakeLinearDevice::new(LinearNegotiated {
                rate: 46_875,
                channels: 3,
                format: "S24_3LE".to_string(),
                frame_bytes: 9,
            }))
        }
    }

    struct FailingLinearFactory;

    struct FailingLinearDevice;

    impl LinearDevice for FailingLinearDevice {
        fn open(&mut self, _request: &LinearRequest) -> Result<LinearNegotiated, DeviceError> {
            Err(DeviceError::LinearDeviceOpen {
                name: "fake".to_string(),
                message: "simulated failure".to_string(),
            })
        }
        fn start(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn read_frames(&mut self, _buf: &mut [u8], _frame_bytes: usize) -> std::io::Result<usize> {
            Ok(0)
        }
        fn close(&mut self) {}
    }

    impl LinearDeviceFactory for FailingLinearFactory {
        fn create(&self) -> Box<dyn LinearDevice> {
            Box::new(FailingLinearDevice)
        }
    }

    #[test]
    fn second_start_while_running_reports_state_without_mutating() {
        let session = Arc::new(CaptureSession::new());
        session
            .state()
            .try_transition(CaptureState::Idle, CaptureState::Running)
            .unwrap();

        let (body, handles) = start(&session, "cxadc0", &FakeRawOpener, &FakeLinearFactory);
        assert_eq!(body["state"], "Running");
        assert_eq!(session.raw_source_count(), 0);
        assert!(handles.is_empty());
    }

    #[test]
    fn failed_linear_negotiation_rolls_back_to_idle() {
        let session = Arc::new(CaptureSession::new());
        let (body, handles) = start(&session, "cxadc0", &FakeRawOpener, &FailingLinearFactory);
        assert_eq!(body["state"], "Failed");
        assert!(handles.is_empty());
        assert_eq!(session.state().load(), CaptureState::Idle);
        assert_eq!(session.raw_source_count(), 0);
    }

    #[test]
    fn stop_while_idle_reports_current_state() {
        let session = Arc::new(CaptureSession::new());
        let body = stop(&session, Vec::new());
        assert_eq!(body["state"], "Idle");
    }
}
