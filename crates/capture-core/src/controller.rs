//! Ties a [`CaptureSession`] to the device factories the start orchestrator
//! needs and to the producer handles a successful start leaves behind, so
//! the HTTP layer can drive `/start` and `/stop` without reaching into
//! orchestrator internals itself.

use crate::device::LinearDevice;
use crate::orchestrator::{self, LinearDeviceFactory, RawDeviceOpener};
use crate::session::CaptureSession;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub struct CaptureController {
    session: Arc<CaptureSession>,
    raw_opener: Box<dyn RawDeviceOpener>,
    linear_factory: Box<dyn LinearDeviceFactory>,
    producer_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CaptureController {
    pub fn new(
        raw_opener: Box<dyn RawDeviceOpener>,
        linear_factory: Box<dyn LinearDeviceFactory>,
    ) -> Self {
        Self {
            session: Arc::new(CaptureSession::new()),
            raw_opener,
            linear_factory,
            producer_handles: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }

    pub fn start(&self, query: &str) -> Value {
        let (body, handles) = orchestrator::start(
            &self.session,
            query,
            self.raw_opener.as_ref(),
            self.linear_factory.as_ref(),
        );
        if !handles.is_empty() {
            *self.producer_handles.lock().expect("producer handle lock poisoned") = handles;
        }
        body
    }

    pub fn stop(&self) -> Value {
        let handles = std::mem::take(
            &mut *self.producer_handles.lock().expect("producer handle lock poisoned"),
        );
        orchestrator::stop(&self.session, handles)
    }

    pub fn stats(&self) -> Value {
        crate::stats::stats(&self.session)
    }
}

/// Default production factory: real ALSA PCM device.
pub struct DefaultLinearDeviceFactory;

impl LinearDeviceFactory for DefaultLinearDeviceFactory {
    #[cfg(target_os = "linux")]
    fn create(&self) -> Box<dyn LinearDevice> {
        Box::new(crate::device::AlsaLinearDevice::new())
    }

    #[cfg(not(target_os = "linux"))]
    fn create(&self) -> Box<dyn LinearDevice> {
        panic!("no linear device backend available on this platform")
    }
}
