//! Capture-state machine, source producers, and start/stop orchestration.
//!
//! This crate owns everything above the raw ring primitive and below the
//! HTTP surface: the five-state capture lifecycle, the producer loops that
//! feed each source's ring from its device, and the two orchestrators that
//! acquire or release every device/ring/thread as one atomic-feeling unit
//! gated by [`state::CaptureState`].

pub mod clock;
pub mod controller;
pub mod device;
pub mod error;
pub mod orchestrator;
pub mod producer;
pub mod query;
pub mod session;
pub mod source;
pub mod state;
pub mod stats;

pub use controller::{CaptureController, DefaultLinearDeviceFactory};
pub use error::{ConfigError, DeviceError, StartError, StopError};
pub use orchestrator::{DefaultRawDeviceOpener, LinearDeviceFactory, RawDeviceOpener};
pub use session::CaptureSession;
pub use source::{AttachGuard, Source};
pub use state::{AtomicCaptureState, CaptureState};
