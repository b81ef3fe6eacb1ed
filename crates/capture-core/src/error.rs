use thiserror::Error;

/// Invalid start-request arguments or malformed CLI input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("raw source index {0} is out of range (must be < 256)")]
    RawSourceOutOfRange(u32),

    #[error("too many raw sources requested (max 256)")]
    TooManyRawSources,

    #[error("malformed query token: {0:?}")]
    MalformedToken(String),

    #[error("malformed percent-encoding in lname value: {0:?}")]
    MalformedPercentEncoding(String),
}

/// A device (raw character device or linear PCM device) could not be
/// opened or configured.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot open cxadc{index}: {source}")]
    RawDeviceOpen { index: u32, source: std::io::Error },

    #[error("cannot open linear device {name:?}: {message}")]
    LinearDeviceOpen { name: String, message: String },

    #[error("cannot negotiate linear device hardware params: {0}")]
    LinearHwParams(String),

    #[error("cannot negotiate linear device software params: {0}")]
    LinearSwParams(String),

    #[error("cannot prepare or start linear device: {0}")]
    LinearStart(String),
}

/// Errors raised while starting a capture session.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("ring allocation failed: {0}")]
    Alloc(#[from] capture_ring::AllocError),

    #[error("failed to spawn producer thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

impl StartError {
    /// Single-line human message for the `/start` failure JSON body.
    pub fn fail_reason(&self) -> String {
        self.to_string()
    }
}

/// Errors raised while stopping a capture session. Currently only the
/// "nothing to stop" case, surfaced as a state mismatch rather than an
/// error type by the orchestrator; kept as a distinct type for parity with
/// `StartError` and to leave room for future stop-time failures.
#[derive(Debug, Error)]
pub enum StopError {
    #[error("capture is not running")]
    NotRunning,
}
