//! The linear (multichannel PCM) capture source, modeled as a trait so the
//! start/stop orchestrators and their tests do not require a real sound
//! card. The production implementation talks to ALSA; call sites only ever
//! see `Box<dyn LinearDevice>`, the same trait-at-the-seam shape the
//! teacher crate's span exporter uses to keep its core logic hardware- (or
//! backend-) independent.

use crate::error::DeviceError;

/// Caller-requested linear device parameters, straight from the parsed
/// `/start` query (each field `None` means "use the device default").
#[derive(Debug, Clone, Default)]
pub struct LinearRequest {
    pub name: Option<String>,
    pub format: Option<String>,
    pub rate: Option<u32>,
    pub channels: Option<u8>,
}

/// The parameters actually negotiated with the device, echoed back in the
/// `/start` response and used to compute `frame_bytes` for the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearNegotiated {
    pub rate: u32,
    pub channels: u8,
    pub format: String,
    pub frame_bytes: usize,
}

/// Default hardware identifier used when the caller omits `lname`.
pub const DEFAULT_LINEAR_DEVICE: &str = "hw:CARD=CXADCADCClockGe";

/// Trait-at-the-seam abstraction over a linear PCM device.
pub trait LinearDevice: Send {
    /// Opens the device and negotiates hardware/software parameters.
    fn open(&mut self, request: &LinearRequest) -> Result<LinearNegotiated, DeviceError>;

    /// Starts the device clock. Called once, immediately after `open`.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Reads up to `buf.len() / frame_bytes` frames into `buf`, returning
    /// the number of frames actually read. `0` means "try again" (EAGAIN
    /// on a nonblocking handle); a negative ALSA return becomes `Err`.
    fn read_frames(&mut self, buf: &mut [u8], frame_bytes: usize) -> std::io::Result<usize>;

    /// Drops any samples still queued in the device before closing.
    fn close(&mut self);
}

fn format_byte_size(format: &str) -> Option<usize> {
    match format {
        "S16_LE" | "S16_BE" | "U16_LE" | "U16_BE" => Some(2),
        "S24_3LE" | "S24_3BE" | "U24_3LE" | "U24_3BE" => Some(3),
        "S24_LE" | "S24_BE" | "S32_LE" | "S32_BE" | "FLOAT_LE" => Some(4),
        _ => None,
    }
}

#[cfg(target_os = "linux")]
pub mod alsa_impl {
    use super::*;
    use alsa::pcm::{Access, Format, HwParams, State, Stream, SwParams, PCM};
    use alsa::{Direction, ValueOr};

    const DEFAULT_FORMAT: &str = "S24_3LE";
    const DEFAULT_CHANNELS: u8 = 3;

    fn format_from_str(s: &str) -> Option<Format> {
        match s {
            "S16_LE" => Some(Format::S16LE),
            "S16_BE" => Some(Format::S16BE),
            "S24_3LE" => Some(Format::S243LE),
            "S24_3BE" => Some(Format::S243BE),
            "S24_LE" => Some(Format::S24LE),
            "S24_BE" => Some(Format::S24BE),
            "S32_LE" => Some(Format::S32LE),
            "S32_BE" => Some(Format::S32BE),
            "FLOAT_LE" => Some(Format::FloatLE),
            _ => None,
        }
    }

    /// Production linear device, backed by a real ALSA PCM capture handle.
    pub struct AlsaLinearDevice {
        pcm: Option<PCM>,
    }

    impl AlsaLinearDevice {
        pub fn new() -> Self {
            Self { pcm: None }
        }
    }

    impl Default for AlsaLinearDevice {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LinearDevice for AlsaLinearDevice {
        fn open(&mut self, request: &LinearRequest) -> Result<LinearNegotiated, DeviceError> {
            let name = request
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_LINEAR_DEVICE.to_string());

            let pcm = PCM::new(&name, Direction::Capture, true).map_err(|e| {
                DeviceError::LinearDeviceOpen {
                    name: name.clone(),
                    message: e.to_string(),
                }
            })?;

            let (format, channels, rate) = {
                let hwp = HwParams::any(&pcm)
                    .map_err(|e| DeviceError::LinearHwParams(e.to_string()))?;
                hwp.set_access(Access::RWInterleaved)
                    .map_err(|e| DeviceError::LinearHwParams(e.to_string()))?;

                let format_name = request.format.clone().unwrap_or_else(|| DEFAULT_FORMAT.to_string());
                let format = format_from_str(&format_name).ok_or_else(|| {
                    DeviceError::LinearHwParams(format!("unknown linear format {format_name:?}"))
                })?;
                hwp.set_format(format)
                    .map_err(|e| DeviceError::LinearHwParams(e.to_string()))?;

                let channels = request.channels.unwrap_or(DEFAULT_CHANNELS);
                hwp.set_channels(u32::from(channels))
                    .map_err(|e| DeviceError::LinearHwParams(e.to_string()))?;

                let rate = match request.rate {
                    Some(rate) => {
                        hwp.set_rate(rate, ValueOr::Nearest)
                            .map_err(|e| DeviceError::LinearHwParams(e.to_string()))?;
                        rate
                    }
                    None => {
                        // Open question resolution: query current, then max.
                        hwp.set_rate_near(0, ValueOr::Nearest)
                            .or_else(|_| hwp.set_rate_near(u32::MAX, ValueOr::Nearest))
                            .map_err(|e| DeviceError::LinearHwParams(e.to_string()))?
                    }
                };

                pcm.hw_params(&hwp)
                    .map_err(|e| DeviceError::LinearHwParams(e.to_string()))?;

                (format_name, channels, rate)
            };

            {
                let swp = pcm
                    .sw_params_current()
                    .map_err(|e| DeviceError::LinearSwParams(e.to_string()))?;
                swp.set_tstamp_mode(true)
                    .map_err(|e| DeviceError::LinearSwParams(e.to_string()))?;
                pcm.sw_params(&swp)
                    .map_err(|e| DeviceError::LinearSwParams(e.to_string()))?;
            }

            pcm.prepare()
                .map_err(|e| DeviceError::LinearStart(e.to_string()))?;

            let frame_bytes = format_byte_size(&format).unwrap_or(1) * channels as usize;
            self.pcm = Some(pcm);

            Ok(LinearNegotiated {
                rate,
                channels,
                format,
                frame_bytes,
            })
        }

        fn start(&mut self) -> Result<(), DeviceError> {
            let pcm = self.pcm.as_ref().expect("open() must precede start()");
            pcm.start()
                .map_err(|e| DeviceError::LinearStart(e.to_string()))
        }

        fn read_frames(&mut self, buf: &mut [u8], _frame_bytes: usize) -> std::io::Result<usize> {
            let pcm = self
                .pcm
                .as_ref()
                .expect("open() must precede read_frames()");
            let io = pcm.io_bytes();
            match io.readi(buf) {
                Ok(frames) => Ok(frames),
                Err(e) if e.errno() == libc::EAGAIN => Ok(0),
                Err(e) => {
                    if pcm.state() == State::XRun {
                        let _ = pcm.prepare();
                    }
                    Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
                }
            }
        }

        fn close(&mut self) {
            if let Some(pcm) = self.pcm.take() {
                let _ = pcm.drop();
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use alsa_impl::AlsaLinearDevice;

/// In-memory stand-in for tests and non-Linux builds: yields a fixed
/// pattern at a configurable frame size, never blocks, and ignores
/// `close()`.
pub struct FakeLinearDevice {
    pub negotiated: LinearNegotiated,
    pub frames_available: usize,
    fill_byte: u8,
}

impl FakeLinearDevice {
    pub fn new(negotiated: LinearNegotiated) -> Self {
        Self {
            negotiated,
            frames_available: usize::MAX,
            fill_byte: 0x55,
        }
    }
}

impl LinearDevice for FakeLinearDevice {
    fn open(&mut self, _request: &LinearRequest) -> Result<LinearNegotiated, DeviceError> {
        Ok(self.negotiated.clone())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn read_frames(&mut self, buf: &mut [u8], frame_bytes: usize) -> std::io::Result<usize> {
        if self.frames_available == 0 {
            return Ok(0);
        }
        let want_frames = (buf.len() / frame_bytes).min(self.frames_available);
        let n_bytes = want_frames * frame_bytes;
        buf[..n_bytes].fill(self.fill_byte);
        self.frames_available = self.frames_available.saturating_sub(want_frames);
        Ok(want_frames)
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiated() -> LinearNegotiated {
        LinearNegotiated {
            rate: 46_875,
            channels: 3,
            format: "S24_3LE".to_string(),
            frame_bytes: 9,
        }
    }

    #[test]
    fn fake_device_reads_requested_frames() {
        let mut dev = FakeLinearDevice::new(negotiated());
        dev.frames_available = 10;
        let mut buf = [0u8; 90];
        let frames = dev.read_frames(&mut buf, 9).unwrap();
        assert_eq!(frames, 10);
        assert!(buf.iter().all(|&b| b == 0x55));
    }

    #[test]
    fn fake_device_exhausts_then_returns_zero() {
        let mut dev = FakeLinearDevice::new(negotiated());
        dev.frames_available = 1;
        let mut buf = [0u8; 90];
        assert_eq!(dev.read_frames(&mut buf, 9).unwrap(), 1);
        assert_eq!(dev.read_frames(&mut buf, 9).unwrap(), 0);
    }

    #[test]
    fn format_byte_size_known_formats() {
        assert_eq!(format_byte_size("S24_3LE"), Some(3));
        assert_eq!(format_byte_size("S16_LE"), Some(2));
        assert_eq!(format_byte_size("unknown"), None);
    }
}
