use thiserror::Error;

/// Errors that can occur while allocating or sizing a [`crate::ByteRing`].
#[derive(Debug, Error)]
pub enum AllocError {
    #[error("ring capacity must be non-zero")]
    ZeroCapacity,

    #[error("mmap failed (errno {errno}): {message}")]
    MmapFailed { errno: i32, message: String },
}
