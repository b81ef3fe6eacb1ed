//! Lock-free single-producer/single-consumer byte ring buffer.
//!
//! This is the hot-path primitive the capture server is built around: one
//! producer thread per capture source reserves scratch space, fills it from
//! a blocking read, and commits; one consumer thread per HTTP attachment
//! drains it and writes to a socket. See [`ByteRing`] for the full API.

mod alloc;
mod error;
mod invariants;
mod ring;

pub use alloc::RingMemory;
pub use error::AllocError;
pub use ring::{ByteRing, RingStats};
