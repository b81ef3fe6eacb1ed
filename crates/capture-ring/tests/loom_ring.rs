//! Loom-based concurrency tests for the byte ring's cursor protocol.
//!
//! Run with: `cargo test --features loom --test loom_ring --release`
//!
//! `loom` exhaustively explores thread interleavings under its own shadow
//! atomics, so the production `ByteRing` (built on `std::sync::atomic` and
//! raw mmap'd memory) can't be exercised directly. Instead we model the
//! same read/written cursor protocol over a small fixed buffer, matching
//! the approach the ring-buffer crate this project grew out of used for
//! its own sequence-number protocol.

#![cfg(feature = "loom")]

use loom::cell::UnsafeCell;
use loom::sync::atomic::{AtomicU64, Ordering};
use loom::sync::Arc;
use loom::thread;

struct LoomByteRing {
    written: AtomicU64,
    read: AtomicU64,
    buffer: UnsafeCell<[u8; 4]>,
    capacity: usize,
}

unsafe impl Send for LoomByteRing {}
unsafe impl Sync for LoomByteRing {}

impl LoomByteRing {
    fn new() -> Self {
        Self {
            written: AtomicU64::new(0),
            read: AtomicU64::new(0),
            buffer: UnsafeCell::new([0; 4]),
            capacity: 4,
        }
    }

    fn try_write(&self, byte: u8) -> bool {
        let written = self.written.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        let free = self.capacity - (written.wrapping_sub(read)) as usize;
        if free == 0 {
            return false;
        }
        let idx = (written as usize) % self.capacity;
        self.buffer.with_mut(|b| unsafe { (*b)[idx] = byte });
        self.written.store(written.wrapping_add(1), Ordering::Release);
        true
    }

    fn try_read(&self) -> Option<u8> {
        let read = self.read.load(Ordering::Relaxed);
        let written = self.written.load(Ordering::Acquire);
        if read == written {
            return None;
        }
        let idx = (read as usize) % self.capacity;
        let byte = self.buffer.with(|b| unsafe { (*b)[idx] });
        self.read.store(read.wrapping_add(1), Ordering::Release);
        Some(byte)
    }
}

#[test]
fn loom_byte_ring_fifo_order() {
    loom::model(|| {
        let ring = Arc::new(LoomByteRing::new());
        let producer_ring = Arc::clone(&ring);

        let producer = thread::spawn(move || {
            producer_ring.try_write(1);
            producer_ring.try_write(2);
        });

        let consumer = thread::spawn(move || {
            let mut received = Vec::new();
            for _ in 0..10 {
                if let Some(b) = ring.try_read() {
                    received.push(b);
                }
                if received.len() == 2 {
                    break;
                }
                loom::thread::yield_now();
            }
            received
        });

        producer.join().unwrap();
        let received = consumer.join().unwrap();

        if received.len() >= 2 {
            assert_eq!(received[0], 1);
            assert_eq!(received[1], 2);
        }
    });
}

#[test]
fn loom_byte_ring_full_rejects_write() {
    loom::model(|| {
        let ring = Arc::new(LoomByteRing::new());
        let ring2 = Arc::clone(&ring);

        assert!(ring.try_write(1));
        assert!(ring.try_write(2));
        assert!(ring.try_write(3));
        assert!(ring.try_write(4));
        assert!(!ring.try_write(5));

        let consumer = thread::spawn(move || ring2.try_read());
        let value = consumer.join().unwrap();
        assert_eq!(value, Some(1));

        assert!(ring.try_write(5));
    });
}

#[test]
fn loom_byte_ring_received_never_exceeds_sent() {
    loom::model(|| {
        let ring = Arc::new(LoomByteRing::new());
        let producer_ring = Arc::clone(&ring);
        let consumer_ring = Arc::clone(&ring);

        let sent = Arc::new(loom::sync::atomic::AtomicUsize::new(0));
        let received = Arc::new(loom::sync::atomic::AtomicUsize::new(0));
        let sent_p = Arc::clone(&sent);
        let received_c = Arc::clone(&received);

        let producer = thread::spawn(move || {
            if producer_ring.try_write(10) {
                sent_p.fetch_add(1, Ordering::SeqCst);
            }
            if producer_ring.try_write(20) {
                sent_p.fetch_add(1, Ordering::SeqCst);
            }
        });

        let consumer = thread::spawn(move || {
            for _ in 0..4 {
                if consumer_ring.try_read().is_some() {
                    received_c.fetch_add(1, Ordering::SeqCst);
                }
                loom::thread::yield_now();
            }
        });

        producer.join().unwrap();
        consumer.join().unwrap();

        let s = sent.load(Ordering::SeqCst);
        let r = received.load(Ordering::SeqCst);
        assert!(r <= s, "received {r} but only sent {s}");
    });
}
