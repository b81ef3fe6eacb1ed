//! Property-based invariant tests for `ByteRing`.
//!
//! Drives the ring through randomized write/read chunk sequences and checks
//! that the bytes observed by the consumer are exactly the bytes the
//! producer wrote, in order, regardless of how the chunk sizes line up
//! against the ring's wraparound boundary.

use capture_ring::ByteRing;
use proptest::prelude::*;

fn drain_all(ring: &ByteRing, out: &mut Vec<u8>) {
    loop {
        let region = ring.read_region();
        if region.is_empty() {
            break;
        }
        out.extend_from_slice(region);
        let n = region.len();
        ring.commit_read(n);
    }
}

proptest! {
    #[test]
    fn write_read_preserves_byte_order(
        capacity in 8usize..512,
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..40),
    ) {
        let ring = ByteRing::new(capacity).unwrap();
        let mut expected = Vec::new();
        let mut observed = Vec::new();

        for chunk in &chunks {
            let mut offset = 0;
            while offset < chunk.len() {
                let region = ring.write_region();
                if region.is_empty() {
                    // Ring full: drain before the producer could make progress.
                    drain_all(&ring, &mut observed);
                    continue;
                }
                let n = region.len().min(chunk.len() - offset);
                region[..n].copy_from_slice(&chunk[offset..offset + n]);
                ring.commit_write(n);
                expected.extend_from_slice(&chunk[offset..offset + n]);
                offset += n;
            }
            drain_all(&ring, &mut observed);
        }

        prop_assert_eq!(observed, expected);
        prop_assert!(ring.is_empty());
    }

    #[test]
    fn outstanding_never_exceeds_capacity(
        capacity in 8usize..256,
        writes in prop::collection::vec(1usize..128, 1..50),
    ) {
        let ring = ByteRing::new(capacity).unwrap();
        for want in writes {
            let region = ring.write_region();
            let n = region.len().min(want);
            ring.commit_write(n);
            prop_assert!(ring.len() as usize <= ring.capacity());
        }
    }
}
