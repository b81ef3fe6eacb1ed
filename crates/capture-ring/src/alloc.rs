//! Huge-page-backed anonymous memory allocation.
//!
//! Mirrors the allocation sequence of the original capture daemon: try a
//! 1 GiB huge page mapping, fall back to 2 MiB, fall back to ordinary
//! anonymous pages. The first byte is touched after mapping to force the
//! kernel to populate the page table entry rather than deferring the fault
//! to the first real write from a producer thread.

use crate::error::AllocError;
use std::ptr::NonNull;

#[cfg(target_os = "linux")]
use libc::{MAP_HUGETLB, MAP_HUGE_SHIFT};

const HUGE_PAGE_1GB_SHIFT: i32 = 30;
const HUGE_PAGE_2MB_SHIFT: i32 = 21;

/// An anonymous mapping owning `len` bytes of process memory.
///
/// Backed by a huge page when the kernel grants one, ordinary pages
/// otherwise. Always `MAP_POPULATE`d so the mapping is resident before the
/// first producer write, matching the original daemon's preallocation
/// strategy for its multi-gigabyte raw-source rings.
pub struct RingMemory {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is exclusively owned by this struct and handed out
// through `&`/`&mut` slices with the same aliasing discipline as a `Box<[u8]>`.
unsafe impl Send for RingMemory {}
unsafe impl Sync for RingMemory {}

impl RingMemory {
    /// Maps `len` bytes of anonymous memory, attempting huge pages first.
    pub fn allocate(len: usize) -> Result<Self, AllocError> {
        if len == 0 {
            return Err(AllocError::ZeroCapacity);
        }

        let ptr = Self::mmap_with_fallback(len)?;

        // Touch the first byte so the page (huge or not) is faulted in now,
        // not on the first real write from a producer thread.
        unsafe {
            ptr.as_ptr().write_volatile(0);
        }

        Ok(Self { ptr, len })
    }

    #[cfg(target_os = "linux")]
    fn mmap_with_fallback(len: usize) -> Result<NonNull<u8>, AllocError> {
        let base_flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_POPULATE;

        for shift in [HUGE_PAGE_1GB_SHIFT, HUGE_PAGE_2MB_SHIFT] {
            let flags = base_flags | MAP_HUGETLB | (shift << MAP_HUGE_SHIFT);
            if let Some(ptr) = Self::try_mmap(len, flags) {
                log::debug!("ring: mapped {len} bytes with {shift}-bit huge pages");
                return Ok(ptr);
            }
        }

        log::debug!("ring: huge pages unavailable, falling back to ordinary pages for {len} bytes");
        Self::try_mmap(len, base_flags).ok_or_else(|| {
            let errno = std::io::Error::last_os_error();
            AllocError::MmapFailed {
                errno: errno.raw_os_error().unwrap_or(-1),
                message: errno.to_string(),
            }
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn mmap_with_fallback(len: usize) -> Result<NonNull<u8>, AllocError> {
        let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
        Self::try_mmap(len, flags).ok_or_else(|| {
            let errno = std::io::Error::last_os_error();
            AllocError::MmapFailed {
                errno: errno.raw_os_error().unwrap_or(-1),
                message: errno.to_string(),
            }
        })
    }

    fn try_mmap(len: usize, flags: i32) -> Option<NonNull<u8>> {
        unsafe {
            let addr = libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                flags,
                -1,
                0,
            );
            if addr == libc::MAP_FAILED {
                None
            } else {
                NonNull::new(addr.cast::<u8>())
            }
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn as_mut_slice(&self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}

impl Drop for RingMemory {
    fn drop(&mut self) {
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if rc != 0 {
            let errno = std::io::Error::last_os_error();
            log::error!(
                "ring: munmap failed while dropping a {}-byte mapping: {errno}",
                self.len
            );
        }
    }
}
