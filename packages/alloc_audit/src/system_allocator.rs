use std::ptr::NonNull;

use crate::RawAllocator;

/// A [`RawAllocator`] backed by the C runtime heap (`malloc`, `calloc`, `realloc`, `free`).
///
/// This is the allocator that instrumented code would call directly if it were not being
/// audited, which makes it the natural default for a [`Registry`](crate::Registry).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl RawAllocator for SystemAllocator {
    #[inline]
    fn allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
        // SAFETY: malloc has no preconditions. A null result is the failure marker.
        NonNull::new(unsafe { libc::malloc(bytes) }.cast())
    }

    #[inline]
    fn zero_allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
        if bytes == 0 {
            return None;
        }

        // SAFETY: calloc has no preconditions. A null result is the failure marker.
        NonNull::new(unsafe { libc::calloc(bytes, 1) }.cast())
    }

    #[inline]
    unsafe fn resize(&self, identity: NonNull<u8>, bytes: usize) -> Option<NonNull<u8>> {
        // SAFETY: Forwarding the caller's guarantee that the identity came from malloc/calloc/
        // realloc and is still live. On failure realloc leaves the original block untouched.
        NonNull::new(unsafe { libc::realloc(identity.as_ptr().cast(), bytes) }.cast())
    }

    #[inline]
    unsafe fn release(&self, identity: NonNull<u8>) {
        // SAFETY: Forwarding the caller's guarantee that the identity came from malloc/calloc/
        // realloc and has not been released yet.
        unsafe {
            libc::free(identity.as_ptr().cast());
        }
    }
}
