use std::fmt::Debug;
use std::ptr::NonNull;

/// The raw heap primitives that the registry instruments.
///
/// The registry never changes how the raw allocator behaves, it only observes the results.
/// A `None` result is the failure marker: the allocator could not satisfy the request. Any
/// `Some` identity is treated as an opaque handle and is never dereferenced by the registry.
///
/// Distinct allocations that are live at the same time must have distinct identities.
///
/// # Examples
///
/// ```
/// use alloc_audit::{RawAllocator, SystemAllocator};
///
/// let allocator = SystemAllocator;
/// let identity = allocator.allocate(16).unwrap();
///
/// // SAFETY: The identity was just returned by the same allocator and is released once.
/// unsafe {
///     allocator.release(identity);
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait RawAllocator: Debug + Send + Sync {
    /// Allocates `bytes` bytes of uninitialized memory.
    fn allocate(&self, bytes: usize) -> Option<NonNull<u8>>;

    /// Allocates `bytes` bytes of zero-initialized memory.
    ///
    /// Implementations that treat a zero-byte request as a failure must return `None` rather
    /// than a degenerate identity.
    fn zero_allocate(&self, bytes: usize) -> Option<NonNull<u8>>;

    /// Resizes an allocation to `bytes` bytes, possibly moving it.
    ///
    /// On success the old identity is no longer valid and the returned one takes its place.
    /// On failure the old identity remains valid and unchanged.
    ///
    /// # Safety
    ///
    /// `identity` must have been returned by this allocator and not yet released.
    unsafe fn resize(&self, identity: NonNull<u8>, bytes: usize) -> Option<NonNull<u8>>;

    /// Returns an allocation to the allocator.
    ///
    /// # Safety
    ///
    /// `identity` must have been returned by this allocator and not yet released.
    unsafe fn release(&self, identity: NonNull<u8>);
}
