use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, trace, warn};

use crate::constants::ERR_POISONED_LOCK;
use crate::live_set::{Identity, LiveSet};
use crate::{
    AllocationRecord, CallSite, Error, RawAllocator, ReleaseAttemptRecord, Report,
    RegistryBuilder, Result, SystemAllocator,
};

/// Everything the registry knows, guarded as one unit.
#[derive(Debug, Default)]
struct RegistryState {
    live: LiveSet,

    // Only ever summed for the "bytes allocated in total" statistic.
    released: Vec<AllocationRecord>,

    failed_allocations: Vec<AllocationRecord>,
    failed_releases: Vec<ReleaseAttemptRecord>,

    // Rendered report, dropped whenever any of the lists above change.
    cached_report: Option<String>,
}

impl RegistryState {
    /// Records the outcome of a raw allocation and passes the result through.
    fn record_allocation(
        &mut self,
        outcome: Option<NonNull<u8>>,
        record: AllocationRecord,
    ) -> Option<NonNull<u8>> {
        self.cached_report = None;

        let Some(ptr) = outcome else {
            warn!(
                site = %record.site(),
                type_name = record.type_name(),
                count = record.count(),
                element_size = record.element_size(),
                "allocation failed"
            );

            self.failed_allocations.push(record);
            return None;
        };

        if !self.live.insert(Identity::new(ptr), record) {
            error!(
                site = %record.site(),
                identity = ?ptr,
                "raw allocator returned an identity that is already live; \
                 releases of it will match the older allocation first"
            );
        }

        trace!(
            site = %record.site(),
            identity = ?ptr,
            type_name = record.type_name(),
            count = record.count(),
            "allocation recorded"
        );

        Some(ptr)
    }

    /// Matches a release against the live set.
    ///
    /// A match moves the allocation into the released list. A miss is recorded as a failed
    /// release. Returns whether there was a match; the caller decides what to do with the
    /// raw allocation.
    fn retire(&mut self, identity: Identity, site: CallSite) -> bool {
        self.cached_report = None;

        if let Some(record) = self.live.remove(identity) {
            trace!(%site, identity = ?identity.get(), "release matched");

            self.released.push(record);
            return true;
        }

        warn!(
            %site,
            identity = ?identity.get(),
            "release does not match any live allocation"
        );

        self.failed_releases.push(ReleaseAttemptRecord::new(site));
        false
    }

    fn clear(&mut self) {
        self.live.clear();
        self.released.clear();
        self.failed_allocations.clear();
        self.failed_releases.clear();
        self.cached_report = None;
    }
}

/// Records every allocation and release made through it and reports leaks, failed
/// allocations and releases that did not match any live allocation.
///
/// A registry wraps a [`RawAllocator`] and observes it without changing its behavior. Each
/// diagnostic session gets its own registry; at the end of the session, [`report()`] or
/// [`report_text()`] describes what went wrong and [`reset()`] releases whatever is still
/// live.
///
/// Failures are never fatal. A failed allocation returns `None` like the raw allocator would,
/// a release that matches nothing returns an error and is not forwarded to the raw allocator.
/// Either way the event is kept for the report.
///
/// # Examples
///
/// ```
/// use alloc_audit::Registry;
///
/// let registry = Registry::system();
///
/// let numbers = registry.allocate::<i32>(2);
/// let _leaked = registry.zero_allocate::<u8>(10);
///
/// registry.release(numbers).unwrap();
/// assert!(registry.release(numbers).is_err()); // Double release.
///
/// let report = registry.report();
/// assert_eq!(report.total_allocated_bytes(), 18);
/// assert_eq!(report.total_leaked_bytes(), 10);
/// assert_eq!(report.failed_releases().len(), 1);
///
/// // Releases the leaked allocation and forgets everything.
/// registry.reset();
/// assert!(registry.is_clean());
/// ```
///
/// # Thread safety
///
/// All state is guarded by a single mutex, so every operation is atomic with respect to the
/// others, including the raw allocator call it makes.
///
/// [`report()`]: Self::report
/// [`report_text()`]: Self::report_text
/// [`reset()`]: Self::reset
#[derive(Debug)]
pub struct Registry<A: RawAllocator = SystemAllocator> {
    allocator: A,
    state: Mutex<RegistryState>,
    release_on_drop: bool,
}

impl Registry<SystemAllocator> {
    /// Creates a registry that instruments the C runtime heap.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemAllocator)
    }

    /// Starts building a registry with non-default options.
    ///
    /// # Examples
    ///
    /// ```
    /// use alloc_audit::{Registry, SystemAllocator};
    ///
    /// let registry = Registry::builder()
    ///     .allocator(SystemAllocator)
    ///     .release_on_drop(false)
    ///     .build();
    /// ```
    pub fn builder() -> RegistryBuilder<SystemAllocator> {
        RegistryBuilder::new()
    }
}

impl<A: RawAllocator> Registry<A> {
    /// Creates an empty registry that instruments the given allocator.
    ///
    /// Allocations still live when the registry is dropped are released.
    #[must_use]
    pub fn new(allocator: A) -> Self {
        Self::with_options(allocator, true)
    }

    pub(crate) fn with_options(allocator: A, release_on_drop: bool) -> Self {
        Self {
            allocator,
            state: Mutex::new(RegistryState::default()),
            release_on_drop,
        }
    }

    /// The instrumented allocator.
    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().expect(ERR_POISONED_LOCK)
    }

    /// Allocates memory for the described request and records the outcome.
    ///
    /// Returns the new identity, or `None` if the raw allocator failed (which is recorded as a
    /// failed allocation). A request whose byte size does not fit in `usize` fails without
    /// reaching the raw allocator.
    pub fn record_allocate(&self, record: AllocationRecord) -> Option<NonNull<u8>> {
        let mut state = self.lock();

        let outcome = record
            .byte_size()
            .and_then(|bytes| self.allocator.allocate(bytes));

        state.record_allocation(outcome, record)
    }

    /// Allocates zero-initialized memory for the described request and records the outcome.
    ///
    /// A request for zero items or for zero-sized items returns `None` without calling the
    /// raw allocator and without recording anything.
    pub fn record_zero_allocate(&self, record: AllocationRecord) -> Option<NonNull<u8>> {
        if record.is_degenerate() {
            trace!(site = %record.site(), "ignoring empty zero-initialized allocation");
            return None;
        }

        let mut state = self.lock();

        let outcome = record
            .byte_size()
            .and_then(|bytes| self.allocator.zero_allocate(bytes));

        state.record_allocation(outcome, record)
    }

    /// Resizes an allocation to the described request and records the outcome.
    ///
    /// * A request for zero items or zero-sized items releases `old` (exactly like
    ///   [`record_release()`](Self::record_release)) and returns `None`.
    /// * Resizing `None` allocates, exactly like [`record_allocate()`](Self::record_allocate).
    /// * If the raw allocator fails, `None` is returned, nothing is recorded and `old` remains
    ///   live and owned by the caller.
    /// * On success `old` is matched against the live set as if it had been released and the
    ///   new identity is recorded as a live allocation described by `record`.
    ///
    /// # Safety
    ///
    /// `old` must be `None` or an identity that was returned by this registry's raw allocator
    /// and has not been released since.
    pub unsafe fn record_resize(
        &self,
        old: Option<NonNull<u8>>,
        record: AllocationRecord,
    ) -> Option<NonNull<u8>> {
        if record.is_degenerate() {
            // An unmatched release is already recorded for the report.
            _ = self.record_release(old, record.site());
            return None;
        }

        let Some(old) = old else {
            return self.record_allocate(record);
        };

        let mut state = self.lock();

        let Some(bytes) = record.byte_size() else {
            warn!(
                site = %record.site(),
                count = record.count(),
                element_size = record.element_size(),
                "resize request overflows the address space, keeping the old allocation"
            );
            return None;
        };

        // SAFETY: Forwarding the caller's guarantee that `old` is a live allocation of this
        // allocator.
        let Some(new) = (unsafe { self.allocator.resize(old, bytes) }) else {
            warn!(
                site = %record.site(),
                identity = ?old,
                bytes,
                "resize failed, keeping the old allocation"
            );
            return None;
        };

        // The raw allocator has already consumed the old identity, so a miss here is only
        // recorded, there is nothing left to release.
        state.retire(Identity::new(old), record.site());

        state.record_allocation(Some(new), record)
    }

    /// Releases an allocation made through this registry.
    ///
    /// Releasing `None` does nothing. Releasing an identity that is not a live allocation (for
    /// example releasing the same identity twice) is recorded as a failed release and is
    /// **not** forwarded to the raw allocator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UntrackedRelease`] if `identity` does not match a live allocation.
    pub fn record_release(&self, identity: Option<NonNull<u8>>, site: CallSite) -> Result<()> {
        let Some(ptr) = identity else {
            return Ok(());
        };

        let mut state = self.lock();

        if !state.retire(Identity::new(ptr), site) {
            return Err(Error::UntrackedRelease { site });
        }

        // SAFETY: The identity was a live allocation of this allocator: it was returned by it
        // and every path that hands it back (release, resize) removes it from the live set.
        unsafe {
            self.allocator.release(ptr);
        }

        Ok(())
    }

    /// Allocates memory for `count` items of type `T`, recording the caller as the call site.
    ///
    /// The raw allocator decides the alignment of the returned memory; [`SystemAllocator`]
    /// only guarantees the alignment of fundamental types.
    #[track_caller]
    pub fn allocate<T>(&self, count: usize) -> Option<NonNull<T>> {
        self.record_allocate(AllocationRecord::of::<T>(count, CallSite::caller()))
            .map(NonNull::cast)
    }

    /// Allocates zero-initialized memory for `count` items of type `T`, recording the caller
    /// as the call site.
    #[track_caller]
    pub fn zero_allocate<T>(&self, count: usize) -> Option<NonNull<T>> {
        self.record_zero_allocate(AllocationRecord::of::<T>(count, CallSite::caller()))
            .map(NonNull::cast)
    }

    /// Resizes an allocation to hold `count` items of type `T`, recording the caller as the
    /// call site.
    ///
    /// # Safety
    ///
    /// Same as [`record_resize()`](Self::record_resize).
    #[track_caller]
    pub unsafe fn resize<T>(&self, ptr: Option<NonNull<T>>, count: usize) -> Option<NonNull<T>> {
        let record = AllocationRecord::of::<T>(count, CallSite::caller());

        // SAFETY: Forwarding the caller's guarantee.
        unsafe { self.record_resize(ptr.map(NonNull::cast), record) }.map(NonNull::cast)
    }

    /// Releases an allocation, recording the caller as the call site.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UntrackedRelease`] if `ptr` does not match a live allocation.
    #[track_caller]
    pub fn release<T>(&self, ptr: Option<NonNull<T>>) -> Result<()> {
        self.record_release(ptr.map(NonNull::cast), CallSite::caller())
    }

    /// Takes a snapshot of the registry for reporting.
    ///
    /// The registry is not modified.
    #[must_use]
    pub fn report(&self) -> Report {
        let state = self.lock();

        Report::new(
            state.live.records(),
            &state.released,
            &state.failed_allocations,
            &state.failed_releases,
        )
    }

    /// Renders the current report as text.
    ///
    /// The text is cached until the next operation that changes the registry.
    #[must_use]
    pub fn report_text(&self) -> String {
        let mut state = self.lock();

        if let Some(text) = &state.cached_report {
            return text.clone();
        }

        let text = Report::new(
            state.live.records(),
            &state.released,
            &state.failed_allocations,
            &state.failed_releases,
        )
        .to_string();

        state.cached_report = Some(text.clone());
        text
    }

    /// Prints the current report to stdout.
    ///
    /// This is a convenience method equivalent to `println!("{}", registry.report_text())`.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        println!("{}", self.report_text());
    }

    /// Releases every allocation that is still live and forgets everything recorded so far.
    ///
    /// Call this after reporting: once reset, the registry reports a clean run.
    ///
    /// Each remaining identity is released exactly once, even if the raw allocator handed the
    /// same identity out more than once.
    pub fn reset(&self) {
        let mut state = self.lock();

        let released = self.release_live(&state.live);
        state.clear();

        debug!(released, "registry reset");
    }

    fn release_live(&self, live: &LiveSet) -> usize {
        let identities = live.distinct_identities();

        for identity in &identities {
            // SAFETY: Every live identity was returned by this allocator and has not been
            // handed back to it since. Each identity is released at most once.
            unsafe {
                self.allocator.release(identity.get());
            }
        }

        identities.len()
    }

    /// How many allocations are live (not yet released).
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// How many allocations were released through the registry since the last reset.
    #[must_use]
    pub fn released_count(&self) -> usize {
        self.lock().released.len()
    }

    /// How many allocations failed since the last reset.
    #[must_use]
    pub fn failed_allocation_count(&self) -> usize {
        self.lock().failed_allocations.len()
    }

    /// How many releases matched no live allocation since the last reset.
    #[must_use]
    pub fn failed_release_count(&self) -> usize {
        self.lock().failed_releases.len()
    }

    /// Whether the report would list no issues: nothing is live and nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        let state = self.lock();

        state.live.is_empty()
            && state.failed_allocations.is_empty()
            && state.failed_releases.is_empty()
    }
}

impl<A: RawAllocator> Drop for Registry<A> {
    fn drop(&mut self) {
        if !self.release_on_drop {
            return;
        }

        // Even if some thread panicked while holding the lock, the live set only ever contains
        // identities that are still owned by the allocator, so releasing them remains sound.
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);

        if state.live.is_empty() {
            return;
        }

        let live = std::mem::take(&mut state.live);
        let released = self.release_live(&live);

        debug!(released, "released live allocations of dropped registry");
    }
}
