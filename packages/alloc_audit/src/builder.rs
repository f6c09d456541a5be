//! Registry configuration.

use crate::{RawAllocator, Registry, SystemAllocator};

/// Builder for a [`Registry`] with non-default options.
///
/// Created via [`Registry::builder()`]. By default the registry instruments
/// [`SystemAllocator`] and releases any allocations still live when it is dropped.
///
/// # Examples
///
/// ```
/// use alloc_audit::Registry;
///
/// // The host keeps ownership of leaked allocations even after the registry is gone.
/// let registry = Registry::builder().release_on_drop(false).build();
///
/// let _leaked = registry.allocate::<u8>(16);
/// println!("{}", registry.report_text());
/// # registry.reset();
/// ```
#[derive(Debug)]
#[must_use]
pub struct RegistryBuilder<A: RawAllocator> {
    allocator: A,
    release_on_drop: bool,
}

impl RegistryBuilder<SystemAllocator> {
    pub(crate) fn new() -> Self {
        Self {
            allocator: SystemAllocator,
            release_on_drop: true,
        }
    }
}

impl<A: RawAllocator> RegistryBuilder<A> {
    /// Sets the raw allocator that the registry instruments.
    pub fn allocator<B: RawAllocator>(self, allocator: B) -> RegistryBuilder<B> {
        RegistryBuilder {
            allocator,
            release_on_drop: self.release_on_drop,
        }
    }

    /// Whether allocations still live when the registry is dropped are released.
    ///
    /// Enabled by default. Disable it if the host program keeps using its allocations after
    /// the diagnostic session ends.
    pub fn release_on_drop(mut self, enabled: bool) -> Self {
        self.release_on_drop = enabled;
        self
    }

    /// Creates the registry.
    pub fn build(self) -> Registry<A> {
        Registry::with_options(self.allocator, self.release_on_drop)
    }
}
