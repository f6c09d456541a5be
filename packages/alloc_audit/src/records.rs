use std::any::type_name;

use crate::CallSite;

/// Describes one allocation request: where it was made, what type it was for and how many
/// items of that type were requested.
///
/// The same record describes a live allocation, a released allocation or a failed allocation,
/// depending on which list of the registry it ends up in. Records are never modified after
/// creation.
///
/// # Examples
///
/// ```
/// use alloc_audit::{AllocationRecord, CallSite};
///
/// let record = AllocationRecord::of::<u32>(4, CallSite::new("main.c", 10));
///
/// assert_eq!(record.count(), 4);
/// assert_eq!(record.element_size(), 4);
/// assert_eq!(record.total_bytes(), 16);
/// assert_eq!(record.type_name(), "u32");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AllocationRecord {
    site: CallSite,
    count: usize,
    element_size: usize,
    type_name: &'static str,
}

impl AllocationRecord {
    /// Creates a record from explicitly declared type information.
    #[must_use]
    pub const fn new(
        count: usize,
        element_size: usize,
        type_name: &'static str,
        site: CallSite,
    ) -> Self {
        Self {
            site,
            count,
            element_size,
            type_name,
        }
    }

    /// Creates a record for `count` items of type `T`.
    #[must_use]
    pub fn of<T>(count: usize, site: CallSite) -> Self {
        Self::new(count, size_of::<T>(), type_name::<T>(), site)
    }

    /// Where the allocation was requested.
    #[must_use]
    pub const fn site(&self) -> CallSite {
        self.site
    }

    /// How many items were requested.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// The size of one item, in bytes.
    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.element_size
    }

    /// The declared name of the item type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The number of bytes requested from the raw allocator.
    ///
    /// Computed in `u128`, which cannot overflow for any pair of `usize` factors, so that
    /// even absurd requests are reported with their true size.
    #[must_use]
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "the product of two usize values always fits in u128"
    )]
    pub fn total_bytes(&self) -> u128 {
        (self.count as u128) * (self.element_size as u128)
    }

    /// The byte size as the raw allocator sees it, or `None` if it does not fit in `usize`.
    pub(crate) fn byte_size(&self) -> Option<usize> {
        self.count.checked_mul(self.element_size)
    }

    /// Whether the request asks for zero items or zero-sized items.
    pub(crate) fn is_degenerate(&self) -> bool {
        self.count == 0 || self.element_size == 0
    }
}

/// A release call that did not match any live allocation.
///
/// This is either a double release or a release of memory the registry never handed out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReleaseAttemptRecord {
    site: CallSite,
}

impl ReleaseAttemptRecord {
    #[must_use]
    pub(crate) const fn new(site: CallSite) -> Self {
        Self { site }
    }

    /// Where the release was requested.
    #[must_use]
    pub const fn site(&self) -> CallSite {
        self.site
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(AllocationRecord: Send, Sync, Copy);
    static_assertions::assert_impl_all!(ReleaseAttemptRecord: Send, Sync, Copy);

    #[test]
    fn of_uses_type_layout() {
        let record = AllocationRecord::of::<u64>(3, CallSite::new("a.c", 1));

        assert_eq!(record.element_size(), 8);
        assert_eq!(record.type_name(), "u64");
        assert_eq!(record.total_bytes(), 24);
        assert_eq!(record.byte_size(), Some(24));
    }

    #[test]
    fn total_bytes_does_not_overflow() {
        let record = AllocationRecord::new(usize::MAX, 2, "wide", CallSite::new("a.c", 1));

        assert_eq!(record.total_bytes(), (usize::MAX as u128) * 2);
        assert_eq!(record.byte_size(), None);
    }

    #[test]
    fn degenerate_when_any_factor_is_zero() {
        let site = CallSite::new("a.c", 1);

        assert!(AllocationRecord::new(0, 4, "int", site).is_degenerate());
        assert!(AllocationRecord::new(4, 0, "unit", site).is_degenerate());
        assert!(!AllocationRecord::new(1, 1, "char", site).is_degenerate());
    }
}
