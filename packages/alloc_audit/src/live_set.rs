//! Ordered set of live allocations, addressable by identity.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ptr::NonNull;

use foldhash::HashMap;

use crate::AllocationRecord;

/// An identity handed out by the raw allocator.
///
/// Wrapped so the registry can be shared across threads: the pointer is only compared,
/// hashed and handed back to the raw allocator, never dereferenced.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct Identity(NonNull<u8>);

impl Identity {
    pub(crate) const fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    pub(crate) const fn get(self) -> NonNull<u8> {
        self.0
    }
}

// SAFETY: The pointer is an opaque handle. Nothing reads or writes through it, so moving it
// to another thread cannot create a data race.
unsafe impl Send for Identity {}

// SAFETY: As above, shared access only ever copies or compares the address.
unsafe impl Sync for Identity {}

#[derive(Debug)]
struct LiveEntry {
    identity: Identity,
    record: AllocationRecord,
}

/// Live allocations in the order they were made.
///
/// Entries are keyed by a sequence number so iteration follows insertion order, while the
/// identity index gives constant-time lookup for release matching.
#[derive(Debug, Default)]
pub(crate) struct LiveSet {
    entries: BTreeMap<u64, LiveEntry>,

    // Sequence numbers of the entries with each identity, oldest first. Only ever holds more
    // than one sequence number if the raw allocator hands out a live identity again.
    index: HashMap<Identity, VecDeque<u64>>,

    next_sequence: u64,
}

impl LiveSet {
    /// Appends a live allocation.
    ///
    /// Returns `false` if the identity was already live. That can only happen if the raw
    /// allocator handed out the same identity twice; both entries are kept and releases of the
    /// identity match them oldest first.
    pub(crate) fn insert(&mut self, identity: Identity, record: AllocationRecord) -> bool {
        let sequence = self.next_sequence;
        // Never going to overflow u64, so no point doing slower checked arithmetic here.
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.entries.insert(sequence, LiveEntry { identity, record });

        let sequences = self.index.entry(identity).or_default();
        sequences.push_back(sequence);

        sequences.len() == 1
    }

    /// Removes the oldest live allocation with the given identity, returning its record.
    pub(crate) fn remove(&mut self, identity: Identity) -> Option<AllocationRecord> {
        let sequences = self.index.get_mut(&identity)?;
        let sequence = sequences.pop_front();

        if sequences.is_empty() {
            self.index.remove(&identity);
        }

        self.entries.remove(&sequence?).map(|entry| entry.record)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, identity: Identity) -> bool {
        self.index.contains_key(&identity)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records of all live allocations, oldest first.
    pub(crate) fn records(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.entries.values().map(|entry| &entry.record)
    }

    /// Every identity still present, oldest first, each listed once even if several entries
    /// share it.
    pub(crate) fn distinct_identities(&self) -> Vec<Identity> {
        let mut seen = HashSet::with_capacity(self.entries.len());

        self.entries
            .values()
            .map(|entry| entry.identity)
            .filter(|identity| seen.insert(*identity))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::ptr;

    use super::*;
    use crate::CallSite;

    static_assertions::assert_impl_all!(LiveSet: Send, Sync);

    fn identity(addr: usize) -> Identity {
        Identity::new(NonNull::new(ptr::without_provenance_mut(addr)).unwrap())
    }

    fn record(count: usize) -> AllocationRecord {
        AllocationRecord::new(count, 4, "int", CallSite::new("live.c", 1))
    }

    #[test]
    fn remove_returns_matching_record() {
        let mut live = LiveSet::default();
        assert!(live.insert(identity(0x10), record(1)));
        assert!(live.insert(identity(0x20), record(2)));

        assert_eq!(live.remove(identity(0x20)), Some(record(2)));
        assert_eq!(live.len(), 1);
        assert!(live.contains(identity(0x10)));
        assert!(!live.contains(identity(0x20)));
    }

    #[test]
    fn remove_of_unknown_identity_is_none() {
        let mut live = LiveSet::default();
        live.insert(identity(0x10), record(1));

        assert_eq!(live.remove(identity(0x30)), None);
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn records_follow_insertion_order() {
        let mut live = LiveSet::default();
        live.insert(identity(0x30), record(3));
        live.insert(identity(0x10), record(1));
        live.insert(identity(0x20), record(2));
        live.remove(identity(0x10));

        let counts: Vec<usize> = live.records().map(AllocationRecord::count).collect();
        assert_eq!(counts, vec![3, 2]);
    }

    #[test]
    fn reinserting_released_identity_is_not_duplicate() {
        let mut live = LiveSet::default();
        live.insert(identity(0x10), record(1));
        live.remove(identity(0x10));

        assert!(live.insert(identity(0x10), record(2)));
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn duplicate_identity_keeps_both_entries_but_lists_identity_once() {
        let mut live = LiveSet::default();
        assert!(live.insert(identity(0x10), record(1)));
        assert!(!live.insert(identity(0x10), record(2)));

        assert_eq!(live.len(), 2);
        assert_eq!(live.distinct_identities(), vec![identity(0x10)]);

        // Releases match the oldest entry first and the identity stays matchable until every
        // entry with it is gone.
        assert_eq!(live.remove(identity(0x10)), Some(record(1)));
        assert_eq!(live.len(), 1);
        assert!(live.contains(identity(0x10)));

        assert_eq!(live.remove(identity(0x10)), Some(record(2)));
        assert!(live.is_empty());
        assert!(!live.contains(identity(0x10)));
        assert_eq!(live.remove(identity(0x10)), None);
    }

    #[test]
    fn clear_empties_everything() {
        let mut live = LiveSet::default();
        live.insert(identity(0x10), record(1));
        live.clear();

        assert!(live.is_empty());
        assert!(!live.contains(identity(0x10)));
        assert!(live.distinct_identities().is_empty());
    }
}
