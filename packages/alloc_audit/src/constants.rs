pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - the allocation registry \
     can no longer guarantee that its bookkeeping matches the state of the raw allocator";
