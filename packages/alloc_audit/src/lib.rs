#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Allocation auditing for development and test builds.
//!
//! This package wraps raw heap primitives (allocate, zero-allocate, resize, release) and
//! records where each allocation was made, what it was for and what happened to it. At the
//! end of a run it produces a report of leaked memory, allocations that failed and releases
//! that did not match any live allocation (double releases or releases of foreign memory).
//!
//! The core functionality includes:
//! - [`Registry`] - Records allocations and releases and produces reports
//! - [`Report`] - A snapshot of a registry, rendered as a summary line and an issue table
//! - [`RawAllocator`] - The raw heap primitives being instrumented
//! - [`SystemAllocator`] - A [`RawAllocator`] backed by the C runtime heap
//!
//! This package is not meant for use in production, serving only as a development tool.
//! Production builds are expected to call the raw allocator directly.
//!
//! # Simple Usage
//!
//! ```
//! use alloc_audit::Registry;
//!
//! let registry = Registry::system();
//!
//! let freed = registry.allocate::<i32>(2);
//! let _leaked = registry.zero_allocate::<u8>(10);
//!
//! registry.release(freed).unwrap();
//!
//! // 18 bytes allocated in total, with 10 leaked.
//! //
//! // +==========...==========+
//! // |          Issue | File | Line | Type | Item Count | Type Size | Total Size |
//! // +----------...----------+
//! // |   LEAKED ALLOC | ...
//! // +==========...==========+
//! registry.print_to_stdout();
//!
//! // Releases what leaked and starts over.
//! registry.reset();
//! ```
//!
//! # Call sites
//!
//! The typed methods ([`Registry::allocate()`], [`Registry::zero_allocate()`],
//! [`Registry::resize()`], [`Registry::release()`]) capture the file and line of their caller
//! automatically. The `record_*` methods take the call site and type information explicitly,
//! for hosts that forward them from elsewhere (for example from C macros over FFI).
//!
//! # Logging
//!
//! Every recorded event is emitted through [`tracing`]: successful operations at `trace`
//! level, failed allocations and unmatched releases at `warn` level.

mod builder;
mod call_site;
mod constants;
mod error;
mod live_set;
mod raw_allocator;
mod records;
mod registry;
mod report;
mod system_allocator;

pub use builder::*;
pub use call_site::*;
pub use error::*;
pub use raw_allocator::*;
pub use records::*;
pub use registry::*;
pub use report::*;
pub use system_allocator::*;
