use thiserror::Error;

use crate::CallSite;

/// Errors returned by instrumented operations.
///
/// Errors are diagnostics, not failures of the registry itself: by the time an error is
/// returned, the offending call has already been recorded and will appear in the report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A release targeted an identity that is not a live allocation of the registry.
    ///
    /// The release was not forwarded to the raw allocator.
    #[error("release at {site} does not match any live allocation (double release or foreign memory)")]
    UntrackedRelease {
        /// Where the release was requested.
        site: CallSite,
    },
}

/// A specialized `Result` type for registry operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
