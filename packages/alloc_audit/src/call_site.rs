use std::fmt;
use std::panic::Location;

/// The source location at which an instrumented allocation or release was requested.
///
/// The registry never inspects the call site, it only carries it into the report so that
/// each leak or invalid release can be traced back to the code that caused it.
///
/// # Examples
///
/// ```
/// use alloc_audit::CallSite;
///
/// let explicit = CallSite::new("parser.c", 42);
/// assert_eq!(explicit.to_string(), "parser.c:42");
///
/// let here = CallSite::caller();
/// assert_eq!(here.line(), line!() - 1);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CallSite {
    file: &'static str,
    line: u32,
}

impl CallSite {
    /// Creates a call site from an explicit file name and line number.
    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Captures the location of the code that called the current function.
    ///
    /// When used inside a `#[track_caller]` function, the location propagates outward
    /// to the first caller that is not itself `#[track_caller]`.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }

    /// The name of the source file.
    #[must_use]
    pub const fn file(&self) -> &'static str {
        self.file
    }

    /// The line number within the source file.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
