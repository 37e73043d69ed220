//! Result type definition and extension traits.

use crate::error::Error;

/// The standard Result type for Factory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing side-effect combinators for Results.
///
/// Lets best-effort call sites log a failure without breaking the chain.
pub trait ResultExt<T, E> {
    /// Inspect the error without consuming the Result.
    fn inspect_error<F: FnOnce(&E)>(self, f: F) -> Self;

    /// Convert to an Option, logging the error at warn level if present.
    fn ok_or_warn(self, context: &str) -> Option<T>
    where
        E: std::fmt::Display;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E> {
    fn inspect_error<F: FnOnce(&E)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }

    fn ok_or_warn(self, context: &str) -> Option<T>
    where
        E: std::fmt::Display,
    {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }
}
