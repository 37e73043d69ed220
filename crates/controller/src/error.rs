//! Error types returned by sync handlers.

use thiserror::Error;

/// Result type alias for sync handlers.
pub type SyncResult = std::result::Result<(), SyncError>;

/// Outcome of a failed sync.
///
/// Every variant requeues the key with backoff; they differ only in how
/// loudly the failure is reported.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Ask for a retry without signalling a real failure.
    ///
    /// Cheaper than re-adding the key by hand. Logged at debug level only.
    #[error("synthetic requeue request")]
    SyntheticRequeue,

    /// A typed runtime failure, e.g. a status store error.
    #[error(transparent)]
    Runtime(#[from] factory_core::Error),

    /// Any other reconciliation failure.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl SyncError {
    /// Create a failure from a message.
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(anyhow::anyhow!("{message}"))
    }

    /// Whether this is the synthetic requeue request.
    #[must_use]
    pub const fn is_synthetic_requeue(&self) -> bool {
        matches!(self, Self::SyntheticRequeue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_requeue_message() {
        let err = SyncError::SyntheticRequeue;
        assert_eq!(err.to_string(), "synthetic requeue request");
        assert!(err.is_synthetic_requeue());
    }

    #[test]
    fn test_failed_is_transparent() {
        let err = SyncError::failed("route not admitted");
        assert_eq!(err.to_string(), "route not admitted");
        assert!(!err.is_synthetic_requeue());
    }

    #[test]
    fn test_failed_accepts_owned_message() {
        let route = "default/web";
        let err = SyncError::failed(format!("route {route} not admitted"));
        assert_eq!(err.to_string(), "route default/web not admitted");
    }

    #[test]
    fn test_runtime_error_converts() {
        let err: SyncError = factory_core::Error::status_update_failed("store down").into();
        assert!(err.to_string().contains("store down"));
    }
}
