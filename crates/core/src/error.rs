//! Core error types for controller operations.
//!
//! All errors are explicit and typed. Recoverable conditions (sync failures)
//! stay inside a processing cycle; only startup faults and crashes escape it.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for Factory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Lifecycle errors
    #[error("timeout waiting for informer cache of '{controller}' controller")]
    CacheSyncTimeout { controller: String },

    // Processing errors
    #[error("'{controller}' controller failed to sync '{key}', err: {reason}")]
    SyncFailed {
        controller: String,
        key: String,
        reason: String,
    },

    #[error("'{controller}' controller failed to process key '{key}' (blank key)")]
    MalformedQueueKey { controller: String, key: String },

    // Status store errors
    #[error("operation cannot be fulfilled: the object has been modified (resource version {resource_version})")]
    Conflict { resource_version: String },

    #[error("status update failed: {reason}")]
    StatusUpdateFailed { reason: String },

    // Configuration errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },
}

impl Error {
    /// Create a cache sync timeout error.
    pub fn cache_sync_timeout(controller: impl Into<String>) -> Self {
        Self::CacheSyncTimeout {
            controller: controller.into(),
        }
    }

    /// Create a sync failed error.
    pub fn sync_failed(
        controller: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SyncFailed {
            controller: controller.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed queue key error.
    pub fn malformed_queue_key(controller: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MalformedQueueKey {
            controller: controller.into(),
            key: key.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(resource_version: impl Into<String>) -> Self {
        Self::Conflict {
            resource_version: resource_version.into(),
        }
    }

    /// Create a status update error.
    pub fn status_update_failed(reason: impl Into<String>) -> Self {
        Self::StatusUpdateFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid schedule error.
    pub fn invalid_schedule(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is an optimistic-concurrency conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_failed_display() {
        let err = Error::sync_failed("Routes", "ns/name", "boom");
        assert_eq!(
            err.to_string(),
            "'Routes' controller failed to sync 'ns/name', err: boom"
        );
    }

    #[test]
    fn test_cache_sync_timeout_names_controller() {
        let err = Error::cache_sync_timeout("Routes");
        assert!(err.to_string().contains("informer cache"));
        assert!(err.to_string().contains("Routes"));
    }

    #[test]
    fn test_is_conflict() {
        assert!(Error::conflict("7").is_conflict());
        assert!(!Error::status_update_failed("down").is_conflict());
    }
}
