//! Error and crash reporting shared by controller workers.
//!
//! Sync failures are not returned to anyone: the worker that observed them
//! hands them to an [`ErrorHandler`] and moves on. Panics caught at a worker
//! boundary go through [`handle_crash`].

use std::any::Any;

use tracing::error;

use crate::error::Error;

/// Sink for errors that have no caller to return to.
pub trait ErrorHandler: Send + Sync {
    /// Report an error observed by a controller.
    fn handle_error(&self, err: &Error);
}

/// Default handler: logs every error at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle_error(&self, err: &Error) {
        error!(error = %err, "Observed a controller error");
    }
}

/// Log a crash caught at a task boundary.
///
/// The payload is whatever `catch_unwind` produced; string payloads are
/// rendered, anything else is reported as opaque.
pub fn handle_crash(component: &str, payload: &(dyn Any + Send)) {
    let message = panic_message(payload);
    error!(component, panic = %message, "Observed a panic");
}

/// Extract a human readable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_from_str() {
        let payload: Box<dyn Any + Send> = Box::new("worker exploded");
        assert_eq!(panic_message(payload.as_ref()), "worker exploded");
    }

    #[test]
    fn test_panic_message_from_string() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("formatted 42"));
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");
    }

    #[test]
    fn test_panic_message_opaque() {
        let payload: Box<dyn Any + Send> = Box::new(7_u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
