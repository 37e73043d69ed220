//! # Factory Core
//!
//! Error taxonomy shared by the work queue, the controller runtime and the
//! `factory` binary, plus the process-wide error and crash reporting used by
//! controller workers.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod error;
pub mod result;
pub mod runtime;

pub use error::Error;
pub use result::{Result, ResultExt};
pub use runtime::{ErrorHandler, LogErrorHandler, handle_crash, panic_message};
