#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # Factory
//!
//! Queue-driven reconciliation controllers.
//!
//! This library re-exports the workspace crates and holds the pieces of the
//! `factory` binary that are worth testing on their own: configuration and
//! the controller runner.

// Re-export all crates
pub use factory_controller;
pub use factory_core;
pub use factory_workqueue;

pub mod cli;
pub mod config;
pub mod runner;

pub use config::{ControllerConfig, FactoryConfig};
pub use runner::{build_controller, run_controllers};
