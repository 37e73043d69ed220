//! TOML configuration for the `factory` binary.
//!
//! ```toml
//! [[controllers]]
//! name = "Certificates"
//! workers = 2
//! resync_every_secs = 30
//! resync_schedules = ["*/5 * * * *"]
//! report_degraded = true
//! seed_keys = ["default/ingress-cert"]
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use factory_controller::parse_schedule;
use factory_core::{Error, Result};
use serde::{Deserialize, Serialize};

const fn default_workers() -> usize {
    1
}

/// One controller to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Controller name; also prefixes its `Degraded` condition.
    pub name: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Periodic resync interval. Zero disables periodic resync.
    #[serde(default)]
    pub resync_every_secs: u64,
    /// Cron expressions that trigger a resync.
    #[serde(default)]
    pub resync_schedules: Vec<String>,
    /// Mirror sync outcomes into the operator status.
    #[serde(default)]
    pub report_degraded: bool,
    /// Keys enqueued once the controller has started.
    #[serde(default)]
    pub seed_keys: Vec<String>,
}

impl ControllerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workers: default_workers(),
            resync_every_secs: 0,
            resync_schedules: Vec::new(),
            report_degraded: false,
            seed_keys: Vec::new(),
        }
    }

    #[must_use]
    pub const fn resync_every(&self) -> Duration {
        Duration::from_secs(self.resync_every_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_config("controller name must not be empty"));
        }
        if self.workers == 0 {
            return Err(Error::invalid_config(format!(
                "controller '{}' needs at least one worker",
                self.name
            )));
        }
        if self.seed_keys.iter().any(|key| key.trim().is_empty()) {
            return Err(Error::invalid_config(format!(
                "controller '{}' has a blank seed key",
                self.name
            )));
        }
        self.resync_schedules
            .iter()
            .try_for_each(|expression| parse_schedule(expression).map(|_| ()))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactoryConfig {
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            controllers: vec![ControllerConfig {
                resync_every_secs: 30,
                report_degraded: true,
                seed_keys: vec!["default/example".to_string()],
                ..ControllerConfig::new("Example")
            }],
        }
    }
}

impl FactoryConfig {
    /// Read and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileReadFailed`] when the file cannot be read and
    /// [`Error::InvalidConfig`] or [`Error::InvalidSchedule`] when it does
    /// not describe a runnable set of controllers.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a config document.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every controller entry and that names are unique.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.controllers.is_empty() {
            return Err(Error::invalid_config("no controllers configured"));
        }

        let mut names = HashSet::new();
        for controller in &self.controllers {
            controller.validate()?;
            if !names.insert(controller.name.as_str()) {
                return Err(Error::invalid_config(format!(
                    "duplicate controller name '{}'",
                    controller.name
                )));
            }
        }
        Ok(())
    }

    /// Override the worker count of every controller.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        for controller in &mut self.controllers {
            controller.workers = workers;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::indexing_slicing)]

    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FactoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parse_full_entry() {
        let config = FactoryConfig::from_toml(
            r#"
            [[controllers]]
            name = "Certificates"
            workers = 3
            resync_every_secs = 15
            resync_schedules = ["*/5 * * * *"]
            report_degraded = true
            seed_keys = ["ns/cert"]
            "#,
        )
        .unwrap();

        let controller = &config.controllers[0];
        assert_eq!(controller.workers, 3);
        assert_eq!(controller.resync_every(), Duration::from_secs(15));
        assert!(controller.report_degraded);
        assert_eq!(controller.seed_keys, vec!["ns/cert".to_string()]);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let config = FactoryConfig::from_toml("[[controllers]]\nname = \"Minimal\"\n").unwrap();
        assert_eq!(config.controllers[0], ControllerConfig::new("Minimal"));
    }

    #[test]
    fn test_rejects_empty_config() {
        let err = FactoryConfig::from_toml("").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = FactoryConfig::from_toml(
            "[[controllers]]\nname = \"A\"\n[[controllers]]\nname = \"A\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err =
            FactoryConfig::from_toml("[[controllers]]\nname = \"A\"\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_rejects_bad_schedule() {
        let err = FactoryConfig::from_toml(
            "[[controllers]]\nname = \"A\"\nresync_schedules = [\"whenever\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchedule { .. }));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = FactoryConfig::from_toml("[[controllers]]\nname = \"A\"\nthreads = 2\n")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[controllers]]\nname = \"FromFile\"").unwrap();

        let config = FactoryConfig::load(file.path()).unwrap();
        assert_eq!(config.controllers[0].name, "FromFile");
    }

    #[test]
    fn test_load_missing_file() {
        let err = FactoryConfig::load(Path::new("/nonexistent/factory.toml")).unwrap_err();
        assert!(matches!(err, Error::FileReadFailed { .. }));
    }

    #[test]
    fn test_workers_override() {
        let config = FactoryConfig::default().with_workers(8);
        assert!(config.controllers.iter().all(|c| c.workers == 8));
    }
}
