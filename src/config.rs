//! Controller configuration.
//!
//! Built in layers: built-in defaults, then an optional TOML/YAML/JSON file, then
//! `FILTER_LIFECYCLE_*` environment variables. CLI flags are applied last by `cli::build_config`.

use crate::error::ConfigError;
use crate::model::FilterKind;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "FILTER_LIFECYCLE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Default filter family created for empty applications
    #[serde(default)]
    pub kind: FilterKind,
    /// JSON store backing the local directory; `None` means the platform data dir
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Upper bound on a single directory fetch
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// After this long an in-flight fetch is reported as slow
    #[serde(with = "humantime_serde")]
    pub slow_fetch_notice: Duration,
    /// Announce the selection after default filters are created
    #[serde(default)]
    pub notify_after_bootstrap: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kind: FilterKind::Task,
            store_path: None,
            fetch_timeout: Duration::from_secs(10),
            slow_fetch_notice: Duration::from_secs(3),
            notify_after_bootstrap: false,
        }
    }
}

impl ControllerConfig {
    /// Load defaults, then `path` (if given), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("kind", "task")?
            .set_default("fetch_timeout", "10s")?
            .set_default("slow_fetch_notice", "3s")?
            .set_default("notify_after_bootstrap", false)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let cfg = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }
}
