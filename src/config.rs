//! Application configuration management.
//!
//! Settings are layered with `figment`, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `--config <PATH>`, or `config.toml` in the platform
//!    config directory
//! 3. `MEDIADEDUPE_*` environment variables (e.g. `MEDIADEDUPE_IO_THREADS=8`)
//!
//! CLI flags are applied on top by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::DEFAULT_MIN_SIMILARITY_RATIO;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "MEDIADEDUPE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog database used when none is given on the command line
    pub database: Option<PathBuf>,
    /// Hashing threads
    pub io_threads: usize,
    /// Minimum path similarity when `--basename`/`--dirname` is used
    pub min_similarity_ratio: f64,
    /// Move duplicates to the trash instead of unlinking them
    pub use_trash: bool,
    /// Command run on each duplicate instead of removing it
    pub dedupe_command: Option<String>,
    /// Default keep-ranking sort keys
    pub sort: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            io_threads: 4,
            min_similarity_ratio: DEFAULT_MIN_SIMILARITY_RATIO,
            use_trash: true,
            dedupe_command: None,
            sort: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default file (or `path`) and environment.
    ///
    /// A missing file is not an error; a malformed one is.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value has the
    /// wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };
        Self::figment(file.as_deref())
            .extract()
            .context("failed to load configuration")
    }

    /// The provider stack used by [`Config::load`].
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            log::debug!("Reading configuration from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Write the configuration as TOML to `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Platform-specific `config.toml` location, if one can be determined.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mediadedupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
