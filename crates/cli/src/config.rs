//! Optional `svrf.toml` project configuration.
//!
//! # Example
//!
//! ```toml
//! [check]
//! deny_warnings = true
//!
//! [defines]
//! FAST = ""
//! PROCESS = "n7"
//! ```
//!
//! An empty value defines the name without a value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use svrf_core::conditional::Defines;

/// File looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "svrf.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub check: CheckSettings,
    #[serde(default)]
    pub defines: BTreeMap<String, String>,
}

/// `[check]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckSettings {
    /// Treat warnings as errors in `svrf check`.
    #[serde(default)]
    pub deny_warnings: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    /// `[defines]` as a conditional-resolution set.
    pub fn defines(&self) -> Defines {
        self.defines
            .iter()
            .map(|(name, value)| {
                let value = (!value.is_empty()).then(|| value.clone());
                (name.clone(), value)
            })
            .collect()
    }
}

/// Read an explicitly named config file.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// The explicit `--config` file, else `svrf.toml` in the working directory
/// when present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => read_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                read_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}
