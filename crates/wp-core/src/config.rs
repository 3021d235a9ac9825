//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML. Every section
//! defaults sensibly so an empty file is valid; command-line flags are layered
//! on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::{ByteSize, Error};

/// Config file locations searched when no explicit path is given.
const DEFAULT_PATHS: &[&str] = &["./webpify.toml", "~/.config/webpify/config.toml"];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub conversion: ConversionConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a TOML file.
    ///
    /// Values are not validated here: command-line flags may still replace
    /// them, so callers run [`Config::validate`] once everything is merged.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;

        Self::from_toml(&content)
    }

    /// Load from `custom_path` if given, otherwise from the first default
    /// location that exists, otherwise return defaults.
    pub fn load_or_default(custom_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = custom_path {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            return Self::load(Path::new(&expanded));
        }

        for path_str in DEFAULT_PATHS {
            let path = shellexpand::tilde(path_str);
            let path = Path::new(path.as_ref());
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Check values that serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        self.conversion.min_size()?;

        let ext = &self.conversion.target_extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(Error::Config(format!(
                "conversion.target_extension {ext:?} must be a bare extension such as \"webp\""
            )));
        }

        if self.conversion.workers == Some(0) {
            return Err(Error::Config("conversion.workers must be at least 1".into()));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Defaults for a conversion run. Each field can be overridden on the
/// command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Encoder quality; 0 means "not set".
    pub quality: u32,
    /// Overwrite outputs that already exist.
    pub replace: bool,
    /// Worker count; `None` uses the number of CPUs.
    pub workers: Option<usize>,
    /// Smallest input that will be converted, e.g. `"10KB"`.
    pub min_size: String,
    /// Prepended to every output file name.
    pub prepend: String,
    /// Appended to every output file stem, before the extension.
    pub append: String,
    /// Extension of the produced files, without the dot.
    pub target_extension: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: 0,
            replace: false,
            workers: None,
            min_size: "10KB".into(),
            prepend: String::new(),
            append: String::new(),
            target_extension: "webp".into(),
        }
    }
}

impl ConversionConfig {
    /// Parse [`min_size`](Self::min_size) into a [`ByteSize`].
    pub fn min_size(&self) -> Result<ByteSize> {
        self.min_size.parse()
    }
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit path to `cwebp`; searched in `PATH` when unset.
    pub cwebp_path: Option<PathBuf>,
    /// Seconds an encoder invocation may run before it is killed.
    pub encode_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            cwebp_path: None,
            encode_timeout_secs: 300,
        }
    }
}
