//! Configuration schema, file discovery and loading
//!
//! Resolution priority for every runtime setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 are handled by the binary's argument parser; this module owns
//! tiers 3 and 4.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FPM_CONFIG";

/// Config file name inside the per-user config directory
pub const CONFIG_FILE_NAME: &str = "fpm-matcher.toml";

/// Top-level TOML configuration
///
/// Every section has defaults, so an empty file (or no file at all) is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactConfig,
    pub toolkit: ToolkitConfig,
    pub imaging: ImagingConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Transient artifact directory settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Shared root for per-operation artifacts (default: `<temp>/nbis_fingerprints`)
    pub root: Option<PathBuf>,
}

impl ArtifactConfig {
    /// Configured root, or the compiled default
    pub fn root_or_default(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(default_artifact_root)
    }
}

/// External NBIS toolkit settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Explicit path to the WSQ re-encoder (`cwsq`)
    pub cwsq: Option<PathBuf>,
    /// Explicit path to the minutiae detector (`mindtct`)
    pub mindtct: Option<PathBuf>,
    /// Explicit path to the pairwise matcher (`bozorth3`)
    pub bozorth3: Option<PathBuf>,
    /// Wall-clock budget per tool invocation, in seconds
    pub timeout_secs: u64,
    /// WSQ compression bitrate passed to the re-encoder
    pub wsq_bitrate: String,
    /// Assumed sensor sampling density (pixels per inch)
    pub sampling_density_ppi: u32,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            cwsq: None,
            mindtct: None,
            bozorth3: None,
            timeout_secs: 30,
            wsq_bitrate: "2.25".to_string(),
            sampling_density_ppi: 500,
        }
    }
}

/// Input image validation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingConfig {
    /// Largest accepted width or height in pixels
    pub max_dimension: u32,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            max_dimension: 4096,
        }
    }
}

/// What a batch does when one candidate fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchFailurePolicy {
    /// Record a per-candidate error and keep going
    #[default]
    Skip,
    /// Fail the whole batch on the first candidate error
    Abort,
}

impl std::str::FromStr for BatchFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(Error::InvalidInput(format!(
                "unknown batch failure policy '{}' (expected 'skip' or 'abort')",
                other
            ))),
        }
    }
}

/// Batch comparison settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub failure_policy: BatchFailurePolicy,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Compiled default artifact root
pub fn default_artifact_root() -> PathBuf {
    std::env::temp_dir().join("nbis_fingerprints")
}

/// Locate the config file to load
///
/// An explicit path always wins (even if it does not exist, so the caller
/// can report it). Otherwise the per-user config dir is tried, then
/// `/etc/fpm`.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("fpm").join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/fpm").join(CONFIG_FILE_NAME);
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Parse TOML configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load configuration from `path`
///
/// A missing file degrades gracefully to compiled defaults with a warning.
/// A file that exists but cannot be read or parsed is a configuration error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write configuration atomically (temp file in the same directory + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, content)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
