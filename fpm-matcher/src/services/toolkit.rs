//! NBIS toolkit resolution and readiness
//!
//! Tool paths are resolved exactly once at startup into an immutable
//! [`Toolkit`]; readiness is derived from it and never re-probed per request.
//!
//! Resolution order per tool: explicit configured path, then `PATH`, then
//! the conventional NBIS install directories.

use fpm_common::config::ToolkitConfig;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Install directories probed when a tool is not on `PATH`
pub const FALLBACK_DIRS: [&str; 3] = ["/opt/nbis/bin", "/usr/local/bin", "/usr/bin"];

/// The three external tools the pipeline depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Raster to WSQ re-encoder
    Cwsq,
    /// Minutiae detector
    Mindtct,
    /// Pairwise template matcher
    Bozorth3,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Cwsq, Tool::Mindtct, Tool::Bozorth3];

    pub fn binary_name(self) -> &'static str {
        match self {
            Tool::Cwsq => "cwsq",
            Tool::Mindtct => "mindtct",
            Tool::Bozorth3 => "bozorth3",
        }
    }
}

/// Resolution outcome for one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub tool: Tool,
    pub path: PathBuf,
    pub exists: bool,
    pub executable: bool,
}

impl ToolStatus {
    /// Probe `path` on the filesystem
    pub fn probe(tool: Tool, path: PathBuf) -> Self {
        let exists = path.is_file();
        let executable = exists && is_executable(&path);
        Self {
            tool,
            path,
            exists,
            executable,
        }
    }

    pub fn usable(&self) -> bool {
        self.exists && self.executable
    }
}

/// Resolved, immutable toolkit configuration
#[derive(Debug, Clone)]
pub struct Toolkit {
    cwsq: ToolStatus,
    mindtct: ToolStatus,
    bozorth3: ToolStatus,
}

impl Toolkit {
    /// Resolve all tools from configuration, the process `PATH` and the
    /// standard install directories
    pub fn resolve(config: &ToolkitConfig) -> Self {
        let fallback: Vec<PathBuf> = FALLBACK_DIRS.iter().map(PathBuf::from).collect();
        let toolkit = Self::resolve_with(config, std::env::var_os("PATH"), &fallback);
        toolkit.log_readiness();
        toolkit
    }

    /// Resolve with an explicit search path and fallback directories
    pub fn resolve_with(
        config: &ToolkitConfig,
        search_path: Option<OsString>,
        fallback_dirs: &[PathBuf],
    ) -> Self {
        let resolve_one = |tool: Tool, explicit: &Option<PathBuf>| {
            let path = match explicit {
                Some(path) => path.clone(),
                None => find_tool(tool.binary_name(), search_path.as_deref(), fallback_dirs)
                    .unwrap_or_else(|| PathBuf::from(tool.binary_name())),
            };
            ToolStatus::probe(tool, path)
        };

        Self {
            cwsq: resolve_one(Tool::Cwsq, &config.cwsq),
            mindtct: resolve_one(Tool::Mindtct, &config.mindtct),
            bozorth3: resolve_one(Tool::Bozorth3, &config.bozorth3),
        }
    }

    /// Build directly from known paths
    pub fn from_paths(cwsq: PathBuf, mindtct: PathBuf, bozorth3: PathBuf) -> Self {
        Self {
            cwsq: ToolStatus::probe(Tool::Cwsq, cwsq),
            mindtct: ToolStatus::probe(Tool::Mindtct, mindtct),
            bozorth3: ToolStatus::probe(Tool::Bozorth3, bozorth3),
        }
    }

    pub fn status(&self, tool: Tool) -> &ToolStatus {
        match tool {
            Tool::Cwsq => &self.cwsq,
            Tool::Mindtct => &self.mindtct,
            Tool::Bozorth3 => &self.bozorth3,
        }
    }

    pub fn path(&self, tool: Tool) -> &Path {
        &self.status(tool).path
    }

    pub fn statuses(&self) -> [&ToolStatus; 3] {
        [&self.cwsq, &self.mindtct, &self.bozorth3]
    }

    /// True only if every tool exists and is executable
    pub fn available(&self) -> bool {
        self.statuses().iter().all(|s| s.usable())
    }

    /// Tools that are missing or not executable
    pub fn unusable(&self) -> Vec<Tool> {
        self.statuses()
            .iter()
            .filter(|s| !s.usable())
            .map(|s| s.tool)
            .collect()
    }

    fn log_readiness(&self) {
        for status in self.statuses() {
            info!(
                tool = status.tool.binary_name(),
                path = %status.path.display(),
                exists = status.exists,
                executable = status.executable,
                "NBIS tool resolved"
            );
        }
        if !self.available() {
            let names: Vec<&str> = self.unusable().iter().map(|t| t.binary_name()).collect();
            warn!(
                "NBIS toolkit incomplete (unusable: {}); matching endpoints will answer 503",
                names.join(", ")
            );
        }
    }
}

/// Search `search_path` entries, then `fallback_dirs`, for an existing file
fn find_tool(
    binary: &str,
    search_path: Option<&std::ffi::OsStr>,
    fallback_dirs: &[PathBuf],
) -> Option<PathBuf> {
    let path_dirs = search_path
        .map(|p| std::env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();

    path_dirs
        .iter()
        .chain(fallback_dirs.iter())
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
