//! Runtime configuration for fpm-matcher
//!
//! Merges command-line arguments and environment variables (via clap) over
//! the TOML file and compiled defaults into one immutable [`ServiceConfig`].
//! Nothing reads the environment after this is built.

use clap::Parser;
use fpm_common::config::{BatchFailurePolicy, ToolkitConfig, TomlConfig};
use std::path::PathBuf;
use std::time::Duration;

use crate::services::{EncodingSettings, PipelineSettings};

/// Command-line arguments for fpm-matcher
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "fpm-matcher")]
#[command(about = "Fingerprint matching service backed by the NIST NBIS toolkit")]
#[command(version)]
pub struct Args {
    /// TOML config file
    #[arg(short, long, env = "FPM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "FPM_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "FPM_PORT")]
    pub port: Option<u16>,

    /// Shared directory for transient artifacts
    #[arg(long, env = "FPM_ARTIFACT_ROOT")]
    pub artifact_root: Option<PathBuf>,

    /// Path to the cwsq re-encoder
    #[arg(long, env = "FPM_CWSQ")]
    pub cwsq: Option<PathBuf>,

    /// Path to the mindtct minutiae detector
    #[arg(long, env = "FPM_MINDTCT")]
    pub mindtct: Option<PathBuf>,

    /// Path to the bozorth3 matcher
    #[arg(long, env = "FPM_BOZORTH3")]
    pub bozorth3: Option<PathBuf>,

    /// Wall-clock limit per external tool invocation, in seconds
    #[arg(long, env = "FPM_TOOL_TIMEOUT_SECS")]
    pub tool_timeout_secs: Option<u64>,

    /// Batch behavior when a candidate fails: skip or abort
    #[arg(long, env = "FPM_BATCH_POLICY")]
    pub batch_policy: Option<BatchFailurePolicy>,

    /// Default log filter (RUST_LOG takes precedence)
    #[arg(long, env = "FPM_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    pub write_default_config: Option<PathBuf>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub artifact_root: PathBuf,
    pub toolkit: ToolkitConfig,
    pub max_dimension: u32,
    pub batch_policy: BatchFailurePolicy,
    pub log_level: String,
}

impl ServiceConfig {
    /// Apply CLI/ENV overrides on top of the file (or default) configuration
    pub fn resolve(args: &Args, file: TomlConfig) -> Self {
        let TomlConfig {
            server,
            artifacts,
            mut toolkit,
            imaging,
            batch,
            logging,
        } = file;

        if args.cwsq.is_some() {
            toolkit.cwsq = args.cwsq.clone();
        }
        if args.mindtct.is_some() {
            toolkit.mindtct = args.mindtct.clone();
        }
        if args.bozorth3.is_some() {
            toolkit.bozorth3 = args.bozorth3.clone();
        }
        if let Some(secs) = args.tool_timeout_secs {
            toolkit.timeout_secs = secs;
        }

        Self {
            host: args.host.clone().unwrap_or(server.host),
            port: args.port.unwrap_or(server.port),
            artifact_root: args
                .artifact_root
                .clone()
                .unwrap_or_else(|| artifacts.root_or_default()),
            toolkit,
            max_dimension: imaging.max_dimension,
            batch_policy: args.batch_policy.unwrap_or(batch.failure_policy),
            log_level: args.log_level.clone().unwrap_or(logging.level),
        }
    }

    /// Back to the file schema, for `--write-default-config`
    pub fn to_toml(&self) -> TomlConfig {
        let mut config = TomlConfig::default();
        config.server.host = self.host.clone();
        config.server.port = self.port;
        config.artifacts.root = Some(self.artifact_root.clone());
        config.toolkit = self.toolkit.clone();
        config.imaging.max_dimension = self.max_dimension;
        config.batch.failure_policy = self.batch_policy;
        config.logging.level = self.log_level.clone();
        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            // A zero timeout would fail every invocation.
            tool_timeout: Duration::from_secs(self.toolkit.timeout_secs.max(1)),
            max_dimension: self.max_dimension,
            encoding: EncodingSettings {
                wsq_bitrate: self.toolkit.wsq_bitrate.clone(),
                sampling_density_ppi: self.toolkit.sampling_density_ppi,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_values_used_without_overrides() {
        let mut file = TomlConfig::default();
        file.server.port = 7000;
        file.toolkit.timeout_secs = 12;
        file.batch.failure_policy = BatchFailurePolicy::Abort;

        let config = ServiceConfig::resolve(&Args::default(), file);
        assert_eq!(config.port, 7000);
        assert_eq!(config.toolkit.timeout_secs, 12);
        assert_eq!(config.batch_policy, BatchFailurePolicy::Abort);
        assert_eq!(config.bind_address(), "0.0.0.0:7000");
    }

    #[test]
    fn test_args_override_file() {
        let mut file = TomlConfig::default();
        file.server.port = 7000;
        file.toolkit.mindtct = Some(PathBuf::from("/file/mindtct"));

        let args = Args {
            port: Some(9000),
            mindtct: Some(PathBuf::from("/cli/mindtct")),
            batch_policy: Some(BatchFailurePolicy::Abort),
            artifact_root: Some(PathBuf::from("/srv/artifacts")),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(&args, file);
        assert_eq!(config.port, 9000);
        assert_eq!(config.toolkit.mindtct, Some(PathBuf::from("/cli/mindtct")));
        assert_eq!(config.batch_policy, BatchFailurePolicy::Abort);
        assert_eq!(config.artifact_root, PathBuf::from("/srv/artifacts"));
    }

    #[test]
    fn test_parse_cli_flags() {
        let args = Args::try_parse_from([
            "fpm-matcher",
            "--port",
            "5100",
            "--batch-policy",
            "abort",
            "--tool-timeout-secs",
            "3",
        ])
        .unwrap();

        assert_eq!(args.port, Some(5100));
        assert_eq!(args.batch_policy, Some(BatchFailurePolicy::Abort));
        assert_eq!(args.tool_timeout_secs, Some(3));
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let mut file = TomlConfig::default();
        file.toolkit.timeout_secs = 0;
        let settings = ServiceConfig::resolve(&Args::default(), file).pipeline_settings();
        assert_eq!(settings.tool_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_to_toml_round_trips_through_resolve() {
        let config = ServiceConfig::resolve(&Args::default(), TomlConfig::default());
        let again = ServiceConfig::resolve(&Args::default(), config.to_toml());
        assert_eq!(config, again);
    }
}
