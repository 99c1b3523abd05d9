//! # CLI Interface
//!
//! Defines the command-line argument structure for `oraclenet-node` using
//! `clap` derive. Supports three subcommands: `run`, `sign`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// OracleNet identity node.
///
/// Serves the oracle verification API (GitHub announcement challenges and
/// wallet signatures) and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "oraclenet-node",
    about = "OracleNet identity verification node",
    version,
    propagate_version = true
)]
pub struct OracleNetCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the verification API.
    Run(RunArgs),
    /// Sign a message the way a wallet does and print address and signature.
    ///
    /// Development helper for exercising the wallet flow without a browser
    /// wallet.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the HTTP API.
    #[arg(long, short = 'p', env = "ORACLENET_PORT", default_value_t = 8090)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ORACLENET_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Directory of the oracle record database. Created on first run.
    #[arg(long, short = 'd', env = "ORACLENET_DATA_DIR", default_value = "./oraclenet-data")]
    pub data_dir: PathBuf,

    /// Keep records in memory only. Everything is lost on shutdown.
    #[arg(long, env = "ORACLENET_IN_MEMORY")]
    pub in_memory: bool,

    /// Base URL of the GitHub REST API.
    #[arg(long, env = "ORACLENET_GITHUB_API_URL", default_value = oraclenet_protocol::config::GITHUB_API_BASE)]
    pub github_api_url: String,

    /// GitHub token for authenticated API requests (higher rate limit).
    #[arg(long, env = "ORACLENET_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Bearer token for the admin endpoints. Admin endpoints are disabled
    /// when unset.
    #[arg(long, env = "ORACLENET_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Log output format.
    #[arg(long, env = "ORACLENET_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Hex-encoded secp256k1 private key (with or without `0x`).
    ///
    /// **Never pass a key that guards real funds.**
    #[arg(long, env = "ORACLENET_SIGNING_KEY", hide_env_values = true)]
    pub key: String,

    /// Message to sign, exactly as returned by the nonce endpoint.
    #[arg(long, short = 'm')]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        OracleNetCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = OracleNetCli::try_parse_from(["oraclenet-node", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.port, 8090);
        assert!(!args.in_memory);
        assert_eq!(args.github_api_url, "https://api.github.com");
        assert!(args.admin_token.is_none());
        assert_eq!(args.log_format, LogFormat::Pretty);
    }

    #[test]
    fn sign_requires_key_and_message() {
        assert!(OracleNetCli::try_parse_from(["oraclenet-node", "sign", "--key", "01"]).is_err());
        let cli = OracleNetCli::try_parse_from([
            "oraclenet-node",
            "sign",
            "--key",
            "01",
            "-m",
            "hello",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Sign(_)));
    }
}
