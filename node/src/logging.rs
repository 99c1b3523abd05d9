//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. Output goes to stderr; stdout
//! is reserved for the `sign` and `version` subcommands.
//!
//! Codes, nonces and bearer tokens are never passed to a log macro, so
//! switching a deployment to `debug` does not leak credentials.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "oraclenet_node=info,oraclenet_protocol=info,tower_http=debug";

/// Log output format, selected with `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Multi-line colored output with source locations.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// JSON lines for log aggregation.
    Json,
}

/// `RUST_LOG` if set and valid, otherwise `default_directives`.
fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Installs the subscriber. Fails if one is already installed.
///
/// ```text
/// RUST_LOG=oraclenet_protocol=debug oraclenet-node run --log-format json
/// ```
pub fn init_logging(default_directives: &str, format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(default_directives));

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init()?,
    }

    tracing::debug!(?format, "logging initialized");
    Ok(())
}
