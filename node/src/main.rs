// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # OracleNet Node
//!
//! Entry point for the `oraclenet-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the oracle record store, and serves
//! the verification API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     start the verification API
//! - `sign`    sign a message with a local key, as a wallet would
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use oraclenet_protocol::challenge::{ChallengeStore, MemoryChallengeStore};
use oraclenet_protocol::config::{CHALLENGE_SWEEP_INTERVAL, SOCIAL_CHALLENGE_TTL, WALLET_NONCE_TTL};
use oraclenet_protocol::identity::{
    IdentityResolver, MemoryOracleStore, OracleDb, OracleStore, SessionTokens,
};
use oraclenet_protocol::social::{GitHubClient, SocialVerifier};
use oraclenet_protocol::wallet::{sign_personal_message, SignatureVerifier};

use cli::{Commands, OracleNetCli};
use metrics::{NodeMetrics, FLOW_GITHUB, FLOW_WALLET};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = OracleNetCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Sign(args) => sign_message(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens the record store selected on the command line. The database
/// handle is returned too so shutdown can flush it.
fn open_store(args: &cli::RunArgs) -> Result<(Arc<dyn OracleStore>, Option<OracleDb>)> {
    if args.in_memory {
        tracing::warn!("running with an in-memory store, records are lost on shutdown");
        return Ok((Arc::new(MemoryOracleStore::new()), None));
    }

    let db_path = args.data_dir.join("oracles");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = OracleDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    let count = db.count().context("failed to read oracle count")?;
    tracing::info!(path = %db_path.display(), oracles = count, "database opened");
    Ok((Arc::new(db.clone()), Some(db)))
}

/// Starts the verification node: API server, metrics endpoint, and the
/// background sweeper.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_DIRECTIVES, args.log_format)?;

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        github_api = %args.github_api_url,
        "starting oraclenet-node"
    );

    // --- Storage ---
    let (store, db) = open_store(&args)?;
    let resolver = Arc::new(IdentityResolver::new(Arc::clone(&store)));
    let tokens = Arc::new(SessionTokens::new());

    // --- Challenge stores ---
    let codes: Arc<dyn ChallengeStore> = Arc::new(MemoryChallengeStore::new(SOCIAL_CHALLENGE_TTL));
    let nonces: Arc<dyn ChallengeStore> = Arc::new(MemoryChallengeStore::new(WALLET_NONCE_TTL));

    // --- Flows ---
    let tracker = GitHubClient::new(args.github_api_url.clone())
        .context("failed to build GitHub client")?
        .with_token(args.github_token.clone());
    let social = SocialVerifier::new(
        Arc::new(tracker),
        Arc::clone(&codes),
        Arc::clone(&resolver),
        tokens.clone(),
    );
    let wallet = SignatureVerifier::new(Arc::clone(&nonces), resolver, tokens.clone());

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    if args.admin_token.is_none() {
        tracing::info!("no admin token configured, admin endpoints disabled");
    }

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        social: Arc::new(social),
        wallet: Arc::new(wallet),
        store,
        tokens: Arc::clone(&tokens),
        metrics: Arc::clone(&node_metrics),
        admin_token: args.admin_token.clone(),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Sweeper ---
    // Expired entries are also dropped lazily on access; this bounds memory
    // for subjects nobody comes back to.
    let metrics_ref = Arc::clone(&node_metrics);
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHALLENGE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let dropped_codes = codes.sweep_expired();
            let dropped_nonces = nonces.sweep_expired();
            let dropped_sessions = tokens.sweep_expired();

            metrics_ref
                .pending_challenges
                .with_label_values(&[FLOW_GITHUB])
                .set(codes.len() as i64);
            metrics_ref
                .pending_challenges
                .with_label_values(&[FLOW_WALLET])
                .set(nonces.len() as i64);

            tracing::debug!(
                codes = dropped_codes,
                nonces = dropped_nonces,
                sessions = dropped_sessions,
                "expired entries swept"
            );
        }
    });

    // --- Serve ---
    let metrics_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_router).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    axum::serve(api_listener, api_router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    sweeper.abort();
    metrics_server.abort();
    if let Some(db) = db {
        db.flush().context("failed to flush database")?;
    }
    tracing::info!("oraclenet-node stopped");
    Ok(())
}

/// Signs `args.message` with the personal-message convention and prints the
/// signer address and the signature.
fn sign_message(args: cli::SignArgs) -> Result<()> {
    let key_hex = args.key.trim();
    let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
    let key = hex::decode(key_hex).context("signing key is not valid hex")?;

    let (address, signature) =
        sign_personal_message(&key, &args.message).context("failed to sign message")?;

    println!("Address   : {}", address.to_checksum());
    println!("Signature : {}", signature);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("oraclenet-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Resolves on SIGINT or, on Unix, SIGTERM. In-flight requests finish
/// before the API server returns.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C");
                wait_for_ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = wait_for_ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;

    tracing::info!("shutdown signal received, draining connections");
}

async fn wait_for_ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}
