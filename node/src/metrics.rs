//! # Prometheus Metrics
//!
//! Exposes operational metrics for the verification node. Scraped by
//! Prometheus at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! Metrics live in their own [`prometheus::Registry`] under the `oraclenet_`
//! prefix. Every metric carries a `flow` label (`github` or `wallet`).

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Label value for the GitHub announcement flow.
pub const FLOW_GITHUB: &str = "github";
/// Label value for the wallet signature flow.
pub const FLOW_WALLET: &str = "wallet";

/// Outcome label values for `verifications_total`.
pub const OUTCOME_VERIFIED: &str = "verified";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_FAILED: &str = "failed";

/// Metric handles for the verification flows. Handlers record into it;
/// the sweeper refreshes the gauges.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Codes and nonces handed out.
    pub challenges_issued_total: IntCounterVec,
    /// Verify attempts by outcome.
    pub verifications_total: IntCounterVec,
    /// Identities created on first verification.
    pub oracles_created_total: IntCounterVec,
    /// Challenges currently held, refreshed by the sweeper.
    pub pending_challenges: IntGaugeVec,
    /// Wall time of verify requests, upstream calls included.
    pub verification_duration_seconds: HistogramVec,
}

impl NodeMetrics {
    /// Registers every metric in a fresh registry.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("oraclenet".into()), None)
            .expect("failed to create prometheus registry");

        let challenges_issued_total = IntCounterVec::new(
            Opts::new("challenges_issued_total", "Total number of codes and nonces issued"),
            &["flow"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(challenges_issued_total.clone()))
            .expect("metric registration");

        let verifications_total = IntCounterVec::new(
            Opts::new("verifications_total", "Total number of verify attempts by outcome"),
            &["flow", "outcome"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(verifications_total.clone()))
            .expect("metric registration");

        let oracles_created_total = IntCounterVec::new(
            Opts::new("oracles_created_total", "Total number of oracle identities created"),
            &["flow"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(oracles_created_total.clone()))
            .expect("metric registration");

        let pending_challenges = IntGaugeVec::new(
            Opts::new("pending_challenges", "Challenges currently held in memory"),
            &["flow"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(pending_challenges.clone()))
            .expect("metric registration");

        let verification_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "verification_duration_seconds",
                "Verify request latency in seconds, upstream calls included",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["flow"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(verification_duration_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            challenges_issued_total,
            verifications_total,
            oracles_created_total,
            pending_challenges,
            verification_duration_seconds,
        }
    }

    /// Counts one verify attempt, and one created identity if `created`.
    pub fn record_verification(&self, flow: &str, outcome: &str, created: bool) {
        self.verifications_total
            .with_label_values(&[flow, outcome])
            .inc();
        if created {
            self.oracles_created_total.with_label_values(&[flow]).inc();
        }
    }

    /// Text exposition of the registry.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

/// Handle shared by the API state, the sweeper and the metrics server.
pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics` on the metrics port.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_labelled_counters() {
        let metrics = NodeMetrics::new();
        metrics
            .challenges_issued_total
            .with_label_values(&[FLOW_WALLET])
            .inc();
        metrics.record_verification(FLOW_GITHUB, OUTCOME_VERIFIED, true);
        metrics.pending_challenges.with_label_values(&[FLOW_GITHUB]).set(3);

        let text = metrics.encode().unwrap();
        assert!(text.contains("oraclenet_challenges_issued_total{flow=\"wallet\"} 1"));
        assert!(text.contains("oraclenet_verifications_total{flow=\"github\",outcome=\"verified\"} 1"));
        assert!(text.contains("oraclenet_oracles_created_total{flow=\"github\"} 1"));
        assert!(text.contains("oraclenet_pending_challenges{flow=\"github\"} 3"));
    }
}
