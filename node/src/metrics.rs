//! # Prometheus Metrics
//!
//! Operational metrics for the ledger node, scraped at `/metrics` on the
//! configured metrics port. Everything lives in a dedicated
//! [`prometheus::Registry`] under the `rebase` namespace.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use rebase_protocol::math::SCALE;
use rebase_protocol::{Amount, Rate};

/// Holds all Prometheus metric handles for the node.
///
/// Prometheus handles are reference counted, so cloning is cheap.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Successful vault deposits.
    pub deposits_total: IntCounter,
    /// Successful vault redeems.
    pub redeems_total: IntCounter,
    /// Bridge messages produced by `send`.
    pub bridge_sent_total: IntCounter,
    /// Bridge messages applied by `receive`.
    pub bridge_received_total: IntCounter,
    /// Refused operations, labelled by failure kind.
    pub rejected_operations_total: IntCounterVec,
    /// Current global rate, per second, as a fraction (rate / 1e18).
    pub global_rate: Gauge,
    /// Total principal in whole tokens (supply / 1e18).
    pub total_supply: Gauge,
    /// Time spent inside a state-mutating request, lock included.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("rebase".into()), None)?;

        let deposits_total = IntCounter::new("deposits_total", "Successful vault deposits")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let redeems_total = IntCounter::new("redeems_total", "Successful vault redeems")?;
        registry.register(Box::new(redeems_total.clone()))?;

        let bridge_sent_total =
            IntCounter::new("bridge_sent_total", "Cross-chain messages sent")?;
        registry.register(Box::new(bridge_sent_total.clone()))?;

        let bridge_received_total =
            IntCounter::new("bridge_received_total", "Cross-chain messages applied")?;
        registry.register(Box::new(bridge_received_total.clone()))?;

        let rejected_operations_total = IntCounterVec::new(
            Opts::new(
                "rejected_operations_total",
                "Operations refused by the ledger or an adapter",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(rejected_operations_total.clone()))?;

        let global_rate = Gauge::new(
            "global_rate",
            "Per-second rate new deposits receive, as a fraction",
        )?;
        registry.register(Box::new(global_rate.clone()))?;

        let total_supply = Gauge::new("total_supply", "Total principal in whole tokens")?;
        registry.register(Box::new(total_supply.clone()))?;

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Latency of state-mutating API operations in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            deposits_total,
            redeems_total,
            bridge_sent_total,
            bridge_received_total,
            rejected_operations_total,
            global_rate,
            total_supply,
            operation_latency_seconds,
        })
    }

    /// Refreshes the two ledger gauges.
    pub fn observe_ledger(&self, global_rate: Rate, total_supply: Amount) {
        self.global_rate.set(global_rate as f64 / SCALE as f64);
        self.total_supply.set(total_supply as f64 / SCALE as f64);
    }

    /// Counts a refused operation under `kind`.
    pub fn reject(&self, kind: &str) {
        self.rejected_operations_total.with_label_values(&[kind]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
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
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_uses_namespace() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.deposits_total.inc();
        metrics.reject("authorization");
        metrics.observe_ledger(50_000_000_000, 3 * SCALE);

        let text = metrics.encode().unwrap();
        assert!(text.contains("rebase_deposits_total 1"));
        assert!(text.contains("rebase_rejected_operations_total{kind=\"authorization\"} 1"));
        assert!(text.contains("rebase_total_supply 3"));
    }
}
