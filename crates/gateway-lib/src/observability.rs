//! Observability infrastructure for the gateway environment
//!
//! Provides:
//! - Prometheus metrics (observation cycles, degraded fetches, actuation failures)
//! - Structured logging of control events with tracing

use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Prometheus metrics owned by one environment instance
///
/// Metrics live in their own [`Registry`] rather than the process-wide
/// default one, so several environments in one process do not collide.
#[derive(Clone)]
pub struct EnvMetrics {
    registry: Registry,
    observation_cycles: IntCounter,
    degraded_fetches: IntCounter,
    actuation_failures: IntCounterVec,
    classes_observed: IntGauge,
    last_cycle_seconds: Gauge,
}

impl Default for EnvMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvMetrics {
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("gateway_env".to_string()), None)
            .expect("Failed to create metrics registry");

        let observation_cycles =
            IntCounter::new("observation_cycles_total", "Completed observation cycles")
                .expect("Failed to create observation_cycles_total");

        let degraded_fetches = IntCounter::new(
            "degraded_fetches_total",
            "Metrics fetches that failed and were replaced by an empty response",
        )
        .expect("Failed to create degraded_fetches_total");

        let actuation_failures = IntCounterVec::new(
            Opts::new("actuation_failures_total", "Failed per-target actuation calls"),
            &["kind"],
        )
        .expect("Failed to create actuation_failures_total");

        let classes_observed = IntGauge::new(
            "classes_observed",
            "Classes present in the latest observation tree",
        )
        .expect("Failed to create classes_observed");

        let last_cycle_seconds = Gauge::new(
            "last_cycle_seconds",
            "Wall time of the latest observation cycle",
        )
        .expect("Failed to create last_cycle_seconds");

        registry
            .register(Box::new(observation_cycles.clone()))
            .expect("Failed to register observation_cycles_total");
        registry
            .register(Box::new(degraded_fetches.clone()))
            .expect("Failed to register degraded_fetches_total");
        registry
            .register(Box::new(actuation_failures.clone()))
            .expect("Failed to register actuation_failures_total");
        registry
            .register(Box::new(classes_observed.clone()))
            .expect("Failed to register classes_observed");
        registry
            .register(Box::new(last_cycle_seconds.clone()))
            .expect("Failed to register last_cycle_seconds");

        Self {
            registry,
            observation_cycles,
            degraded_fetches,
            actuation_failures,
            classes_observed,
            last_cycle_seconds,
        }
    }

    /// Record a finished observation cycle
    pub fn record_cycle(&self, classes: usize, duration_secs: f64) {
        self.observation_cycles.inc();
        self.classes_observed.set(classes as i64);
        self.last_cycle_seconds.set(duration_secs);
    }

    pub fn inc_degraded_fetches(&self) {
        self.degraded_fetches.inc();
    }

    /// Count a failed call of the given kind (`rate_limit`, `weights`, `slo`, `class_info`)
    pub fn inc_actuation_failures(&self, kind: &str) {
        self.actuation_failures.with_label_values(&[kind]).inc();
    }

    pub fn observation_cycles(&self) -> u64 {
        self.observation_cycles.get()
    }

    pub fn degraded_fetches(&self) -> u64 {
        self.degraded_fetches.get()
    }

    pub fn actuation_failures(&self, kind: &str) -> u64 {
        self.actuation_failures.with_label_values(&[kind]).get()
    }

    /// Text exposition of every metric in this registry
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for control events
///
/// Every event carries an `event` field and the environment name so logs
/// from several gateways can be told apart.
#[derive(Clone)]
pub struct StructuredLogger {
    environment: String,
}

impl StructuredLogger {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }

    pub fn log_observation_cycle(&self, window_minutes: u32, classes: usize, leaves: usize) {
        info!(
            event = "observation_cycle",
            environment = %self.environment,
            window_minutes = window_minutes,
            classes = classes,
            leaves = leaves,
            "Observation cycle completed"
        );
    }

    /// A fetch failed and its response was replaced by an empty one
    pub fn log_observation_degraded(&self, queries: &[&str], error: &str) {
        warn!(
            event = "observation_degraded",
            environment = %self.environment,
            queries = ?queries,
            error = %error,
            "Metrics fetch failed, continuing with empty observations"
        );
    }

    pub fn log_class_weights_updated(&self, weights: &BTreeMap<String, f64>) {
        info!(
            event = "class_weights_updated",
            environment = %self.environment,
            weights = ?weights,
            "Updated class weights"
        );
    }

    pub fn log_rate_limit_applied(&self, class: &str, tokens: u64) {
        info!(
            event = "rate_limit_applied",
            environment = %self.environment,
            class = %class,
            tokens = tokens,
            "Patched TrafficPolicy"
        );
    }

    pub fn log_slo_plan_updated(&self, classes: usize, pods: usize) {
        info!(
            event = "slo_plan_updated",
            environment = %self.environment,
            classes = classes,
            pods = pods,
            "Timeliness SLOs updated"
        );
    }

    /// A single class or pod could not be updated; the batch continues
    pub fn log_actuation_failed(&self, kind: &str, target: &str, error: &str) {
        warn!(
            event = "actuation_failed",
            environment = %self.environment,
            kind = %kind,
            target = %target,
            error = %error,
            "Actuation failed"
        );
    }
}
