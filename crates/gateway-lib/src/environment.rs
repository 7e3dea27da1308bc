//! Gateway environment
//!
//! Owns the latest observation tree and the control state (class weights,
//! importance parameters, source counts, SLO plan) and exposes the
//! observation and action primitives an external policy calls each cycle.
//!
//! Calls are made one after another; nothing here fans out in parallel.

use crate::actuator::{
    first_pod_ip, push_each, token_plan, PushReport, RateLimitReport, TrafficPolicyPatcher,
};
use crate::error::{GatewayError, Result};
use crate::models::{
    metric, CapacityConfig, ClassInfo, ClassSummary, ClassWeights, DropBudgets, ImportanceParameters,
    MetricsResponse, ObservationTree, PodDirectory, SloPlan, SourceCounts, UrgencyTree,
    WeightPlan,
};
use crate::observability::{EnvMetrics, StructuredLogger};
use crate::observation::{aggregate_class_metrics, transform_observations, TransformContext};
use crate::scoring::compute_urgency;
use crate::settings::Settings;
use crate::transport::{build_http_client, MetricsClient, PodClient};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub const ENVIRONMENT_NAME: &str = "observability-gateway";

/// Observation and control surface for one tiered ingestion gateway
pub struct GatewayEnvironment {
    settings: Settings,
    metrics_client: MetricsClient,
    pod_client: PodClient,
    patcher: Arc<dyn TrafficPolicyPatcher>,
    capacity: CapacityConfig,

    observations: ObservationTree,
    class_weights: ClassWeights,
    importance: ImportanceParameters,
    source_counts: SourceCounts,
    drop_budgets: DropBudgets,
    pods: PodDirectory,
    timeliness_slo: SloPlan,

    metrics: EnvMetrics,
    logger: StructuredLogger,
}

impl GatewayEnvironment {
    /// Create an environment from settings and a TrafficPolicy patcher
    ///
    /// Fails with a validation error when the settings carry an out-of-range
    /// drop budget.
    pub fn new(settings: Settings, patcher: Arc<dyn TrafficPolicyPatcher>) -> Result<Self> {
        settings.validate()?;

        let http = build_http_client(settings.request_timeout())?;
        let metrics_client = MetricsClient::new(http.clone(), &settings.metrics_endpoint)?;
        let pod_client = PodClient::new(http, settings.pod_port);

        info!(
            metrics_endpoint = %metrics_client.observations_url(),
            pod_port = settings.pod_port,
            timeout_secs = settings.request_timeout_secs,
            "Gateway environment configured"
        );

        Ok(Self {
            metrics_client,
            pod_client,
            patcher,
            capacity: settings.capacity(),
            observations: ObservationTree::new(),
            class_weights: settings.class_weights.clone(),
            importance: settings.importance,
            source_counts: settings.source_counts.clone(),
            drop_budgets: settings.drop_budgets.clone(),
            pods: settings.pods.clone(),
            timeliness_slo: SloPlan::new(),
            metrics: EnvMetrics::new(),
            logger: StructuredLogger::new(ENVIRONMENT_NAME),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ingestion rate and queue capacity used for tokens and queue ratios
    pub fn capacity(&self) -> &CapacityConfig {
        &self.capacity
    }

    /// Tree produced by the most recent observation cycle
    pub fn observations(&self) -> &ObservationTree {
        &self.observations
    }

    pub fn class_weights(&self) -> &ClassWeights {
        &self.class_weights
    }

    pub fn importance(&self) -> &ImportanceParameters {
        &self.importance
    }

    /// Replace the importance parameters; they are validated on the next scoring pass
    pub fn set_importance(&mut self, importance: ImportanceParameters) {
        self.importance = importance;
    }

    pub fn source_counts(&self) -> &SourceCounts {
        &self.source_counts
    }

    pub fn pods(&self) -> &PodDirectory {
        &self.pods
    }

    pub fn set_pods(&mut self, pods: PodDirectory) {
        self.pods = pods;
    }

    pub fn timeliness_slo(&self) -> &SloPlan {
        &self.timeliness_slo
    }

    pub fn metrics(&self) -> &EnvMetrics {
        &self.metrics
    }

    /// Fetch, transform and aggregate one observation cycle
    ///
    /// The new tree replaces the previous one. A failed fetch degrades to an
    /// empty response (logged and counted). A malformed response body or a
    /// missing source count aborts the cycle and leaves the previous tree in
    /// place.
    pub async fn get_observations(&mut self, window_minutes: u32) -> Result<ClassSummary> {
        let started = Instant::now();

        let primary = self
            .fetch_or_degrade(&metric::PRIMARY_QUERIES, window_minutes)
            .await?;

        let ctx = TransformContext::new(self.capacity.class_queue_capacity, &self.source_counts)
            .with_drop_budgets(&self.drop_budgets);
        let tree = transform_observations(&primary, &ctx)?;

        let class_level = self
            .fetch_or_degrade(&metric::CLASS_QUERIES, window_minutes)
            .await?;
        let summary = aggregate_class_metrics(&tree, &class_level);

        let leaves = tree.leaves().count();
        self.logger
            .log_observation_cycle(window_minutes, tree.len(), leaves);
        self.metrics
            .record_cycle(tree.len(), started.elapsed().as_secs_f64());
        self.observations = tree;

        Ok(summary)
    }

    /// Transport failures degrade to an empty response; a body of the wrong
    /// shape is a validation error and aborts the cycle.
    async fn fetch_or_degrade(&self, queries: &[&str], window_minutes: u32) -> Result<MetricsResponse> {
        match self.metrics_client.fetch(queries, window_minutes).await {
            Ok(response) => Ok(response),
            Err(GatewayError::Transport(e)) => {
                self.logger.log_observation_degraded(queries, &e.to_string());
                self.metrics.inc_degraded_fetches();
                Ok(MetricsResponse::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Softmax-normalized urgency per source within each pod
    pub fn compute_source_weights(&self) -> Result<UrgencyTree> {
        compute_urgency(&self.observations, &self.importance)
    }

    /// Validate class weights, store them and patch each class's TrafficPolicy
    ///
    /// Validation failures abort before anything is stored or patched. A
    /// failed patch is reported for its class and the remaining classes are
    /// still patched.
    pub async fn apply_rate_limits(&mut self, weights: ClassWeights) -> Result<RateLimitReport> {
        let plan = token_plan(&weights, self.capacity.total_ingestion_rate)?;

        self.logger
            .log_class_weights_updated(&weights.iter().map(|(c, w)| (c.to_string(), w)).collect());
        self.class_weights = weights;

        let mut report = RateLimitReport::new();
        for (class, tokens) in plan {
            match self.patcher.patch_token_bucket(&class, tokens).await {
                Ok(()) => {
                    self.logger.log_rate_limit_applied(&class, tokens);
                    report.insert(class, Ok(tokens));
                }
                Err(e) => {
                    self.logger
                        .log_actuation_failed("rate_limit", &class, &e.to_string());
                    self.metrics.inc_actuation_failures("rate_limit");
                    report.insert(class, Err(e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Query one pod per class for its weights and source count
    ///
    /// A reported source count replaces the stored one. Classes without a
    /// reachable pod keep their last known count.
    pub async fn fetch_class_info(&mut self) -> BTreeMap<String, ClassInfo> {
        let mut results = BTreeMap::new();

        let classes: Vec<String> = self.pods.keys().cloned().collect();
        for class in classes {
            let known = self.source_counts.get(&class).copied().unwrap_or(0);

            let Some(ip) = first_pod_ip(&self.pods, &class).map(str::to_string) else {
                debug!(class = %class, "No pod with an IP, keeping last known source count");
                results.insert(class, ClassInfo { weights: None, num_sources: known });
                continue;
            };

            match self.pod_client.status(&ip).await {
                Ok(status) => {
                    if let Some(n) = status.num_sources {
                        self.source_counts.insert(class.clone(), n);
                    }
                    let num_sources = status.num_sources.unwrap_or(known);
                    results.insert(
                        class,
                        ClassInfo {
                            weights: status.weights,
                            num_sources,
                        },
                    );
                }
                Err(e) => {
                    self.logger
                        .log_actuation_failed("class_info", &class, &e.to_string());
                    self.metrics.inc_actuation_failures("class_info");
                    results.insert(class, ClassInfo { weights: None, num_sources: known });
                }
            }
        }

        results
    }

    /// POST per-source weights to each pod in the plan
    ///
    /// A pod that accepts its weights sets its class's source count to the
    /// number of sources pushed.
    pub async fn push_weights_to_pods(&mut self, plan: &WeightPlan) -> PushReport {
        let client = &self.pod_client;
        let source_counts = &mut self.source_counts;

        let report = push_each(
            &self.pods,
            plan,
            move |ip, weights| async move { client.update_weights(&ip, weights).await },
            |class, weights| {
                source_counts.insert(class.to_string(), weights.len());
            },
        )
        .await;

        self.record_push("weights", &report);
        report
    }

    /// Store a new SLO plan and push it to the pods it names
    pub async fn set_timeliness_slo(&mut self, plan: SloPlan) -> Result<PushReport> {
        if let Some((target, update)) = plan.iter().find_map(|(class, pods)| {
            pods.iter().find_map(|(pod, updates)| {
                updates
                    .iter()
                    .find(|u| !u.threshold.is_finite() || u.threshold < 0.0)
                    .map(|u| (format!("{}/{}", class, pod), u))
            })
        }) {
            return Err(GatewayError::validation(format!(
                "SLO threshold for source '{}' on {} must be a non-negative number (got {})",
                update.source, target, update.threshold
            )));
        }

        let pods: usize = plan.values().map(|p| p.len()).sum();
        self.logger.log_slo_plan_updated(plan.len(), pods);
        self.timeliness_slo = plan;

        Ok(self.push_slos_to_pods().await)
    }

    /// Push the stored SLO plan to every pod it names
    pub async fn push_slos_to_pods(&self) -> PushReport {
        let client = &self.pod_client;
        let report = push_each(
            &self.pods,
            &self.timeliness_slo,
            move |ip, updates| async move { client.update_slos(&ip, updates).await },
            |_, _| {},
        )
        .await;

        self.record_push("slo", &report);
        report
    }

    fn record_push(&self, kind: &str, report: &PushReport) {
        for (target, error) in &report.failed {
            self.logger.log_actuation_failed(kind, target, error);
            self.metrics.inc_actuation_failures(kind);
        }
        info!(
            kind = %kind,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Pod push finished"
        );
    }
}
