//! Observation transformer
//!
//! Folds a flat metrics response into an [`ObservationTree`] and derives,
//! per leaf, the starvation flag and the drop, staleness and queue ratios.

use super::labels::parse_labels;
use crate::error::{GatewayError, Result};
use crate::models::{
    count_sources, metric, DropBudgets, LeafMetrics, MetricValue, MetricsResponse,
    ObservationTree, PodMap, SourceCounts, GLOBAL,
};
use tracing::debug;

/// Inputs that the derived ratios depend on besides the raw counters
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Queue capacity of one class, split evenly over its sources
    pub class_total_capacity: f64,
    pub source_counts: &'a SourceCounts,
    pub drop_budgets: Option<&'a DropBudgets>,
}

impl<'a> TransformContext<'a> {
    pub fn new(class_total_capacity: f64, source_counts: &'a SourceCounts) -> Self {
        Self {
            class_total_capacity,
            source_counts,
            drop_budgets: None,
        }
    }

    pub fn with_drop_budgets(mut self, budgets: &'a DropBudgets) -> Self {
        self.drop_budgets = Some(budgets);
        self
    }

    fn drop_budget(&self, class: &str, source: &str) -> Option<f64> {
        self.drop_budgets?.get(class)?.get(source).copied()
    }
}

/// Build the observation tree from a raw response
///
/// Pure: identical inputs give identical trees. Fails with a configuration
/// error when a class in the tree has no positive source count.
pub fn transform_observations(
    response: &MetricsResponse,
    ctx: &TransformContext<'_>,
) -> Result<ObservationTree> {
    if !(ctx.class_total_capacity.is_finite() && ctx.class_total_capacity > 0.0) {
        return Err(GatewayError::configuration(format!(
            "class queue capacity must be a positive number (got {})",
            ctx.class_total_capacity
        )));
    }

    let mut tree = file_raw_metrics(response);

    for (class, pods) in tree.classes_mut() {
        let per_source_capacity = per_source_capacity(class, pods, ctx)?;

        for sources in pods.values_mut() {
            for (source, leaf) in sources.iter_mut() {
                let budget = ctx.drop_budget(class, source);
                derive_ratios(leaf, per_source_capacity, budget);
            }
        }
    }

    debug!(classes = tree.len(), "Transformed observations");
    Ok(tree)
}

fn file_raw_metrics(response: &MetricsResponse) -> ObservationTree {
    let mut tree = ObservationTree::new();

    for (name, value) in &response.metrics {
        match value {
            MetricValue::Labeled(entries) => {
                for (label, raw) in entries {
                    let labels = parse_labels(label);
                    let (class, pod, source) = labels.coordinates(GLOBAL);
                    tree.leaf_mut(class, pod, source).set(name.as_str(), *raw);
                }
            }
            MetricValue::Scalar(raw) => {
                tree.leaf_mut(GLOBAL, GLOBAL, GLOBAL).set(name.as_str(), *raw);
            }
        }
    }

    tree
}

fn per_source_capacity(
    class: &str,
    pods: &PodMap,
    ctx: &TransformContext<'_>,
) -> Result<f64> {
    let configured = ctx.source_counts.get(class).copied();

    let num_sources = match configured {
        Some(n) if n > 0 => n,
        // The sentinel class is never configured; size it by what was observed
        None if class == GLOBAL => count_sources(pods).max(1),
        Some(_) => {
            return Err(GatewayError::configuration(format!(
                "class '{}' has zero sources configured; cannot compute queue capacity",
                class
            )))
        }
        None => {
            return Err(GatewayError::configuration(format!(
                "no source count known for class '{}'",
                class
            )))
        }
    };

    Ok(ctx.class_total_capacity / num_sources as f64)
}

fn derive_ratios(leaf: &mut LeafMetrics, per_source_capacity: f64, drop_budget: Option<f64>) {
    let queue_length = leaf.get_or_zero(metric::QUEUE_LENGTH);
    let forwarded = leaf.get_or_zero(metric::FORWARDED_BATCHES);
    let dropped = leaf.get_or_zero(metric::DROPPED_BATCHES);
    let fresh_good = leaf.get_or_zero(metric::FRESH_GOOD_BATCHES);

    let starving = queue_length > 0.0 && forwarded < 1.0;
    leaf.set(metric::STARVATION_FLAG, if starving { 1.0 } else { 0.0 });

    let offered = forwarded + dropped;
    let drop_ratio = if offered != 0.0 { dropped / offered } else { 0.0 };
    leaf.set(metric::DROP_RATIO, drop_ratio);

    let drop_excess = match drop_budget {
        Some(budget) => (drop_ratio - budget).max(0.0),
        None => drop_ratio,
    };
    leaf.set(metric::DROP_EXCESS, drop_excess);

    let staleness_ratio = if forwarded != 0.0 {
        1.0 - fresh_good / forwarded
    } else {
        1.0
    };
    leaf.set(metric::STALENESS_RATIO, staleness_ratio);

    leaf.set(metric::QUEUE_RATIO, queue_length / per_source_capacity);
}
