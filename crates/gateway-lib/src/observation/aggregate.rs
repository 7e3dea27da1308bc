//! Class-level aggregation
//!
//! Reduces an observation tree to averages and maxima per class, then merges
//! in class-level scalars such as demand and rejection rate.

use super::labels::parse_class;
use crate::models::{ClassStats, ClassSummary, MetricValue, MetricsResponse, ObservationTree};

pub const AVG_QUEUE_RATIO: &str = "avg_queue_ratio";
pub const AVG_DROP_RATIO: &str = "avg_drop_ratio";
pub const AVG_STALENESS_RATIO: &str = "avg_staleness_ratio";
pub const AVG_STARVATION_FLAG: &str = "avg_starvation_flag";
pub const MAX_QUEUE_RATIO: &str = "max_queue_ratio";
pub const MAX_DROP_RATIO: &str = "max_drop_ratio";
pub const MAX_STALENESS_RATIO: &str = "max_staleness_ratio";
pub const MAX_STARVATION_FLAG: &str = "max_starvation_flag";

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    queue_sum: f64,
    drop_sum: f64,
    stale_sum: f64,
    starvation_sum: f64,
    queue_max: f64,
    drop_max: f64,
    stale_max: f64,
    starvation_max: f64,
}

impl Accumulator {
    fn add(&mut self, queue: f64, drop: f64, stale: f64, starvation: f64) {
        self.count += 1;
        self.queue_sum += queue;
        self.drop_sum += drop;
        self.stale_sum += stale;
        self.starvation_sum += starvation;
        self.queue_max = self.queue_max.max(queue);
        self.drop_max = self.drop_max.max(drop);
        self.stale_max = self.stale_max.max(stale);
        self.starvation_max = self.starvation_max.max(starvation);
    }

    fn into_stats(self) -> ClassStats {
        let avg = |sum: f64| {
            if self.count == 0 {
                0.0
            } else {
                sum / self.count as f64
            }
        };

        ClassStats::from([
            (AVG_QUEUE_RATIO.to_string(), avg(self.queue_sum)),
            (AVG_DROP_RATIO.to_string(), avg(self.drop_sum)),
            (AVG_STALENESS_RATIO.to_string(), avg(self.stale_sum)),
            (AVG_STARVATION_FLAG.to_string(), avg(self.starvation_sum)),
            (MAX_QUEUE_RATIO.to_string(), self.queue_max),
            (MAX_DROP_RATIO.to_string(), self.drop_max),
            (MAX_STALENESS_RATIO.to_string(), self.stale_max),
            (MAX_STARVATION_FLAG.to_string(), self.starvation_max),
        ])
    }
}

/// Summarize the tree per class and merge class-level scalars
///
/// Maxima start at 0.0, so a class without leaves summarizes to all zeros.
/// Classes that only appear in `class_metrics` get an entry holding just
/// those scalars.
pub fn aggregate_class_metrics(
    tree: &ObservationTree,
    class_metrics: &MetricsResponse,
) -> ClassSummary {
    let mut summary = ClassSummary::new();

    for (class, pods) in tree.classes() {
        let mut acc = Accumulator::default();
        for leaf in pods.values().flat_map(|sources| sources.values()) {
            acc.add(
                leaf.queue_ratio(),
                leaf.drop_ratio(),
                leaf.staleness_ratio(),
                leaf.starvation_flag(),
            );
        }
        summary.insert(class.to_string(), acc.into_stats());
    }

    for (name, value) in &class_metrics.metrics {
        // Scalars carry no class attribution
        let MetricValue::Labeled(entries) = value else {
            continue;
        };
        for (label, v) in entries {
            if let Some(class) = parse_class(label) {
                summary.entry(class).or_default().insert(name.clone(), *v);
            }
        }
    }

    summary
}
