//! Urgency scoring
//!
//! Each leaf gets a convex combination of its staleness, drop and queue
//! ratios. Scores are then softmax-normalized across the sources of each
//! pod, so a pod's weights sum to one and the most pathological source
//! gets the largest share.

use crate::error::Result;
use crate::models::{ImportanceParameters, LeafMetrics, ObservationTree, UrgencyTree};
use std::collections::BTreeMap;

/// Weighted urgency of a single leaf (higher is worse)
pub fn raw_score(params: &ImportanceParameters, leaf: &LeafMetrics) -> f64 {
    params.staleness * leaf.staleness_ratio()
        + params.batch_loss * leaf.drop_ratio()
        + params.backlog * leaf.queue_ratio()
}

/// Numerically stable softmax over a map of scores
///
/// Subtracts the maximum before exponentiating. An empty input gives an
/// empty output.
pub fn softmax(scores: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    if scores.is_empty() {
        return BTreeMap::new();
    }

    let max_score = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: BTreeMap<&String, f64> = scores
        .iter()
        .map(|(k, v)| (k, (v - max_score).exp()))
        .collect();

    let mut denom: f64 = exps.values().sum();
    if denom == 0.0 {
        denom = 1.0;
    }

    exps.into_iter()
        .map(|(k, e)| (k.clone(), e / denom))
        .collect()
}

/// Score every pod of the tree
///
/// Validates `params` first; nothing is computed when they do not sum to
/// one. Pods without sources map to an empty set of weights.
pub fn compute_urgency(tree: &ObservationTree, params: &ImportanceParameters) -> Result<UrgencyTree> {
    params.validate()?;

    let mut urgency = UrgencyTree::new();
    for (class, pods) in tree.classes() {
        let class_entry = urgency.entry(class.to_string()).or_default();
        for (pod, sources) in pods {
            let scores: BTreeMap<String, f64> = sources
                .iter()
                .map(|(source, leaf)| (source.clone(), raw_score(params, leaf)))
                .collect();
            class_entry.insert(pod.clone(), softmax(&scores));
        }
    }

    Ok(urgency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{metric, PodMap};

    fn leaf(stale: f64, drop: f64, queue: f64) -> LeafMetrics {
        [
            (metric::STALENESS_RATIO, stale),
            (metric::DROP_RATIO, drop),
            (metric::QUEUE_RATIO, queue),
        ]
        .into_iter()
        .collect()
    }

    fn scores(values: &[(&str, f64)]) -> BTreeMap<String, f64> {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_raw_score_is_convex_combination() {
        let params = ImportanceParameters::new(0.5, 0.3, 0.2);
        let score = raw_score(&params, &leaf(0.8, 0.4, 0.1));
        assert!((score - (0.4 + 0.12 + 0.02)).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&scores(&[("a", 0.0), ("b", 1.0), ("c", -2.0)]));
        let s: f64 = p.values().sum();
        assert!((s - 1.0).abs() < 1e-9);
        assert!(p["b"] > p["a"] && p["a"] > p["c"]);
    }

    #[test]
    fn test_softmax_large_scores_do_not_overflow() {
        let p = softmax(&scores(&[("a", 1000.0), ("b", 1000.0001)]));
        let s: f64 = p.values().sum();
        assert!((s - 1.0).abs() < 1e-6);
        assert!(p.values().all(|v| v.is_finite() && *v > 0.0));
        assert!(p["b"] > p["a"]);
    }

    #[test]
    fn test_softmax_single_and_empty() {
        let p = softmax(&scores(&[("only", 42.0)]));
        assert_eq!(p["only"], 1.0);
        assert!(softmax(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_invalid_params_abort_scoring() {
        let mut tree = ObservationTree::new();
        *tree.leaf_mut("gold", "p1", "s1") = leaf(1.0, 0.0, 0.0);

        let err = compute_urgency(&tree, &ImportanceParameters::new(0.5, 0.3, 0.3)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_urgency_per_pod() {
        let mut tree = ObservationTree::new();
        *tree.leaf_mut("gold", "p1", "s1") = leaf(1.0, 0.5, 0.2);
        *tree.leaf_mut("gold", "p1", "s2") = leaf(0.1, 0.0, 0.0);
        *tree.leaf_mut("gold", "p2", "s1") = leaf(0.3, 0.3, 0.3);
        tree.insert_class("bronze", PodMap::from([("idle".to_string(), Default::default())]));

        let urgency = compute_urgency(&tree, &ImportanceParameters::default()).unwrap();

        let p1 = &urgency["gold"]["p1"];
        assert!(p1["s1"] > p1["s2"]);
        assert!((p1.values().sum::<f64>() - 1.0).abs() < 1e-6);
        assert_eq!(urgency["gold"]["p2"]["s1"], 1.0);
        assert!(urgency["bronze"]["idle"].is_empty());
    }

    #[test]
    fn test_nan_strings_keep_pod_weights_normalized() {
        use crate::models::{MetricsResponse, SourceCounts};
        use crate::observation::{transform_observations, TransformContext};

        let body = serde_json::json!({
            "forwarded_batches": {
                "class=gold,pod=p1,source=s1": "NaN",
                "class=gold,pod=p1,source=s2": 10
            },
            "queue_length": {
                "class=gold,pod=p1,source=s1": 1,
                "class=gold,pod=p1,source=s2": 1
            }
        });
        let response = MetricsResponse::from_json(&body).unwrap();
        let counts = SourceCounts::from([("gold".to_string(), 2)]);
        let tree = transform_observations(&response, &TransformContext::new(100.0, &counts)).unwrap();

        let s1 = tree.leaf("gold", "p1", "s1").unwrap();
        assert_eq!(s1.staleness_ratio(), 1.0);
        assert!((0.0..=1.0).contains(&s1.drop_ratio()));

        let urgency = compute_urgency(&tree, &ImportanceParameters::default()).unwrap();
        let pod = &urgency["gold"]["p1"];
        assert!(pod.values().all(|w| w.is_finite()));
        assert!((pod.values().sum::<f64>() - 1.0).abs() < 1e-6);
    }
}
