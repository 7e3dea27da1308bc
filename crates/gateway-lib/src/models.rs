//! Core data models for the gateway environment

use crate::error::{ensure_unit_sum, GatewayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Sentinel used for any class, pod or source that a label string omits
pub const GLOBAL: &str = "global";

/// Raw counter names requested from the metrics endpoint
pub mod metric {
    pub const FORWARDED_BATCHES: &str = "forwarded_batches";
    pub const DROPPED_BATCHES: &str = "dropped_batches";
    pub const FRESH_GOOD_BATCHES: &str = "fresh_good_batches";
    pub const QUEUE_LENGTH: &str = "queue_length";

    pub const DEMAND_RATE: &str = "demand_rate";
    pub const REJECTION_RATE: &str = "rejection_rate";

    pub const STARVATION_FLAG: &str = "starvation_flag";
    pub const DROP_RATIO: &str = "drop_ratio";
    pub const DROP_EXCESS: &str = "drop_excess";
    pub const STALENESS_RATIO: &str = "staleness_ratio";
    pub const QUEUE_RATIO: &str = "queue_ratio";

    /// Per-source counters for the primary observation query
    pub const PRIMARY_QUERIES: [&str; 4] =
        [FORWARDED_BATCHES, DROPPED_BATCHES, FRESH_GOOD_BATCHES, QUEUE_LENGTH];

    /// Class-level scalars merged into the class summary
    pub const CLASS_QUERIES: [&str; 2] = [DEMAND_RATE, REJECTION_RATE];
}

/// A single query result: either one scalar or a label-string keyed map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Labeled(BTreeMap<String, f64>),
}

impl MetricValue {
    /// Resolve a JSON value into a metric value
    ///
    /// Returns `None` for shapes that carry no finite number (strings that
    /// do not parse or spell NaN or infinity, booleans, null, arrays).
    /// Non-numeric entries inside a labeled map are dropped individually.
    pub fn from_json(name: &str, value: &Value) -> Option<Self> {
        match value {
            Value::Object(entries) => {
                let mut labeled = BTreeMap::new();
                for (label, raw) in entries {
                    match numeric(raw) {
                        Some(v) => {
                            labeled.insert(label.clone(), v);
                        }
                        None => {
                            debug!(metric = %name, label = %label, "Skipping non-numeric labeled value");
                        }
                    }
                }
                Some(MetricValue::Labeled(labeled))
            }
            other => numeric(other).map(MetricValue::Scalar),
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Flat response of the metrics endpoint: query name -> value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsResponse {
    pub metrics: BTreeMap<String, MetricValue>,
}

impl MetricsResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a response from the decoded JSON body
    pub fn from_json(body: &Value) -> Result<Self> {
        let Value::Object(entries) = body else {
            return Err(GatewayError::validation(format!(
                "metrics response must be a JSON object (got {})",
                json_kind(body)
            )));
        };

        let mut metrics = BTreeMap::new();
        for (name, value) in entries {
            match MetricValue::from_json(name, value) {
                Some(v) => {
                    metrics.insert(name.clone(), v);
                }
                None => debug!(metric = %name, "Skipping non-numeric metric"),
            }
        }
        Ok(Self { metrics })
    }

    pub fn with_scalar(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), MetricValue::Scalar(value));
        self
    }

    pub fn with_labeled<L, I>(mut self, name: impl Into<String>, entries: I) -> Self
    where
        L: Into<String>,
        I: IntoIterator<Item = (L, f64)>,
    {
        let map = entries.into_iter().map(|(l, v)| (l.into(), v)).collect();
        self.metrics.insert(name.into(), MetricValue::Labeled(map));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Metric values for one (class, pod, source) leaf
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeafMetrics {
    values: BTreeMap<String, f64>,
}

impl LeafMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value of `name`, or 0.0 when absent
    pub fn get_or_zero(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn starvation_flag(&self) -> f64 {
        self.get_or_zero(metric::STARVATION_FLAG)
    }

    pub fn drop_ratio(&self) -> f64 {
        self.get_or_zero(metric::DROP_RATIO)
    }

    pub fn drop_excess(&self) -> f64 {
        self.get_or_zero(metric::DROP_EXCESS)
    }

    pub fn staleness_ratio(&self) -> f64 {
        self.get_or_zero(metric::STALENESS_RATIO)
    }

    pub fn queue_ratio(&self) -> f64 {
        self.get_or_zero(metric::QUEUE_RATIO)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for LeafMetrics {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// source -> leaf metrics
pub type SourceMap = BTreeMap<String, LeafMetrics>;
/// pod -> sources
pub type PodMap = BTreeMap<String, SourceMap>;

/// Number of distinct source names across the pods of one class
pub fn count_sources(pods: &PodMap) -> usize {
    let mut names: Vec<&String> = pods.values().flat_map(|s| s.keys()).collect();
    names.sort();
    names.dedup();
    names.len()
}

/// Nested class -> pod -> source -> metrics
///
/// Branches only come into existence through [`ObservationTree::leaf_mut`],
/// so looking up a missing coordinate never creates an empty branch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationTree {
    classes: BTreeMap<String, PodMap>,
}

impl ObservationTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-insert the leaf at (class, pod, source)
    pub fn leaf_mut(&mut self, class: &str, pod: &str, source: &str) -> &mut LeafMetrics {
        self.classes
            .entry(class.to_string())
            .or_default()
            .entry(pod.to_string())
            .or_default()
            .entry(source.to_string())
            .or_default()
    }

    pub fn leaf(&self, class: &str, pod: &str, source: &str) -> Option<&LeafMetrics> {
        self.classes.get(class)?.get(pod)?.get(source)
    }

    pub fn class(&self, class: &str) -> Option<&PodMap> {
        self.classes.get(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &PodMap)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn classes_mut(&mut self) -> impl Iterator<Item = (&String, &mut PodMap)> {
        self.classes.iter_mut()
    }

    /// Insert a class with no pods (only reachable explicitly)
    pub fn insert_class(&mut self, class: impl Into<String>, pods: PodMap) {
        self.classes.insert(class.into(), pods);
    }

    /// Iterate every (class, pod, source, leaf)
    pub fn leaves(&self) -> impl Iterator<Item = (&str, &str, &str, &LeafMetrics)> {
        self.classes.iter().flat_map(|(class, pods)| {
            pods.iter().flat_map(move |(pod, sources)| {
                sources
                    .iter()
                    .map(move |(source, leaf)| (class.as_str(), pod.as_str(), source.as_str(), leaf))
            })
        })
    }

    /// Distinct source names seen under a class, across all its pods
    pub fn distinct_sources(&self, class: &str) -> usize {
        self.classes.get(class).map(count_sources).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}

/// Per-class statistics: statistic name -> value
pub type ClassStats = BTreeMap<String, f64>;

/// Flat class -> statistics mapping
pub type ClassSummary = BTreeMap<String, ClassStats>;

/// class -> pod -> source -> normalized weight
pub type UrgencyTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>;

/// Weights for the three urgency components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportanceParameters {
    pub staleness: f64,
    pub batch_loss: f64,
    pub backlog: f64,
}

impl Default for ImportanceParameters {
    fn default() -> Self {
        Self {
            staleness: 0.5,
            batch_loss: 0.3,
            backlog: 0.2,
        }
    }
}

impl ImportanceParameters {
    pub fn new(staleness: f64, batch_loss: f64, backlog: f64) -> Self {
        Self {
            staleness,
            batch_loss,
            backlog,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_unit_sum(
            "importance parameters",
            &[self.staleness, self.batch_loss, self.backlog],
        )
    }
}

/// Share of the total ingestion rate per class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassWeights(BTreeMap<String, f64>);

impl Default for ClassWeights {
    fn default() -> Self {
        [("gold", 0.5), ("silver", 0.3), ("bronze", 0.2)]
            .into_iter()
            .collect()
    }
}

impl ClassWeights {
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        Self(weights)
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(GatewayError::validation(
                "class weights must be a non-empty mapping of class to weight",
            ));
        }
        if let Some((class, w)) = self.0.iter().find(|(_, w)| **w < 0.0) {
            return Err(GatewayError::validation(format!(
                "class weight for '{}' must not be negative (got {})",
                class, w
            )));
        }
        ensure_unit_sum("class weights", self.0.values())
    }

    pub fn get(&self, class: &str) -> Option<f64> {
        self.0.get(class).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse `gold=0.5,silver=0.3` style input
    pub fn parse(input: &str) -> Result<Self> {
        let mut weights = BTreeMap::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (class, raw) = part.split_once('=').ok_or_else(|| {
                GatewayError::validation(format!("expected class=weight, got '{}'", part))
            })?;
            let weight = raw.trim().parse::<f64>().map_err(|_| {
                GatewayError::validation(format!("weight for '{}' is not a number", class.trim()))
            })?;
            weights.insert(class.trim().to_string(), weight);
        }
        Ok(Self(weights))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ClassWeights {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Capacity figures that turn ratios and weights into absolute units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// Tokens available per fill interval across all classes
    pub total_ingestion_rate: f64,
    /// Queue capacity of a class, shared by its sources
    pub class_queue_capacity: f64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            total_ingestion_rate: 1000.0,
            class_queue_capacity: 100.0,
        }
    }
}

/// class -> number of sources
pub type SourceCounts = BTreeMap<String, usize>;

/// class -> source -> tolerated drop ratio
pub type DropBudgets = BTreeMap<String, BTreeMap<String, f64>>;

/// class -> pod name -> pod IP (if scheduled)
pub type PodDirectory = BTreeMap<String, BTreeMap<String, Option<String>>>;

/// One timeliness threshold for a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloUpdate {
    pub source: String,
    pub threshold: f64,
    pub unit: String,
}

/// class -> pod -> SLO updates
pub type SloPlan = BTreeMap<String, BTreeMap<String, Vec<SloUpdate>>>;

/// class -> pod -> source -> weight
pub type WeightPlan = BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>;

/// Per-class weights and source count reported by a pod
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub weights: Option<BTreeMap<String, f64>>,
    pub num_sources: usize,
}
