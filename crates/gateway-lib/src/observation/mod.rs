//! Observation pipeline
//!
//! Turns the flat, label-encoded metrics response into a class -> pod ->
//! source tree with derived ratios, and reduces that tree to class-level
//! summaries.

mod aggregate;
mod labels;
mod transform;


pub use aggregate::{
    aggregate_class_metrics, AVG_DROP_RATIO, AVG_QUEUE_RATIO, AVG_STALENESS_RATIO,
    AVG_STARVATION_FLAG, MAX_DROP_RATIO, MAX_QUEUE_RATIO, MAX_STALENESS_RATIO,
    MAX_STARVATION_FLAG,
};
pub use labels::{parse_class, parse_labels, LabelSet};
pub use transform::{transform_observations, TransformContext};
