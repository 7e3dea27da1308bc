//! Environment settings
//!
//! Loaded from an optional file plus `GWENV_*` environment variables
//! (nested keys separated by `__`, e.g. `GWENV_IMPORTANCE__BACKLOG=0.3`).

use crate::error::{GatewayError, Result};
use crate::models::{
    CapacityConfig, ClassWeights, DropBudgets, ImportanceParameters, PodDirectory, SourceCounts,
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for one gateway environment instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the metrics proxy
    pub metrics_endpoint: String,

    /// Port pods listen on for weight and SLO updates
    pub pod_port: u16,

    /// Timeout applied to every outbound HTTP call
    pub request_timeout_secs: u64,

    /// Lookback window for observation queries
    pub window_minutes: u32,

    pub total_ingestion_rate: f64,
    pub class_queue_capacity: f64,

    /// Namespace holding one TrafficPolicy per class
    pub traffic_policy_namespace: String,

    pub importance: ImportanceParameters,
    pub class_weights: ClassWeights,
    pub source_counts: SourceCounts,
    pub drop_budgets: DropBudgets,
    pub pods: PodDirectory,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            metrics_endpoint: "http://127.0.0.1:8000".to_string(),
            pod_port: 4500,
            request_timeout_secs: 30,
            window_minutes: 5,
            total_ingestion_rate: 1000.0,
            class_queue_capacity: 100.0,
            traffic_policy_namespace: "observability-ingress".to_string(),
            importance: ImportanceParameters::default(),
            class_weights: ClassWeights::default(),
            source_counts: SourceCounts::new(),
            drop_budgets: DropBudgets::new(),
            pods: PodDirectory::new(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the environment
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("GWENV")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Check values the type system cannot: every drop budget lies in [0, 1]
    pub fn validate(&self) -> Result<()> {
        for (class, budgets) in &self.drop_budgets {
            if let Some((source, budget)) = budgets
                .iter()
                .find(|(_, b)| !(b.is_finite() && (0.0..=1.0).contains(*b)))
            {
                return Err(GatewayError::validation(format!(
                    "drop budget for {}/{} must be between 0 and 1 (got {})",
                    class, source, budget
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn capacity(&self) -> CapacityConfig {
        CapacityConfig {
            total_ingestion_rate: self.total_ingestion_rate,
            class_queue_capacity: self.class_queue_capacity,
        }
    }
}
