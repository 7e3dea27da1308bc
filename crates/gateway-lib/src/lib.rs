//! Feedback-control environment for a tiered traffic-ingestion gateway
//!
//! This crate provides:
//! - Label parsing and the observation transformer (class -> pod -> source tree)
//! - Class-level aggregation and softmax urgency scoring
//! - HTTP clients for the metrics proxy and gateway pods
//! - Rate-limit and pod actuators
//! - Settings, structured logging and Prometheus metrics

pub mod actuator;
pub mod environment;
pub mod error;
pub mod models;
pub mod observability;
pub mod observation;
pub mod scoring;
pub mod settings;
pub mod transport;

pub use environment::GatewayEnvironment;
pub use error::{GatewayError, Result, TransportError};
pub use models::*;
pub use observability::{EnvMetrics, StructuredLogger};
pub use settings::Settings;
