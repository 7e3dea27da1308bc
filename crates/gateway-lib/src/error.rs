//! Error types for the gateway environment
//!
//! Validation and configuration failures abort an operation before any
//! side effect. Transport failures are returned per call so the caller can
//! decide whether to continue with the next class or pod.

use thiserror::Error;

/// Tolerance used when checking that a weight vector sums to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Top-level error for environment operations
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Weight or parameter sums off tolerance, malformed input shape
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing source count or capacity needed for a ratio
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Metrics fetch, pod push or resource patch failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Failure of a single outbound call
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("failed to patch {resource}: {source}")]
    Kube {
        resource: String,
        #[source]
        source: kube::Error,
    },

    /// No Kubernetes client could be built from the available kubeconfig
    #[error("kubernetes client unavailable: {0}")]
    KubeClient(String),

    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Check that `values` sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`]
pub fn ensure_unit_sum<'a>(
    what: &str,
    values: impl IntoIterator<Item = &'a f64>,
) -> Result<()> {
    let mut total = 0.0;
    for value in values {
        if !value.is_finite() {
            return Err(GatewayError::validation(format!(
                "{} must be finite numbers (got {})",
                what, value
            )));
        }
        total += *value;
    }

    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(GatewayError::validation(format!(
            "{} must sum to 1.0 (got {})",
            what, total
        )));
    }
    Ok(())
}
