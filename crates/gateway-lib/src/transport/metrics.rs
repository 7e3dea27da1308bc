//! Client for the metrics proxy's observation endpoint

use super::{join_url, send_json};
use crate::error::{GatewayError, Result, TransportError};
use crate::models::MetricsResponse;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize)]
struct ObservationQuery<'a> {
    queries: &'a [&'a str],
    window_minutes: u32,
}

/// Queries windowed counters from the metrics proxy
#[derive(Debug, Clone)]
pub struct MetricsClient {
    client: Client,
    observations_url: Url,
}

impl MetricsClient {
    pub fn new(client: Client, metrics_endpoint: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client,
            observations_url: join_url(metrics_endpoint, "observations")?,
        })
    }

    pub fn observations_url(&self) -> &Url {
        &self.observations_url
    }

    /// POST `queries` over the given window and decode the response
    ///
    /// An empty body is treated as an empty response. A body that is not a
    /// JSON object is a validation error.
    pub async fn fetch(&self, queries: &[&str], window_minutes: u32) -> Result<MetricsResponse> {
        let url = &self.observations_url;
        let request = ObservationQuery {
            queries,
            window_minutes,
        };

        debug!(url = %url, queries = ?queries, window_minutes, "Fetching observations");
        let response = send_json(&self.client, url, &request).await?;

        let bytes = response.bytes().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(MetricsResponse::new());
        }

        let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
            GatewayError::from(TransportError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
        })?;
        MetricsResponse::from_json(&body)
    }
}
