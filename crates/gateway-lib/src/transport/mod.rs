//! HTTP transport to the metrics proxy and to gateway pods
//!
//! All calls share one `reqwest` client built with the configured request
//! timeout. Each call returns its own `Result` so batch callers can isolate
//! failures per target.

mod metrics;
mod pods;

pub use metrics::MetricsClient;
pub use pods::{PodClient, PodStatus};

use crate::error::TransportError;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Build the HTTP client used for every outbound call
pub fn build_http_client(timeout: Duration) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(TransportError::Client)
}

/// Absolute URL of a pod-local endpoint
///
/// A path without a leading slash gets one.
pub fn pod_url(pod_ip: &str, port: u16, path: &str) -> Result<Url, TransportError> {
    if pod_ip.trim().is_empty() {
        return Err(TransportError::InvalidUrl("pod IP is required".to_string()));
    }
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    let raw = format!("http://{}:{}{}", pod_ip.trim(), port, path);
    Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", raw, e)))
}

/// Join `path` onto a base URL, treating the base as a directory
pub fn join_url(base: &str, path: &str) -> Result<Url, TransportError> {
    let mut base = Url::parse(base).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base, e)))?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", path, e)))
}

async fn check_status(url: &Url, response: Response) -> Result<Response, TransportError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        url: url.to_string(),
        status,
        body,
    })
}

async fn send_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &Url,
    body: &B,
) -> Result<Response, TransportError> {
    debug!(url = %url, "POST");
    let response = client
        .post(url.clone())
        .json(body)
        .send()
        .await
        .map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;
    check_status(url, response).await
}

async fn get_json<T: DeserializeOwned>(client: &Client, url: &Url) -> Result<T, TransportError> {
    debug!(url = %url, "GET");
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;
    let response = check_status(url, response).await?;
    response.json().await.map_err(|e| TransportError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
