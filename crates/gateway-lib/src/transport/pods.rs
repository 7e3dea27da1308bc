//! Client for the pod-local control endpoints

use super::{get_json, pod_url, send_json};
use crate::error::TransportError;
use crate::models::SloUpdate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const WEIGHTS_PATH: &str = "/weights";
pub const UPDATE_WEIGHTS_PATH: &str = "/update_weights";
pub const SLO_UPDATE_PATH: &str = "/slo/update";

/// Body of `GET /weights`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodStatus {
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub num_sources: Option<usize>,
}

#[derive(Debug, Serialize)]
struct WeightsUpdate<'a> {
    weights: &'a BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
struct SloUpdates<'a> {
    updates: &'a [SloUpdate],
}

/// Sends weight and SLO updates to individual pods
#[derive(Debug, Clone)]
pub struct PodClient {
    client: Client,
    port: u16,
}

impl PodClient {
    pub fn new(client: Client, port: u16) -> Self {
        Self { client, port }
    }

    /// Current source weights and source count of a pod
    pub async fn status(&self, pod_ip: &str) -> Result<PodStatus, TransportError> {
        let url = pod_url(pod_ip, self.port, WEIGHTS_PATH)?;
        get_json(&self.client, &url).await
    }

    pub async fn update_weights(
        &self,
        pod_ip: &str,
        weights: &BTreeMap<String, f64>,
    ) -> Result<(), TransportError> {
        let url = pod_url(pod_ip, self.port, UPDATE_WEIGHTS_PATH)?;
        send_json(&self.client, &url, &WeightsUpdate { weights }).await?;
        Ok(())
    }

    pub async fn update_slos(
        &self,
        pod_ip: &str,
        updates: &[SloUpdate],
    ) -> Result<(), TransportError> {
        let url = pod_url(pod_ip, self.port, SLO_UPDATE_PATH)?;
        send_json(&self.client, &url, &SloUpdates { updates }).await?;
        Ok(())
    }
}
