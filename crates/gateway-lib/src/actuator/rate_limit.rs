//! Per-class token bucket limits on TrafficPolicy resources
//!
//! A class weight becomes `round(weight * total_ingestion_rate)` tokens,
//! used as both bucket capacity and per-fill replenishment over a one-minute
//! fill interval.

use crate::error::{Result, TransportError};
use crate::models::ClassWeights;
use async_trait::async_trait;
use kube::api::{
    Api, ApiResource, DynamicObject, GroupVersionKind, Patch, PatchParams,
};
use kube::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const TRAFFIC_POLICY_GROUP: &str = "gateway.kgateway.dev";
pub const TRAFFIC_POLICY_VERSION: &str = "v1alpha1";
pub const TRAFFIC_POLICY_KIND: &str = "TrafficPolicy";
pub const TRAFFIC_POLICY_PLURAL: &str = "trafficpolicies";
pub const FILL_INTERVAL: &str = "1m";

/// Applies a token bucket to the policy of one class
#[async_trait]
pub trait TrafficPolicyPatcher: Send + Sync {
    async fn patch_token_bucket(&self, class: &str, tokens: u64) -> Result<(), TransportError>;
}

/// Merge patch body setting both bucket size and refill to `tokens`
pub fn token_bucket_patch(tokens: u64) -> Value {
    json!({
        "spec": {
            "rateLimit": {
                "local": {
                    "tokenBucket": {
                        "maxTokens": tokens,
                        "tokensPerFill": tokens,
                        "fillInterval": FILL_INTERVAL
                    }
                }
            }
        }
    })
}

/// Validate class weights and convert them to absolute token counts
pub fn token_plan(weights: &ClassWeights, total_ingestion_rate: f64) -> Result<BTreeMap<String, u64>> {
    weights.validate()?;

    let total = total_ingestion_rate.max(0.0).trunc();
    Ok(weights
        .iter()
        .map(|(class, weight)| (class.to_string(), (weight * total).round() as u64))
        .collect())
}

/// Outcome of one rate-limit application, per class
pub type RateLimitReport = BTreeMap<String, std::result::Result<u64, String>>;

/// Patches TrafficPolicy custom resources through the Kubernetes API
pub struct KubeTrafficPolicyPatcher {
    api: Api<DynamicObject>,
    namespace: String,
}

impl KubeTrafficPolicyPatcher {
    pub fn new(client: Client, namespace: &str) -> Self {
        let gvk = GroupVersionKind::gvk(
            TRAFFIC_POLICY_GROUP,
            TRAFFIC_POLICY_VERSION,
            TRAFFIC_POLICY_KIND,
        );
        let resource = ApiResource::from_gvk_with_plural(&gvk, TRAFFIC_POLICY_PLURAL);
        Self {
            api: Api::namespaced_with(client, namespace, &resource),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl TrafficPolicyPatcher for KubeTrafficPolicyPatcher {
    async fn patch_token_bucket(&self, class: &str, tokens: u64) -> Result<(), TransportError> {
        let patch = token_bucket_patch(tokens);
        self.api
            .patch(class, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|source| TransportError::Kube {
                resource: format!("{}/{}/{}", TRAFFIC_POLICY_PLURAL, self.namespace, class),
                source,
            })?;
        Ok(())
    }
}
