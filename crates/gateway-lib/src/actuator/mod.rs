//! Control actions: class rate limits and per-pod pushes

mod pods;
mod rate_limit;

pub use pods::{first_pod_ip, pod_ip, push_each, target_name, PushReport};
pub use rate_limit::{
    token_bucket_patch, token_plan, KubeTrafficPolicyPatcher, RateLimitReport,
    TrafficPolicyPatcher, FILL_INTERVAL, TRAFFIC_POLICY_GROUP, TRAFFIC_POLICY_PLURAL,
    TRAFFIC_POLICY_VERSION,
};
