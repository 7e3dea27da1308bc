//! Weight and SLO pushes to individual pods
//!
//! Pods are visited one at a time. A pod without a known IP is skipped and a
//! failed push is recorded; neither stops the remaining pods.

use crate::error::TransportError;
use crate::models::PodDirectory;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::warn;

/// Outcome of a push across many pods, keyed by `class/pod`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

impl PushReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

pub fn target_name(class: &str, pod: &str) -> String {
    format!("{}/{}", class, pod)
}

/// Resolve the IP of `pod` in `class`, if the directory knows one
pub fn pod_ip<'a>(pods: &'a PodDirectory, class: &str, pod: &str) -> Option<&'a str> {
    pods.get(class)?
        .get(pod)?
        .as_deref()
        .filter(|ip| !ip.trim().is_empty())
}

/// First pod in `class` with a known IP
pub fn first_pod_ip<'a>(pods: &'a PodDirectory, class: &str) -> Option<&'a str> {
    pods.get(class)?
        .values()
        .filter_map(|ip| ip.as_deref())
        .find(|ip| !ip.trim().is_empty())
}

/// Run `push` for every (class, pod, payload) in `plan`, sequentially
///
/// `on_success` is called with the class and payload of each pod that
/// accepted the update.
pub async fn push_each<'p, T, F, Fut, S>(
    pods: &PodDirectory,
    plan: &'p BTreeMap<String, BTreeMap<String, T>>,
    mut push: F,
    mut on_success: S,
) -> PushReport
where
    F: FnMut(String, &'p T) -> Fut,
    Fut: Future<Output = Result<(), TransportError>>,
    S: FnMut(&str, &T),
{
    let mut report = PushReport::default();

    for (class, entries) in plan {
        for (pod, payload) in entries {
            let target = target_name(class, pod);
            let Some(ip) = pod_ip(pods, class, pod) else {
                warn!(class = %class, pod = %pod, "No IP found for pod, skipping");
                report.skipped.push(target);
                continue;
            };

            match push(ip.to_string(), payload).await {
                Ok(()) => {
                    on_success(class, payload);
                    report.succeeded.push(target);
                }
                Err(e) => {
                    report.failed.insert(target, e.to_string());
                }
            }
        }
    }

    report
}
