//! Kubernetes client setup for TrafficPolicy patches
//!
//! The client is only built the first time a patch is sent, so commands
//! that never touch rate limits work without cluster access.

use anyhow::{Context, Result};
use async_trait::async_trait;
use gateway_lib::actuator::{KubeTrafficPolicyPatcher, TrafficPolicyPatcher};
use gateway_lib::TransportError;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::debug;

pub async fn init_kube_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let client = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig file: {}", path.display()))?;

            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .with_context(|| {
                    format!("Failed to create config from kubeconfig: {}", path.display())
                })?;

            Client::try_from(config)
                .context("Failed to create Kubernetes client from custom kubeconfig")?
        }
        // In-cluster configuration
        None => Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?,
    };
    Ok(client)
}

/// Patcher that connects to the cluster on first use
pub struct LazyKubePatcher {
    kubeconfig: Option<PathBuf>,
    namespace: String,
    inner: OnceCell<KubeTrafficPolicyPatcher>,
}

impl LazyKubePatcher {
    pub fn new(kubeconfig: Option<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            kubeconfig,
            namespace: namespace.into(),
            inner: OnceCell::new(),
        }
    }

    async fn patcher(&self) -> Result<&KubeTrafficPolicyPatcher, TransportError> {
        self.inner
            .get_or_try_init(|| async {
                debug!(kubeconfig = ?self.kubeconfig, namespace = %self.namespace, "Connecting to cluster");
                let client = init_kube_client(self.kubeconfig.as_deref())
                    .await
                    .map_err(|e| TransportError::KubeClient(format!("{:#}", e)))?;
                Ok(KubeTrafficPolicyPatcher::new(client, &self.namespace))
            })
            .await
    }
}

#[async_trait]
impl TrafficPolicyPatcher for LazyKubePatcher {
    async fn patch_token_bucket(&self, class: &str, tokens: u64) -> Result<(), TransportError> {
        self.patcher().await?.patch_token_bucket(class, tokens).await
    }
}
