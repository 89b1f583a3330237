//! Replica control through the Deployment `scale` subresource
//!
//! Reads `spec.replicas` with `get_scale` and writes it with a merge patch,
//! so nothing else in the Deployment spec is touched.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v1::Scale;
use kube::api::{Api, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use tracing::debug;

use super::{AdapterError, WorkloadScaler};
use crate::config::WorkloadSettings;

/// Reads and patches the replica count of one Deployment
#[derive(Clone)]
pub struct KubernetesScaler {
    api: Api<Deployment>,
    namespace: String,
    deployment: String,
}

impl KubernetesScaler {
    pub fn new(client: Client, namespace: impl Into<String>, deployment: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            api: Api::namespaced(client, &namespace),
            namespace,
            deployment: deployment.into(),
        }
    }

    /// Connect with the configured kubeconfig and context.
    ///
    /// Without either, the client is inferred the usual way: `$KUBECONFIG`,
    /// `~/.kube/config`, then the pod's service account.
    pub async fn from_settings(settings: &WorkloadSettings) -> Result<Self, AdapterError> {
        let deployment = settings
            .deployment
            .clone()
            .ok_or_else(|| AdapterError::Unavailable("deployment not configured".into()))?;
        let client = connect(settings).await?;
        Ok(Self::new(client, settings.namespace.clone(), deployment))
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

async fn connect(settings: &WorkloadSettings) -> Result<Client, AdapterError> {
    let options = KubeConfigOptions {
        context: settings.context.clone(),
        ..KubeConfigOptions::default()
    };

    let config = match settings.kubeconfig {
        Some(ref path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                AdapterError::Unavailable(format!("cannot read kubeconfig {}: {}", path.display(), e))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &options).await
        }
        None if settings.context.is_some() => Config::from_kubeconfig(&options).await,
        None => return Ok(Client::try_default().await?),
    }
    .map_err(|e| AdapterError::Unavailable(format!("invalid kubeconfig: {}", e)))?;

    Ok(Client::try_from(config)?)
}

/// `spec.replicas` of a scale object; an unset count means zero
fn replicas_of(scale: &Scale) -> Result<u32, AdapterError> {
    let replicas = scale.spec.as_ref().and_then(|spec| spec.replicas).unwrap_or(0);
    u32::try_from(replicas)
        .map_err(|_| AdapterError::Parse(format!("negative replica count {}", replicas)))
}

#[async_trait]
impl WorkloadScaler for KubernetesScaler {
    async fn current_replicas(&self) -> Result<u32, AdapterError> {
        let scale = self.api.get_scale(&self.deployment).await?;
        replicas_of(&scale)
    }

    async fn set_replicas(&self, replicas: u32) -> Result<(), AdapterError> {
        let patch = json!({ "spec": { "replicas": replicas } });
        self.api
            .patch_scale(&self.deployment, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!(
            "Patched {}/{} to {} replicas",
            self.namespace, self.deployment, replicas
        );
        Ok(())
    }
}
