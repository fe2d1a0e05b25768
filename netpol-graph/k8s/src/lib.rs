#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod convert;

pub use k8s_openapi::api::{
    core::v1::{Namespace, Pod},
    networking::v1::NetworkPolicy,
};
pub use kube::{api::ObjectMeta, Client, ResourceExt};

use anyhow::{Context, Result};
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
};
use netpol_graph_core::{ClusterDataSource, NamespaceMeta, PolicySpec, WorkloadMeta};
use std::path::Path;
use tracing::{debug, instrument};

/// Lists cluster objects from the Kubernetes API.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

/// Builds a client from the kubeconfig at `path`, or infers the configuration
/// (i.e. from the environment or the pod's service account) when no path is
/// given.
pub async fn client(kubeconfig: Option<&Path>) -> Result<Client> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .with_context(|| format!("failed to load kubeconfig {}", path.display()))?
        }
        None => kube::Config::infer()
            .await
            .context("failed to infer kubernetes configuration")?,
    };
    Client::try_from(config).context("failed to build kubernetes client")
}

// === impl KubeSource ===

impl KubeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSource").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ClusterDataSource for KubeSource {
    #[instrument(skip(self))]
    async fn list_namespaces(&self) -> Result<Vec<NamespaceMeta>> {
        let list = Api::<Namespace>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        debug!(count = list.items.len(), "Listed namespaces");
        Ok(list.items.into_iter().map(convert::namespace).collect())
    }

    #[instrument(skip(self))]
    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadMeta>> {
        let list = Api::<Pod>::namespaced(self.client.clone(), namespace)
            .list(&ListParams::default())
            .await?;
        debug!(count = list.items.len(), "Listed pods");
        Ok(list.items.into_iter().map(convert::workload).collect())
    }

    #[instrument(skip(self))]
    async fn list_policies(&self, namespace: &str) -> Result<Vec<PolicySpec>> {
        let list = Api::<NetworkPolicy>::namespaced(self.client.clone(), namespace)
            .list(&ListParams::default())
            .await?;
        debug!(count = list.items.len(), "Listed network policies");
        Ok(list.items.into_iter().map(convert::policy_spec).collect())
    }
}
