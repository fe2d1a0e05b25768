use crate::{
    expand::PeerLabels,
    labels::Labels,
    model::{Cluster, NamespaceId},
    policy::PolicySpec,
    resolve::Resolver,
};
use ahash::AHashMap as HashMap;
use anyhow::Result;
use futures::future;
use tracing::{debug, info, instrument};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceMeta {
    pub name: String,
    pub labels: Labels,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadMeta {
    pub name: String,
    pub labels: Labels,
}

/// Supplies the raw cluster objects a run is built from.
#[async_trait::async_trait]
pub trait ClusterDataSource {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceMeta>>;

    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadMeta>>;

    async fn list_policies(&self, namespace: &str) -> Result<Vec<PolicySpec>>;
}

/// Indicates that the data source could not produce the cluster's objects.
#[derive(Debug, thiserror::Error)]
#[error("failed to list {resource}{}", in_namespace(.namespace))]
pub struct DataAcquisitionError {
    pub resource: &'static str,
    pub namespace: Option<String>,
    #[source]
    pub source: BoxError,
}

/// A fully materialized cluster along with the policies declared in each
/// namespace, ready for resolution.
#[derive(Debug)]
pub struct Inventory {
    cluster: Cluster,
    policies: Vec<(NamespaceId, Vec<PolicySpec>)>,
}

/// An in-memory data source.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    namespaces: Vec<NamespaceMeta>,
    workloads: HashMap<String, Vec<WorkloadMeta>>,
    policies: HashMap<String, Vec<PolicySpec>>,
}

// === impl DataAcquisitionError ===

impl DataAcquisitionError {
    fn new(resource: &'static str, namespace: Option<&str>, source: impl Into<BoxError>) -> Self {
        Self {
            resource,
            namespace: namespace.map(Into::into),
            source: source.into(),
        }
    }
}

fn in_namespace(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!(" in namespace {ns}"),
        None => String::new(),
    }
}

// === impl Inventory ===

impl Inventory {
    /// Loads every namespace, workload and policy from `source`.
    ///
    /// Workloads and policies are listed concurrently across namespaces. The
    /// cluster is only assembled once every listing has completed, so a failure
    /// leaves nothing partially built.
    #[instrument(skip(source))]
    pub async fn load<S>(source: &S) -> Result<Self, DataAcquisitionError>
    where
        S: ClusterDataSource + Sync,
    {
        let namespaces = source
            .list_namespaces()
            .await
            .map_err(|e| DataAcquisitionError::new("namespaces", None, e))?;
        debug!(namespaces = namespaces.len(), "Listed namespaces");

        let contents = future::try_join_all(namespaces.iter().map(|ns| async move {
            let workloads = source
                .list_workloads(&ns.name)
                .await
                .map_err(|e| DataAcquisitionError::new("workloads", Some(ns.name.as_str()), e))?;
            let policies = source
                .list_policies(&ns.name)
                .await
                .map_err(|e| DataAcquisitionError::new("policies", Some(ns.name.as_str()), e))?;
            debug!(
                ns = %ns.name,
                workloads = workloads.len(),
                policies = policies.len(),
                "Listed namespace contents"
            );
            Ok::<_, DataAcquisitionError>((workloads, policies))
        }))
        .await?;

        let mut cluster = Cluster::default();
        let mut policies = Vec::with_capacity(namespaces.len());
        for (ns, (workloads, specs)) in namespaces.into_iter().zip(contents) {
            let id = cluster
                .add_namespace(ns.name, ns.labels)
                .map_err(|e| DataAcquisitionError::new("namespaces", None, e))?;
            for WorkloadMeta { name, labels } in workloads {
                cluster.add_workload(id, name, labels);
            }
            policies.push((id, specs));
        }

        let inventory = Self { cluster, policies };
        info!(
            namespaces = inventory.cluster.namespaces().count(),
            workloads = inventory.cluster.workload_count(),
            policies = inventory.policy_count(),
            "Loaded cluster inventory"
        );
        Ok(inventory)
    }

    #[inline]
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn policy_count(&self) -> usize {
        self.policies.iter().map(|(_, specs)| specs.len()).sum()
    }

    /// Applies every policy, namespace by namespace in discovery order, and
    /// returns the resolved cluster.
    pub fn resolve(self, peer_labels: PeerLabels) -> Cluster {
        let Self { cluster, policies } = self;
        let mut resolver = Resolver::new(cluster, peer_labels);
        for (ns, specs) in &policies {
            for spec in specs {
                resolver.apply(*ns, spec);
            }
        }
        resolver.into_cluster()
    }
}

// === impl Snapshot ===

impl Snapshot {
    pub fn with_namespace(mut self, name: impl Into<String>, labels: Labels) -> Self {
        self.namespaces.push(NamespaceMeta {
            name: name.into(),
            labels,
        });
        self
    }

    pub fn with_workload(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        labels: Labels,
    ) -> Self {
        self.workloads
            .entry(namespace.into())
            .or_default()
            .push(WorkloadMeta {
                name: name.into(),
                labels,
            });
        self
    }

    pub fn with_policy(mut self, namespace: impl Into<String>, policy: PolicySpec) -> Self {
        self.policies
            .entry(namespace.into())
            .or_default()
            .push(policy);
        self
    }
}

#[async_trait::async_trait]
impl ClusterDataSource for Snapshot {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceMeta>> {
        Ok(self.namespaces.clone())
    }

    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadMeta>> {
        Ok(self.workloads.get(namespace).cloned().unwrap_or_default())
    }

    async fn list_policies(&self, namespace: &str) -> Result<Vec<PolicySpec>> {
        Ok(self.policies.get(namespace).cloned().unwrap_or_default())
    }
}
