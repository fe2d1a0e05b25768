use crate::labels::Labels;
use ahash::AHashMap as HashMap;

/// Identifies a namespace within the [`Cluster`] that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(usize);

/// Identifies a workload within the [`Cluster`] that issued it.
///
/// References are non-owning: the namespace owns the workload and any upward
/// query goes back through the cluster.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadRef {
    pub namespace: NamespaceId,
    index: usize,
}

/// The cluster inventory: namespaces in discovery order, each owning its workloads.
#[derive(Debug, Default)]
pub struct Cluster {
    namespaces: Vec<Namespace>,
    by_name: HashMap<String, NamespaceId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    name: String,
    labels: Labels,
    workloads: Vec<Workload>,
}

/// A pod and the connections its policies permit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    name: String,
    labels: Labels,
    namespace: NamespaceId,
    pub(crate) ingress: Vec<Rule>,
    pub(crate) egress: Vec<Rule>,
    pub(crate) global_policy: GlobalPolicy,
}

/// The coarse default posture policies contribute per direction.
///
/// Flags only ever accumulate; no policy clears another policy's contribution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GlobalPolicy {
    pub allow_ingress: bool,
    pub deny_ingress: bool,
    pub allow_egress: bool,
    pub deny_egress: bool,
}

/// A resolved permission entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub peers: Peers,
    pub ports: Vec<Port>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Peers {
    /// Matches all traffic.
    Everywhere,

    IpBlock(IpBlock),

    /// Workloads reached through namespace and pod selectors. May be empty when
    /// the selectors match nothing.
    Workloads(Vec<WorkloadRef>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IpBlock {
    pub cidr: String,
    pub except: Vec<String>,
}

/// A declared port, kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Port {
    pub protocol: String,

    /// Either a port number or a named container port.
    pub value: String,

    pub end: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("namespace {0} already exists")]
pub struct DuplicateNamespace(pub String);

// === impl Cluster ===

impl Cluster {
    pub fn add_namespace(
        &mut self,
        name: impl Into<String>,
        labels: Labels,
    ) -> Result<NamespaceId, DuplicateNamespace> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(DuplicateNamespace(name));
        }

        let id = NamespaceId(self.namespaces.len());
        self.by_name.insert(name.clone(), id);
        self.namespaces.push(Namespace {
            name,
            labels,
            workloads: Vec::new(),
        });
        Ok(id)
    }

    /// Appends a workload to a namespace.
    ///
    /// Panics if `namespace` was not issued by this cluster.
    pub fn add_workload(
        &mut self,
        namespace: NamespaceId,
        name: impl Into<String>,
        labels: Labels,
    ) -> WorkloadRef {
        let workloads = &mut self.namespaces[namespace.0].workloads;
        let index = workloads.len();
        workloads.push(Workload {
            name: name.into(),
            labels,
            namespace,
            ingress: Vec::new(),
            egress: Vec::new(),
            global_policy: GlobalPolicy::default(),
        });
        WorkloadRef { namespace, index }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn namespace_id(&self, name: &str) -> Option<NamespaceId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0]
    }

    #[inline]
    pub fn workload(&self, workload: WorkloadRef) -> &Workload {
        &self.namespaces[workload.namespace.0].workloads[workload.index]
    }

    #[inline]
    pub(crate) fn workload_mut(&mut self, workload: WorkloadRef) -> &mut Workload {
        &mut self.namespaces[workload.namespace.0].workloads[workload.index]
    }

    #[inline]
    pub fn namespace_of(&self, workload: WorkloadRef) -> &Namespace {
        self.namespace(workload.namespace)
    }

    /// Iterates namespaces in discovery order.
    pub fn namespaces(&self) -> impl Iterator<Item = (NamespaceId, &Namespace)> + '_ {
        self.namespaces
            .iter()
            .enumerate()
            .map(|(i, ns)| (NamespaceId(i), ns))
    }

    /// Iterates the workloads of a single namespace in discovery order.
    pub fn workloads_in(
        &self,
        namespace: NamespaceId,
    ) -> impl Iterator<Item = (WorkloadRef, &Workload)> + '_ {
        self.namespaces[namespace.0]
            .workloads
            .iter()
            .enumerate()
            .map(move |(index, w)| (WorkloadRef { namespace, index }, w))
    }

    /// Iterates every workload in the cluster, namespace by namespace.
    pub fn workloads(&self) -> impl Iterator<Item = (WorkloadRef, &Workload)> + '_ {
        self.namespaces().flat_map(move |(id, _)| self.workloads_in(id))
    }

    pub fn workload_count(&self) -> usize {
        self.namespaces.iter().map(|ns| ns.workloads.len()).sum()
    }
}

impl PartialEq for Cluster {
    fn eq(&self, other: &Self) -> bool {
        self.namespaces == other.namespaces
    }
}

impl Eq for Cluster {}

// === impl Namespace ===

impl Namespace {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    #[inline]
    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }
}

// === impl Workload ===

impl Workload {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    #[inline]
    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    #[inline]
    pub fn ingress(&self) -> &[Rule] {
        &self.ingress
    }

    #[inline]
    pub fn egress(&self) -> &[Rule] {
        &self.egress
    }

    #[inline]
    pub fn global_policy(&self) -> GlobalPolicy {
        self.global_policy
    }
}

// === impl GlobalPolicy ===

impl GlobalPolicy {
    pub fn merge(&mut self, other: GlobalPolicy) {
        self.allow_ingress |= other.allow_ingress;
        self.deny_ingress |= other.deny_ingress;
        self.allow_egress |= other.allow_egress;
        self.deny_egress |= other.deny_egress;
    }
}
