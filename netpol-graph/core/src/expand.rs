use crate::{
    labels::Selector,
    model::{Cluster, WorkloadRef},
};
use anyhow::{anyhow, Error, Result};
use tracing::trace;

/// Indicates whose labels a peer's pod selector is evaluated against.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PeerLabels {
    /// Each candidate workload's own labels. This is how the platform evaluates
    /// peer selectors.
    #[default]
    Candidate,

    /// The labels of the workload that owns the rule. Reproduces the output of
    /// earlier releases of this tool, where a selector either matched every
    /// candidate in scope or none of them.
    Owner,
}

/// Returns the workloads denoted by a selector peer of `owner`'s rule.
///
/// Without a namespace selector, only the owner's namespace is searched;
/// otherwise every namespace whose labels satisfy the selector is. The owner
/// itself is never included.
pub fn expand(
    cluster: &Cluster,
    owner: WorkloadRef,
    namespace_selector: Option<&Selector>,
    pod_selector: Option<&Selector>,
    mode: PeerLabels,
) -> Vec<WorkloadRef> {
    let owner_labels = cluster.workload(owner).labels();

    let mut peers = Vec::new();
    for (ns_id, ns) in cluster.namespaces() {
        let in_scope = match namespace_selector {
            None => ns_id == owner.namespace,
            Some(selector) => selector.matches(ns.labels()),
        };
        if !in_scope {
            continue;
        }

        for (candidate, workload) in cluster.workloads_in(ns_id) {
            if candidate == owner {
                continue;
            }

            let labels = match mode {
                PeerLabels::Candidate => workload.labels(),
                PeerLabels::Owner => owner_labels,
            };
            if pod_selector.map_or(true, |s| s.matches(labels)) {
                trace!(ns = %ns.name(), name = %workload.name(), "Selected peer");
                peers.push(candidate);
            }
        }
    }

    peers
}

// === impl PeerLabels ===

impl std::str::FromStr for PeerLabels {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "candidate" => Ok(Self::Candidate),
            "owner" => Ok(Self::Owner),
            s => Err(anyhow!("invalid peer label mode: {:?}", s)),
        }
    }
}

impl std::fmt::Display for PeerLabels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Candidate => f.write_str("candidate"),
            Self::Owner => f.write_str("owner"),
        }
    }
}
