use crate::{
    labels::Selector,
    model::{IpBlock, Port},
};
use anyhow::{anyhow, Error, Result};
use std::collections::BTreeSet;

/// A traffic direction a policy object may govern.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyType {
    Ingress,
    Egress,
}

/// A policy object as supplied by the data source, before resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicySpec {
    /// The policy object's name. Only used for diagnostics.
    pub name: String,

    /// Selects the workloads, in the policy's own namespace, that the policy applies to.
    pub pod_selector: Selector,

    pub policy_types: BTreeSet<PolicyType>,
    pub ingress: Vec<RuleSpec>,
    pub egress: Vec<RuleSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSpec {
    /// When empty, the rule permits traffic from (or to) everywhere.
    pub peers: Vec<PeerSpec>,
    pub ports: Vec<Port>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerSpec {
    IpBlock(IpBlock),

    /// Workloads selected by labels.
    ///
    /// Without a namespace selector, only the policy's own namespace is
    /// searched. Without a pod selector, every workload in scope matches.
    Selector {
        namespace: Option<Selector>,
        pod: Option<Selector>,
    },
}

// === impl PolicyType ===

impl std::str::FromStr for PolicyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Ingress" => Ok(Self::Ingress),
            "Egress" => Ok(Self::Egress),
            s => Err(anyhow!("invalid policy type: {:?}", s)),
        }
    }
}

impl std::fmt::Display for PolicyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingress => f.write_str("Ingress"),
            Self::Egress => f.write_str("Egress"),
        }
    }
}

// === impl PolicySpec ===

impl PolicySpec {
    #[inline]
    pub fn governs(&self, direction: PolicyType) -> bool {
        self.policy_types.contains(&direction)
    }

    pub fn rules(&self, direction: PolicyType) -> &[RuleSpec] {
        match direction {
            PolicyType::Ingress => &self.ingress,
            PolicyType::Egress => &self.egress,
        }
    }
}

// === impl RuleSpec ===

impl RuleSpec {
    /// A rule with neither peers nor ports: the "allow all" shorthand.
    #[inline]
    pub fn is_unrestricted(&self) -> bool {
        self.peers.is_empty() && self.ports.is_empty()
    }
}
