use crate::{
    expand::{expand, PeerLabels},
    model::{Cluster, GlobalPolicy, NamespaceId, Peers, Rule, WorkloadRef},
    policy::{PeerSpec, PolicySpec, PolicyType, RuleSpec},
};
use tracing::{debug, instrument};

/// Attaches policy objects to the workloads they select.
///
/// A resolver owns a fully materialized cluster. Every namespace and workload
/// must already be present, since selector peers may reach into any
/// namespace.
#[derive(Debug)]
pub struct Resolver {
    cluster: Cluster,
    peer_labels: PeerLabels,
}

// === impl Resolver ===

impl Resolver {
    pub fn new(cluster: Cluster, peer_labels: PeerLabels) -> Self {
        Self {
            cluster,
            peer_labels,
        }
    }

    #[inline]
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    #[inline]
    pub fn into_cluster(self) -> Cluster {
        self.cluster
    }

    /// Applies a policy declared in `namespace` to every workload it selects.
    ///
    /// Contributions are additive: the default posture is merged into each
    /// target's global policy and resolved rules are appended to its existing
    /// rules.
    #[instrument(
        skip(self, policy),
        fields(
            ns = %self.cluster.namespace(namespace).name(),
            name = %policy.name,
        )
    )]
    pub fn apply(&mut self, namespace: NamespaceId, policy: &PolicySpec) {
        let targets = self
            .cluster
            .workloads_in(namespace)
            .filter(|(_, w)| policy.pod_selector.matches(w.labels()))
            .map(|(r, _)| r)
            .collect::<Vec<_>>();
        if targets.is_empty() {
            debug!(selector = %policy.pod_selector, "Policy selects no workloads");
            return;
        }

        let posture = posture(policy);
        debug!(targets = targets.len(), ?posture, "Applying policy");
        if policy.governs(PolicyType::Egress) && !policy.egress.is_empty() {
            debug!(rules = policy.egress.len(), "Egress rules are not expanded");
        }

        for target in targets {
            let ingress = if policy.governs(PolicyType::Ingress) {
                self.resolve_rules(target, &policy.ingress)
            } else {
                Vec::new()
            };

            let workload = self.cluster.workload_mut(target);
            workload.global_policy.merge(posture);
            workload.ingress.extend(ingress);
        }
    }

    fn resolve_rules(&self, owner: WorkloadRef, rules: &[RuleSpec]) -> Vec<Rule> {
        let mut resolved = Vec::new();
        for rule in rules {
            if rule.peers.is_empty() {
                resolved.push(Rule {
                    peers: Peers::Everywhere,
                    ports: rule.ports.clone(),
                });
                continue;
            }

            for peer in &rule.peers {
                let peers = match peer {
                    PeerSpec::IpBlock(block) => Peers::IpBlock(block.clone()),
                    PeerSpec::Selector { namespace, pod } => Peers::Workloads(expand(
                        &self.cluster,
                        owner,
                        namespace.as_ref(),
                        pod.as_ref(),
                        self.peer_labels,
                    )),
                };
                resolved.push(Rule {
                    peers,
                    ports: rule.ports.clone(),
                });
            }
        }
        resolved
    }
}

/// Derives the default posture a single policy object contributes.
///
/// For each direction the policy governs: no rules denies the direction, and a
/// lone rule without peers or ports allows it. Any other shape contributes
/// nothing beyond its explicit rules.
pub fn posture(policy: &PolicySpec) -> GlobalPolicy {
    let mut global = GlobalPolicy::default();
    for direction in &policy.policy_types {
        let (allow, deny) = match direction {
            PolicyType::Ingress => (&mut global.allow_ingress, &mut global.deny_ingress),
            PolicyType::Egress => (&mut global.allow_egress, &mut global.deny_egress),
        };
        match policy.rules(*direction) {
            [] => *deny = true,
            [rule] if rule.is_unrestricted() => *allow = true,
            _ => {}
        }
    }
    global
}
