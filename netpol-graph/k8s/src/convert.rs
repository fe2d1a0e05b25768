//! Converts Kubernetes resources into the resolver's input types.

use crate::{Namespace, NetworkPolicy, ObjectMeta, Pod, ResourceExt};
use k8s_openapi::{
    api::networking::v1::{IPBlock, NetworkPolicyPeer, NetworkPolicyPort},
    apimachinery::pkg::{apis::meta::v1::LabelSelector, util::intstr::IntOrString},
};
use netpol_graph_core::{
    IpBlock, Labels, NamespaceMeta, PeerSpec, PolicySpec, PolicyType, Port, RuleSpec, Selector,
    WorkloadMeta,
};
use tracing::warn;

/// The protocol Kubernetes assumes when a policy port omits one.
const DEFAULT_PROTOCOL: &str = "TCP";

pub fn labels(meta: &ObjectMeta) -> Labels {
    meta.labels.clone().into()
}

pub fn namespace(ns: Namespace) -> NamespaceMeta {
    NamespaceMeta {
        labels: labels(&ns.metadata),
        name: ns.name_any(),
    }
}

pub fn workload(pod: Pod) -> WorkloadMeta {
    WorkloadMeta {
        labels: labels(&pod.metadata),
        name: pod.name_any(),
    }
}

pub fn policy_spec(policy: NetworkPolicy) -> PolicySpec {
    let name = policy.name_any();
    let spec = policy.spec.unwrap_or_default();

    let ingress = spec
        .ingress
        .into_iter()
        .flatten()
        .map(|rule| rule_spec(&name, rule.from, rule.ports))
        .collect::<Vec<_>>();
    let egress = spec
        .egress
        .into_iter()
        .flatten()
        .map(|rule| rule_spec(&name, rule.to, rule.ports))
        .collect::<Vec<_>>();

    let policy_types = match spec.policy_types {
        Some(types) => types
            .iter()
            .filter_map(|ty| match ty.parse::<PolicyType>() {
                Ok(ty) => Some(ty),
                Err(error) => {
                    warn!(policy = %name, %error, "Ignoring policy type");
                    None
                }
            })
            .collect(),
        // Kubernetes always governs ingress, and egress only when egress rules
        // are present.
        None => Some(PolicyType::Ingress)
            .into_iter()
            .chain((!egress.is_empty()).then_some(PolicyType::Egress))
            .collect(),
    };

    PolicySpec {
        pod_selector: selector(&name, spec.pod_selector),
        policy_types,
        ingress,
        egress,
        name,
    }
}

fn rule_spec(
    policy: &str,
    peers: Option<Vec<NetworkPolicyPeer>>,
    ports: Option<Vec<NetworkPolicyPort>>,
) -> RuleSpec {
    RuleSpec {
        peers: peers
            .into_iter()
            .flatten()
            .map(|peer| peer_spec(policy, peer))
            .collect(),
        ports: ports.into_iter().flatten().map(port).collect(),
    }
}

fn peer_spec(policy: &str, peer: NetworkPolicyPeer) -> PeerSpec {
    if let Some(IPBlock { cidr, except }) = peer.ip_block {
        return PeerSpec::IpBlock(IpBlock {
            cidr,
            except: except.unwrap_or_default(),
        });
    }

    PeerSpec::Selector {
        namespace: peer.namespace_selector.map(|s| selector(policy, s)),
        pod: peer.pod_selector.map(|s| selector(policy, s)),
    }
}

/// Only `matchLabels` is honored; set-based expressions are dropped.
fn selector(policy: &str, selector: LabelSelector) -> Selector {
    let expressions = selector.match_expressions.unwrap_or_default();
    if !expressions.is_empty() {
        warn!(
            %policy,
            expressions = expressions.len(),
            "Ignoring label selector expressions"
        );
    }
    selector.match_labels.unwrap_or_default().into()
}

fn port(port: NetworkPolicyPort) -> Port {
    Port {
        protocol: port
            .protocol
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
        value: match port.port {
            Some(IntOrString::Int(n)) => n.to_string(),
            Some(IntOrString::String(name)) => name,
            None => String::new(),
        },
        end: port.end_port,
    }
}
