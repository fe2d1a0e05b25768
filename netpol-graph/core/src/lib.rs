//! Network policy resolution
//!
//! Computes, for every workload in a cluster snapshot, the connections its
//! `NetworkPolicy` objects permit:
//!
//! - A policy applies to the workloads in its own namespace that match its pod
//!   selector.
//! - Each policy contributes a default posture per direction it governs, derived
//!   from how many rules it declares for that direction.
//! - Each ingress rule resolves to `Everywhere`, an IP block, or the set of
//!   workloads its namespace and pod selectors reach, anywhere in the cluster.
//!
//! ```text
//! [ Namespace ] -> [ Workload ] <- [ PolicySpec ] -> [ Peers ]
//! ```
//!
//! Resolution happens in two phases. The [`Inventory`] loads every namespace
//! and workload from a [`ClusterDataSource`] before any policy is applied, as a
//! peer selector may reach into any namespace. The [`Resolver`] then applies
//! each policy, appending to the workloads it selects.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod expand;
pub mod labels;
pub mod model;
pub mod policy;
mod resolve;
mod source;

pub use self::{
    expand::{expand, PeerLabels},
    labels::{Labels, Selector},
    model::{
        Cluster, DuplicateNamespace, GlobalPolicy, IpBlock, Namespace, NamespaceId, Peers, Port,
        Rule, Workload, WorkloadRef,
    },
    policy::{PeerSpec, PolicySpec, PolicyType, RuleSpec},
    resolve::{posture, Resolver},
    source::{
        ClusterDataSource, DataAcquisitionError, Inventory, NamespaceMeta, Snapshot, WorkloadMeta,
    },
};
