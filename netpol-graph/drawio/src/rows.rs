use ahash::AHashMap as HashMap;
use netpol_graph_core::{Cluster, IpBlock, Peers, Rule, WorkloadRef};

/// The rows of a draw.io CSV import, in id order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Graph {
    rows: Vec<Row>,
}

/// A single diagram node. Ids are positions in the [`Graph`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    pub name: String,
    pub notes: String,

    /// Rows this row is connected to by containment.
    pub refs: Vec<usize>,

    /// Rows traffic may arrive from.
    pub ingress: Vec<usize>,

    /// Rows traffic may be sent to.
    pub egress: Vec<usize>,
}

/// Peers that have no row of their own in the cluster inventory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Synthetic {
    Everywhere,
    IpBlock(IpBlock),
}

// === impl Graph ===

impl Graph {
    /// Lays out a resolved cluster.
    ///
    /// Each namespace row is followed by its workload rows, in discovery order.
    /// `Everywhere` and IP block peers are given rows after every namespace and
    /// workload, one per distinct peer, in the order they're first referenced.
    pub fn from_cluster(cluster: &Cluster) -> Self {
        let mut graph = Self::default();

        let mut workloads = Vec::with_capacity(cluster.workload_count());
        let mut workload_rows = HashMap::<WorkloadRef, usize>::default();
        for (ns_id, ns) in cluster.namespaces() {
            let ns_row = graph.push(Row::new(ns.name(), ""));
            for (workload, w) in cluster.workloads_in(ns_id) {
                let row = graph.push(Row::new(w.name(), ns.name()));
                graph.rows[ns_row].refs.push(row);
                workload_rows.insert(workload, row);
                workloads.push((row, w));
            }
        }

        let mut synthetic = HashMap::<Synthetic, usize>::default();
        for (row, w) in workloads {
            let ingress = graph.peer_rows(w.ingress(), &workload_rows, &mut synthetic);
            let egress = graph.peer_rows(w.egress(), &workload_rows, &mut synthetic);
            let row = &mut graph.rows[row];
            row.ingress = ingress;
            row.egress = egress;
        }

        graph
    }

    #[inline]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn push(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    fn peer_rows(
        &mut self,
        rules: &[Rule],
        workload_rows: &HashMap<WorkloadRef, usize>,
        synthetic: &mut HashMap<Synthetic, usize>,
    ) -> Vec<usize> {
        let mut ids = Vec::new();
        for rule in rules {
            match &rule.peers {
                Peers::Everywhere => {
                    let id = self.synthetic_row(Synthetic::Everywhere, synthetic);
                    push_unique(&mut ids, id);
                }
                Peers::IpBlock(block) => {
                    let id = self.synthetic_row(Synthetic::IpBlock(block.clone()), synthetic);
                    push_unique(&mut ids, id);
                }
                Peers::Workloads(peers) => {
                    for id in peers.iter().filter_map(|p| workload_rows.get(p)) {
                        push_unique(&mut ids, *id);
                    }
                }
            }
        }
        ids
    }

    fn synthetic_row(&mut self, peer: Synthetic, rows: &mut HashMap<Synthetic, usize>) -> usize {
        if let Some(id) = rows.get(&peer) {
            return *id;
        }

        let row = match &peer {
            Synthetic::Everywhere => Row::new("Everywhere", ""),
            Synthetic::IpBlock(block) => Row::new(&block.cidr, &block.except.join("\n")),
        };
        let id = self.push(row);
        rows.insert(peer, id);
        id
    }
}

fn push_unique(ids: &mut Vec<usize>, id: usize) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

// === impl Row ===

impl Row {
    fn new(name: &str, notes: &str) -> Self {
        Self {
            name: name.to_string(),
            notes: notes.to_string(),
            ..Default::default()
        }
    }

    /// Renders the row's fields in header order.
    pub(crate) fn record(&self, id: usize) -> [String; 6] {
        [
            id.to_string(),
            self.name.clone(),
            self.notes.clone(),
            join(&self.refs),
            join(&self.ingress),
            join(&self.egress),
        ]
    }
}

fn join(ids: &[usize]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpol_graph_core::{
        Labels, PeerLabels, PeerSpec, PolicySpec, PolicyType, Port, Resolver, RuleSpec, Selector,
    };
    use std::iter::FromIterator;

    fn ingress_policy(
        pod_selector: impl IntoIterator<Item = (&'static str, &'static str)>,
        rules: Vec<RuleSpec>,
    ) -> PolicySpec {
        PolicySpec {
            name: "policy".to_string(),
            pod_selector: pod_selector.into_iter().collect(),
            policy_types: Some(PolicyType::Ingress).into_iter().collect(),
            ingress: rules,
            egress: vec![],
        }
    }

    fn row(name: &str, notes: &str, refs: Vec<usize>, ingress: Vec<usize>) -> Row {
        Row {
            name: name.to_string(),
            notes: notes.to_string(),
            refs,
            ingress,
            egress: vec![],
        }
    }

    #[test]
    fn empty_cluster_has_no_rows() {
        let graph = Graph::from_cluster(&Cluster::default());
        assert!(graph.is_empty());
    }

    #[test]
    fn namespaces_contain_workloads() {
        let mut cluster = Cluster::default();
        let ns = cluster.add_namespace("default", Labels::default()).unwrap();
        cluster.add_workload(ns, "a", Labels::from_iter(Some(("app", "a"))));
        cluster.add_workload(ns, "b", Labels::default());
        let other = cluster.add_namespace("other", Labels::default()).unwrap();
        cluster.add_workload(other, "c", Labels::default());

        let graph = Graph::from_cluster(&cluster);
        assert_eq!(
            graph.rows(),
            [
                row("default", "", vec![1, 2], vec![]),
                row("a", "default", vec![], vec![]),
                row("b", "default", vec![], vec![]),
                row("other", "", vec![4], vec![]),
                row("c", "other", vec![], vec![]),
            ]
        );
    }

    #[test]
    fn peers_reference_rows() {
        let mut cluster = Cluster::default();
        let web = cluster
            .add_namespace("web", Labels::from_iter(Some(("tier", "front"))))
            .unwrap();
        cluster.add_workload(web, "frontend", Labels::from_iter(Some(("app", "web"))));
        let db = cluster.add_namespace("db", Labels::default()).unwrap();
        cluster.add_workload(db, "postgres", Labels::from_iter(Some(("app", "db"))));
        cluster.add_workload(db, "backup", Labels::from_iter(Some(("app", "backup"))));

        let block = IpBlock {
            cidr: "10.0.0.0/8".to_string(),
            except: vec!["10.1.0.0/16".to_string(), "10.2.0.0/16".to_string()],
        };
        let mut resolver = Resolver::new(cluster, PeerLabels::Candidate);
        resolver.apply(
            db,
            &ingress_policy(
                Some(("app", "db")),
                vec![
                    RuleSpec {
                        peers: vec![
                            PeerSpec::Selector {
                                namespace: Some(Selector::from_iter(Some(("tier", "front")))),
                                pod: None,
                            },
                            PeerSpec::IpBlock(block.clone()),
                            PeerSpec::Selector {
                                namespace: Some(Selector::default()),
                                pod: Some(Selector::from_iter(Some(("app", "web")))),
                            },
                        ],
                        ports: vec![Port {
                            protocol: "TCP".to_string(),
                            value: "5432".to_string(),
                            end: None,
                        }],
                    },
                    RuleSpec::default(),
                ],
            ),
        );
        // The same peers from another workload reuse the synthetic rows.
        resolver.apply(
            db,
            &ingress_policy(
                Some(("app", "backup")),
                vec![
                    RuleSpec {
                        peers: vec![PeerSpec::IpBlock(block)],
                        ports: vec![],
                    },
                    RuleSpec::default(),
                ],
            ),
        );
        let graph = Graph::from_cluster(&resolver.into_cluster());

        assert_eq!(
            graph.rows(),
            [
                row("web", "", vec![1], vec![]),
                row("frontend", "web", vec![], vec![]),
                row("db", "", vec![3, 4], vec![]),
                row("postgres", "db", vec![], vec![1, 5, 6]),
                row("backup", "db", vec![], vec![5, 6]),
                row("10.0.0.0/8", "10.1.0.0/16\n10.2.0.0/16", vec![], vec![]),
                row("Everywhere", "", vec![], vec![]),
            ]
        );
    }

    #[test]
    fn records_join_ids() {
        let row = row("db", "", vec![3, 4], vec![1, 5]);
        assert_eq!(
            row.record(2),
            [
                "2".to_string(),
                "db".to_string(),
                "".to_string(),
                "3,4".to_string(),
                "1,5".to_string(),
                "".to_string(),
            ]
        );
    }
}
