//! Exports a resolved cluster as a draw.io CSV import.
//!
//! The output starts with draw.io's CSV configuration directives, which lay
//! out one node per row and draw containment (`refs`) as solid edges and
//! allowed traffic (`ingress`/`egress`) as dashed ones. The header row and one
//! record per [`Row`] follow.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod rows;

pub use self::rows::{Graph, Row};

use netpol_graph_core::Cluster;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

pub const HEADER: &str = "id,name,notes,refs,ingress,egress";

pub const PREAMBLE: &str = r#"## **********************************************************
## Configuration
## **********************************************************
# label: %name%<br>%notes%
# style: whiteSpace=wrap;html=1;rounded=1;fillColor=#ffffff;strokeColor=#000000;
# namespace: csvimport-
# connect: {"from": "refs", "to": "id", "style": "fontSize=11;"}
# connect: {"from": "ingress", "to": "id", "invert": true, "style": "dashed=1;fontSize=11;"}
# connect: {"from": "egress", "to": "id", "style": "dashed=1;fontSize=11;"}
# width: auto
# height: auto
# padding: 5
# ignore: id,refs,ingress,egress
# link: url
# nodespacing: 60
# levelspacing: 60
# edgespacing: 40
# layout: auto
## **********************************************************
## CSV Data
## **********************************************************
id,name,notes,refs,ingress,egress
"#;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to create {}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes the cluster's graph to `path`, replacing any existing file.
///
/// Returns the number of data rows written.
#[instrument(skip(cluster), fields(path = %path.display()))]
pub fn export(cluster: &Cluster, path: &Path) -> Result<usize, ExportError> {
    let graph = Graph::from_cluster(cluster);

    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    graph
        .write_to(&mut out)
        .and_then(|()| out.flush())
        .map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(rows = graph.len(), "Wrote graph");
    Ok(graph.len())
}

// === impl Graph ===

impl Graph {
    /// Writes the preamble followed by one CSV record per row.
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        out.write_all(PREAMBLE.as_bytes())?;

        let mut records = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);
        for (id, row) in self.rows().iter().enumerate() {
            records
                .write_record(&row.record(id))
                .map_err(io::Error::from)?;
        }
        records.flush()
    }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpol_graph_core::{
        IpBlock, Labels, PeerLabels, PeerSpec, PolicySpec, PolicyType, Resolver, RuleSpec,
    };
    use std::iter::FromIterator;

    fn cluster_a() -> Cluster {
        let mut cluster = Cluster::default();
        let ns = cluster.add_namespace("default", Labels::default()).unwrap();
        cluster.add_workload(ns, "a", Labels::from_iter(Some(("app", "a"))));
        cluster.add_workload(ns, "b", Labels::default());
        cluster
    }

    #[test]
    fn preamble_ends_with_header() {
        assert!(PREAMBLE.ends_with(&format!("{}\n", HEADER)));
    }

    #[test]
    fn empty_cluster_writes_preamble() {
        let text = Graph::from_cluster(&Cluster::default()).to_text();
        assert_eq!(text, PREAMBLE);
    }

    #[test]
    fn quotes_multiple_refs() {
        let text = Graph::from_cluster(&cluster_a()).to_text();
        let data = text.strip_prefix(PREAMBLE).expect("must start with preamble");
        assert_eq!(data, "0,default,,\"1,2\",,\n1,a,default,,,\n2,b,default,,,\n");
    }

    #[test]
    fn quotes_multiline_notes() {
        let cluster = cluster_a();
        let ns = cluster.namespace_id("default").unwrap();
        let mut resolver = Resolver::new(cluster, PeerLabels::default());
        resolver.apply(
            ns,
            &PolicySpec {
                name: "allow-cidr".to_string(),
                pod_selector: Some(("app", "a")).into_iter().collect(),
                policy_types: Some(PolicyType::Ingress).into_iter().collect(),
                ingress: vec![RuleSpec {
                    peers: vec![PeerSpec::IpBlock(IpBlock {
                        cidr: "10.0.0.0/8".to_string(),
                        except: vec!["10.1.0.0/16".to_string(), "10.2.0.0/16".to_string()],
                    })],
                    ports: vec![],
                }],
                egress: vec![],
            },
        );

        let text = Graph::from_cluster(&resolver.into_cluster()).to_text();
        let data = text.strip_prefix(PREAMBLE).expect("must start with preamble");
        assert_eq!(
            data,
            "0,default,,\"1,2\",,\n\
             1,a,default,,3,\n\
             2,b,default,,,\n\
             3,10.0.0.0/8,\"10.1.0.0/16\n10.2.0.0/16\",,,\n"
        );
    }

    #[test]
    fn exports_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawio.txt");
        std::fs::write(&path, "stale").unwrap();

        let rows = export(&cluster_a(), &path).unwrap();
        assert_eq!(rows, 3);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, Graph::from_cluster(&cluster_a()).to_text());
    }

    #[test]
    fn reports_create_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("drawio.txt");

        let error = export(&cluster_a(), &path).unwrap_err();
        assert!(matches!(error, ExportError::Create { .. }));
        assert!(error.to_string().starts_with("failed to create "));
    }
}
