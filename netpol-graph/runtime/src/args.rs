use crate::{core::PeerLabels, k8s};
use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

const INSTRUCTIONS: &str = "\
To view the graph in draw.io:
  1. Open https://app.diagrams.net and create a blank diagram
  2. Select Arrange > Insert > Advanced > CSV
  3. Replace the sample text with the contents of the output file
  4. Select Import";

/// Renders the connections Kubernetes network policies allow as a draw.io
/// diagram.
#[derive(Debug, Parser)]
#[clap(name = "netpol-graph", version, about)]
pub struct Args {
    #[clap(long, default_value = "netpol_graph=info,warn", env = "NETPOL_GRAPH_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    /// Path to the kubeconfig file.
    ///
    /// Defaults to `~/.kube/config`. When that doesn't exist, the in-cluster
    /// configuration is used.
    #[clap(long)]
    kubeconfig: Option<PathBuf>,

    /// The draw.io CSV file to write.
    #[clap(long = "outputfile", default_value = "drawio.txt")]
    output_file: PathBuf,

    /// Whose labels a peer's pod selector is matched against: the `candidate`
    /// peer's or the policy `owner`'s.
    #[clap(long, default_value = "candidate")]
    peer_labels: PeerLabels,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            kubeconfig,
            output_file,
            peer_labels,
        } = self;

        log_format
            .try_init(log_level)
            .expect("must configure logging");

        let kubeconfig = kubeconfig.or_else(default_kubeconfig);
        debug!(kubeconfig = ?kubeconfig, %peer_labels);
        if let Err(error) = export(kubeconfig.as_deref(), peer_labels, &output_file).await {
            error!("{:#}", error);
            return Err(error);
        }

        println!("Wrote {}\n\n{}", output_file.display(), INSTRUCTIONS);
        Ok(())
    }
}

async fn export(
    kubeconfig: Option<&Path>,
    peer_labels: PeerLabels,
    output: &Path,
) -> Result<usize> {
    let client = k8s::client(kubeconfig).await?;
    crate::build(&k8s::KubeSource::new(client), peer_labels, output).await
}

fn default_kubeconfig() -> Option<PathBuf> {
    let path = dirs::home_dir()?.join(".kube").join("config");
    path.try_exists().unwrap_or(false).then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["netpol-graph"]).unwrap();
        assert_eq!(args.kubeconfig, None);
        assert_eq!(args.output_file, PathBuf::from("drawio.txt"));
        assert_eq!(args.peer_labels, PeerLabels::Candidate);
    }

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "netpol-graph",
            "--kubeconfig",
            "/tmp/kubeconfig",
            "--outputfile",
            "graph.csv",
            "--peer-labels",
            "owner",
        ])
        .unwrap();
        assert_eq!(args.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        assert_eq!(args.output_file, PathBuf::from("graph.csv"));
        assert_eq!(args.peer_labels, PeerLabels::Owner);
    }

    #[test]
    fn rejects_unknown_peer_labels() {
        assert!(Args::try_parse_from(["netpol-graph", "--peer-labels", "sideways"]).is_err());
    }
}
