#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netpol_graph_core as core;
pub use netpol_graph_drawio as drawio;
pub use netpol_graph_k8s as k8s;

mod args;


pub use self::args::Args;

use self::core::{ClusterDataSource, Inventory, PeerLabels};
use anyhow::Result;
use std::path::Path;
use tracing::{info, instrument};

/// Loads the cluster from `source`, resolves its policies and writes the graph
/// to `output`.
///
/// Nothing is written unless the whole inventory loads. Returns the number of
/// rows written.
#[instrument(skip(source, output), fields(output = %output.display()))]
pub async fn build<S>(source: &S, peer_labels: PeerLabels, output: &Path) -> Result<usize>
where
    S: ClusterDataSource + Sync,
{
    let inventory = Inventory::load(source).await?;
    let cluster = inventory.resolve(peer_labels);
    let rows = drawio::export(&cluster, output)?;
    info!(rows, "Exported graph");
    Ok(rows)
}
