//! Manual one-off retrieval check

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use spark_retrieval::{retrieval_url, FixedPeerId, Orchestrator, SparkConfig};
use spark_types::{Protocol, RetrievalTask, Stats};
use tracing::info;

const LASSIE_INSTALL_URL: &str =
    "https://github.com/filecoin-project/lassie?tab=readme-ov-file#installation";

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// CID to retrieve
    #[arg(long)]
    pub cid: String,

    /// Storage provider id, e.g. f017840
    #[arg(long)]
    pub miner_id: String,

    /// Skip peer resolution and use this index-provider peer id
    #[arg(long)]
    pub peer_id: Option<String>,
}

pub async fn run(config: &SparkConfig, args: CheckArgs) -> Result<()> {
    let mut orchestrator = Orchestrator::from_config(config, None)?;
    if let Some(peer_id) = args.peer_id {
        info!(%peer_id, "Using fixed peer id");
        orchestrator = orchestrator.with_peer_resolver(Arc::new(FixedPeerId(peer_id)));
    }

    let task = RetrievalTask::new("manual", args.cid, args.miner_id);
    let stats = orchestrator.execute_check(&task).await?;

    let measurement =
        serde_json::to_string_pretty(&stats).context("Cannot serialize measurement")?;
    println!("Measurement: {}", measurement);
    if let Some(hints) = reproduction_hints(&task.cid, &stats) {
        println!("\n{}", hints);
    }
    Ok(())
}

/// Commands that reproduce a failed retrieval outside the checker.
///
/// Only produced when a provider was found and the retrieval did not return 200.
pub fn reproduction_hints(cid: &str, stats: &Stats) -> Option<String> {
    let address = stats.provider_address.as_deref()?;
    if stats.status_code == Some(200) {
        return None;
    }

    let lassie = |protocol: Protocol| {
        format!(
            "  lassie fetch -o /dev/null -vv --dag-scope block --protocols {} --providers {:?} {}",
            protocol, address, cid
        )
    };

    let mut out = vec!["The retrieval failed.".to_string()];
    match stats.protocol? {
        Protocol::Graphsync => {
            out.push("You can get more details by running Lassie manually:\n".to_string());
            out.push(lassie(Protocol::Graphsync));
        }
        Protocol::Http => match retrieval_url(Protocol::Http, address, cid) {
            Ok(url) => {
                out.push("You can get more details by requesting the following URL yourself:\n".to_string());
                out.push(format!("  {}", url));
                out.push("\nE.g. using `curl`:".to_string());
                out.push(format!("  curl -i {:?}", url));
                out.push("\nYou can also test the retrieval using Lassie:\n".to_string());
                out.push(lassie(Protocol::Http));
            }
            Err(err) => {
                out.push(format!(
                    "The provider address {:?} cannot be converted to a URL: {}",
                    address, err
                ));
                return Some(out.join("\n"));
            }
        },
        Protocol::Bitswap => return None,
    }
    out.push(format!("\nHow to install Lassie: {}", LASSIE_INSTALL_URL));
    Some(out.join("\n"))
}
