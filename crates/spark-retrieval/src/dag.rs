//! Link extraction for the DAG codecs used by UnixFS and friends

use cid::Cid;
use ipld_core::ipld::Ipld;
use prost::Message;

pub const DAG_PB: u64 = 0x70;
pub const DAG_CBOR: u64 = 0x71;
pub const RAW: u64 = 0x55;

/// `PBNode` from the dag-pb schema
#[derive(Clone, PartialEq, Message)]
pub struct PbNode {
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<PbLink>,
    #[prost(bytes = "vec", optional, tag = "1")]
    pub data: Option<Vec<u8>>,
}

/// `PBLink` from the dag-pb schema
#[derive(Clone, PartialEq, Message)]
pub struct PbLink {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub hash: Option<Vec<u8>>,
    #[prost(string, optional, tag = "2")]
    pub name: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub tsize: Option<u64>,
}

/// Decode the `Links[].Hash` targets of a block.
///
/// Returns `Ok(None)` for codecs that carry no links (raw and unknown codecs).
pub fn decode_links(cid: &Cid, bytes: &[u8]) -> Result<Option<Vec<Cid>>, String> {
    match cid.codec() {
        DAG_PB => dag_pb_links(bytes).map(Some),
        DAG_CBOR => dag_cbor_links(bytes).map(Some),
        _ => Ok(None),
    }
}

fn dag_pb_links(bytes: &[u8]) -> Result<Vec<Cid>, String> {
    let node = PbNode::decode(bytes).map_err(|err| format!("invalid dag-pb node: {}", err))?;
    node.links
        .iter()
        .map(|link| {
            let hash = link
                .hash
                .as_deref()
                .ok_or_else(|| "dag-pb link without Hash".to_string())?;
            Cid::try_from(hash).map_err(|err| format!("invalid dag-pb link: {}", err))
        })
        .collect()
}

fn dag_cbor_links(bytes: &[u8]) -> Result<Vec<Cid>, String> {
    let node: Ipld =
        serde_ipld_dagcbor::from_slice(bytes).map_err(|err| format!("invalid dag-cbor node: {}", err))?;

    let links = match &node {
        Ipld::Map(map) => match map.get("Links") {
            Some(Ipld::List(links)) => links,
            Some(_) => return Err("Links is not a list".to_string()),
            None => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };

    links
        .iter()
        .map(|link| match link {
            Ipld::Map(link) => match link.get("Hash") {
                Some(Ipld::Link(cid)) => Ok(*cid),
                _ => Err("dag-cbor link without Hash".to_string()),
            },
            _ => Err("dag-cbor link is not a map".to_string()),
        })
        .collect()
}
