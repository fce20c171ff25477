//! Shared fixtures: in-memory CAR files and index responses

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use cid::Cid;
use ipld_core::ipld::Ipld;
use multihash::Multihash;
use prost::Message;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use spark_retrieval::dag::{PbLink, PbNode, DAG_PB, RAW};
use spark_retrieval::{IndexerConfig, RetrievalConfig, RetryConfig};
use wiremock::MockServer;

pub const CID_FRISBII: &str = "bafkreih25dih6ug3xtj73vswccw423b56ilrwmnos4cbwhrceudopdp5sq";
pub const PEER_ID: &str = "12D3KooWC8gXxg9LoJ9h3hy3jzBkEAxamyHEQJKtRmAuBuvoMzpr";

/// base64(varint(0x920))
pub const HTTP_METADATA: &str = "oBI=";
/// base64(varint(0x910))
pub const GRAPHSYNC_METADATA: &str = "kBI=";
/// base64(varint(0x900))
pub const BITSWAP_METADATA: &str = "gBI=";

pub fn cid_for(codec: u64, data: &[u8]) -> Cid {
    Cid::new_v1(codec, Multihash::<64>::wrap(0x12, &Sha256::digest(data)).unwrap())
}

pub fn raw_cid(data: &[u8]) -> Cid {
    cid_for(RAW, data)
}

fn varint(n: usize) -> Vec<u8> {
    let mut buf = unsigned_varint::encode::usize_buffer();
    unsigned_varint::encode::usize(n, &mut buf).to_vec()
}

/// CARv1 bytes with the given sections, CIDs taken as-is
pub fn car_v1(roots: &[Cid], sections: &[(Cid, Vec<u8>)]) -> Vec<u8> {
    let header = Ipld::Map(BTreeMap::from([
        ("version".to_string(), Ipld::Integer(1)),
        (
            "roots".to_string(),
            Ipld::List(roots.iter().map(|cid| Ipld::Link(*cid)).collect()),
        ),
    ]));
    let header = serde_ipld_dagcbor::to_vec(&header).unwrap();

    let mut out = varint(header.len());
    out.extend_from_slice(&header);
    for (cid, data) in sections {
        let cid = cid.to_bytes();
        out.extend(varint(cid.len() + data.len()));
        out.extend_from_slice(&cid);
        out.extend_from_slice(data);
    }
    out
}

/// A CAR holding a single raw block
pub fn single_block_car(data: &[u8]) -> (Cid, Vec<u8>) {
    let cid = raw_cid(data);
    (cid, car_v1(&[cid], &[(cid, data.to_vec())]))
}

/// dag-pb node linking to `children`
pub fn dag_pb_node(children: &[Cid]) -> (Cid, Vec<u8>) {
    let node = PbNode {
        links: children
            .iter()
            .map(|cid| PbLink {
                hash: Some(cid.to_bytes()),
                name: None,
                tsize: None,
            })
            .collect(),
        data: Some(vec![0x08, 0x02]),
    };
    let bytes = node.encode_to_vec();
    (cid_for(DAG_PB, &bytes), bytes)
}

pub fn checksum_of(bytes: &[u8]) -> String {
    format!("1220{}", hex::encode(Sha256::digest(bytes)))
}

/// `/ip4/127.0.0.1/tcp/<port>/http` for a mock server
pub fn multiaddr_of(server: &MockServer) -> String {
    format!("/ip4/127.0.0.1/tcp/{}/http", server.address().port())
}

/// Index response body with one provider result per `(peer, addr, metadata)`
pub fn index_response(records: &[(&str, &str, &str)]) -> Value {
    let results: Vec<Value> = records
        .iter()
        .map(|(peer, addr, metadata)| {
            json!({
                "ContextID": "AAAA",
                "Metadata": metadata,
                "Provider": { "ID": peer, "Addrs": [addr] },
            })
        })
        .collect();
    json!({ "MultihashResults": [{ "Multihash": "EiA=", "ProviderResults": results }] })
}

pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 1,
        backoff_factor: 1.0,
        max_delay_ms: 1,
    }
}

pub fn indexer_config(server: &MockServer) -> IndexerConfig {
    IndexerConfig {
        base_url: server.uri(),
        retry: fast_retry(3),
    }
}

pub fn retrieval_config() -> RetrievalConfig {
    RetrievalConfig {
        idle_timeout_ms: 5_000,
        max_request_duration_ms: 10_000,
        head_timeout_ms: 2_000,
        ..RetrievalConfig::default()
    }
}

pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
