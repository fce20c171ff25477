//! End-to-end retrieval checks against mocked index and provider endpoints

mod common;

use std::sync::Arc;

use anyhow::Result;
use common::*;
use spark_error::StatusCode;
use spark_retrieval::{
    FixedPeerId, IndexerClient, IndexerConfig, Orchestrator, RetrievalChecker, RetrievalConfig,
};
use spark_types::{IndexerResult, Protocol, RetrievalTask, Stats};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CAR: &str = "application/vnd.ipld.car";

async fn mount_car(server: &MockServer, cid: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/ipfs/{}", cid)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", CAR)
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

async fn check(server: &MockServer, config: RetrievalConfig, cid: &str) -> Stats {
    let checker = RetrievalChecker::new(reqwest::Client::new(), config);
    let mut stats = Stats::new();
    checker
        .check_retrieval(Protocol::Http, &multiaddr_of(server), cid, &mut stats)
        .await;
    stats
}

#[tokio::test]
async fn test_execute_check_end_to_end() -> Result<()> {
    let (cid, car) = single_block_car(b"hello from frisbii");
    let cid = cid.to_string();

    let provider = MockServer::start().await;
    mount_car(&provider, &cid, car.clone()).await;
    Mock::given(method("HEAD"))
        .and(path(format!("/ipfs/{}", cid)))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&provider)
        .await;

    let index = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/cid/{}", cid)))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_response(&[(
            PEER_ID,
            &multiaddr_of(&provider),
            HTTP_METADATA,
        )])))
        .mount(&index)
        .await;

    let http = reqwest::Client::new();
    let orchestrator = Orchestrator::new(
        Arc::new(FixedPeerId(PEER_ID.to_string())),
        IndexerClient::new(http.clone(), &indexer_config(&index)),
        RetrievalChecker::new(http, retrieval_config()),
    );

    let task = RetrievalTask::new("1", cid.clone(), "f01spark");
    let stats = orchestrator.execute_check(&task).await?;

    assert_eq!(stats.provider_id.as_deref(), Some(PEER_ID));
    assert_eq!(stats.indexer_result, Some(IndexerResult::Ok));
    assert_eq!(stats.protocol, Some(Protocol::Http));
    assert_eq!(stats.provider_address, Some(multiaddr_of(&provider)));
    assert_eq!(stats.status_code, Some(200));
    assert_eq!(stats.head_status_code, Some(405));
    assert_eq!(stats.byte_length, car.len() as u64);
    assert_eq!(stats.car_checksum, Some(checksum_of(&car)));
    assert!(!stats.timeout);
    assert!(!stats.car_too_large);
    assert!(stats.full_verification);
    assert!(stats.first_byte_at.is_some());
    assert!(stats.end_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_no_provider_skips_retrieval() -> Result<()> {
    let index = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_response(&[(
            "12D3KooWsomeoneelse",
            "/dns/example.com/https",
            HTTP_METADATA,
        )])))
        .mount(&index)
        .await;

    let http = reqwest::Client::new();
    let orchestrator = Orchestrator::new(
        Arc::new(FixedPeerId(PEER_ID.to_string())),
        IndexerClient::new(http.clone(), &indexer_config(&index)),
        RetrievalChecker::new(http, retrieval_config()),
    );

    let stats = orchestrator
        .execute_check(&RetrievalTask::new("2", CID_FRISBII, "f01234"))
        .await?;
    assert_eq!(stats.indexer_result, Some(IndexerResult::NoValidAdvertisement));
    assert_eq!(stats.status_code, None);
    assert_eq!(stats.protocol, None);
    assert_eq!(stats.byte_length, 0);
    Ok(())
}

#[tokio::test]
async fn test_idle_timeout() {
    let (cid, car) = single_block_car(b"slow provider");
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(car)
                .set_delay(millis(3_000)),
        )
        .mount(&provider)
        .await;

    let config = RetrievalConfig {
        idle_timeout_ms: 200,
        ..retrieval_config()
    };
    let stats = check(&provider, config, &cid.to_string()).await;

    assert!(stats.timeout);
    assert_eq!(stats.status_code, Some(StatusCode::UNKNOWN_ERROR));
    assert_eq!(stats.byte_length, 0);
    assert_eq!(stats.car_checksum, None);
}

/// Provider that answers 200, sends the first chunk of the body and then
/// goes quiet with the connection still open.
async fn stalling_provider(first_chunk: Vec<u8>) -> (u16, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = socket.read(&mut buf).await.unwrap();
            if read == 0 {
                return;
            }
            request.extend_from_slice(&buf[..read]);
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: {}\r\ntransfer-encoding: chunked\r\n\r\n",
            CAR
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket
            .write_all(format!("{:x}\r\n", first_chunk.len()).as_bytes())
            .await
            .unwrap();
        socket.write_all(&first_chunk).await.unwrap();
        socket.write_all(b"\r\n").await.unwrap();
        socket.flush().await.unwrap();

        tokio::time::sleep(millis(5_000)).await;
    });
    (port, server)
}

#[tokio::test]
async fn test_idle_timeout_after_first_chunk() {
    let (cid, car) = single_block_car(&[7u8; 512]);
    let half = car[..car.len() / 2].to_vec();
    let (port, server) = stalling_provider(half.clone()).await;

    let checker = RetrievalChecker::new(
        reqwest::Client::new(),
        RetrievalConfig {
            idle_timeout_ms: 300,
            ..retrieval_config()
        },
    );
    let mut stats = Stats::new();
    checker
        .check_retrieval(
            Protocol::Http,
            &format!("/ip4/127.0.0.1/tcp/{}/http", port),
            &cid.to_string(),
            &mut stats,
        )
        .await;
    server.abort();

    assert!(stats.timeout);
    assert_eq!(stats.byte_length, half.len() as u64);
    assert!(stats.first_byte_at.is_some());
    // the 200 from the response head does not survive the stall
    assert_eq!(stats.status_code, Some(StatusCode::UNKNOWN_ERROR));
    assert_eq!(stats.car_checksum, None);
}

#[tokio::test]
async fn test_request_deadline() {
    let (cid, car) = single_block_car(b"slow provider");
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(car)
                .set_delay(millis(3_000)),
        )
        .mount(&provider)
        .await;

    let config = RetrievalConfig {
        max_request_duration_ms: 300,
        ..retrieval_config()
    };
    let stats = check(&provider, config, &cid.to_string()).await;

    assert!(stats.timeout);
    assert_eq!(stats.status_code, Some(600));
}

#[tokio::test]
async fn test_oversized_car_is_flagged_and_verified() {
    let (cid, car) = single_block_car(&[7u8; 4096]);
    let cid = cid.to_string();
    let provider = MockServer::start().await;
    mount_car(&provider, &cid, car.clone()).await;

    let config = RetrievalConfig {
        max_car_size: 1024,
        ..retrieval_config()
    };
    let stats = check(&provider, config, &cid).await;

    assert!(stats.car_too_large);
    assert_eq!(stats.status_code, Some(200));
    assert_eq!(stats.byte_length, car.len() as u64);
    assert_eq!(stats.car_checksum, Some(checksum_of(&car)));
}

#[tokio::test]
async fn test_hash_mismatch() {
    let claimed = raw_cid(b"expected content");
    let car = car_v1(&[claimed], &[(claimed, b"tampered content".to_vec())]);
    let provider = MockServer::start().await;
    mount_car(&provider, &claimed.to_string(), car.clone()).await;

    let stats = check(&provider, retrieval_config(), &claimed.to_string()).await;

    assert_eq!(stats.status_code, Some(StatusCode::HASH_MISMATCH));
    assert_eq!(stats.byte_length, car.len() as u64);
    assert_eq!(stats.car_checksum, None);
}

#[tokio::test]
async fn test_unparseable_car() {
    let cid = raw_cid(b"anything").to_string();
    let provider = MockServer::start().await;
    mount_car(&provider, &cid, b"definitely not a CAR".to_vec()).await;

    let stats = check(&provider, retrieval_config(), &cid).await;
    assert_eq!(stats.status_code, Some(StatusCode::CANNOT_PARSE_CAR_BYTES));
}

#[tokio::test]
async fn test_dag_fallback_accepts_complete_node() {
    let leaf_a = b"chunk a".to_vec();
    let leaf_b = b"chunk b".to_vec();
    let (node_cid, node) = dag_pb_node(&[raw_cid(&leaf_a), raw_cid(&leaf_b)]);
    let car = car_v1(
        &[node_cid],
        &[
            (raw_cid(&leaf_a), leaf_a),
            (node_cid, node),
            (raw_cid(&leaf_b), leaf_b),
        ],
    );

    // requested under a CID the CAR does not carry directly
    let requested = raw_cid(b"file as requested").to_string();
    let provider = MockServer::start().await;
    mount_car(&provider, &requested, car.clone()).await;

    let stats = check(&provider, retrieval_config(), &requested).await;
    assert_eq!(stats.status_code, Some(200));
    assert_eq!(stats.car_checksum, Some(checksum_of(&car)));
}

#[tokio::test]
async fn test_incomplete_dag() {
    let (node_cid, node) = dag_pb_node(&[raw_cid(b"missing leaf")]);
    let car = car_v1(&[node_cid], &[(node_cid, node)]);
    let requested = raw_cid(b"file as requested").to_string();
    let provider = MockServer::start().await;
    mount_car(&provider, &requested, car).await;

    let stats = check(&provider, retrieval_config(), &requested).await;
    assert_eq!(stats.status_code, Some(600));
    assert_eq!(stats.car_checksum, None);
}

#[tokio::test]
async fn test_unexpected_block_in_block_scope() {
    let (cid, _) = single_block_car(b"root");
    let extra = raw_cid(b"extra");
    let car = car_v1(&[cid], &[(cid, b"root".to_vec()), (extra, b"extra".to_vec())]);
    let provider = MockServer::start().await;
    mount_car(&provider, &cid.to_string(), car).await;

    let config = RetrievalConfig {
        full_verification: false,
        ..retrieval_config()
    };
    let stats = check(&provider, config, &cid.to_string()).await;
    assert_eq!(stats.status_code, Some(StatusCode::UNEXPECTED_CAR_BLOCK));
    assert!(!stats.full_verification);
}

#[tokio::test]
async fn test_raw_block_response() {
    let data = b"served as a raw block".to_vec();
    let cid = raw_cid(&data).to_string();
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/ipfs/{}", cid)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/vnd.ipld.raw")
                .set_body_bytes(data.clone()),
        )
        .mount(&provider)
        .await;

    let stats = check(&provider, retrieval_config(), &cid).await;
    assert_eq!(stats.status_code, Some(200));
    assert_eq!(stats.car_checksum, Some(checksum_of(&data)));
}

#[tokio::test]
async fn test_error_status_is_recorded() {
    let cid = raw_cid(b"not stored").to_string();
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("block not found\n"))
        .mount(&provider)
        .await;

    let stats = check(&provider, retrieval_config(), &cid).await;
    assert_eq!(stats.status_code, Some(404));
    assert!(!stats.timeout);
    assert_eq!(stats.byte_length, 0);
    assert_eq!(stats.car_checksum, None);
}

#[tokio::test]
async fn test_empty_body() {
    let cid = raw_cid(b"empty").to_string();
    let provider = MockServer::start().await;
    mount_car(&provider, &cid, Vec::new()).await;

    let stats = check(&provider, retrieval_config(), &cid).await;
    assert_eq!(stats.status_code, Some(600));
}

#[tokio::test]
async fn test_connection_refused_is_tcp_connect_error() {
    let checker = RetrievalChecker::new(reqwest::Client::new(), retrieval_config());
    let mut stats = Stats::new();
    checker
        .check_retrieval(Protocol::Http, "/ip4/127.0.0.1/tcp/1/http", CID_FRISBII, &mut stats)
        .await;

    assert_eq!(stats.status_code, Some(StatusCode::TCP_CONNECT_ERROR));
    assert!(!stats.timeout);

    checker
        .test_head_request("/ip4/127.0.0.1/tcp/1/http", CID_FRISBII, &mut stats)
        .await;
    assert_eq!(stats.head_status_code, Some(StatusCode::TCP_CONNECT_ERROR));
}

#[tokio::test]
#[ignore = "needs a working DNS resolver"]
async fn test_unknown_host_is_dns_error() {
    let checker = RetrievalChecker::new(reqwest::Client::new(), retrieval_config());
    let mut stats = Stats::new();
    checker
        .check_retrieval(Protocol::Http, "/dns/spark.invalid/tcp/80/http", CID_FRISBII, &mut stats)
        .await;
    assert_eq!(stats.status_code, Some(StatusCode::DNS_ERROR));
}

#[tokio::test]
async fn test_invalid_multiaddr_is_classified() {
    let checker = RetrievalChecker::new(reqwest::Client::new(), retrieval_config());
    let mut stats = Stats::new();
    checker
        .check_retrieval(Protocol::Http, "/ip4/127.0.0.1/udp/90", CID_FRISBII, &mut stats)
        .await;
    assert_eq!(stats.status_code, Some(StatusCode::UNSUPPORTED_MULTIADDR_PROTO));

    checker
        .test_head_request("/ip4/127.0.0.1/tcp/80", CID_FRISBII, &mut stats)
        .await;
    assert_eq!(stats.head_status_code, Some(StatusCode::UNSUPPORTED_MULTIADDR_SCHEME));
}

#[tokio::test]
async fn test_graphsync_without_gateway() {
    let checker = RetrievalChecker::new(reqwest::Client::new(), retrieval_config());
    let mut stats = Stats::new();
    checker
        .check_retrieval(
            Protocol::Graphsync,
            &format!("/ip4/1.2.3.4/tcp/24001/p2p/{}", PEER_ID),
            CID_FRISBII,
            &mut stats,
        )
        .await;
    assert_eq!(stats.status_code, Some(600));
}

#[tokio::test]
async fn test_graphsync_through_gateway() {
    let (cid, car) = single_block_car(b"graphsync content");
    let cid = cid.to_string();
    let lassie = MockServer::start().await;
    mount_car(&lassie, &cid, car.clone()).await;

    let config = RetrievalConfig {
        lassie_url: Some(lassie.uri()),
        ..retrieval_config()
    };
    let checker = RetrievalChecker::new(reqwest::Client::new(), config);
    let mut stats = Stats::new();
    checker
        .check_retrieval(
            Protocol::Graphsync,
            &format!("/ip4/1.2.3.4/tcp/24001/p2p/{}", PEER_ID),
            &cid,
            &mut stats,
        )
        .await;

    assert_eq!(stats.status_code, Some(200));
    assert_eq!(stats.car_checksum, Some(checksum_of(&car)));
}

/// Retrieves the known CID from the public frisbii deployment.
#[tokio::test]
#[ignore = "requires network access to cid.contact and frisbii.fly.dev"]
async fn test_retrieval_check_for_our_cid() -> Result<()> {
    let http = reqwest::Client::new();
    let orchestrator = Orchestrator::new(
        Arc::new(FixedPeerId(PEER_ID.to_string())),
        IndexerClient::new(http.clone(), &IndexerConfig::default()),
        RetrievalChecker::new(http, RetrievalConfig::default()),
    );

    let stats = orchestrator
        .execute_check(&RetrievalTask::new("live", CID_FRISBII, "f01spark"))
        .await?;

    assert_eq!(stats.indexer_result, Some(IndexerResult::Ok));
    assert_eq!(
        stats.provider_address.as_deref(),
        Some("/dns/frisbii.fly.dev/tcp/443/https")
    );
    assert_eq!(stats.protocol, Some(Protocol::Http));
    assert!(!stats.timeout);
    assert_eq!(stats.status_code, Some(200));
    assert_eq!(stats.head_status_code, Some(405));
    assert_eq!(stats.byte_length, 200);
    assert!(!stats.car_too_large);
    Ok(())
}
