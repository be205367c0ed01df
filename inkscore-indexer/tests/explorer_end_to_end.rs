//! End-to-end ingestion through the real explorer client against a
//! wiremock upstream: HTTP, tolerant decoding, pagination, and the
//! canonical mapping all in one path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{contract_address, register_contract, tx_hash};
use inkscore_indexer::ingest::{Ingestor, IngestorConfig};
use inkscore_indexer::ports::CursorStore;
use inkscore_indexer::store::MemoryStore;
use inkscore_indexer::types::enums::{IndexType, IngestMode};
use routescan_client::{ClientConfig, RoutescanClient};

fn fast_client(base_url: String) -> Arc<RoutescanClient> {
    let config = ClientConfig::default()
        .with_timeout(Duration::from_secs(2))
        .with_page_limit(2);
    Arc::new(RoutescanClient::with_config(base_url, config).expect("client"))
}

fn item_json(n: u8, block: u64) -> serde_json::Value {
    serde_json::json!({
        "chainId": 57073,
        "blockNumber": block,
        "index": 0,
        "timestamp": "2025-06-01T12:00:00Z",
        "from": {"id": format!("0xaa000000000000000000000000000000000000{n:02x}")},
        "to": {"id": contract_address(1).to_hex()},
        "txHash": tx_hash(n).to_hex(),
        "value": "1000000000000000000",
        "gasUsed": "21000",
        "methodId": "0xa9059cbb",
        "method": "transfer(address,uint256)",
        "status": true,
        "futureField": {"ignored": true}
    })
}

#[tokio::test]
async fn two_page_backfill_over_http() {
    let server = MockServer::start().await;

    // Page one answers the tokenless request; page two terminates.
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("nextToken", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [item_json(3, 102)],
            "count": 3,
            "link": {}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("sort", "asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [item_json(1, 100), item_json(2, 101)],
            "count": 3,
            "link": {"nextToken": "tok-1"}
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let contract = register_contract(&store, 1, IndexType::Count).await;

    let ingestor = Ingestor::new(
        fast_client(server.uri()),
        store.clone(),
        store.clone(),
        IngestorConfig {
            page_limit: 2,
            min_request_delay: Duration::from_millis(1),
            poll_page_cap: 10,
            insert_chunk_size: 500,
            default_chain_id: 57073,
        },
    );

    let report = ingestor
        .ingest(
            &contract,
            IngestMode::Backfill,
            None,
            &CancellationToken::new(),
            None,
        )
        .await
        .expect("backfill over HTTP");

    assert!(report.completed);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.rows_inserted, 3);
    assert_eq!(store.transaction_count(), 3);

    let cursor = CursorStore::get(store.as_ref(), &contract.address)
        .await
        .unwrap()
        .expect("cursor");
    assert!(cursor.is_complete);
    assert_eq!(cursor.total_indexed, 3);
}
