//! Adaptive polling scenarios.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{Scripted, ScriptedFeed, ingestor, item, page, register_contract, tx_hash};
use inkscore_indexer::poller::{AdaptivePoller, PollState};
use inkscore_indexer::ports::{ContractStore, CursorStore, TransactionStore};
use inkscore_indexer::store::MemoryStore;
use inkscore_indexer::types::enums::IndexType;

async fn completed_contract(
    store: &Arc<MemoryStore>,
    n: u8,
) -> inkscore_indexer::types::entities::Contract {
    let contract = register_contract(store, n, IndexType::Volume).await;
    ContractStore::mark_complete(store.as_ref(), &contract.address, 0)
        .await
        .unwrap();
    ContractStore::get(store.as_ref(), &contract.address)
        .await
        .unwrap()
        .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════════
// POLL WITH ACTIVITY SURGE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn activity_surge_collapses_interval() {
    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(ScriptedFeed::new());
    let contract = completed_contract(&store, 1).await;

    // Seven fresh rows, newest-first as the poll query requests.
    feed.script_page(
        "",
        Scripted::Ok(page(
            (1..=7).rev().map(|n| item(n, 400 + u64::from(n))).collect(),
            Some(7),
            None,
        )),
    );

    let poller = AdaptivePoller::new(
        store.clone(),
        store.clone(),
        ingestor(feed, store.clone()),
        common::poller_settings(),
    );

    // One empty poll already happened: interval widened to 60 s.
    poller.prime(
        contract.address,
        PollState {
            last_poll_at: Some(Instant::now() - Duration::from_secs(120)),
            interval: Duration::from_secs(60),
            consecutive_empty: 1,
        },
    );

    let report = poller
        .poll_contract(&contract.address, &CancellationToken::new())
        .await
        .expect("poll succeeds");

    assert_eq!(report.rows_inserted, 7);
    assert_eq!(store.transaction_count(), 7);

    let state = poller.state(&contract.address).expect("state");
    assert_eq!(state.interval, Duration::from_secs(15));
    assert_eq!(state.consecutive_empty, 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// EARLY TERMINATION
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn poll_stops_at_first_known_hash() {
    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(ScriptedFeed::new());
    let contract = completed_contract(&store, 1).await;
    let cancel = CancellationToken::new();

    // Backfill h1/h2 first so the poll finds a known row.
    feed.script_page(
        "",
        Scripted::Ok(page(vec![item(1, 100), item(2, 101)], Some(2), None)),
    );
    let shared_ingestor = ingestor(feed.clone(), store.clone());
    shared_ingestor
        .ingest(
            &contract,
            inkscore_indexer::types::enums::IngestMode::Backfill,
            None,
            &cancel,
            None,
        )
        .await
        .expect("seed backfill");

    // Poll page: two new rows, then the known h2. A further page exists
    // but must never be requested.
    feed.script_page(
        "",
        Scripted::Ok(page(
            vec![item(4, 103), item(3, 102), item(2, 101), item(1, 100)],
            Some(4),
            Some("tok-deep"),
        )),
    );

    let poller = AdaptivePoller::new(
        store.clone(),
        store.clone(),
        shared_ingestor,
        common::poller_settings(),
    );
    poller.prime(
        contract.address,
        PollState {
            last_poll_at: None,
            interval: Duration::from_secs(15),
            consecutive_empty: 0,
        },
    );

    let report = poller
        .poll_contract(&contract.address, &cancel)
        .await
        .expect("poll succeeds");

    assert_eq!(report.rows_inserted, 2);
    assert_eq!(store.transaction_count(), 4);
    assert!(TransactionStore::contains(store.as_ref(), &tx_hash(4)).await.unwrap());

    // Early termination: the deeper page was never fetched.
    assert!(!feed.served().contains(&"tok-deep".to_string()));

    // Poll keeps the cursor complete and advances the block high-water mark.
    let cursor = CursorStore::get(store.as_ref(), &contract.address)
        .await
        .unwrap()
        .expect("cursor");
    assert!(cursor.is_complete);
    assert_eq!(cursor.last_block_indexed.map(|b| b.value()), Some(103));
    assert!(cursor.last_page_token.is_none());
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMPTY AND FAILED POLLS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn empty_poll_widens_interval() {
    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(ScriptedFeed::new());
    let contract = completed_contract(&store, 1).await;

    feed.script_page("", Scripted::Ok(page(vec![], Some(0), None)));

    let poller = AdaptivePoller::new(
        store.clone(),
        store.clone(),
        ingestor(feed, store.clone()),
        common::poller_settings(),
    );
    poller.prime(
        contract.address,
        PollState {
            last_poll_at: None,
            interval: Duration::from_secs(15),
            consecutive_empty: 0,
        },
    );

    poller
        .poll_contract(&contract.address, &CancellationToken::new())
        .await
        .expect("poll succeeds");

    let state = poller.state(&contract.address).expect("state");
    assert_eq!(state.interval, Duration::from_secs(60));
    assert_eq!(state.consecutive_empty, 1);
}

#[tokio::test]
async fn failed_poll_backs_off() {
    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(ScriptedFeed::new());
    let contract = completed_contract(&store, 1).await;

    feed.script_page("", Scripted::Transient);

    let poller = AdaptivePoller::new(
        store.clone(),
        store.clone(),
        ingestor(feed, store.clone()),
        common::poller_settings(),
    );
    poller.prime(
        contract.address,
        PollState {
            last_poll_at: None,
            interval: Duration::from_secs(30),
            consecutive_empty: 0,
        },
    );

    let result = poller
        .poll_contract(&contract.address, &CancellationToken::new())
        .await;
    assert!(result.is_err());

    // Backoff applied despite the error.
    let state = poller.state(&contract.address).expect("state");
    assert_eq!(state.interval, Duration::from_secs(60));
    assert_eq!(state.consecutive_empty, 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULING
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn never_polled_contracts_sort_first() {
    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(ScriptedFeed::new());
    let fresh = completed_contract(&store, 1).await;
    let seasoned = completed_contract(&store, 2).await;

    let poller = AdaptivePoller::new(
        store.clone(),
        store.clone(),
        ingestor(feed, store.clone()),
        common::poller_settings(),
    );

    let now = Instant::now();
    poller.prime(
        seasoned.address,
        PollState {
            last_poll_at: Some(now - Duration::from_secs(600)),
            interval: Duration::from_secs(15),
            consecutive_empty: 0,
        },
    );
    poller.prime(
        fresh.address,
        PollState {
            last_poll_at: None,
            interval: Duration::from_secs(15),
            consecutive_empty: 0,
        },
    );

    assert_eq!(poller.next_due(now), Some(fresh.address));
}

#[tokio::test]
async fn nothing_due_returns_none() {
    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(ScriptedFeed::new());
    let contract = completed_contract(&store, 1).await;

    let poller = AdaptivePoller::new(
        store.clone(),
        store.clone(),
        ingestor(feed, store.clone()),
        common::poller_settings(),
    );

    let now = Instant::now();
    poller.prime(
        contract.address,
        PollState {
            last_poll_at: Some(now),
            interval: Duration::from_secs(15),
            consecutive_empty: 0,
        },
    );

    assert_eq!(poller.next_due(now), None);
}
