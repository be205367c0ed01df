//! Explorer HTTP client with transparent retry on transient failures.
//!
//! This module provides [`RoutescanClient`], the main entry point for the
//! explorer list and detail endpoints.
//!
//! # Features
//!
//! - **Token pagination**: The listing endpoint hands back an opaque
//!   `nextToken`; callers thread it through [`TxListQuery::with_next_token`]
//!   and persist it between pages
//! - **Capped backoff**: 429/5xx/connect failures retry with exponential
//!   backoff (1 s doubling, 30 s cap) up to the configured attempt budget,
//!   then surface as a transient error for the orchestration layer
//! - **Tolerant decoding**: see [`crate::types`]
//!
//! # Example
//!
//! ```ignore
//! use routescan_client::{RoutescanClient, TxListQuery};
//!
//! let client = RoutescanClient::new("https://api.example.io/v2")?;
//! let query = TxListQuery::for_contract("0xabc...");
//! let page = client.list_transactions(&query).await?;
//! println!("{} items, next={:?}", page.items.len(), page.link.next_token);
//! ```

use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::config::{ClientConfig, RETRY_MAX_DELAY};
use crate::error::{Result, RoutescanError};
use crate::types::{TxDetail, TxListQuery, TxListResponse};

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTESCAN CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// HTTP client for the explorer list/detail API.
///
/// # Thread Safety
///
/// This client is `Send + Sync` and can be shared across tasks. The internal
/// `reqwest::Client` is designed for concurrent use.
#[derive(Debug, Clone)]
pub struct RoutescanClient {
    /// HTTP client for REST requests.
    http: reqwest::Client,

    /// Base URL of the explorer API, without trailing slash.
    base_url: String,

    /// Client configuration.
    config: ClientConfig,
}

impl RoutescanClient {
    /// Create a new explorer client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(base_url, ClientConfig::default())
    }

    /// Create a new client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn with_config(base_url: impl Into<String>, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                RoutescanError::Connection(format!("Failed to create HTTP client: {e}"))
            })?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Get the base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the current configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ───────────────────────────────────────────────────────────────────────────
    // LIST ENDPOINT
    // ───────────────────────────────────────────────────────────────────────────

    /// Fetch one page of the per-contract transaction listing.
    ///
    /// Pagination is the caller's loop: pass the returned
    /// `link.next_token` back via [`TxListQuery::with_next_token`] until it
    /// comes back absent.
    ///
    /// # Errors
    ///
    /// Transient failures (429, 5xx, timeouts) are retried internally with
    /// capped exponential backoff; the last error surfaces once the attempt
    /// budget is exhausted. Permanent 4xx responses surface immediately.
    #[instrument(skip(self, query), fields(contract = %query.from_addresses, token = query.next_token.is_some()))]
    pub async fn list_transactions(&self, query: &TxListQuery) -> Result<TxListResponse> {
        let url = format!("{}/transactions", self.base_url);
        let params = self.list_params(query);
        self.get_json(&url, &params).await
    }

    /// Fetch the full detail for one transaction hash.
    ///
    /// # Errors
    ///
    /// A 404 means the explorer does not know the hash; callers treat that
    /// as permanent (log and skip). Transient failures retry as in
    /// [`Self::list_transactions`].
    #[instrument(skip(self), fields(hash = %hash))]
    pub async fn transaction_detail(&self, hash: &str) -> Result<TxDetail> {
        let url = format!("{}/transactions/{hash}", self.base_url);
        self.get_json(&url, &[]).await
    }

    /// Build the query-parameter set for a listing request.
    fn list_params(&self, query: &TxListQuery) -> Vec<(&'static str, String)> {
        let chain_ids = self
            .config
            .chain_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut params = vec![
            ("ecosystem", self.config.ecosystem.clone()),
            ("includedChainIds", chain_ids),
            ("fromAddresses", query.from_addresses.clone()),
            ("toAddresses", query.to_addresses.clone()),
            ("sort", query.sort.as_str().to_string()),
            ("count", "true".to_string()),
            (
                "limit",
                query.limit.unwrap_or(self.config.page_limit).to_string(),
            ),
        ];

        if let Some(token) = &query.next_token {
            params.push(("nextToken", token.clone()));
        }
        if let Some(start) = query.start_timestamp {
            params.push(("startTimestamp", start.to_string()));
        }
        if let Some(end) = query.end_timestamp {
            params.push(("endTimestamp", end.to_string()));
        }

        params
    }

    // ───────────────────────────────────────────────────────────────────────────
    // INTERNAL HELPERS
    // ───────────────────────────────────────────────────────────────────────────

    /// GET a JSON document with retry on transient failures.
    async fn get_json<T>(&self, url: &str, params: &[(&'static str, String)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut attempt = 0u32;

        loop {
            match self.get_json_once(url, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.config.max_retries => {
                    // Rate-limit responses may carry a server hint; honor it
                    // within the usual cap.
                    let delay = match &e {
                        RoutescanError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => std::time::Duration::from_secs(*secs).min(RETRY_MAX_DELAY),
                        _ => self.config.retry_delay(attempt),
                    };

                    attempt += 1;
                    warn!(
                        attempt,
                        max = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient explorer failure, backing off"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute a single GET request.
    async fn get_json_once<T>(&self, url: &str, params: &[(&'static str, String)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.http.get(url).query(params).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(RoutescanError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let excerpt: String = message.chars().take(200).collect();
            return Err(RoutescanError::Http {
                status: status.as_u16(),
                message: excerpt,
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Explorer response received");
        Ok(serde_json::from_str(&body)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;
    use crate::types::SortOrder;

    fn fast_config() -> ClientConfig {
        // Keep test retries quick; delay math is covered in config tests.
        ClientConfig::default().with_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn client_creation() {
        let client = RoutescanClient::new("https://api.example.io/v2/").expect("client");
        assert_eq!(client.base_url(), "https://api.example.io/v2");
    }

    #[tokio::test]
    async fn list_single_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/transactions"))
            .and(query_param("ecosystem", "ink"))
            .and(query_param("sort", "asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"txHash": "0x01", "value": "100", "status": true},
                    {"txHash": "0x02", "value": "200", "status": false}
                ],
                "count": 2,
                "link": {}
            })))
            .mount(&mock_server)
            .await;

        let client = RoutescanClient::with_config(mock_server.uri(), fast_config()).expect("client");
        let query = TxListQuery::for_contract("0xContract0000000000000000000000000000000c");
        let page = client.list_transactions(&query).await.expect("list");

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.count, Some(2));
        assert!(!page.has_next_page());
    }

    #[tokio::test]
    async fn list_threads_next_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/transactions"))
            .and(query_param("nextToken", "tok-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"txHash": "0x03"}],
                "link": {"nextToken": "tok-43"}
            })))
            .mount(&mock_server)
            .await;

        let client = RoutescanClient::with_config(mock_server.uri(), fast_config()).expect("client");
        let query = TxListQuery::for_contract("0xc0ffee0000000000000000000000000000000001")
            .with_next_token("tok-42");
        let page = client.list_transactions(&query).await.expect("list");

        assert_eq!(page.link.next_token.as_deref(), Some("tok-43"));
    }

    #[tokio::test]
    async fn list_sends_time_window() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/transactions"))
            .and(query_param("startTimestamp", "1700000000"))
            .and(query_param("endTimestamp", "1700691200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [],
                "link": {}
            })))
            .mount(&mock_server)
            .await;

        let client = RoutescanClient::with_config(mock_server.uri(), fast_config()).expect("client");
        let query = TxListQuery::for_contract("0xc0ffee0000000000000000000000000000000001")
            .with_sort(SortOrder::Asc)
            .with_time_window(Some(1_700_000_000), Some(1_700_691_200));

        let page = client.list_transactions(&query).await.expect("list");
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn retries_on_rate_limit_then_succeeds() {
        // First response 429 with a zero-second hint, second succeeds.
        struct FlakyResponder {
            calls: Arc<AtomicU32>,
        }

        impl Respond for FlakyResponder {
            fn respond(&self, _request: &Request) -> ResponseTemplate {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429).insert_header("retry-after", "0")
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "items": [{"txHash": "0x04"}],
                        "link": {}
                    }))
                }
            }
        }

        let mock_server = MockServer::start().await;
        let calls = Arc::new(AtomicU32::new(0));

        Mock::given(method("GET"))
            .and(path("/transactions"))
            .respond_with(FlakyResponder {
                calls: calls.clone(),
            })
            .mount(&mock_server)
            .await;

        let client = RoutescanClient::with_config(mock_server.uri(), fast_config()).expect("client");
        let query = TxListQuery::for_contract("0xc0ffee0000000000000000000000000000000001");
        let page = client.list_transactions(&query).await.expect("list");

        assert_eq!(page.items.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_error_surfaces_immediately() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/transactions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad address"))
            .expect(1) // No retries for 4xx
            .mount(&mock_server)
            .await;

        let client = RoutescanClient::with_config(mock_server.uri(), fast_config()).expect("client");
        let query = TxListQuery::for_contract("0xc0ffee0000000000000000000000000000000001");
        let err = client.list_transactions(&query).await.expect_err("error");

        assert!(!err.is_transient());
        assert!(matches!(err, RoutescanError::Http { status: 400, .. }));
    }

    #[tokio::test]
    async fn detail_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/transactions/0xdead"))
            .respond_with(ResponseTemplate::new(404).set_body_string("unknown hash"))
            .mount(&mock_server)
            .await;

        let client = RoutescanClient::with_config(mock_server.uri(), fast_config()).expect("client");
        let err = client.transaction_detail("0xdead").await.expect_err("error");

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn detail_decodes_logs_and_operations() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/transactions/0x05"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "txHash": "0x05",
                "gasUsed": "21000",
                "logs": [{"address": "0xfeed", "topics": [], "data": "0x"}],
                "operations": [{"type": "call", "value": "1"}],
                "contractVerified": false
            })))
            .mount(&mock_server)
            .await;

        let client = RoutescanClient::with_config(mock_server.uri(), fast_config()).expect("client");
        let detail = client.transaction_detail("0x05").await.expect("detail");

        assert_eq!(detail.tx.hash(), Some("0x05"));
        assert_eq!(detail.logs.len(), 1);
        assert_eq!(detail.operations.len(), 1);
        assert_eq!(detail.contract_verified, Some(false));
    }
}
