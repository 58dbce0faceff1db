//! Client for the mempool.space address-transaction API.
//!
//! Pages through an address's transaction history with the `after_txid`
//! cursor, newest first. Interrupted responses are retried a bounded number
//! of times, anything else fails the page immediately.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::env::ENV_CONFIG;

pub const DEFAULT_MAX_TRANSACTIONS: usize = 1000;
pub const MAX_RETRIES: usize = 3;

const RETRY_DELAY: Duration = Duration::from_secs(3);
const PAGE_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TxOutput {
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TxInput {
    pub prevout: Option<TxOutput>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TxStatus {
    pub confirmed: bool,
    pub block_time: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Transaction {
    pub txid: String,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
    pub status: TxStatus,
}

#[derive(Debug, Error, PartialEq)]
pub enum FetchError {
    #[error("interrupted response from mempool API: {0}")]
    Interrupted(String),
    #[error("request to mempool API failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // A truncated or interrupted body surfaces as a body/decode error.
        if err.is_body() || err.is_decode() {
            FetchError::Interrupted(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

#[automock]
#[async_trait]
pub trait MempoolApi {
    async fn transactions_page(
        &self,
        address: &str,
        after_txid: Option<String>,
    ) -> Result<Vec<Transaction>, FetchError>;
}

pub struct MempoolApiHttp {
    server_url: String,
    client: reqwest::Client,
    max_retries: usize,
}

impl MempoolApiHttp {
    pub fn new() -> Self {
        Self::new_with_url(&ENV_CONFIG.mempool_api_url)
    }

    pub fn new_with_url(server_url: &str) -> Self {
        Self {
            server_url: server_url.into(),
            client: reqwest::Client::new(),
            max_retries: MAX_RETRIES,
        }
    }

    async fn send_transactions_request(&self, url: &str) -> Result<Vec<Transaction>, FetchError> {
        debug!("sending request to {}", url);
        let page = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Transaction>>()
            .await?;
        Ok(page)
    }
}

impl Default for MempoolApiHttp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MempoolApi for MempoolApiHttp {
    async fn transactions_page(
        &self,
        address: &str,
        after_txid: Option<String>,
    ) -> Result<Vec<Transaction>, FetchError> {
        let url = match after_txid {
            Some(txid) => format!(
                "{}/address/{}/txs?after_txid={}",
                self.server_url, address, txid
            ),
            None => format!("{}/address/{}/txs", self.server_url, address),
        };

        retry_interrupted(self.max_retries, || self.send_transactions_request(&url)).await
    }
}

/// Runs `attempt` up to `max_retries` times, sleeping between attempts, but
/// only for interrupted responses. Any other error is returned immediately.
async fn retry_interrupted<T, F, Fut>(max_retries: usize, mut attempt: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempts = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(FetchError::Interrupted(reason)) => {
                attempts += 1;
                if attempts >= max_retries {
                    return Err(FetchError::Interrupted(reason));
                }
                warn!(attempts, %reason, "interrupted response, retrying");
                sleep(RETRY_DELAY).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Walks an address's history newest first, advancing the cursor to the last
/// transaction of every page, until the history runs out or
/// `max_transactions` have accumulated.
pub async fn transactions_for_address(
    api: &impl MempoolApi,
    address: &str,
    max_transactions: usize,
) -> Result<Vec<Transaction>, FetchError> {
    let mut transactions: Vec<Transaction> = Vec::new();
    let mut after_txid: Option<String> = None;

    while transactions.len() < max_transactions {
        let page = api.transactions_page(address, after_txid.clone()).await?;

        let Some(last) = page.last() else {
            // History exhausted.
            break;
        };
        after_txid = Some(last.txid.clone());
        transactions.extend(page);

        debug!(
            address,
            count = transactions.len(),
            "accumulated transactions"
        );

        // Pace our requests to stay friendly with the API's rate limits.
        sleep(PAGE_DELAY).await;
    }

    transactions.truncate(max_transactions);
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;

    fn transaction(txid: &str) -> Transaction {
        Transaction {
            txid: txid.to_string(),
            vin: vec![],
            vout: vec![],
            status: TxStatus {
                confirmed: true,
                block_time: Some(1_700_000_000),
            },
        }
    }

    #[tokio::test]
    async fn transactions_page_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/address/bc1qtest/txs")
            .with_status(200)
            .with_body(
                json!([{
                    "txid": "abc",
                    "vin": [{ "prevout": { "scriptpubkey_address": "bc1qtest", "value": 500000000u64 } }],
                    "vout": [{ "scriptpubkey_address": "bc1qother", "value": 400000000u64 }],
                    "status": { "confirmed": true, "block_time": 1700000000 }
                }])
                .to_string(),
            )
            .create_async().await;

        let api = MempoolApiHttp::new_with_url(&server.url());

        let page = api.transactions_page("bc1qtest", None).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].txid, "abc");
        assert_eq!(page[0].vin[0].prevout.as_ref().unwrap().value, 500000000);
        assert_eq!(page[0].status.block_time, Some(1700000000));
    }

    #[tokio::test]
    async fn transactions_page_sends_cursor_test() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/address/bc1qtest/txs?after_txid=abc")
            .with_status(200)
            .with_body("[]")
            .create_async().await;

        let api = MempoolApiHttp::new_with_url(&server.url());

        let page = api
            .transactions_page("bc1qtest", Some("abc".to_string()))
            .await
            .unwrap();
        assert!(page.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn transactions_page_http_error_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/address/bc1qtest/txs")
            .with_status(500)
            .create_async().await;

        let api = MempoolApiHttp::new_with_url(&server.url());

        let err = api.transactions_page("bc1qtest", None).await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn transactions_page_truncated_body_test() {
        let mut server = mockito::Server::new_async().await;
        // A body that cuts off mid-array decodes as an interrupted response.
        server
            .mock("GET", "/address/bc1qtest/txs")
            .with_status(200)
            .with_body("[{\"txid\": \"ab")
            .expect(MAX_RETRIES)
            .create_async().await;

        let api = MempoolApiHttp::new_with_url(&server.url());

        let err = api.transactions_page("bc1qtest", None).await.unwrap_err();
        assert!(matches!(err, FetchError::Interrupted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_transient_errors_test() {
        let mut calls = 0;
        let start = Instant::now();
        let result = retry_interrupted(3, || {
            calls += 1;
            let outcome = if calls <= 2 {
                Err(FetchError::Interrupted("broken pipe".to_string()))
            } else {
                Ok(vec![transaction("abc")])
            };
            async move { outcome }
        })
        .await;

        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(calls, 3);
        // One 3s delay per transient error before the success.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_max_retries_test() {
        let mut calls = 0;
        let result: Result<Vec<Transaction>, FetchError> = retry_interrupted(3, || {
            calls += 1;
            async { Err(FetchError::Interrupted("broken pipe".to_string())) }
        })
        .await;

        assert_eq!(
            result.unwrap_err(),
            FetchError::Interrupted("broken pipe".to_string())
        );
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_aborts_on_request_error_test() {
        let mut calls = 0;
        let result: Result<Vec<Transaction>, FetchError> = retry_interrupted(3, || {
            calls += 1;
            async { Err(FetchError::Request("dns error".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(FetchError::Request(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn walker_concatenates_pages_test() {
        let mut api = MockMempoolApi::new();
        api.expect_transactions_page()
            .times(3)
            .returning(|_, after_txid| {
                let page = match after_txid.as_deref() {
                    None => vec![transaction("a1"), transaction("a2")],
                    Some("a2") => vec![transaction("b1"), transaction("b2")],
                    Some("b2") => vec![],
                    Some(other) => panic!("unexpected cursor {other}"),
                };
                Ok(page)
            });

        let transactions = transactions_for_address(&api, "bc1qtest", 1000)
            .await
            .unwrap();

        let txids: Vec<&str> = transactions.iter().map(|tx| tx.txid.as_str()).collect();
        assert_eq!(txids, vec!["a1", "a2", "b1", "b2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn walker_truncates_to_max_test() {
        let mut api = MockMempoolApi::new();
        api.expect_transactions_page()
            .times(2)
            .returning(|_, after_txid| {
                let page = match after_txid.as_deref() {
                    None => vec![transaction("a1"), transaction("a2")],
                    Some("a2") => vec![transaction("b1"), transaction("b2")],
                    Some(other) => panic!("unexpected cursor {other}"),
                };
                Ok(page)
            });

        let transactions = transactions_for_address(&api, "bc1qtest", 3).await.unwrap();

        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions.last().unwrap().txid, "b1");
    }

    #[tokio::test(start_paused = true)]
    async fn walker_surfaces_fetch_failure_test() {
        let mut api = MockMempoolApi::new();
        api.expect_transactions_page()
            .times(1)
            .returning(|_, _| Err(FetchError::Request("timed out".to_string())));

        let result = transactions_for_address(&api, "bc1qtest", 1000).await;
        assert!(matches!(result, Err(FetchError::Request(_))));
    }
}
