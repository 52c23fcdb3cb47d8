//! Post-deposit status monitoring against a Stacks blockchain API.
//!
//! After the xReserve deposit confirms, minting happens out of band on
//! Stacks. The monitor polls a Hiro-style API for the recipient's wrapped
//! token balance and treats a strict increase over the pre-deposit
//! baseline as the authoritative completion signal. Mint transaction
//! detection is display-only: it advances the reported phase but never
//! decides completion, since the recipient may receive unrelated mints.

use alloy::primitives::TxHash;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::stacks_address::StacksAddress;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("status API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed balance value: {0}")]
    MalformedBalance(String),
}

/// Observable phases of a Stacks-bound bridge, in order. Display status
/// only moves forward; the poll loop cannot regress it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Idle,
    Depositing,
    EthConfirmed,
    Attesting,
    Minting,
    Completed,
    Error,
}

impl BridgeStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Depositing => 1,
            Self::EthConfirmed => 2,
            Self::Attesting => 3,
            Self::Minting => 4,
            Self::Completed => 5,
            Self::Error => 6,
        }
    }
}

/// Point-in-time view for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub status: BridgeStatus,
    pub eth_tx: Option<TxHash>,
    pub mint_tx: Option<String>,
    pub error: Option<String>,
    pub elapsed_secs: Option<u64>,
}

/// Endpoints, token identifiers and poll bounds for one deployment.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Hiro-style API root, e.g. `https://api.testnet.hiro.so`.
    pub api_base: Url,
    /// Token principal holding the wrapped balance, `{address}.{contract}`.
    pub token_contract: String,
    /// Asset name within the token contract.
    pub token_asset: String,
    /// Contract whose `mint` calls identify incoming mints.
    pub mint_contract: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Time in `EthConfirmed` after which the display advances to
    /// `Attesting` even without an on-chain signal.
    pub attesting_after: Duration,
}

impl MonitorConfig {
    pub fn testnet_defaults() -> Result<Self, url::ParseError> {
        Ok(Self {
            api_base: "https://api.testnet.hiro.so".parse()?,
            token_contract: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.usdcx".into(),
            token_asset: "usdcx-token".into(),
            mint_contract: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.usdcx-v1".into(),
            poll_interval: Duration::from_secs(10),
            max_polls: 120,
            attesting_after: Duration::from_secs(30),
        })
    }

    fn asset_key(&self) -> String {
        format!("{}::{}", self.token_contract, self.token_asset)
    }
}

#[derive(Debug, Default)]
struct Inner {
    status: Option<BridgeStatus>,
    eth_tx: Option<TxHash>,
    mint_tx: Option<String>,
    error: Option<String>,
    started_at: Option<Instant>,
}

impl Inner {
    fn status(&self) -> BridgeStatus {
        self.status.unwrap_or(BridgeStatus::Idle)
    }

    /// Forward-only display transition; stale poll results cannot move the
    /// status backwards.
    fn advance(&mut self, next: BridgeStatus) {
        if next.rank() > self.status().rank() {
            self.status = Some(next);
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.status = Some(BridgeStatus::Error);
        self.error = Some(message.into());
    }
}

/// Polls the Stacks API for one in-flight bridge. At most one poll loop is
/// live per instance; starting a new one cancels its predecessor.
pub struct BridgeMonitor {
    config: MonitorConfig,
    client: reqwest::Client,
    inner: Arc<Mutex<Inner>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeMonitor {
    pub fn new(config: MonitorConfig) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            config,
            client,
            inner: Arc::new(Mutex::new(Inner::default())),
            task: Mutex::new(None),
        })
    }

    /// Marks the deposit transaction as submitted but not yet confirmed.
    pub fn mark_depositing(&self) {
        let mut inner = self.inner.lock().expect("monitor state mutex poisoned");
        inner.advance(BridgeStatus::Depositing);
    }

    /// Begins polling for the mint that follows a confirmed deposit.
    ///
    /// Captures the recipient's current wrapped-token balance as the
    /// baseline before the first poll; an unreachable balance endpoint
    /// reads as zero so a later read can still complete the bridge.
    pub async fn start_monitoring(&self, eth_tx: TxHash, recipient: &StacksAddress) {
        self.abort_task();

        let baseline = match self.fetch_balance(recipient).await {
            Ok(balance) => balance,
            Err(error) => {
                warn!(%error, "Baseline balance fetch failed; assuming zero");
                0
            }
        };
        debug!(%eth_tx, baseline, "Starting mint monitoring");

        {
            let mut inner = self.inner.lock().expect("monitor state mutex poisoned");
            *inner = Inner {
                status: Some(BridgeStatus::EthConfirmed),
                eth_tx: Some(eth_tx),
                mint_tx: None,
                error: None,
                started_at: Some(Instant::now()),
            };
        }

        let monitor = MonitorTask {
            config: self.config.clone(),
            client: self.client.clone(),
            inner: Arc::clone(&self.inner),
            recipient: recipient.clone(),
            baseline,
        };
        let handle = tokio::spawn(monitor.run());
        *self.task.lock().expect("monitor task mutex poisoned") = Some(handle);
    }

    /// Stops polling without clearing the last observed state.
    pub fn stop_monitoring(&self) {
        self.abort_task();
    }

    /// Stops polling and clears back to [`BridgeStatus::Idle`]. Safe at any
    /// time, including mid-poll.
    pub fn reset(&self) {
        self.abort_task();
        *self.inner.lock().expect("monitor state mutex poisoned") = Inner::default();
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let inner = self.inner.lock().expect("monitor state mutex poisoned");
        MonitorSnapshot {
            status: inner.status(),
            eth_tx: inner.eth_tx,
            mint_tx: inner.mint_tx.clone(),
            error: inner.error.clone(),
            elapsed_secs: inner.started_at.map(|started| started.elapsed().as_secs()),
        }
    }

    fn abort_task(&self) {
        if let Some(handle) = self
            .task
            .lock()
            .expect("monitor task mutex poisoned")
            .take()
        {
            handle.abort();
        }
    }

    async fn fetch_balance(&self, recipient: &StacksAddress) -> Result<u128, MonitorError> {
        fetch_balance(&self.client, &self.config, recipient).await
    }
}

impl Drop for BridgeMonitor {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// State moved into the spawned poll loop.
struct MonitorTask {
    config: MonitorConfig,
    client: reqwest::Client,
    inner: Arc<Mutex<Inner>>,
    recipient: StacksAddress,
    baseline: u128,
}

impl MonitorTask {
    async fn run(self) {
        for poll in 1..=self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            match fetch_balance(&self.client, &self.config, &self.recipient).await {
                Ok(balance) if balance > self.baseline => {
                    info!(
                        balance,
                        baseline = self.baseline,
                        "Wrapped balance increased; bridge complete"
                    );
                    let mut inner = self.inner.lock().expect("monitor state mutex poisoned");
                    inner.advance(BridgeStatus::Completed);
                    return;
                }
                Ok(_) => {}
                Err(error) => debug!(poll, %error, "Balance poll failed"),
            }

            match self.find_mint_tx().await {
                Ok(Some(tx_id)) => {
                    let mut inner = self.inner.lock().expect("monitor state mutex poisoned");
                    if inner.mint_tx.is_none() {
                        debug!(%tx_id, "Observed candidate mint transaction");
                        inner.mint_tx = Some(tx_id);
                    }
                    inner.advance(BridgeStatus::Minting);
                }
                Ok(None) => {
                    let mut inner = self.inner.lock().expect("monitor state mutex poisoned");
                    let waited = inner
                        .started_at
                        .map(|started| started.elapsed())
                        .unwrap_or_default();
                    if inner.status() == BridgeStatus::EthConfirmed
                        && waited >= self.config.attesting_after
                    {
                        inner.advance(BridgeStatus::Attesting);
                    }
                }
                Err(error) => debug!(poll, %error, "Mint transaction poll failed"),
            }
        }

        warn!(
            polls = self.config.max_polls,
            "Monitoring window exhausted without a balance increase"
        );
        self.inner
            .lock()
            .expect("monitor state mutex poisoned")
            .fail(
                "timed out waiting for the mint on Stacks; verify the balance manually on a Stacks explorer",
            );
    }

    /// Looks for a `mint` call against the configured contract, first among
    /// confirmed transactions and then in the mempool. Display-only signal.
    async fn find_mint_tx(&self) -> Result<Option<String>, MonitorError> {
        let confirmed: TransactionsResponse = self
            .client
            .get(endpoint(
                &self.config.api_base,
                &format!(
                    "extended/v1/address/{}/transactions",
                    self.recipient.as_str()
                ),
            ))
            .query(&[("limit", "10")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(tx) = confirmed
            .results
            .iter()
            .find(|tx| tx.is_mint_for(&self.config.mint_contract))
        {
            return Ok(Some(tx.tx_id.clone()));
        }

        let mempool: TransactionsResponse = self
            .client
            .get(endpoint(&self.config.api_base, "extended/v1/tx/mempool"))
            .query(&[("recipient_address", self.recipient.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(mempool
            .results
            .iter()
            .find(|tx| tx.is_mint_for(&self.config.mint_contract))
            .map(|tx| tx.tx_id.clone()))
    }
}

fn endpoint(base: &Url, path: &str) -> String {
    format!("{}/{path}", base.as_str().trim_end_matches('/'))
}

async fn fetch_balance(
    client: &reqwest::Client,
    config: &MonitorConfig,
    recipient: &StacksAddress,
) -> Result<u128, MonitorError> {
    let response: BalancesResponse = client
        .get(endpoint(
            &config.api_base,
            &format!("extended/v1/address/{}/balances", recipient.as_str()),
        ))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let Some(token) = response.fungible_tokens.get(&config.asset_key()) else {
        return Ok(0);
    };
    token
        .balance
        .parse()
        .map_err(|_| MonitorError::MalformedBalance(token.balance.clone()))
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    fungible_tokens: HashMap<String, TokenBalance>,
}

#[derive(Debug, Deserialize)]
struct TokenBalance {
    balance: String,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    results: Vec<TransactionEntry>,
}

#[derive(Debug, Deserialize)]
struct TransactionEntry {
    tx_id: String,
    #[serde(default)]
    tx_type: Option<String>,
    #[serde(default)]
    contract_call: Option<ContractCall>,
}

#[derive(Debug, Deserialize)]
struct ContractCall {
    contract_id: String,
    function_name: String,
}

impl TransactionEntry {
    fn is_mint_for(&self, mint_contract: &str) -> bool {
        self.tx_type.as_deref() == Some("contract_call")
            && self.contract_call.as_ref().is_some_and(|call| {
                call.contract_id == mint_contract && call.function_name == "mint"
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;
    use httpmock::prelude::*;
    use serde_json::json;

    const RECIPIENT: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

    fn recipient() -> StacksAddress {
        RECIPIENT.parse().unwrap()
    }

    fn eth_tx() -> TxHash {
        b256!("00000000000000000000000000000000000000000000000000000000000000e1")
    }

    fn test_config(server: &MockServer, max_polls: u32) -> MonitorConfig {
        MonitorConfig {
            api_base: server.base_url().parse().unwrap(),
            token_contract: format!("{RECIPIENT}.usdcx"),
            token_asset: "usdcx-token".into(),
            mint_contract: format!("{RECIPIENT}.usdcx-v1"),
            poll_interval: Duration::from_millis(20),
            max_polls,
            attesting_after: Duration::from_secs(3600),
        }
    }

    fn balance_body(balance: &str, key: &str) -> serde_json::Value {
        json!({ "fungible_tokens": { key: { "balance": balance } } })
    }

    fn empty_results() -> serde_json::Value {
        json!({ "results": [] })
    }

    async fn mock_empty_tx_endpoints(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/transactions"));
                then.status(200).json_body(empty_results());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/extended/v1/tx/mempool");
                then.status(200).json_body(empty_results());
            })
            .await;
    }

    async fn wait_for<F: Fn(&MonitorSnapshot) -> bool>(
        monitor: &BridgeMonitor,
        condition: F,
    ) -> MonitorSnapshot {
        for _ in 0..250 {
            let snapshot = monitor.snapshot();
            if condition(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        monitor.snapshot()
    }

    #[tokio::test]
    async fn balance_increase_over_baseline_completes_the_bridge() {
        let server = MockServer::start_async().await;
        mock_empty_tx_endpoints(&server).await;
        let config = test_config(&server, 120);
        let key = config.asset_key();

        let baseline_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/balances"));
                then.status(200).json_body(balance_body("100", &key));
            })
            .await;

        let monitor = BridgeMonitor::new(config).unwrap();
        monitor.start_monitoring(eth_tx(), &recipient()).await;
        assert_eq!(monitor.snapshot().status, BridgeStatus::EthConfirmed);

        // The mint lands: subsequent balance reads exceed the baseline.
        baseline_mock.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/balances"));
                then.status(200).json_body(balance_body("150", &key));
            })
            .await;

        let snapshot = wait_for(&monitor, |snapshot| {
            snapshot.status == BridgeStatus::Completed
        })
        .await;
        assert_eq!(snapshot.status, BridgeStatus::Completed);
        assert_eq!(snapshot.eth_tx, Some(eth_tx()));
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn unchanged_balance_exhausts_into_a_timeout_error() {
        let server = MockServer::start_async().await;
        mock_empty_tx_endpoints(&server).await;
        let config = test_config(&server, 3);
        let key = config.asset_key();

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/balances"));
                then.status(200).json_body(balance_body("100", &key));
            })
            .await;

        let monitor = BridgeMonitor::new(config).unwrap();
        monitor.start_monitoring(eth_tx(), &recipient()).await;

        let snapshot =
            wait_for(&monitor, |snapshot| snapshot.status == BridgeStatus::Error).await;
        assert_eq!(snapshot.status, BridgeStatus::Error);
        let error = snapshot.error.unwrap();
        assert!(error.contains("timed out"), "unexpected message: {error}");
        assert!(error.contains("explorer"), "unexpected message: {error}");
    }

    #[tokio::test]
    async fn mint_transaction_advances_display_to_minting_only() {
        let server = MockServer::start_async().await;
        let config = test_config(&server, 10);
        let key = config.asset_key();

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/balances"));
                then.status(200).json_body(balance_body("100", &key));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/transactions"));
                then.status(200).json_body(json!({
                    "results": [
                        {
                            "tx_id": "0xstacksmint",
                            "tx_type": "contract_call",
                            "contract_call": {
                                "contract_id": format!("{RECIPIENT}.usdcx-v1"),
                                "function_name": "mint"
                            }
                        },
                        {
                            "tx_id": "0xother",
                            "tx_type": "token_transfer"
                        }
                    ]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/extended/v1/tx/mempool");
                then.status(200).json_body(empty_results());
            })
            .await;

        let monitor = BridgeMonitor::new(config).unwrap();
        monitor.start_monitoring(eth_tx(), &recipient()).await;

        let snapshot = wait_for(&monitor, |snapshot| {
            snapshot.status == BridgeStatus::Minting
        })
        .await;
        // Detection is display-only: the balance has not moved, so the
        // bridge is not complete.
        assert_eq!(snapshot.status, BridgeStatus::Minting);
        assert_eq!(snapshot.mint_tx.as_deref(), Some("0xstacksmint"));
    }

    #[tokio::test]
    async fn quiet_wait_advances_to_attesting_after_the_threshold() {
        let server = MockServer::start_async().await;
        mock_empty_tx_endpoints(&server).await;
        let mut config = test_config(&server, 10);
        config.attesting_after = Duration::ZERO;
        let key = config.asset_key();

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/balances"));
                then.status(200).json_body(balance_body("100", &key));
            })
            .await;

        let monitor = BridgeMonitor::new(config).unwrap();
        monitor.start_monitoring(eth_tx(), &recipient()).await;

        let snapshot = wait_for(&monitor, |snapshot| {
            snapshot.status == BridgeStatus::Attesting
        })
        .await;
        assert_eq!(snapshot.status, BridgeStatus::Attesting);
    }

    #[tokio::test]
    async fn reset_mid_poll_clears_to_idle() {
        let server = MockServer::start_async().await;
        mock_empty_tx_endpoints(&server).await;
        let config = test_config(&server, 120);
        let key = config.asset_key();

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/balances"));
                then.status(200).json_body(balance_body("100", &key));
            })
            .await;

        let monitor = BridgeMonitor::new(config).unwrap();
        monitor.start_monitoring(eth_tx(), &recipient()).await;
        assert_eq!(monitor.snapshot().status, BridgeStatus::EthConfirmed);

        monitor.reset();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.status, BridgeStatus::Idle);
        assert!(snapshot.eth_tx.is_none());
        assert!(snapshot.error.is_none());
        assert!(snapshot.elapsed_secs.is_none());

        // The aborted loop can no longer mutate state.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(monitor.snapshot().status, BridgeStatus::Idle);
    }

    #[tokio::test]
    async fn restart_replaces_the_previous_poll_loop() {
        let server = MockServer::start_async().await;
        mock_empty_tx_endpoints(&server).await;
        let config = test_config(&server, 120);
        let key = config.asset_key();

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/extended/v1/address/{RECIPIENT}/balances"));
                then.status(200).json_body(balance_body("100", &key));
            })
            .await;

        let monitor = BridgeMonitor::new(config).unwrap();
        monitor.start_monitoring(eth_tx(), &recipient()).await;
        let second_tx =
            b256!("00000000000000000000000000000000000000000000000000000000000000e2");
        monitor.start_monitoring(second_tx, &recipient()).await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.status, BridgeStatus::EthConfirmed);
        assert_eq!(snapshot.eth_tx, Some(second_tx));
    }

    #[test]
    fn display_status_is_forward_only() {
        let mut inner = Inner::default();
        inner.advance(BridgeStatus::Minting);
        inner.advance(BridgeStatus::EthConfirmed);
        assert_eq!(inner.status(), BridgeStatus::Minting);
        inner.advance(BridgeStatus::Completed);
        assert_eq!(inner.status(), BridgeStatus::Completed);
    }
}
