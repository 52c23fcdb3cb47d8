//! Scripted in-crate doubles for the wallet provider, balance reader and
//! cross-chain toolkit. Test-only.

use alloy::primitives::{Address, Bytes, FixedBytes, TxHash, U256, address};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::amount::UsdcAmount;
use crate::balance::{BalanceError, BalanceReader};
use crate::chain::ChainId;
use crate::toolkit::{BridgeToolkit, ToolkitError, ToolkitOutcome};
use crate::wallet::{WalletError, WalletProvider};

pub const TEST_ACCOUNT: Address = address!("0x00000000000000000000000000000000000000a1");

/// Wallet double whose network, switch and submission behavior is scripted
/// up front. Queries reflect the scripted "live" network, including
/// switches that landed mid-test.
pub struct ScriptedWallet {
    account: Address,
    network: AtomicU64,
    /// Network a successful switch request actually lands on. When unset,
    /// requests succeed but the provider never moves.
    switch_lands_on: Mutex<Option<u64>>,
    reject_switches: AtomicBool,
    /// Number of upcoming switch requests that fail with a provider error.
    switch_error_budget: AtomicU32,
    switch_requests: AtomicU32,
    reject_submits: AtomicBool,
    /// Description fragment whose submission fails with a provider error.
    failing_submit: Mutex<Option<String>>,
    timeout_receipts: AtomicBool,
    submissions: Mutex<Vec<(Address, Bytes, String)>>,
    next_tx: AtomicU64,
}

impl ScriptedWallet {
    pub fn on_network(network_id: u64) -> Self {
        Self {
            account: TEST_ACCOUNT,
            network: AtomicU64::new(network_id),
            switch_lands_on: Mutex::new(None),
            reject_switches: AtomicBool::new(false),
            switch_error_budget: AtomicU32::new(0),
            switch_requests: AtomicU32::new(0),
            reject_submits: AtomicBool::new(false),
            failing_submit: Mutex::new(None),
            timeout_receipts: AtomicBool::new(false),
            submissions: Mutex::new(Vec::new()),
            next_tx: AtomicU64::new(1),
        }
    }

    pub fn on_chain(chain: ChainId) -> Self {
        Self::on_network(chain.network_id())
    }

    pub fn switch_lands_on(&self, network_id: u64) {
        *self.switch_lands_on.lock().unwrap() = Some(network_id);
    }

    pub fn reject_switches(&self) {
        self.reject_switches.store(true, Ordering::SeqCst);
    }

    pub fn fail_switches_with_provider_error(&self, count: u32) {
        self.switch_error_budget.store(count, Ordering::SeqCst);
    }

    pub fn reject_submissions(&self) {
        self.reject_submits.store(true, Ordering::SeqCst);
    }

    /// Fails the first submission whose description contains `fragment`.
    pub fn fail_submission_containing(&self, fragment: &str) {
        *self.failing_submit.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn timeout_receipts(&self) {
        self.timeout_receipts.store(true, Ordering::SeqCst);
    }

    pub fn switch_requests(&self) -> u32 {
        self.switch_requests.load(Ordering::SeqCst)
    }

    pub fn live_network(&self) -> u64 {
        self.network.load(Ordering::SeqCst)
    }

    /// Moves the scripted provider directly, as an out-of-band actor (the
    /// toolkit, or the user in the wallet UI) would.
    pub fn set_network(&self, network_id: u64) {
        self.network.store(network_id, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<(Address, Bytes, String)> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submission_descriptions(&self) -> Vec<String> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, description)| description.clone())
            .collect()
    }
}

#[async_trait]
impl WalletProvider for ScriptedWallet {
    fn account(&self) -> Address {
        self.account
    }

    async fn live_network_id(&self) -> Result<u64, WalletError> {
        Ok(self.network.load(Ordering::SeqCst))
    }

    async fn request_network_switch(&self, network_id: u64) -> Result<(), WalletError> {
        self.switch_requests.fetch_add(1, Ordering::SeqCst);

        if self.reject_switches.load(Ordering::SeqCst) {
            return Err(WalletError::UserRejected);
        }

        let budget = self.switch_error_budget.load(Ordering::SeqCst);
        if budget > 0 {
            self.switch_error_budget.store(budget - 1, Ordering::SeqCst);
            return Err(WalletError::Provider("scripted provider failure".into()));
        }

        if let Some(lands_on) = *self.switch_lands_on.lock().unwrap()
            && lands_on == network_id
        {
            self.network.store(lands_on, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn submit_contract_call(
        &self,
        to: Address,
        calldata: &Bytes,
        description: &str,
    ) -> Result<TxHash, WalletError> {
        if self.reject_submits.load(Ordering::SeqCst) {
            return Err(WalletError::UserRejected);
        }
        if let Some(fragment) = self.failing_submit.lock().unwrap().as_deref()
            && description.contains(fragment)
        {
            return Err(WalletError::Provider(format!(
                "scripted failure for {description}"
            )));
        }

        self.submissions
            .lock()
            .unwrap()
            .push((to, calldata.clone(), description.to_string()));

        let nonce = self.next_tx.fetch_add(1, Ordering::SeqCst);
        Ok(test_tx_hash(nonce))
    }

    async fn wait_for_receipt(&self, tx: TxHash, timeout: Duration) -> Result<(), WalletError> {
        if self.timeout_receipts.load(Ordering::SeqCst) {
            return Err(WalletError::ConfirmationTimeout { tx, timeout });
        }
        Ok(())
    }
}

pub fn test_tx_hash(nonce: u64) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&nonce.to_be_bytes());
    FixedBytes(bytes)
}

/// Balance reader over a fixed in-memory table. Missing entries read as
/// zero, matching an account the chain has never seen.
#[derive(Default)]
pub struct StaticBalances {
    balances: Mutex<HashMap<(ChainId, Address), U256>>,
    allowances: Mutex<HashMap<(ChainId, Address, Address), U256>>,
}

impl StaticBalances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, chain: ChainId, account: Address, amount: &UsdcAmount) {
        self.balances
            .lock()
            .unwrap()
            .insert((chain, account), amount.to_minor_units());
    }

    pub fn set_allowance(&self, chain: ChainId, owner: Address, spender: Address, raw: U256) {
        self.allowances
            .lock()
            .unwrap()
            .insert((chain, owner, spender), raw);
    }
}

#[async_trait]
impl BalanceReader for StaticBalances {
    async fn usdc_balance(&self, chain: ChainId, account: Address) -> Result<U256, BalanceError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(chain, account))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn usdc_allowance(
        &self,
        chain: ChainId,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BalanceError> {
        Ok(self
            .allowances
            .lock()
            .unwrap()
            .get(&(chain, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO))
    }
}

/// Toolkit double that replays queued outcomes and records every call.
#[derive(Default)]
pub struct ScriptedToolkit {
    outcomes: Mutex<VecDeque<Result<ToolkitOutcome, ToolkitError>>>,
    calls: Mutex<Vec<(ChainId, ChainId, U256)>>,
}

impl ScriptedToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, outcome: Result<ToolkitOutcome, ToolkitError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(ChainId, ChainId, U256)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BridgeToolkit for ScriptedToolkit {
    async fn bridge(
        &self,
        from: ChainId,
        to: ChainId,
        amount: &UsdcAmount,
    ) -> Result<ToolkitOutcome, ToolkitError> {
        self.calls
            .lock()
            .unwrap()
            .push((from, to, amount.to_minor_units()));

        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ToolkitError::NotReady("no scripted outcome queued".into())))
    }
}
