//! Route orchestration for USDC transfers into Stacks and between EVM
//! chains.
//!
//! Three routes share one step machine:
//! - direct: Ethereum Sepolia → Stacks via the xReserve deposit,
//! - via intermediary: any supported chain → Ethereum Sepolia through the
//!   cross-chain toolkit, then the direct route's deposit procedure,
//! - EVM to EVM: a single toolkit transfer.
//!
//! Routes report success as `bool` and write human-readable failures into
//! [`BridgeState`]; they never panic and never retry an on-chain
//! submission on their own. The first failing step halts the route.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::SolCall;
use backon::{ConstantBuilder, Retryable};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::amount::UsdcAmount;
use crate::balance::{BalanceError, BalanceReader};
use crate::bindings::{IERC20, IXReserve};
use crate::chain::{ChainId, INTERMEDIARY_CHAIN, STACKS_DOMAIN, X_RESERVE_CONTRACT};
use crate::chain_switch::{ChainSwitchController, SwitchTiming};
use crate::config::Ctx;
use crate::stacks_address::StacksAddress;
use crate::steps::{BridgeState, BridgeStep, StepError, StepStatus, StepUpdate};
use crate::toolkit::{BridgeToolkit, ToolkitError};
use crate::wallet::{CONFIRMATION_TIMEOUT, WalletError, WalletProvider};

/// Full switch procedures attempted before a route gives up on a network.
const MAX_SWITCH_RETRIES: u32 = 3;

/// Route-internal failures. Not public API: the orchestration boundary
/// reports through [`BridgeState`], and these render into its error text.
#[derive(Debug, thiserror::Error)]
enum BridgeError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("Please switch to {0} network")]
    SwitchFailed(ChainId),
    #[error("Attestation timeout")]
    AttestationTimeout,
    #[error("attestation still pending")]
    AttestationPending,
}

/// Decides whether a confirmed deposit has been attested and minted.
///
/// The reserve scheme exposes no public attestation query yet, so the
/// policy is pluggable; deployments without one skip the phase entirely
/// and leave completion detection to the status monitor.
#[async_trait::async_trait]
pub trait AttestationCheck: Send + Sync {
    async fn is_attested(&self, deposit_tx: TxHash, confirmed_at: Instant) -> bool;
}

/// Default policy: treat a minimum elapsed time since deposit confirmation
/// as attestation.
#[derive(Debug, Clone)]
pub struct ElapsedHeuristic {
    pub minimum: Duration,
}

impl Default for ElapsedHeuristic {
    fn default() -> Self {
        Self {
            minimum: Duration::from_secs(30),
        }
    }
}

#[async_trait::async_trait]
impl AttestationCheck for ElapsedHeuristic {
    async fn is_attested(&self, _deposit_tx: TxHash, confirmed_at: Instant) -> bool {
        confirmed_at.elapsed() >= self.minimum
    }
}

/// Poll bounds for the in-route attestation phase.
#[derive(Debug, Clone)]
pub struct AttestationTiming {
    pub poll_interval: Duration,
    pub max_polls: usize,
}

impl Default for AttestationTiming {
    fn default() -> Self {
        // 10s polls bounded to roughly five minutes.
        Self {
            poll_interval: Duration::from_secs(10),
            max_polls: 30,
        }
    }
}

/// Drives bridge routes over injected wallet, balance and toolkit
/// capabilities. One instance serves one account session; each route call
/// starts a fresh [`BridgeState`] attempt.
pub struct BridgeOrchestrator<W, B, T, A = ElapsedHeuristic> {
    wallet: W,
    balances: B,
    toolkit: T,
    attestation: Option<A>,
    attestation_timing: AttestationTiming,
    switcher: ChainSwitchController,
    state: BridgeState,
    reserve_contract: Address,
    stacks_domain: u32,
    confirmation_timeout: Duration,
}

impl<W, B, T> BridgeOrchestrator<W, B, T> {
    /// Orchestrator on the public testnet deployment, without an in-route
    /// attestation phase; Stacks routes end at the confirmed deposit and
    /// hand off to the status monitor.
    pub fn new(wallet: W, balances: B, toolkit: T) -> Self {
        Self {
            wallet,
            balances,
            toolkit,
            attestation: None,
            attestation_timing: AttestationTiming::default(),
            switcher: ChainSwitchController::new(),
            state: BridgeState::default(),
            reserve_contract: X_RESERVE_CONTRACT,
            stacks_domain: STACKS_DOMAIN,
            confirmation_timeout: CONFIRMATION_TIMEOUT,
        }
    }

    /// Orchestrator configured from an assembled [`Ctx`]: deployment
    /// addresses, timeouts and the optional attestation policy all come
    /// from the config file.
    pub fn from_ctx(ctx: &Ctx, wallet: W, balances: B, toolkit: T) -> Self {
        let (attestation, attestation_timing) = match &ctx.attestation {
            Some((policy, timing)) => (Some(policy.clone()), timing.clone()),
            None => (None, AttestationTiming::default()),
        };
        Self {
            wallet,
            balances,
            toolkit,
            attestation,
            attestation_timing,
            switcher: ChainSwitchController::new(),
            state: BridgeState::default(),
            reserve_contract: ctx.reserve_contract,
            stacks_domain: ctx.stacks_domain,
            confirmation_timeout: ctx.confirmation_timeout,
        }
    }
}

impl<W, B, T, A> BridgeOrchestrator<W, B, T, A> {
    pub fn with_attestation<P>(
        self,
        policy: P,
        timing: AttestationTiming,
    ) -> BridgeOrchestrator<W, B, T, P> {
        BridgeOrchestrator {
            wallet: self.wallet,
            balances: self.balances,
            toolkit: self.toolkit,
            attestation: Some(policy),
            attestation_timing: timing,
            switcher: self.switcher,
            state: self.state,
            reserve_contract: self.reserve_contract,
            stacks_domain: self.stacks_domain,
            confirmation_timeout: self.confirmation_timeout,
        }
    }

    pub fn with_switch_timing(mut self, timing: SwitchTiming) -> Self {
        self.switcher = ChainSwitchController::with_timing(timing);
        self
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}

impl<W, B, T, A> BridgeOrchestrator<W, B, T, A>
where
    W: WalletProvider,
    B: BalanceReader,
    T: BridgeToolkit,
    A: AttestationCheck,
{
    /// Direct route: deposit USDC on Ethereum Sepolia into the xReserve
    /// contract, minting to `recipient` on Stacks.
    #[instrument(skip_all, fields(amount = %amount_text, recipient = %recipient_text))]
    pub async fn bridge_eth_to_stacks(&mut self, amount_text: &str, recipient_text: &str) -> bool {
        let Some((amount, recipient)) = self.validate_stacks_request(amount_text, recipient_text)
        else {
            return false;
        };
        if !self.funded(INTERMEDIARY_CHAIN, &amount).await {
            return false;
        }

        self.state.begin(self.stacks_deposit_steps());
        let outcome = self.run_deposit_route(&amount, &recipient).await;
        self.conclude(outcome)
    }

    /// Route via the intermediary: move USDC from `source` to Ethereum
    /// Sepolia through the cross-chain toolkit, then run the deposit
    /// procedure. A source already on the intermediary short-circuits to
    /// the direct route without touching the toolkit.
    #[instrument(skip_all, fields(%source, amount = %amount_text, recipient = %recipient_text))]
    pub async fn bridge_to_stacks(
        &mut self,
        source: ChainId,
        amount_text: &str,
        recipient_text: &str,
    ) -> bool {
        if source == INTERMEDIARY_CHAIN {
            debug!("Source is the intermediary; using the direct route");
            return self.bridge_eth_to_stacks(amount_text, recipient_text).await;
        }

        let Some((amount, recipient)) = self.validate_stacks_request(amount_text, recipient_text)
        else {
            return false;
        };
        if !self.funded(source, &amount).await {
            return false;
        }

        let mut steps = vec![
            BridgeStep::pending(
                "transfer",
                "Bridge to Ethereum",
                format!("Transfer USDC from {source} to {INTERMEDIARY_CHAIN}"),
            ),
            BridgeStep::pending(
                "switch",
                "Switch Network",
                format!("Switch the wallet to {INTERMEDIARY_CHAIN}"),
            ),
        ];
        steps.extend(self.stacks_deposit_steps());
        self.state.begin(steps);

        let outcome = self.run_via_intermediary(source, &amount, &recipient).await;
        self.conclude(outcome)
    }

    /// EVM-to-EVM route: a single toolkit transfer between two supported
    /// chains.
    #[instrument(skip_all, fields(%source, %dest, amount = %amount_text))]
    pub async fn bridge_evm_to_evm(
        &mut self,
        source: ChainId,
        dest: ChainId,
        amount_text: &str,
    ) -> bool {
        let Some(amount) = self.validate_amount(amount_text) else {
            return false;
        };
        if source == dest {
            self.state
                .reject("source and destination chains must differ");
            return false;
        }
        if !self.funded(source, &amount).await {
            return false;
        }

        self.state.begin(vec![BridgeStep::pending(
            "transfer",
            "Cross-chain transfer",
            format!("Transfer USDC from {source} to {dest}"),
        )]);

        let outcome = async {
            self.ensure_chain(source).await?;
            self.run_transfer_step(source, dest, &amount).await
        }
        .await;
        self.conclude(outcome)
    }

    fn validate_amount(&mut self, amount_text: &str) -> Option<UsdcAmount> {
        match amount_text.parse() {
            Ok(amount) => Some(amount),
            Err(error) => {
                debug!(%error, "Rejected amount input");
                self.state.reject("invalid amount");
                None
            }
        }
    }

    fn validate_stacks_request(
        &mut self,
        amount_text: &str,
        recipient_text: &str,
    ) -> Option<(UsdcAmount, StacksAddress)> {
        let amount = self.validate_amount(amount_text)?;
        let recipient = match recipient_text.parse() {
            Ok(recipient) => recipient,
            Err(error) => {
                debug!(%error, "Rejected recipient input");
                self.state.reject("invalid Stacks address");
                return None;
            }
        };
        Some((amount, recipient))
    }

    /// Balance check before any step runs. Rejects into state on shortfall
    /// or on an unreachable balance endpoint.
    async fn funded(&mut self, chain: ChainId, amount: &UsdcAmount) -> bool {
        let balance = match self
            .balances
            .usdc_balance(chain, self.wallet.account())
            .await
        {
            Ok(balance) => balance,
            Err(error) => {
                warn!(%chain, %error, "Balance check failed");
                self.state.reject(error.to_string());
                return false;
            }
        };

        if balance < amount.to_minor_units() {
            self.state.reject("insufficient balance");
            return false;
        }
        true
    }

    fn stacks_deposit_steps(&self) -> Vec<BridgeStep> {
        let mut steps = vec![
            BridgeStep::pending("approve", "Approve USDC", "Approve USDC spending"),
            BridgeStep::pending(
                "deposit",
                "Bridge to Stacks",
                "Deposit USDC to the xReserve contract",
            ),
        ];
        if self.attestation.is_some() {
            steps.push(BridgeStep::pending(
                "attestation",
                "Attestation & Minting",
                "Wait for the deposit to be attested and minted on Stacks",
            ));
        }
        steps
    }

    async fn run_via_intermediary(
        &mut self,
        source: ChainId,
        amount: &UsdcAmount,
        recipient: &StacksAddress,
    ) -> Result<(), BridgeError> {
        self.ensure_chain(source).await?;
        self.run_transfer_step(source, INTERMEDIARY_CHAIN, amount)
            .await?;
        self.run_switch_step().await?;
        self.run_deposit_route(amount, recipient).await
    }

    /// Approve, deposit and (when configured) attestation, starting at the
    /// current step index. Shared by the direct route and the tail of the
    /// intermediary route.
    async fn run_deposit_route(
        &mut self,
        amount: &UsdcAmount,
        recipient: &StacksAddress,
    ) -> Result<(), BridgeError> {
        self.ensure_chain(INTERMEDIARY_CHAIN).await?;
        self.run_approve_step(amount).await?;
        self.run_deposit_step(amount, recipient).await?;
        self.run_attestation_step().await
    }

    async fn ensure_chain(&mut self, chain: ChainId) -> Result<(), BridgeError> {
        let switched = self
            .switcher
            .ensure_correct_chain(&self.wallet, chain.network_id(), MAX_SWITCH_RETRIES)
            .await;
        if !switched {
            return Err(BridgeError::SwitchFailed(chain));
        }
        Ok(())
    }

    /// Approves exactly the requested amount, or completes the step with no
    /// transaction when the standing allowance already covers it.
    async fn run_approve_step(&mut self, amount: &UsdcAmount) -> Result<(), BridgeError> {
        let index = self.state.current_step_index();
        self.state
            .update_step(index, StepUpdate::status(StepStatus::InProgress))?;

        let owner = self.wallet.account();
        let allowance = self
            .balances
            .usdc_allowance(INTERMEDIARY_CHAIN, owner, self.reserve_contract)
            .await?;

        if allowance >= amount.to_minor_units() {
            debug!(%allowance, "Standing allowance covers the deposit");
            self.state.update_step(index, StepUpdate::completed())?;
            self.state.advance();
            return Ok(());
        }

        let calldata: Bytes = IERC20::approveCall {
            spender: self.reserve_contract,
            amount: amount.to_minor_units(),
        }
        .abi_encode()
        .into();

        let tx = self
            .wallet
            .submit_contract_call(
                INTERMEDIARY_CHAIN.usdc_address(),
                &calldata,
                "USDC approval",
            )
            .await?;
        self.wallet
            .wait_for_receipt(tx, self.confirmation_timeout)
            .await?;

        info!(%tx, "USDC approval confirmed");
        self.state.update_step(
            index,
            StepUpdate::completed_with_tx(tx, INTERMEDIARY_CHAIN.descriptor().explorer_tx_url(tx)),
        )?;
        self.state.advance();
        Ok(())
    }

    async fn run_deposit_step(
        &mut self,
        amount: &UsdcAmount,
        recipient: &StacksAddress,
    ) -> Result<(), BridgeError> {
        let index = self.state.current_step_index();
        self.state
            .update_step(index, StepUpdate::status(StepStatus::InProgress))?;

        // The balance may have moved since validation, and for the
        // intermediary route the funds only just arrived here.
        let balance = self
            .balances
            .usdc_balance(INTERMEDIARY_CHAIN, self.wallet.account())
            .await?;
        if balance < amount.to_minor_units() {
            return Err(BridgeError::InsufficientBalance);
        }

        let calldata: Bytes = IXReserve::depositToRemoteCall {
            amount: amount.to_minor_units(),
            remoteDomain: self.stacks_domain,
            remoteRecipient: recipient.encode(),
            localToken: INTERMEDIARY_CHAIN.usdc_address(),
            maxFee: U256::ZERO,
            hookData: Bytes::new(),
        }
        .abi_encode()
        .into();

        let tx = self
            .wallet
            .submit_contract_call(self.reserve_contract, &calldata, "xReserve deposit")
            .await?;
        self.wallet
            .wait_for_receipt(tx, self.confirmation_timeout)
            .await?;

        info!(%tx, amount = %amount, recipient = %recipient, "xReserve deposit confirmed");
        self.state.update_step(
            index,
            StepUpdate::completed_with_tx(tx, INTERMEDIARY_CHAIN.descriptor().explorer_tx_url(tx)),
        )?;
        self.state.advance();
        Ok(())
    }

    async fn run_attestation_step(&mut self) -> Result<(), BridgeError> {
        let Some(policy) = &self.attestation else {
            return Ok(());
        };
        let index = self.state.current_step_index();
        self.state
            .update_step(index, StepUpdate::status(StepStatus::InProgress))?;

        let deposit_tx = self
            .state
            .steps()
            .iter()
            .rev()
            .find_map(|step| step.tx_hash)
            .unwrap_or_default();
        let confirmed_at = Instant::now();

        let poll = || async move {
            if policy.is_attested(deposit_tx, confirmed_at).await {
                Ok(())
            } else {
                Err(BridgeError::AttestationPending)
            }
        };
        let attested = poll
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.attestation_timing.poll_interval)
                    .with_max_times(self.attestation_timing.max_polls),
            )
            .await;

        if attested.is_err() {
            return Err(BridgeError::AttestationTimeout);
        }

        info!(%deposit_tx, "Attestation phase complete");
        self.state.update_step(index, StepUpdate::completed())?;
        self.state.advance();
        Ok(())
    }

    async fn run_transfer_step(
        &mut self,
        from: ChainId,
        to: ChainId,
        amount: &UsdcAmount,
    ) -> Result<(), BridgeError> {
        let index = self.state.current_step_index();
        self.state
            .update_step(index, StepUpdate::status(StepStatus::InProgress))?;

        // A toolkit that is still initializing gets a few chances; every
        // other failure surfaces immediately.
        let toolkit = &self.toolkit;
        let call = || async move { toolkit.bridge(from, to, amount).await };
        let outcome = call
            .retry(
                ConstantBuilder::default()
                    .with_delay(Duration::from_secs(1))
                    .with_max_times(2),
            )
            .when(|error| matches!(error, ToolkitError::NotReady(_)))
            .await?;
        outcome.ensure_executed()?;
        let last = outcome.last_tx()?;

        // last_tx guarantees the hash; the URL may be absent.
        let tx = last.tx_hash.unwrap_or_default();
        let explorer_url = last
            .explorer_url
            .as_ref()
            .map(|url| url.to_string())
            .unwrap_or_else(|| from.descriptor().explorer_tx_url(tx));

        info!(%tx, %from, %to, "Cross-chain transfer executed");
        self.state
            .update_step(index, StepUpdate::completed_with_tx(tx, explorer_url))?;
        self.state.advance();
        Ok(())
    }

    /// Re-verifies the live network after the toolkit ran; the toolkit may
    /// have left the wallet anywhere. Only switches when actually needed.
    async fn run_switch_step(&mut self) -> Result<(), BridgeError> {
        let index = self.state.current_step_index();
        self.state
            .update_step(index, StepUpdate::status(StepStatus::InProgress))?;

        let live = self.wallet.live_network_id().await?;
        if live != INTERMEDIARY_CHAIN.network_id() {
            self.ensure_chain(INTERMEDIARY_CHAIN).await?;
        } else {
            debug!("Toolkit left the wallet on the intermediary network");
        }

        self.state.update_step(index, StepUpdate::completed())?;
        self.state.advance();
        Ok(())
    }

    fn conclude(&mut self, outcome: Result<(), BridgeError>) -> bool {
        match outcome {
            Ok(()) => match self.state.complete() {
                Ok(()) => {
                    info!("Bridge route completed");
                    true
                }
                Err(error) => {
                    warn!(%error, "Route finished without satisfying completion");
                    self.state.reject(error.to_string());
                    false
                }
            },
            Err(error) => {
                warn!(%error, "Bridge route failed");
                self.state.fail_current(error.to_string());
                false
            }
        }
    }
}
