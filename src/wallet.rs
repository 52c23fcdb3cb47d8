//! Wallet provider capability.
//!
//! The browser wallet is modeled as an injected trait object rather than a
//! global, so every chain-sensitive operation queries the provider live and
//! tests can script responses. The provider owns signing entirely; this
//! crate only hands it calldata and interprets the outcome.

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use std::time::Duration;

/// EIP-1193 error code for a user-rejected request.
const USER_REJECTED_CODE: i64 = 4001;

/// On-chain confirmation waits are bounded; a stuck transaction surfaces as
/// a recoverable timeout rather than an indefinite hang.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The user dismissed the provider prompt. Terminal: never retried.
    #[error("user rejected the request")]
    UserRejected,
    /// The provider exists but cannot serve requests yet (e.g. a pending
    /// permissions prompt). Retried with bounded backoff.
    #[error("wallet provider not ready: {0}")]
    NotReady(String),
    #[error("transaction {tx} not confirmed within {timeout:?}")]
    ConfirmationTimeout { tx: TxHash, timeout: Duration },
    #[error("wallet provider error: {0}")]
    Provider(String),
}

impl WalletError {
    /// Classifies a raw provider error by EIP-1193 code and message
    /// fragment, mirroring how browser wallets actually report rejection.
    pub fn classify(code: Option<i64>, message: &str) -> Self {
        if code == Some(USER_REJECTED_CODE) || message.to_ascii_lowercase().contains("rejected") {
            Self::UserRejected
        } else {
            Self::Provider(message.to_string())
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected)
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }
}

/// Operations the connected wallet exposes to the orchestration layer.
///
/// Implementations must answer [`live_network_id`](Self::live_network_id)
/// with the provider's current truth on every call; cached values go stale
/// the moment the cross-chain toolkit silently switches networks.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// The account whose funds move through the bridge.
    fn account(&self) -> Address;

    /// Live query of the provider's current network. Never cached.
    async fn live_network_id(&self) -> Result<u64, WalletError>;

    /// Asks the provider to switch networks, registering the network
    /// definition first if the wallet does not know it. Resolving does not
    /// guarantee the switch landed; callers re-verify.
    async fn request_network_switch(&self, network_id: u64) -> Result<(), WalletError>;

    /// Signs and submits a contract call, returning the transaction hash.
    async fn submit_contract_call(
        &self,
        to: Address,
        calldata: &Bytes,
        description: &str,
    ) -> Result<TxHash, WalletError>;

    /// Waits for the transaction to be mined, bounded by `timeout`.
    async fn wait_for_receipt(&self, tx: TxHash, timeout: Duration) -> Result<(), WalletError>;
}
