//! Boundary to the external cross-chain transfer toolkit.
//!
//! EVM-to-EVM hops run through a third-party toolkit that drives its own
//! prompts and network switches. Its reported outcome is normalized into
//! [`ToolkitOutcome`] here so routes interrogate one shape; the adapter
//! behind the trait owns whatever wire format the toolkit actually speaks.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use url::Url;

use crate::amount::UsdcAmount;
use crate::chain::ChainId;

#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    /// The user backed out of a toolkit prompt mid-transfer.
    #[error("transfer cancelled in the cross-chain toolkit")]
    Cancelled,
    #[error("cross-chain transfer failed: {0}")]
    Failed(String),
    /// The adapter could not be constructed. Retried with bounded backoff
    /// at the call site.
    #[error("toolkit not ready: {0}")]
    NotReady(String),
}

/// Terminal state the toolkit reports for a transfer it drove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolkitState {
    Completed,
    Error,
    /// The toolkit returned before its own attestation settled.
    Pending,
}

/// One transaction the toolkit submitted along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitStep {
    pub tx_hash: Option<TxHash>,
    pub explorer_url: Option<Url>,
}

/// Normalized result of one toolkit transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitOutcome {
    pub state: ToolkitState,
    pub steps: Vec<ToolkitStep>,
}

impl ToolkitOutcome {
    /// Rejects outcomes that cannot represent a landed transfer. An empty
    /// step list means nothing was submitted; it is never treated as
    /// success.
    pub fn ensure_executed(&self) -> Result<(), ToolkitError> {
        match self.state {
            ToolkitState::Error => Err(ToolkitError::Failed(
                "toolkit reported an error state".into(),
            )),
            _ if self.steps.is_empty() => Err(ToolkitError::Failed(
                "toolkit reported no executed steps".into(),
            )),
            _ => Ok(()),
        }
    }

    /// The final submitted transaction. A final step without a hash means
    /// the user cancelled inside the toolkit before signing.
    pub fn last_tx(&self) -> Result<&ToolkitStep, ToolkitError> {
        let step = self.steps.last().ok_or(ToolkitError::Cancelled)?;
        if step.tx_hash.is_none() {
            return Err(ToolkitError::Cancelled);
        }
        Ok(step)
    }
}

/// Capability to move USDC between two EVM chains.
///
/// Implementations block until the transfer is as settled as the toolkit
/// can make it; a [`ToolkitState::Pending`] outcome means attestation was
/// still in flight when the toolkit gave up waiting, not that the caller
/// should poll.
#[async_trait]
pub trait BridgeToolkit: Send + Sync {
    async fn bridge(
        &self,
        from: ChainId,
        to: ChainId,
        amount: &UsdcAmount,
    ) -> Result<ToolkitOutcome, ToolkitError>;
}
