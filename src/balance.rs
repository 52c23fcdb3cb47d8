//! Read-only USDC balance and allowance queries.
//!
//! Queries go straight to each chain's public RPC endpoint rather than
//! through the wallet provider, so they work regardless of which network
//! the wallet currently sits on.

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::trace;
use url::Url;

use crate::bindings::IERC20;
use crate::chain::ChainId;

#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error("invalid RPC endpoint for {chain}: {source}")]
    Endpoint {
        chain: ChainId,
        source: url::ParseError,
    },
    #[error("contract read failed on {chain}: {source}")]
    Contract {
        chain: ChainId,
        source: alloy::contract::Error,
    },
}

/// Read-only view of USDC holdings across the registered chains.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn usdc_balance(&self, chain: ChainId, account: Address) -> Result<U256, BalanceError>;

    async fn usdc_allowance(
        &self,
        chain: ChainId,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BalanceError>;
}

/// [`BalanceReader`] backed by per-chain HTTP providers built lazily from
/// the registry's RPC endpoints (overridable for tests and private RPCs).
pub struct RpcBalanceReader {
    rpc_overrides: HashMap<ChainId, Url>,
    providers: Mutex<HashMap<ChainId, RootProvider>>,
}

impl RpcBalanceReader {
    pub fn new() -> Self {
        Self::with_overrides(HashMap::new())
    }

    pub fn with_overrides(rpc_overrides: HashMap<ChainId, Url>) -> Self {
        Self {
            rpc_overrides,
            providers: Mutex::new(HashMap::new()),
        }
    }

    fn provider_for(&self, chain: ChainId) -> Result<RootProvider, BalanceError> {
        let mut providers = self
            .providers
            .lock()
            .expect("provider cache mutex poisoned");

        if let Some(provider) = providers.get(&chain) {
            return Ok(provider.clone());
        }

        let url = match self.rpc_overrides.get(&chain) {
            Some(url) => url.clone(),
            None => chain
                .descriptor()
                .rpc_url
                .parse()
                .map_err(|source| BalanceError::Endpoint { chain, source })?,
        };

        let provider = ProviderBuilder::new()
            .connect_http(url)
            .root()
            .clone();
        providers.insert(chain, provider.clone());
        Ok(provider)
    }
}

impl Default for RpcBalanceReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceReader for RpcBalanceReader {
    async fn usdc_balance(&self, chain: ChainId, account: Address) -> Result<U256, BalanceError> {
        let provider = self.provider_for(chain)?;
        let usdc = IERC20::new(chain.usdc_address(), provider);

        let balance = usdc
            .balanceOf(account)
            .call()
            .await
            .map_err(|source| BalanceError::Contract { chain, source })?;

        trace!(%chain, %account, %balance, "Fetched USDC balance");
        Ok(balance)
    }

    async fn usdc_allowance(
        &self,
        chain: ChainId,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BalanceError> {
        let provider = self.provider_for(chain)?;
        let usdc = IERC20::new(chain.usdc_address(), provider);

        let allowance = usdc
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|source| BalanceError::Contract { chain, source })?;

        trace!(%chain, %owner, %spender, %allowance, "Fetched USDC allowance");
        Ok(allowance)
    }
}
