//! Runtime configuration.
//!
//! Deserialized from a plaintext TOML file into [`Config`], then assembled
//! into the runtime [`Ctx`] with deployment defaults filled in. Every field
//! is optional: an empty file yields the public testnet deployment. This
//! client signs through the wallet provider and holds no secrets.

use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::balance::RpcBalanceReader;
use crate::chain::{ChainId, STACKS_DOMAIN, X_RESERVE_CONTRACT};
use crate::monitor::{BridgeMonitor, MonitorConfig, MonitorError};
use crate::orchestrator::{AttestationTiming, ElapsedHeuristic};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid URL in config: {0}")]
    Url(#[from] url::ParseError),
}

/// Settings deserialized from the config TOML.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Hiro-style Stacks API root used by the status monitor.
    stacks_api_url: Option<Url>,
    /// Per-chain RPC endpoint overrides for read-only balance queries.
    #[serde(default)]
    rpc_overrides: HashMap<ChainId, Url>,
    reserve_contract: Option<Address>,
    stacks_domain: Option<u32>,
    confirmation_timeout_secs: Option<u64>,
    monitor: Option<MonitorSection>,
    attestation: Option<AttestationSection>,
}

#[derive(Debug, Default, Deserialize)]
struct MonitorSection {
    token_contract: Option<String>,
    token_asset: Option<String>,
    mint_contract: Option<String>,
    poll_interval_secs: Option<u64>,
    max_polls: Option<u32>,
    attesting_after_secs: Option<u64>,
}

/// Present only when the deployment runs an in-route attestation phase.
#[derive(Debug, Default, Deserialize)]
struct AttestationSection {
    minimum_elapsed_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    max_polls: Option<usize>,
}

impl Config {
    pub fn from_toml_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn into_ctx(self) -> Result<Ctx, ConfigError> {
        let mut monitor = MonitorConfig::testnet_defaults()?;
        if let Some(api_base) = self.stacks_api_url {
            monitor.api_base = api_base;
        }
        if let Some(section) = self.monitor {
            if let Some(token_contract) = section.token_contract {
                monitor.token_contract = token_contract;
            }
            if let Some(token_asset) = section.token_asset {
                monitor.token_asset = token_asset;
            }
            if let Some(mint_contract) = section.mint_contract {
                monitor.mint_contract = mint_contract;
            }
            if let Some(secs) = section.poll_interval_secs {
                monitor.poll_interval = Duration::from_secs(secs);
            }
            if let Some(max_polls) = section.max_polls {
                monitor.max_polls = max_polls;
            }
            if let Some(secs) = section.attesting_after_secs {
                monitor.attesting_after = Duration::from_secs(secs);
            }
        }

        let attestation = self.attestation.map(|section| {
            let policy = ElapsedHeuristic {
                minimum: section
                    .minimum_elapsed_secs
                    .map(Duration::from_secs)
                    .unwrap_or(ElapsedHeuristic::default().minimum),
            };
            let defaults = AttestationTiming::default();
            let timing = AttestationTiming {
                poll_interval: section
                    .poll_interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.poll_interval),
                max_polls: section.max_polls.unwrap_or(defaults.max_polls),
            };
            (policy, timing)
        });

        Ok(Ctx {
            monitor,
            rpc_overrides: self.rpc_overrides,
            reserve_contract: self.reserve_contract.unwrap_or(X_RESERVE_CONTRACT),
            stacks_domain: self.stacks_domain.unwrap_or(STACKS_DOMAIN),
            confirmation_timeout: self
                .confirmation_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(crate::wallet::CONFIRMATION_TIMEOUT),
            attestation,
        })
    }
}

/// Assembled runtime context.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub monitor: MonitorConfig,
    pub rpc_overrides: HashMap<ChainId, Url>,
    pub reserve_contract: Address,
    pub stacks_domain: u32,
    pub confirmation_timeout: Duration,
    pub attestation: Option<(ElapsedHeuristic, AttestationTiming)>,
}

impl Ctx {
    /// Public testnet deployment with no overrides.
    pub fn testnet() -> Result<Self, ConfigError> {
        Config::default().into_ctx()
    }

    /// Balance reader honoring the configured per-chain RPC overrides.
    pub fn balance_reader(&self) -> RpcBalanceReader {
        RpcBalanceReader::with_overrides(self.rpc_overrides.clone())
    }

    /// Status monitor against the configured Stacks API and token
    /// identifiers.
    pub fn bridge_monitor(&self) -> Result<BridgeMonitor, MonitorError> {
        BridgeMonitor::new(self.monitor.clone())
    }
}
