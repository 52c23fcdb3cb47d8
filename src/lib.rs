//! Orchestration core for bridging USDC from EVM testnets into Stacks.
//!
//! The crate drives multi-step bridge routes on behalf of a wallet the user
//! controls: network switching with live verification, ERC-20 approval, the
//! xReserve `depositToRemote` call that mints wrapped USDC on Stacks, an
//! external cross-chain toolkit for EVM-to-EVM hops, and post-deposit mint
//! monitoring against a Stacks API. It performs no signing and renders no
//! UI; wallet and toolkit are injected capabilities, and presentation reads
//! the step state the orchestrator maintains.

pub mod amount;
pub mod balance;
mod bindings;
pub mod chain;
pub mod chain_switch;
pub mod config;
pub mod monitor;
pub mod orchestrator;
pub mod stacks_address;
pub mod steps;
pub mod toolkit;
pub mod wallet;

#[cfg(test)]
pub mod test_utils;

pub use amount::{AmountError, UsdcAmount};
pub use balance::{BalanceError, BalanceReader, RpcBalanceReader};
pub use chain::{ChainDescriptor, ChainId, INTERMEDIARY_CHAIN, STACKS_DOMAIN, X_RESERVE_CONTRACT};
pub use chain_switch::{ChainSwitchController, SwitchTiming};
pub use config::{Config, ConfigError, Ctx};
pub use monitor::{BridgeMonitor, BridgeStatus, MonitorConfig, MonitorError, MonitorSnapshot};
pub use orchestrator::{
    AttestationCheck, AttestationTiming, BridgeOrchestrator, ElapsedHeuristic,
};
pub use stacks_address::{CodecError, StacksAddress};
pub use steps::{BridgeState, BridgeStep, StepStatus, StepTracker, StepUpdate};
pub use toolkit::{BridgeToolkit, ToolkitError, ToolkitOutcome, ToolkitState, ToolkitStep};
pub use wallet::{WalletError, WalletProvider};
