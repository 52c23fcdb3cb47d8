//! Static catalogue of supported CCTP testnet chains.
//!
//! Every bridge route starts on one of these chains and, for Stacks-bound
//! routes, funnels through Ethereum Sepolia before the xReserve deposit.
//! The registry is defined at compile time; lookups never allocate.

use alloy::primitives::{Address, TxHash, address};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported source/destination chains for the cross-chain toolkit.
///
/// Ethereum Sepolia doubles as the intermediary chain: the only network
/// from which the xReserve deposit to Stacks can be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainId {
    EthereumSepolia,
    BaseSepolia,
    ArbitrumSepolia,
    AvalancheFuji,
    OptimismSepolia,
    PolygonAmoy,
    LineaSepolia,
    UnichainSepolia,
    ArcTestnet,
}

/// The mandatory hop before reaching Stacks, regardless of the true source.
pub const INTERMEDIARY_CHAIN: ChainId = ChainId::EthereumSepolia;

/// Destination domain identifying Stacks to the xReserve cross-chain
/// messaging scheme.
pub const STACKS_DOMAIN: u32 = 10003;

/// xReserve reserve contract on Ethereum Sepolia.
pub const X_RESERVE_CONTRACT: Address = address!("0x50647D22A2b9fD04d0Df40fEC3A3e0c3f16d43dA");

/// USDC uses 6 decimal places on every supported chain.
pub const USDC_DECIMALS: u32 = 6;

/// Immutable chain metadata, looked up by [`ChainId`] or numeric network id.
#[derive(Debug, Clone, Copy)]
pub struct ChainDescriptor {
    pub id: ChainId,
    /// EIP-155 chain id reported by the wallet provider.
    pub network_id: u64,
    pub display_name: &'static str,
    pub rpc_url: &'static str,
    pub usdc_address: Address,
    pub explorer_base: &'static str,
    pub testnet: bool,
}

impl ChainDescriptor {
    /// Block-explorer URL for a transaction on this chain.
    pub fn explorer_tx_url(&self, tx: TxHash) -> String {
        format!("{}/tx/{tx}", self.explorer_base)
    }
}

static CHAINS: &[ChainDescriptor] = &[
    ChainDescriptor {
        id: ChainId::EthereumSepolia,
        network_id: 11_155_111,
        display_name: "Ethereum",
        rpc_url: "https://ethereum-sepolia.publicnode.com",
        usdc_address: address!("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
        explorer_base: "https://sepolia.etherscan.io",
        testnet: true,
    },
    ChainDescriptor {
        id: ChainId::BaseSepolia,
        network_id: 84_532,
        display_name: "Base",
        rpc_url: "https://sepolia.base.org",
        usdc_address: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        explorer_base: "https://sepolia.basescan.org",
        testnet: true,
    },
    ChainDescriptor {
        id: ChainId::ArbitrumSepolia,
        network_id: 421_614,
        display_name: "Arbitrum",
        rpc_url: "https://sepolia-rollup.arbitrum.io/rpc",
        usdc_address: address!("0x75faf114eafb1BDbe2F0316DF893fd58CE46AA4d"),
        explorer_base: "https://sepolia.arbiscan.io",
        testnet: true,
    },
    ChainDescriptor {
        id: ChainId::AvalancheFuji,
        network_id: 43_113,
        display_name: "Avalanche",
        rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
        usdc_address: address!("0x5425890298aed601595a70AB815c96711a31Bc65"),
        explorer_base: "https://testnet.snowtrace.io",
        testnet: true,
    },
    ChainDescriptor {
        id: ChainId::OptimismSepolia,
        network_id: 11_155_420,
        display_name: "Optimism",
        rpc_url: "https://sepolia.optimism.io",
        usdc_address: address!("0x5fd84259d66Cd46123540766Be93DFE6D43130D7"),
        explorer_base: "https://sepolia-optimism.etherscan.io",
        testnet: true,
    },
    ChainDescriptor {
        id: ChainId::PolygonAmoy,
        network_id: 80_002,
        display_name: "Polygon",
        rpc_url: "https://rpc-amoy.polygon.technology",
        usdc_address: address!("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"),
        explorer_base: "https://amoy.polygonscan.com",
        testnet: true,
    },
    ChainDescriptor {
        id: ChainId::LineaSepolia,
        network_id: 59_141,
        display_name: "Linea",
        rpc_url: "https://rpc.sepolia.linea.build",
        usdc_address: address!("0xf56dc6695cF1f5c364eDEbC7Dc7077ac9B586068"),
        explorer_base: "https://sepolia.lineascan.build",
        testnet: true,
    },
    ChainDescriptor {
        id: ChainId::UnichainSepolia,
        network_id: 1301,
        display_name: "Unichain",
        rpc_url: "https://sepolia.unichain.org",
        usdc_address: address!("0x31d0220469e10c4E71834a79b1f276d740d3768F"),
        explorer_base: "https://sepolia.uniscan.xyz",
        testnet: true,
    },
    ChainDescriptor {
        id: ChainId::ArcTestnet,
        network_id: 5_042_002,
        display_name: "Arc",
        rpc_url: "https://rpc.testnet.arc.network",
        usdc_address: address!("0x3600000000000000000000000000000000000000"),
        explorer_base: "https://testnet.arcscan.app",
        testnet: true,
    },
];

impl ChainId {
    /// Returns the descriptor for this chain.
    pub fn descriptor(self) -> &'static ChainDescriptor {
        CHAINS
            .iter()
            .find(|chain| chain.id == self)
            .expect("every ChainId variant has a registry entry")
    }

    /// Resolves a chain from the numeric network id a wallet reports.
    pub fn from_network_id(network_id: u64) -> Option<Self> {
        CHAINS
            .iter()
            .find(|chain| chain.network_id == network_id)
            .map(|chain| chain.id)
    }

    pub fn network_id(self) -> u64 {
        self.descriptor().network_id
    }

    pub fn display_name(self) -> &'static str {
        self.descriptor().display_name
    }

    pub fn usdc_address(self) -> Address {
        self.descriptor().usdc_address
    }

    /// All registered chains.
    pub fn all() -> impl Iterator<Item = ChainId> {
        CHAINS.iter().map(|chain| chain.id)
    }

    /// Chains usable as a source when bridging to Stacks. The intermediary
    /// itself is included: that case short-circuits to the direct route.
    pub fn source_chains() -> impl Iterator<Item = ChainId> {
        Self::all()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
