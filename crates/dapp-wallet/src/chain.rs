//! Networks the dapp knows about.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Chainlink faucet for Sepolia test ETH.
const SEPOLIA_FAUCET_URL: &str = "https://faucets.chain.link/sepolia";

/// An EVM network identified by its EIP-155 chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    /// Ethereum mainnet (chain id 1).
    Mainnet,
    /// Sepolia testnet (chain id 11155111).
    Sepolia,
    /// Any chain without built-in support.
    Other(u64),
}

impl Chain {
    pub const fn id(self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Sepolia => 11_155_111,
            Self::Other(id) => id,
        }
    }

    pub const fn from_id(id: u64) -> Self {
        match id {
            1 => Self::Mainnet,
            11_155_111 => Self::Sepolia,
            other => Self::Other(other),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Sepolia => "sepolia",
            Self::Other(_) => "unknown",
        }
    }

    /// `0x`-prefixed chain id, as used by `wallet_switchEthereumChain`.
    pub fn hex_id(self) -> String {
        format!("0x{:x}", self.id())
    }

    /// Where to get test ETH, for testnets that have a known faucet.
    pub const fn faucet_url(self) -> Option<&'static str> {
        match self {
            Self::Sepolia => Some(SEPOLIA_FAUCET_URL),
            _ => None,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized chain {0:?}: expected a name (mainnet, sepolia), decimal id or 0x-hex id")]
pub struct ChainParseError(String);

impl FromStr for Chain {
    type Err = ChainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        match lower.as_str() {
            "mainnet" | "ethereum" | "homestead" => return Ok(Self::Mainnet),
            "sepolia" => return Ok(Self::Sepolia),
            _ => {}
        }

        let id = match lower.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => lower.parse::<u64>(),
        }
        .map_err(|_| ChainParseError(trimmed.to_string()))?;

        Ok(Self::from_id(id))
    }
}
