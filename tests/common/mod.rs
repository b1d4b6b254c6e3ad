//! Shared test helpers and utilities.
//!
//! Factory functions for pool snapshots and a scriptable chain source, so the
//! wallet and pool flows can be exercised without a node.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use alloy::primitives::{address, Address, U256};
use async_trait::async_trait;
use dapp_pool::{BlockTag, PoolSnapshot, Slot0Data, TokenInfo, USDC_WETH_005_POOL};
use dapp_wallet::ChainSource;

/// First default anvil account.
pub const ALICE: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
/// Second default anvil account.
pub const BOB: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

pub const MAINNET_ID: u64 = 1;
pub const SEPOLIA_ID: u64 = 11_155_111;

/// USDC/WETH sqrtPriceX96 around block 17,000,000 (≈ 2765 USDC per WETH).
pub fn usdc_weth_sqrt_price() -> U256 {
    U256::from_str_radix("1506673274302120988651364689808458", 10)
        .expect("literal is a valid U256")
}

/// Creates a Slot0Data with the given price and neutral oracle fields.
pub fn sample_slot0(sqrt_price_x96: U256) -> Slot0Data {
    Slot0Data {
        sqrt_price_x96,
        tick: 0,
        observation_index: 0,
        observation_cardinality: 1,
        observation_cardinality_next: 1,
        fee_protocol: 0,
        unlocked: true,
    }
}

pub fn sample_token(symbol: &str, decimals: u8) -> TokenInfo {
    TokenInfo {
        address: Address::repeat_byte(decimals),
        symbol: symbol.to_string(),
        decimals,
    }
}

/// Creates a PoolSnapshot for the USDC/WETH 0.05% pool at the given price.
pub fn sample_snapshot(sqrt_price_x96: U256) -> PoolSnapshot {
    PoolSnapshot {
        address: USDC_WETH_005_POOL,
        block: BlockTag::Number(17_000_000),
        slot0: sample_slot0(sqrt_price_x96),
        liquidity: 10_000_000_000_000_000_000,
        token0: sample_token("USDC", 6),
        token1: sample_token("WETH", 18),
    }
}

/// A chain source whose answers are set by the test between polls.
///
/// Clones share state, so a test can keep one handle while the watcher owns another.
#[derive(Clone)]
pub struct FakeWallet {
    state: Arc<Mutex<(Vec<Address>, u64)>>,
    failing: Arc<Mutex<bool>>,
}

impl FakeWallet {
    pub fn new(accounts: Vec<Address>, chain_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new((accounts, chain_id))),
            failing: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.state.lock().expect("not poisoned").0 = accounts;
    }

    pub fn set_chain(&self, chain_id: u64) {
        self.state.lock().expect("not poisoned").1 = chain_id;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().expect("not poisoned") = failing;
    }

    fn check(&self) -> eyre::Result<()> {
        if *self.failing.lock().expect("not poisoned") {
            eyre::bail!("node unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl ChainSource for FakeWallet {
    async fn accounts(&self) -> eyre::Result<Vec<Address>> {
        self.check()?;
        Ok(self.state.lock().expect("not poisoned").0.clone())
    }

    async fn chain_id(&self) -> eyre::Result<u64> {
        self.check()?;
        Ok(self.state.lock().expect("not poisoned").1)
    }
}
