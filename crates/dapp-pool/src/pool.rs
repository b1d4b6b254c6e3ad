//! Pool snapshot reader: slot0, liquidity and both tokens' metadata in one call.

use alloy::primitives::{address, Address};
use alloy::providers::Provider;
use alloy::sol;
use eyre::{Context, Result};

use crate::price::{DecimalPrice, PoolPriceState, PriceError};
use crate::rpc::BlockTag;
use crate::slot0::{fetch_slot0_via_call, Slot0Data};

/// Uniswap V3 USDC/WETH 0.05% fee pool on Ethereum mainnet.
///
/// - token0 = USDC (6 decimals)
/// - token1 = WETH (18 decimals)
pub const USDC_WETH_005_POOL: Address = address!("88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640");

sol! {
    #[sol(rpc)]
    interface IUniswapV3PoolImmutables {
        function liquidity() external view returns (uint128 liquidity);
        function token0() external view returns (address token);
        function token1() external view returns (address token);
    }

    #[sol(rpc)]
    interface IERC20Metadata {
        function symbol() external view returns (string symbol);
        function decimals() external view returns (uint8 decimals);
    }
}

/// ERC-20 metadata needed to interpret a pool's raw amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything the UI shows about a pool at one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Pool contract address.
    pub address: Address,
    /// Block the reads were pinned to.
    pub block: BlockTag,
    pub slot0: Slot0Data,
    /// In-range liquidity.
    pub liquidity: u128,
    pub token0: TokenInfo,
    pub token1: TokenInfo,
}

impl PoolSnapshot {
    pub fn price_state(&self, output_decimals: u8) -> PoolPriceState {
        self.slot0
            .price_state(self.token0.decimals, self.token1.decimals, output_decimals)
    }

    /// Price of one token1 in token0 units.
    ///
    /// # Errors
    /// Propagates the converter's [`PriceError`].
    pub fn price(&self, output_decimals: u8) -> Result<DecimalPrice, PriceError> {
        self.price_state(output_decimals).compute()
    }
}

/// Reads pool and token state through an Alloy provider.
///
/// `slot0()` goes through the raw JSON-RPC reader so it can be cross-checked
/// against storage; the remaining reads use `sol!` bindings.
#[derive(Debug, Clone)]
pub struct PoolReader<P> {
    provider: P,
    rpc_url: String,
}

impl<P: Provider + Clone> PoolReader<P> {
    pub fn new(provider: P, rpc_url: impl Into<String>) -> Self {
        Self {
            provider,
            rpc_url: rpc_url.into(),
        }
    }

    /// Read `symbol()` and `decimals()` of an ERC-20 token concurrently.
    ///
    /// # Errors
    /// Returns error if either call fails or reverts.
    #[tracing::instrument(skip(self))]
    pub async fn token_info(&self, token: Address, block: BlockTag) -> Result<TokenInfo> {
        let contract = IERC20Metadata::new(token, self.provider.clone());
        let symbol_call = contract.symbol().block(block.block_id());
        let decimals_call = contract.decimals().block(block.block_id());

        let (symbol, decimals) = tokio::try_join!(
            async {
                symbol_call
                    .call()
                    .await
                    .wrap_err_with(|| format!("symbol() failed for {token:#x}"))
            },
            async {
                decimals_call
                    .call()
                    .await
                    .wrap_err_with(|| format!("decimals() failed for {token:#x}"))
            },
        )?;

        Ok(TokenInfo {
            address: token,
            symbol: symbol.symbol,
            decimals: decimals.decimals,
        })
    }

    /// Read a full [`PoolSnapshot`]: slot0, liquidity, token addresses and
    /// both tokens' metadata, all pinned to `block`.
    ///
    /// # Errors
    /// Returns error if any RPC read fails.
    #[tracing::instrument(skip(self))]
    pub async fn snapshot(&self, pool: Address, block: BlockTag) -> Result<PoolSnapshot> {
        let contract = IUniswapV3PoolImmutables::new(pool, self.provider.clone());
        let liquidity_call = contract.liquidity().block(block.block_id());
        let token0_call = contract.token0().block(block.block_id());
        let token1_call = contract.token1().block(block.block_id());

        let (slot0, liquidity, token0, token1) = tokio::try_join!(
            fetch_slot0_via_call(&self.rpc_url, pool, block),
            async {
                liquidity_call
                    .call()
                    .await
                    .wrap_err("liquidity() call failed")
            },
            async { token0_call.call().await.wrap_err("token0() call failed") },
            async { token1_call.call().await.wrap_err("token1() call failed") },
        )?;

        let (token0, token1) = tokio::try_join!(
            self.token_info(token0.token, block),
            self.token_info(token1.token, block),
        )?;

        tracing::info!(
            pool = %pool,
            token0 = %token0.symbol,
            token1 = %token1.symbol,
            tick = slot0.tick,
            liquidity = liquidity.liquidity,
            "pool snapshot read"
        );

        Ok(PoolSnapshot {
            address: pool,
            block,
            slot0,
            liquidity: liquidity.liquidity,
            token0,
            token1,
        })
    }
}
