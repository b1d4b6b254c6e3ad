//! dapp-pool: Uniswap V3 pool reads and `sqrtPriceX96` price conversion.
//!
//! V3 stores price directly as `sqrtPriceX96` (a Q64.96 fixed-point √P). A
//! single `slot0()` read plus both tokens' `decimals()` is enough to derive a
//! human-readable price; [`price::compute_price`] does that with integer math only.

pub mod pool;
pub mod price;
pub mod rpc;
pub mod slot0;

pub use pool::{PoolReader, PoolSnapshot, TokenInfo, USDC_WETH_005_POOL};
pub use price::{
    compute_price, DecimalPrice, PoolPriceState, PriceError, PriceErrorKind,
    DEFAULT_OUTPUT_DECIMALS,
};
pub use rpc::BlockTag;
pub use slot0::{fetch_slot0_via_call, fetch_slot0_via_storage, Slot0Data};
