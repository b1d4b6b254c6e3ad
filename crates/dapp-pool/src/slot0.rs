//! Slot0 reader for Uniswap V3 pools.
//!
//! Provides two methods for reading a pool's `slot0` struct:
//! - [`fetch_slot0_via_call`]: ABI-encoded `eth_call` to `slot0()`, canonical and always correct.
//! - [`fetch_slot0_via_storage`]: raw `eth_getStorageAt(pool, 0)`, no EVM execution.
//!
//! Both methods return a [`Slot0Data`] struct with the decoded fields. The
//! storage read is used to cross-validate the call result.

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};

use crate::price::PoolPriceState;
use crate::rpc::{http_client, rpc_hex_result, BlockTag};

/// `slot0()` function selector.
const SLOT0_SELECTOR: &str = "0x3850c7bd";

/// ABI encoding of the `slot0()` return: 7 words × 32 bytes = 448 hex chars.
const SLOT0_RETURN_HEX_LEN: usize = 448;

/// Decoded Uniswap V3 `slot0` struct.
///
/// Only `sqrt_price_x96` feeds the price conversion; the remaining fields are
/// shown to the user and used for cross-validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot0Data {
    /// Current √P in Q64.96 fixed-point format (uint160 on-chain).
    pub sqrt_price_x96: U256,
    /// Current tick index (int24 on-chain, stored as i32).
    pub tick: i32,
    /// Index of the most recently written oracle observation.
    pub observation_index: u16,
    /// Current oracle array capacity (used entries).
    pub observation_cardinality: u16,
    /// Pending oracle array capacity (next expansion target).
    pub observation_cardinality_next: u16,
    /// Protocol fee configuration byte.
    pub fee_protocol: u8,
    /// Reentrancy guard (true = unlocked).
    pub unlocked: bool,
}

impl Slot0Data {
    /// Pair this slot0 with token decimals to get a convertible price state.
    pub fn price_state(
        &self,
        token0_decimals: u8,
        token1_decimals: u8,
        output_decimals: u8,
    ) -> PoolPriceState {
        PoolPriceState::new(
            self.sqrt_price_x96,
            token0_decimals,
            token1_decimals,
            output_decimals,
        )
    }
}

/// Fetch `slot0` via `eth_call` to the pool's `slot0()` function.
///
/// # Errors
/// Returns error if the RPC call fails or the response cannot be decoded.
#[tracing::instrument(skip(rpc_url))]
pub async fn fetch_slot0_via_call(rpc_url: &str, pool: Address, block: BlockTag) -> Result<Slot0Data> {
    let client = http_client()?;

    let params = serde_json::json!([
        {
            "to": format!("{pool:#x}"),
            "data": SLOT0_SELECTOR,
        },
        block.to_param()
    ]);

    let result_hex = rpc_hex_result(&client, rpc_url, "eth_call", params).await?;
    let slot0 = decode_slot0_return(&result_hex)?;

    tracing::debug!(
        sqrt_price_x96 = %slot0.sqrt_price_x96,
        tick = slot0.tick,
        "slot0 read via eth_call"
    );

    Ok(slot0)
}

/// Fetch `slot0` via `eth_getStorageAt(pool, 0)`.
///
/// # Errors
/// Returns error if the RPC call fails or the response cannot be decoded.
#[tracing::instrument(skip(rpc_url))]
pub async fn fetch_slot0_via_storage(
    rpc_url: &str,
    pool: Address,
    block: BlockTag,
) -> Result<Slot0Data> {
    let client = http_client()?;

    let params = serde_json::json!([format!("{pool:#x}"), "0x0", block.to_param()]);

    let result_hex = rpc_hex_result(&client, rpc_url, "eth_getStorageAt", params).await?;
    let raw_slot = U256::from_str_radix(result_hex.trim_start_matches("0x"), 16)
        .map_err(|e| eyre!("failed to parse storage slot 0: {}", e))?;

    Ok(unpack_slot0_word(raw_slot))
}

/// Decode the ABI-encoded return of `slot0()`.
///
/// `(uint160 sqrtPriceX96, int24 tick, uint16, uint16, uint16, uint8, bool)`,
/// each value right-aligned (or sign-extended) in its own 32-byte word.
///
/// # Errors
/// Returns error if the payload is short or a word is not valid hex.
pub fn decode_slot0_return(result_hex: &str) -> Result<Slot0Data> {
    let raw = result_hex.trim_start_matches("0x");
    if raw.len() < SLOT0_RETURN_HEX_LEN {
        return Err(eyre!(
            "slot0() response too short: expected {} hex chars, got {}",
            SLOT0_RETURN_HEX_LEN,
            raw.len()
        ));
    }

    let word = |index: usize| -> Result<U256> {
        let chunk = raw
            .get(index * 64..(index + 1) * 64)
            .ok_or_else(|| eyre!("slot0() word {} out of bounds", index))?;
        U256::from_str_radix(chunk, 16)
            .map_err(|e| eyre!("failed to parse slot0() word {}: {}", index, e))
    };

    let sqrt_price_x96 = word(0)?;
    let tick = sign_extend_int256_to_i32(word(1)?);

    Ok(Slot0Data {
        sqrt_price_x96,
        tick,
        observation_index: low_bits(word(2)?, 16) as u16,
        observation_cardinality: low_bits(word(3)?, 16) as u16,
        observation_cardinality_next: low_bits(word(4)?, 16) as u16,
        fee_protocol: low_bits(word(5)?, 8) as u8,
        unlocked: !word(6)?.is_zero(),
    })
}

/// Unpack storage slot 0 of a Uniswap V3 pool.
///
/// Storage layout (packed from the least significant bit):
/// - bits \[0:160\]   → `sqrtPriceX96` (uint160)
/// - bits \[160:184\] → `tick` (int24, sign-extend from 24 bits)
/// - bits \[184:200\] → `observationIndex` (uint16)
/// - bits \[200:216\] → `observationCardinality` (uint16)
/// - bits \[216:232\] → `observationCardinalityNext` (uint16)
/// - bits \[232:240\] → `feeProtocol` (uint8)
/// - bits \[240:248\] → `unlocked` (bool, uint8)
pub fn unpack_slot0_word(raw_slot: U256) -> Slot0Data {
    let mask_160: U256 = (U256::from(1u64) << 160) - U256::from(1u64);

    Slot0Data {
        sqrt_price_x96: raw_slot & mask_160,
        tick: sign_extend_i24(low_bits(raw_slot >> 160, 24) as u32),
        observation_index: low_bits(raw_slot >> 184, 16) as u16,
        observation_cardinality: low_bits(raw_slot >> 200, 16) as u16,
        observation_cardinality_next: low_bits(raw_slot >> 216, 16) as u16,
        fee_protocol: low_bits(raw_slot >> 232, 8) as u8,
        unlocked: low_bits(raw_slot >> 240, 8) != 0,
    }
}

/// Lowest `bits` bits of `value` (bits ≤ 64).
fn low_bits(value: U256, bits: usize) -> u64 {
    let mask = (U256::from(1u64) << bits) - U256::from(1u64);
    (value & mask).to::<u64>()
}

/// Sign-extend a 24-bit `int24` value (stored as u32) to `i32`.
fn sign_extend_i24(raw: u32) -> i32 {
    if raw & 0x80_0000 != 0 {
        (raw | 0xFF00_0000) as i32
    } else {
        raw as i32
    }
}

/// Sign-extend a Solidity `int256` (stored as U256) to `i32`.
///
/// ABI-encoded `int24` values are sign-extended to 256 bits, so the lowest 32
/// bits already hold the two's-complement `i32`.
fn sign_extend_int256_to_i32(val: U256) -> i32 {
    low_bits(val, 32) as u32 as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_hex(value: U256) -> String {
        format!("{value:064x}")
    }

    #[test]
    fn sign_extend_i24_positive() {
        assert_eq!(sign_extend_i24(100), 100);
    }

    #[test]
    fn sign_extend_i24_negative() {
        // tick = -100 → stored as 0xFF_FF9C (24-bit two's complement)
        assert_eq!(sign_extend_i24(0xFF_FF9C), -100);
    }

    #[test]
    fn sign_extend_i24_bounds() {
        assert_eq!(sign_extend_i24(0x7F_FFFF), 8_388_607);
        assert_eq!(sign_extend_i24(0x80_0000), -8_388_608);
    }

    #[test]
    fn sign_extend_int256_negative() {
        // 2^256 - 201234
        let val = U256::MAX - U256::from(201_233u32);
        assert_eq!(sign_extend_int256_to_i32(val), -201_234);
        assert_eq!(sign_extend_int256_to_i32(U256::from(201_234u32)), 201_234);
    }

    #[test]
    fn decode_call_return() {
        let words = [
            U256::from(1u64) << 96,
            U256::MAX - U256::from(99u32), // -100
            U256::from(3u32),
            U256::from(50u32),
            U256::from(60u32),
            U256::ZERO,
            U256::from(1u32),
        ];
        let hex: String = words.iter().map(|w| word_hex(*w)).collect();

        let slot0 = decode_slot0_return(&format!("0x{hex}")).expect("well-formed return");
        assert_eq!(slot0.sqrt_price_x96, U256::from(1u64) << 96);
        assert_eq!(slot0.tick, -100);
        assert_eq!(slot0.observation_index, 3);
        assert_eq!(slot0.observation_cardinality, 50);
        assert_eq!(slot0.observation_cardinality_next, 60);
        assert_eq!(slot0.fee_protocol, 0);
        assert!(slot0.unlocked);
    }

    #[test]
    fn decode_rejects_short_payload() {
        let err = decode_slot0_return("0x1234").expect_err("too short");
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn decode_rejects_non_hex_word() {
        let bad = "zz".repeat(SLOT0_RETURN_HEX_LEN / 2);
        assert!(decode_slot0_return(&bad).is_err());
    }

    #[test]
    fn unpack_storage_word_matches_call_layout() {
        // sqrt = 2^96, tick = -100, obs = 3/50/60, fee = 0, unlocked = true
        let raw = U256::from_str_radix(
            "100003c00320003ffff9c0000000000000001000000000000000000000000",
            16,
        )
        .expect("valid hex");

        let slot0 = unpack_slot0_word(raw);
        assert_eq!(slot0.sqrt_price_x96, U256::from(1u64) << 96);
        assert_eq!(slot0.tick, -100);
        assert_eq!(slot0.observation_index, 3);
        assert_eq!(slot0.observation_cardinality, 50);
        assert_eq!(slot0.observation_cardinality_next, 60);
        assert_eq!(slot0.fee_protocol, 0);
        assert!(slot0.unlocked);
    }

    #[test]
    fn price_state_carries_sqrt_price() {
        let slot0 = unpack_slot0_word(U256::from(1u64) << 96);
        let state = slot0.price_state(18, 18, 4);
        assert_eq!(state.sqrt_price_x96, U256::from(1u64) << 96);
        assert_eq!(state.output_decimals, 4);
    }
}
