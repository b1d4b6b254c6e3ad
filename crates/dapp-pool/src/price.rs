//! Integer-only price conversion from Uniswap V3 `sqrtPriceX96`.
//!
//! ## Math
//!
//! `sqrtPriceX96` encodes $\sqrt{P} \times 2^{96}$ where $P = \frac{token1}{token0}$
//! in raw units. The conversion runs in four integer steps:
//!
//! ```text
//! price_x96 = sqrtPriceX96² × 10^18 / 2^192
//! ratio     = 10^token1_decimals / 10^token0_decimals
//! adjusted  = price_x96 / ratio
//! result    = 10^(18 + output_decimals) / adjusted
//! ```
//!
//! `result`, read with an implied decimal point `output_decimals` digits from
//! the right, is the amount of **token0 per one token1**. For the USDC/WETH
//! pool (token0 = USDC, token1 = WETH) that is "USDC per WETH".
//!
//! ## Overflow Handling
//!
//! `sqrtPriceX96` is `uint160`, so `sqrtPriceX96² × 10^18` needs up to ~380
//! bits. Every intermediate is computed in a 512-bit [`Uint`], so no input
//! bits are shifted away before squaring. The final result is at most
//! `10^54` and always fits back into `U256`.
//!
//! ## Failure Modes
//!
//! Every division that can truncate to zero is checked. A zero at any stage is
//! reported as [`PriceError::PrecisionLoss`] instead of producing a misleading
//! `0` or dividing by zero.

use std::fmt;

use alloy::primitives::{Uint, U256};
use thiserror::Error;

type U512 = Uint<512, 8>;

/// Fractional digits in the produced price when the caller has no preference.
pub const DEFAULT_OUTPUT_DECIMALS: u8 = 4;

/// Largest accepted decimal count for any of the three decimal inputs.
pub const MAX_DECIMALS: u8 = 36;

/// `sqrtPriceX96` is a `uint160` on-chain.
const SQRT_PRICE_MAX_BITS: usize = 160;

/// Decimal fixed-point scale applied to the squared ratio.
const WAD_DECIMALS: u8 = 18;

/// Which decimal input was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalField {
    Token0,
    Token1,
    Output,
}

impl fmt::Display for DecimalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token0 => f.write_str("token0"),
            Self::Token1 => f.write_str("token1"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Input outside its documented domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidInput {
    /// An initialized pool never reports a zero square-root price.
    #[error("sqrtPriceX96 is zero (uninitialized or malformed pool state)")]
    ZeroSqrtPrice,
    #[error("sqrtPriceX96 is {bits} bits wide, expected at most 160")]
    SqrtPriceTooWide { bits: usize },
    #[error("{field} decimals {value} outside [0, 36]")]
    DecimalsOutOfRange { field: DecimalField, value: u8 },
}

/// The conversion step whose integer division truncated to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionStage {
    /// `10^token1_decimals / 10^token0_decimals` is zero (token1 has fewer decimals).
    DecimalRatio,
    /// `price_x96 / ratio` is zero (price too small for 18-decimal fixed point).
    AdjustedPrice,
    /// The final quotient is zero (price below the requested output precision).
    Result,
}

impl fmt::Display for PrecisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DecimalRatio => {
                f.write_str("10^token1_decimals / 10^token0_decimals truncates to zero")
            }
            Self::AdjustedPrice => f.write_str("decimal-adjusted price truncates to zero"),
            Self::Result => f.write_str("price is below the requested output precision"),
        }
    }
}

/// Error returned by [`compute_price`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("invalid pool price input: {0}")]
    InvalidInput(#[from] InvalidInput),
    #[error("precision loss: {0}")]
    PrecisionLoss(PrecisionStage),
}

/// Coarse error category, for callers that only care which class of failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceErrorKind {
    InvalidInput,
    PrecisionLoss,
}

impl PriceError {
    pub fn kind(&self) -> PriceErrorKind {
        match self {
            Self::InvalidInput(_) => PriceErrorKind::InvalidInput,
            Self::PrecisionLoss(_) => PriceErrorKind::PrecisionLoss,
        }
    }
}

/// Raw pool price state, as read from `slot0()` and the two token contracts.
///
/// Built fresh for every query; converting it never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolPriceState {
    /// Current √P in Q64.96 fixed-point format (uint160 on-chain).
    pub sqrt_price_x96: U256,
    /// Decimals of the pool's token0.
    pub token0_decimals: u8,
    /// Decimals of the pool's token1.
    pub token1_decimals: u8,
    /// Fractional digits in the produced price.
    pub output_decimals: u8,
}

impl PoolPriceState {
    pub fn new(
        sqrt_price_x96: U256,
        token0_decimals: u8,
        token1_decimals: u8,
        output_decimals: u8,
    ) -> Self {
        Self {
            sqrt_price_x96,
            token0_decimals,
            token1_decimals,
            output_decimals,
        }
    }

    /// Convert this state to a [`DecimalPrice`] (token0 per token1).
    ///
    /// # Errors
    /// See [`compute_price`].
    pub fn compute(&self) -> Result<DecimalPrice, PriceError> {
        let numerator = compute_price(
            self.sqrt_price_x96,
            self.token0_decimals,
            self.token1_decimals,
            self.output_decimals,
        )?;
        Ok(DecimalPrice {
            numerator,
            decimals: self.output_decimals,
        })
    }
}

/// A decimal number stored as an integer numerator with an implied decimal point.
///
/// `Display` inserts the point `decimals` digits from the right, so
/// `numerator = 27_651_646, decimals = 4` renders as `2765.1646`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalPrice {
    /// Price scaled by `10^decimals`.
    pub numerator: U256,
    /// Number of fractional digits in `numerator`.
    pub decimals: u8,
}

impl DecimalPrice {
    /// Whole-unit part of the price (truncated).
    ///
    /// # Errors
    /// Returns [`PriceError::InvalidInput`] if `decimals` exceeds [`MAX_DECIMALS`].
    pub fn integer_part(&self) -> Result<U256, PriceError> {
        check_output_decimals(self.decimals)?;
        narrow(widen(self.numerator) / pow10(self.decimals), self.decimals)
    }

    /// Invert the price at the same precision: `10^(2 × decimals) / numerator`.
    ///
    /// Turns "token0 per token1" into "token1 per token0".
    ///
    /// # Errors
    /// - [`PriceError::InvalidInput`] if `decimals` exceeds [`MAX_DECIMALS`].
    /// - [`PriceError::PrecisionLoss`] if the numerator is zero or the
    ///   inverse is smaller than one unit of the last decimal place.
    pub fn inverse(&self) -> Result<Self, PriceError> {
        check_output_decimals(self.decimals)?;
        if self.numerator.is_zero() {
            return Err(PriceError::PrecisionLoss(PrecisionStage::Result));
        }
        let inverted = pow10(self.decimals * 2) / widen(self.numerator);
        if inverted.is_zero() {
            return Err(PriceError::PrecisionLoss(PrecisionStage::Result));
        }
        Ok(Self {
            numerator: narrow(inverted, self.decimals)?,
            decimals: self.decimals,
        })
    }
}

impl fmt::Display for DecimalPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.numerator.to_string();
        let decimals = self.decimals as usize;
        if decimals == 0 {
            return f.write_str(&digits);
        }
        if digits.len() <= decimals {
            write!(f, "0.{digits:0>decimals$}")
        } else {
            let (int_part, frac_part) = digits.split_at(digits.len() - decimals);
            write!(f, "{int_part}.{frac_part}")
        }
    }
}

/// Convert `sqrtPriceX96` to a decimal price numerator (token0 per token1).
///
/// ## Parameters
///
/// - `sqrt_price_x96`: The raw Q64.96 value from slot0. Must be non-zero and fit in 160 bits.
/// - `token0_decimals`: Number of decimals for token0 (e.g., 6 for USDC).
/// - `token1_decimals`: Number of decimals for token1 (e.g., 18 for WETH).
/// - `output_decimals`: Fractional digits in the returned numerator.
///
/// # Errors
/// - [`PriceError::InvalidInput`] for a zero or over-wide square-root price,
///   or a decimal count above [`MAX_DECIMALS`].
/// - [`PriceError::PrecisionLoss`] when an intermediate division truncates to
///   zero, including `token1_decimals < token0_decimals`.
pub fn compute_price(
    sqrt_price_x96: U256,
    token0_decimals: u8,
    token1_decimals: u8,
    output_decimals: u8,
) -> Result<U256, PriceError> {
    validate(
        sqrt_price_x96,
        token0_decimals,
        token1_decimals,
        output_decimals,
    )?;

    let sqrt = widen(sqrt_price_x96);
    let price_x96 = (sqrt * sqrt * pow10(WAD_DECIMALS)) >> 192usize;

    let ratio = pow10(token1_decimals) / pow10(token0_decimals);
    if ratio.is_zero() {
        return Err(PriceError::PrecisionLoss(PrecisionStage::DecimalRatio));
    }

    let adjusted = price_x96 / ratio;
    if adjusted.is_zero() {
        return Err(PriceError::PrecisionLoss(PrecisionStage::AdjustedPrice));
    }

    let result = pow10(WAD_DECIMALS + output_decimals) / adjusted;
    if result.is_zero() {
        return Err(PriceError::PrecisionLoss(PrecisionStage::Result));
    }

    narrow(result, output_decimals)
}

fn validate(
    sqrt_price_x96: U256,
    token0_decimals: u8,
    token1_decimals: u8,
    output_decimals: u8,
) -> Result<(), InvalidInput> {
    if sqrt_price_x96.is_zero() {
        return Err(InvalidInput::ZeroSqrtPrice);
    }
    let bits = sqrt_price_x96.bit_len();
    if bits > SQRT_PRICE_MAX_BITS {
        return Err(InvalidInput::SqrtPriceTooWide { bits });
    }
    for (field, value) in [
        (DecimalField::Token0, token0_decimals),
        (DecimalField::Token1, token1_decimals),
        (DecimalField::Output, output_decimals),
    ] {
        if value > MAX_DECIMALS {
            return Err(InvalidInput::DecimalsOutOfRange { field, value });
        }
    }
    Ok(())
}

fn pow10(exp: u8) -> U512 {
    U512::from(10u64).pow(U512::from(exp))
}

fn widen(value: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(value.as_limbs());
    U512::from_limbs(limbs)
}

fn check_output_decimals(decimals: u8) -> Result<(), InvalidInput> {
    if decimals > MAX_DECIMALS {
        return Err(InvalidInput::DecimalsOutOfRange {
            field: DecimalField::Output,
            value: decimals,
        });
    }
    Ok(())
}

/// Only a result scaled by an out-of-range output precision can exceed 256 bits.
fn narrow(value: U512, output_decimals: u8) -> Result<U256, PriceError> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|&limb| limb != 0) {
        return Err(PriceError::InvalidInput(InvalidInput::DecimalsOutOfRange {
            field: DecimalField::Output,
            value: output_decimals,
        }));
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Uniswap V3 `TickMath.MAX_SQRT_RATIO`.
    const MAX_SQRT_RATIO: &str = "1461446703485210103287273052203988822378723970342";

    fn q96() -> U256 {
        U256::from(1u64) << 96
    }

    #[test]
    fn unit_price_with_equal_decimals() {
        // sqrtPriceX96 = 2^96 → P = 1.0 → 1.0000 with 4 output decimals
        let result = compute_price(q96(), 18, 18, 4).expect("valid input");
        assert_eq!(result, U256::from(10_000u64));
    }

    #[test]
    fn known_usdc_weth_value() {
        // sqrtPriceX96 from the RareSkills USDC/WETH example; reference ≈ 2765.16
        let sqrt_price =
            U256::from_str_radix("1506673274302120988651364689808458", 10).expect("valid U256");

        let result = compute_price(sqrt_price, 6, 18, 4).expect("valid input");
        assert_eq!(result, U256::from(27_651_646u64));

        let precise = compute_price(sqrt_price, 6, 18, 8).expect("valid input");
        assert_eq!(precise, U256::from(276_516_466_160u64));
    }

    #[test]
    fn equal_decimals_divide_by_one() {
        // price_x96 = (2·2^96)² · 10^18 / 2^192 = 4·10^18
        let sqrt_price = q96() * U256::from(2u64);
        let result = compute_price(sqrt_price, 18, 18, 4).expect("valid input");
        let expected = U256::from(10u64).pow(U256::from(22u64)) / U256::from(4_000_000_000_000_000_000u128);
        assert_eq!(result, expected);
        assert_eq!(result, U256::from(2_500u64));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let sqrt_price = U256::from(3_543_191_142_285_914_205_922_034_323_214u128);
        let first = compute_price(sqrt_price, 6, 18, 4);
        let second = compute_price(sqrt_price, 6, 18, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn zero_sqrt_price_is_invalid_input() {
        let err = compute_price(U256::ZERO, 6, 18, 4).expect_err("zero must be rejected");
        assert_eq!(err, PriceError::InvalidInput(InvalidInput::ZeroSqrtPrice));
        assert_eq!(err.kind(), PriceErrorKind::InvalidInput);
    }

    #[test]
    fn sqrt_price_wider_than_160_bits_is_invalid_input() {
        let err = compute_price(U256::from(1u64) << 160, 18, 18, 4).expect_err("too wide");
        assert_eq!(
            err,
            PriceError::InvalidInput(InvalidInput::SqrtPriceTooWide { bits: 161 })
        );
    }

    #[test]
    fn decimals_above_36_are_out_of_range() {
        let err = compute_price(q96(), 37, 18, 4).expect_err("token0 decimals too large");
        assert_eq!(
            err,
            PriceError::InvalidInput(InvalidInput::DecimalsOutOfRange {
                field: DecimalField::Token0,
                value: 37
            })
        );

        let err = compute_price(q96(), 18, 37, 4).expect_err("token1 decimals too large");
        assert_eq!(
            err,
            PriceError::InvalidInput(InvalidInput::DecimalsOutOfRange {
                field: DecimalField::Token1,
                value: 37
            })
        );

        let err = compute_price(q96(), 18, 18, 40).expect_err("output decimals too large");
        assert_eq!(err.kind(), PriceErrorKind::InvalidInput);
    }

    #[test]
    fn decimals_at_36_are_accepted() {
        let result = compute_price(q96(), 36, 36, 36).expect("boundary is inclusive");
        assert_eq!(result, U256::from(10u64).pow(U256::from(36u64)));
    }

    #[test]
    fn fewer_token1_decimals_is_precision_loss() {
        let err = compute_price(q96(), 18, 0, 4).expect_err("ratio truncates to zero");
        assert_eq!(err, PriceError::PrecisionLoss(PrecisionStage::DecimalRatio));
        assert_eq!(err.kind(), PriceErrorKind::PrecisionLoss);
    }

    #[test]
    fn tiny_sqrt_price_is_precision_loss() {
        // MIN_SQRT_RATIO squared is far below 2^192 / 10^18
        let err = compute_price(U256::from(4_295_128_739u64), 18, 18, 4)
            .expect_err("price_x96 truncates to zero");
        assert_eq!(err, PriceError::PrecisionLoss(PrecisionStage::AdjustedPrice));
    }

    #[test]
    fn max_sqrt_ratio_underflows_output_precision() {
        let sqrt_price = U256::from_str_radix(MAX_SQRT_RATIO, 10).expect("valid U256");
        let err = compute_price(sqrt_price, 18, 18, 4).expect_err("result truncates to zero");
        assert_eq!(err, PriceError::PrecisionLoss(PrecisionStage::Result));
    }

    #[test]
    fn widest_sqrt_price_does_not_overflow() {
        let sqrt_price = (U256::from(1u64) << 160) - U256::from(1u64);
        let result = compute_price(sqrt_price, 0, 36, 36).expect("fits in 512-bit intermediates");
        assert_eq!(
            result,
            U256::from_str_radix("2938735877055718769925076515978355", 10).expect("valid U256")
        );
    }

    #[test]
    fn pool_price_state_compute_carries_decimals() {
        let state = PoolPriceState::new(q96(), 18, 18, DEFAULT_OUTPUT_DECIMALS);
        let price = state.compute().expect("valid state");
        assert_eq!(price.decimals, DEFAULT_OUTPUT_DECIMALS);
        assert_eq!(price.to_string(), "1.0000");
        assert_eq!(price.integer_part(), Ok(U256::from(1u64)));
    }

    #[test]
    fn display_inserts_decimal_point() {
        let price = DecimalPrice {
            numerator: U256::from(27_651_646u64),
            decimals: 4,
        };
        assert_eq!(price.to_string(), "2765.1646");
    }

    #[test]
    fn display_pads_small_values() {
        let price = DecimalPrice {
            numerator: U256::from(5u64),
            decimals: 4,
        };
        assert_eq!(price.to_string(), "0.0005");

        let exact = DecimalPrice {
            numerator: U256::from(1_234u64),
            decimals: 4,
        };
        assert_eq!(exact.to_string(), "0.1234");
    }

    #[test]
    fn display_without_decimals_is_plain_integer() {
        let price = DecimalPrice {
            numerator: U256::from(42u64),
            decimals: 0,
        };
        assert_eq!(price.to_string(), "42");
    }

    #[test]
    fn inverse_flips_quote_direction() {
        // 0.2500 token0 per token1 → 4.0000 token1 per token0
        let price = DecimalPrice {
            numerator: U256::from(2_500u64),
            decimals: 4,
        };
        let inverse = price.inverse().expect("non-zero price");
        assert_eq!(inverse.numerator, U256::from(40_000u64));
        assert_eq!(inverse.to_string(), "4.0000");
    }

    #[test]
    fn inverse_of_large_price_loses_precision() {
        let price = DecimalPrice {
            numerator: U256::from(10u64).pow(U256::from(12u64)),
            decimals: 4,
        };
        let err = price.inverse().expect_err("inverse below 0.0001");
        assert_eq!(err, PriceError::PrecisionLoss(PrecisionStage::Result));
    }

    #[test]
    fn inverse_rejects_out_of_range_decimals() {
        let price = DecimalPrice {
            numerator: U256::from(1u64),
            decimals: 40,
        };
        assert_eq!(
            price.inverse(),
            Err(PriceError::InvalidInput(InvalidInput::DecimalsOutOfRange {
                field: DecimalField::Output,
                value: 40
            }))
        );
    }

    #[test]
    fn inverse_at_max_decimals_fits() {
        let price = DecimalPrice {
            numerator: U256::from(1u64),
            decimals: MAX_DECIMALS,
        };
        let inverse = price.inverse().expect("10^72 fits in 256 bits");
        assert_eq!(inverse.numerator, U256::from(10u64).pow(U256::from(72u64)));
    }

    #[test]
    fn integer_part_rejects_out_of_range_decimals() {
        let price = DecimalPrice {
            numerator: U256::from(1u64),
            decimals: 80,
        };
        assert_eq!(
            price.integer_part().map_err(|e| e.kind()),
            Err(PriceErrorKind::InvalidInput)
        );
    }

    #[test]
    fn narrow_rejects_values_wider_than_256_bits() {
        let wide = U512::from(1u64) << 256usize;
        assert_eq!(
            narrow(wide, 40),
            Err(PriceError::InvalidInput(InvalidInput::DecimalsOutOfRange {
                field: DecimalField::Output,
                value: 40
            }))
        );
        assert_eq!(narrow(widen(U256::MAX), 4), Ok(U256::MAX));
    }
}
