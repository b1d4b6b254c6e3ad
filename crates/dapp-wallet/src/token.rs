//! Testnet token with a public `mint`.

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::Provider;
use alloy::sol;
use eyre::{bail, eyre, Context, Result};

sol! {
    #[sol(rpc)]
    interface IMintableToken {
        function mint(address to, uint256 amount) external;
        function balanceOf(address account) external view returns (uint256 balance);
        function decimals() external view returns (uint8 decimals);
    }
}

/// Decimals assumed when the token does not implement `decimals()`.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Whole-token balance above which an account counts as "fake rich".
pub const FAKE_RICH_THRESHOLD_TOKENS: u64 = 1_000_000;

/// Mined transaction summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Handle to a deployed mintable ERC-20.
#[derive(Debug, Clone)]
pub struct MintableToken<P> {
    address: Address,
    provider: P,
}

impl<P: Provider + Clone> MintableToken<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self { address, provider }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, account: Address) -> Result<U256> {
        let contract = IMintableToken::new(self.address, self.provider.clone());
        let balance = contract
            .balanceOf(account)
            .call()
            .await
            .wrap_err_with(|| format!("balanceOf({account}) failed on {}", self.address))?;
        Ok(balance.balance)
    }

    pub async fn decimals(&self) -> Result<u8> {
        let contract = IMintableToken::new(self.address, self.provider.clone());
        let decimals = contract
            .decimals()
            .call()
            .await
            .wrap_err_with(|| format!("decimals() failed on {}", self.address))?;
        Ok(decimals.decimals)
    }

    /// On-chain decimals, or [`DEFAULT_TOKEN_DECIMALS`] if the call fails.
    pub async fn decimals_or_default(&self) -> u8 {
        match self.decimals().await {
            Ok(decimals) => decimals,
            Err(e) => {
                tracing::debug!(error = %e, token = %self.address, "falling back to default decimals");
                DEFAULT_TOKEN_DECIMALS
            }
        }
    }

    /// Send `mint(to, amount)` and wait for the receipt.
    ///
    /// `amount` is in base units. The provider must carry a wallet.
    ///
    /// # Errors
    /// Returns error if sending fails, the receipt cannot be fetched, or the
    /// transaction reverted.
    #[tracing::instrument(skip(self), fields(token = %self.address))]
    pub async fn mint(&self, to: Address, amount: U256) -> Result<TxHandle> {
        let contract = IMintableToken::new(self.address, self.provider.clone());
        let pending = contract
            .mint(to, amount)
            .send()
            .await
            .wrap_err("failed to send mint transaction")?;
        let hash = *pending.tx_hash();
        tracing::info!(tx = %hash, "mint submitted, waiting for receipt");

        let receipt = pending
            .get_receipt()
            .await
            .wrap_err_with(|| format!("failed to fetch receipt for {hash}"))?;

        let handle = TxHandle {
            hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            success: receipt.status(),
        };
        if !handle.success {
            bail!("mint transaction {hash} reverted");
        }

        tracing::info!(
            tx = %hash,
            block = ?handle.block_number,
            gas_used = handle.gas_used,
            "mint confirmed"
        );
        Ok(handle)
    }
}

/// Parse a human amount like `"100"` or `"2.5"` into base units.
///
/// # Errors
/// Returns error for negative values, malformed numbers, or more fractional
/// digits than `decimals`.
pub fn parse_token_amount(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        bail!("token amount must not be negative: {trimmed}");
    }
    let parsed = parse_units(trimmed, decimals)
        .map_err(|e| eyre!("invalid token amount {trimmed:?}: {e}"))?;
    Ok(parsed.get_absolute())
}

/// Render base units as a decimal string without trailing fractional zeros.
///
/// # Errors
/// Returns error if `decimals` is not a valid unit.
pub fn format_token_amount(amount: U256, decimals: u8) -> Result<String> {
    let formatted =
        format_units(amount, decimals).map_err(|e| eyre!("cannot format amount: {e}"))?;
    if !formatted.contains('.') {
        return Ok(formatted);
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    Ok(trimmed.to_string())
}

/// Whether `balance` (base units) is above [`FAKE_RICH_THRESHOLD_TOKENS`].
pub fn is_fake_rich(balance: U256, decimals: u8) -> bool {
    let threshold = U256::from(FAKE_RICH_THRESHOLD_TOKENS)
        .saturating_mul(U256::from(10u64).saturating_pow(U256::from(decimals)));
    balance > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_token_amount("100", 18).expect("valid"), tokens(100));
        assert_eq!(
            parse_token_amount("2.5", 6).expect("valid"),
            U256::from(2_500_000u64)
        );
        assert_eq!(parse_token_amount(" 0 ", 18).expect("valid"), U256::ZERO);
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(parse_token_amount("-1", 18).is_err());
        assert!(parse_token_amount("ten", 18).is_err());
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_token_amount(tokens(100), 18).expect("valid"), "100");
        assert_eq!(
            format_token_amount(U256::from(2_500_000u64), 6).expect("valid"),
            "2.5"
        );
        assert_eq!(format_token_amount(U256::from(42u64), 0).expect("valid"), "42");
    }

    #[test]
    fn fake_rich_is_strictly_above_threshold() {
        assert!(!is_fake_rich(tokens(FAKE_RICH_THRESHOLD_TOKENS), 18));
        assert!(is_fake_rich(tokens(FAKE_RICH_THRESHOLD_TOKENS) + U256::from(1u64), 18));
        assert!(!is_fake_rich(tokens(100), 18));
    }

    #[test]
    fn fake_rich_respects_decimals() {
        assert!(is_fake_rich(U256::from(2_000_000_000_000u64), 6));
        assert!(!is_fake_rich(U256::from(2_000_000_000_000u64), 18));
    }
}
