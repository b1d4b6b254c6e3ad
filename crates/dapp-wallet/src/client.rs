//! Read-only chain queries backing the wallet session.

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::rpc::types::eth::{BlockId, BlockNumberOrTag};
use async_trait::async_trait;
use eyre::{eyre, Context, Result};

use crate::chain::Chain;
use crate::watcher::ChainSource;

/// Latest block number and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    /// Unix seconds.
    pub timestamp: u64,
}

/// What the status view shows for the connected account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub account: Address,
    pub chain: Chain,
    pub block_number: u64,
    pub block_timestamp: u64,
    /// Native balance in wei.
    pub balance_wei: U256,
}

/// Wraps an Alloy provider, optionally pinned to a local signer's address.
///
/// With a signer the exposed account is the signer's; without one it is
/// whatever the node returns from `eth_accounts`.
#[derive(Debug, Clone)]
pub struct ChainClient<P> {
    provider: P,
    signer_address: Option<Address>,
}

impl<P: Provider> ChainClient<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            signer_address: None,
        }
    }

    pub fn with_signer_address(mut self, address: Address) -> Self {
        self.signer_address = Some(address);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Accounts the wallet exposes, first one being the active account.
    ///
    /// # Errors
    /// Returns error if `eth_accounts` fails.
    pub async fn accounts(&self) -> Result<Vec<Address>> {
        if let Some(address) = self.signer_address {
            return Ok(vec![address]);
        }
        self.provider
            .get_accounts()
            .await
            .wrap_err("eth_accounts failed")
    }

    pub async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .wrap_err("eth_chainId failed")
    }

    pub async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .wrap_err("eth_blockNumber failed")
    }

    /// Header fields of the latest block.
    ///
    /// # Errors
    /// Returns error if the call fails or the node has no latest block.
    pub async fn latest_block(&self) -> Result<BlockInfo> {
        let block = self
            .provider
            .get_block(BlockId::Number(BlockNumberOrTag::Latest))
            .await
            .wrap_err("failed to fetch latest block")?
            .ok_or_else(|| eyre!("node returned no latest block"))?;

        Ok(BlockInfo {
            number: block.header.number,
            timestamp: block.header.timestamp,
        })
    }

    pub async fn balance(&self, account: Address) -> Result<U256> {
        self.provider
            .get_balance(account)
            .await
            .wrap_err_with(|| format!("eth_getBalance failed for {account}"))
    }

    /// Active account, chain, latest block and native balance.
    ///
    /// # Errors
    /// Returns error if any read fails or no account is exposed.
    #[tracing::instrument(skip(self))]
    pub async fn account_summary(&self) -> Result<AccountSummary> {
        let (accounts, chain_id, block) =
            tokio::try_join!(self.accounts(), self.chain_id(), self.latest_block())?;
        let account = accounts
            .first()
            .copied()
            .ok_or_else(|| eyre!("wallet exposes no accounts"))?;
        let balance_wei = self.balance(account).await?;

        tracing::debug!(%account, chain_id, block = block.number, "account summary read");

        Ok(AccountSummary {
            account,
            chain: Chain::from_id(chain_id),
            block_number: block.number,
            block_timestamp: block.timestamp,
            balance_wei,
        })
    }
}

#[async_trait]
impl<P: Provider> ChainSource for ChainClient<P> {
    async fn accounts(&self) -> Result<Vec<Address>> {
        ChainClient::accounts(self).await
    }

    async fn chain_id(&self) -> Result<u64> {
        ChainClient::chain_id(self).await
    }
}
