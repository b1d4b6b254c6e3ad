//! Minimal JSON-RPC plumbing shared by the raw `eth_call` / `eth_getStorageAt` readers.

use std::time::Duration;

use alloy::rpc::types::eth::{BlockId, BlockNumberOrTag};
use eyre::{eyre, Context, Result};
use reqwest::Client;
use serde::Deserialize;

/// Block at which a read is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    /// Most recent block known to the node.
    #[default]
    Latest,
    /// A specific historical block (needs an archive node for old blocks).
    Number(u64),
}

impl BlockTag {
    /// JSON-RPC block parameter (`"latest"` or a `0x`-prefixed quantity).
    pub fn to_param(self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Number(number) => format!("0x{number:x}"),
        }
    }

    /// The same block as an Alloy [`BlockId`], for contract-binding calls.
    pub fn block_id(self) -> BlockId {
        match self {
            Self::Latest => BlockId::Number(BlockNumberOrTag::Latest),
            Self::Number(number) => BlockId::Number(BlockNumberOrTag::Number(number)),
        }
    }
}

impl From<Option<u64>> for BlockTag {
    fn from(block: Option<u64>) -> Self {
        block.map_or(Self::Latest, Self::Number)
    }
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// HTTP client with a request timeout suitable for public RPC endpoints.
pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .wrap_err("failed to build HTTP client")
}

/// Make a JSON-RPC call and extract the hex result string.
pub(crate) async fn rpc_hex_result(
    client: &Client,
    rpc_url: &str,
    method: &str,
    params: serde_json::Value,
) -> Result<String> {
    let payload = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    let response = client
        .post(rpc_url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| eyre!("{} request failed: {}", method, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(eyre!("{} HTTP status: {}", method, status));
    }

    let rpc: RpcResponse<String> = response
        .json()
        .await
        .map_err(|e| eyre!("failed to decode {} response: {}", method, e))?;

    if let Some(error) = rpc.error {
        return Err(eyre!(
            "{} RPC error {}: {}",
            method,
            error.code,
            error.message
        ));
    }

    rpc.result.ok_or_else(|| eyre!("{} missing result", method))
}
