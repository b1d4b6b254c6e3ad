//! dapp-wallet: networks, wallet session state, provider events and the testnet token.

pub mod chain;
pub mod client;
pub mod events;
pub mod session;
pub mod token;
pub mod watcher;

pub use chain::{Chain, ChainParseError};
pub use client::{AccountSummary, BlockInfo, ChainClient};
pub use events::{EventHub, EventKind, Subscription, WalletEvent};
pub use session::{Session, SessionEvent, SessionState};
pub use token::{
    format_token_amount, is_fake_rich, parse_token_amount, MintableToken, TxHandle,
    DEFAULT_TOKEN_DECIMALS, FAKE_RICH_THRESHOLD_TOKENS,
};
pub use watcher::{apply_event, sync_session, ChainSource, ChainWatcher};
