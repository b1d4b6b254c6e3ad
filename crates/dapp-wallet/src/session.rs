//! Wallet session state machine.
//!
//! The connection lifecycle is an explicit enum with a pure transition
//! function, [`SessionState::next`]. [`Session`] only stores the current state
//! and logs transitions; it never performs I/O.
//!
//! ```text
//!  Disconnected ──ConnectRequested──▶ Connecting ──Connected──▶ Ready | WrongNetwork
//!       ▲                               │                              │
//!       └──────────ConnectFailed────────┘             WrongNetwork ──SwitchRequested──▶ SwitchingNetwork
//!                                                                 ◀──SwitchFailed──────
//!                                               any connected ──ChainChanged──▶ Ready | WrongNetwork
//! ```

use alloy::primitives::Address;

use crate::chain::Chain;
use crate::events::WalletEvent;

/// Where the wallet connection currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Account access has been requested and not yet answered.
    Connecting,
    /// Connected, but to a chain other than the session's target.
    WrongNetwork { account: Address, chain_id: u64 },
    /// Connected to the target chain.
    Ready { account: Address, chain_id: u64 },
    /// A chain switch has been requested and not yet answered.
    SwitchingNetwork { account: Address, from_chain_id: u64 },
}

/// Inputs to the state machine: user intents and provider notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConnectRequested,
    /// Result of an account/chain query after connecting.
    Connected { accounts: Vec<Address>, chain_id: u64 },
    ConnectFailed,
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    SwitchRequested,
    SwitchFailed,
    Disconnect,
}

impl From<WalletEvent> for SessionEvent {
    fn from(event: WalletEvent) -> Self {
        match event {
            WalletEvent::AccountsChanged(accounts) => Self::AccountsChanged(accounts),
            WalletEvent::ChainChanged(chain_id) => Self::ChainChanged(chain_id),
        }
    }
}

fn connected(account: Address, chain_id: u64, target_chain_id: u64) -> SessionState {
    if chain_id == target_chain_id {
        SessionState::Ready { account, chain_id }
    } else {
        SessionState::WrongNetwork { account, chain_id }
    }
}

impl SessionState {
    /// Pure transition: the state after `event`, given the chain the session targets.
    ///
    /// Events that make no sense in the current state leave it unchanged.
    pub fn next(&self, target_chain_id: u64, event: &SessionEvent) -> SessionState {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (_, E::Disconnect) => S::Disconnected,

            (_, E::Connected { accounts, chain_id }) => match accounts.first() {
                Some(&account) => connected(account, *chain_id, target_chain_id),
                None => S::Disconnected,
            },

            (S::Disconnected, E::ConnectRequested) => S::Connecting,
            (S::Connecting, E::ConnectFailed) => S::Disconnected,

            (S::Ready { chain_id, .. }, E::AccountsChanged(accounts)) => match accounts.first() {
                Some(&account) => S::Ready {
                    account,
                    chain_id: *chain_id,
                },
                None => S::Disconnected,
            },
            (S::WrongNetwork { chain_id, .. }, E::AccountsChanged(accounts)) => {
                match accounts.first() {
                    Some(&account) => S::WrongNetwork {
                        account,
                        chain_id: *chain_id,
                    },
                    None => S::Disconnected,
                }
            }
            (S::SwitchingNetwork { from_chain_id, .. }, E::AccountsChanged(accounts)) => {
                match accounts.first() {
                    Some(&account) => S::SwitchingNetwork {
                        account,
                        from_chain_id: *from_chain_id,
                    },
                    None => S::Disconnected,
                }
            }

            (
                S::Ready { account, .. }
                | S::WrongNetwork { account, .. }
                | S::SwitchingNetwork { account, .. },
                E::ChainChanged(chain_id),
            ) => connected(*account, *chain_id, target_chain_id),

            (S::WrongNetwork { account, chain_id }, E::SwitchRequested) => S::SwitchingNetwork {
                account: *account,
                from_chain_id: *chain_id,
            },

            (
                S::SwitchingNetwork {
                    account,
                    from_chain_id,
                },
                E::SwitchFailed,
            ) => S::WrongNetwork {
                account: *account,
                chain_id: *from_chain_id,
            },

            (state, _) => state.clone(),
        }
    }

    pub fn account(&self) -> Option<Address> {
        match self {
            Self::Ready { account, .. }
            | Self::WrongNetwork { account, .. }
            | Self::SwitchingNetwork { account, .. } => Some(*account),
            Self::Disconnected | Self::Connecting => None,
        }
    }

    /// Chain the wallet is on, when known.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Self::Ready { chain_id, .. } | Self::WrongNetwork { chain_id, .. } => Some(*chain_id),
            Self::SwitchingNetwork { from_chain_id, .. } => Some(*from_chain_id),
            Self::Disconnected | Self::Connecting => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.account().is_some()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::WrongNetwork { .. } => "wrong-network",
            Self::Ready { .. } => "ready",
            Self::SwitchingNetwork { .. } => "switching-network",
        }
    }
}

/// Current session plus the chain it should be on.
#[derive(Debug, Clone)]
pub struct Session {
    target: Chain,
    state: SessionState,
}

impl Session {
    pub fn new(target: Chain) -> Self {
        Self {
            target,
            state: SessionState::Disconnected,
        }
    }

    pub fn target(&self) -> Chain {
        self.target
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Feed one event through the state machine.
    ///
    /// Returns the new state if it changed, `None` if the event was ignored.
    pub fn apply(&mut self, event: impl Into<SessionEvent>) -> Option<&SessionState> {
        let event = event.into();
        let next = self.state.next(self.target.id(), &event);
        if next == self.state {
            tracing::debug!(?event, state = self.state.label(), "session event ignored");
            return None;
        }

        tracing::info!(
            from = self.state.label(),
            to = next.label(),
            account = ?next.account(),
            chain_id = ?next.chain_id(),
            "session transition"
        );
        self.state = next;
        Some(&self.state)
    }
}
