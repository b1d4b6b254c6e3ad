//! Polls a chain source and turns differences into [`WalletEvent`]s.
//!
//! An HTTP endpoint cannot push `accountsChanged` / `chainChanged`, so the
//! watcher samples accounts and chain id on an interval and emits an event for
//! each value that moved since the previous sample. [`sync_session`] and
//! [`apply_event`] bring a [`Session`] back in line with the source.

use std::future::Future;
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use eyre::Result;
use tokio::time::MissedTickBehavior;

use crate::events::{EventHub, WalletEvent};
use crate::session::{Session, SessionEvent, SessionState};

/// Something that can report the wallet's exposed accounts and current chain.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>>;
    async fn chain_id(&self) -> Result<u64>;
}

/// Remembers the last observed accounts and chain id.
#[derive(Debug)]
pub struct ChainWatcher<S> {
    source: S,
    last_accounts: Option<Vec<Address>>,
    last_chain_id: Option<u64>,
}

impl<S: ChainSource> ChainWatcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            last_accounts: None,
            last_chain_id: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Sample the source once.
    ///
    /// The first successful sample only records a baseline. Later samples
    /// return one event per changed value, accounts before chain.
    ///
    /// # Errors
    /// Returns error if the source fails; the baseline is left untouched.
    pub async fn poll_once(&mut self) -> Result<Vec<WalletEvent>> {
        let accounts = self.source.accounts().await?;
        let chain_id = self.source.chain_id().await?;

        let mut events = Vec::new();
        if let Some(previous) = &self.last_accounts {
            if *previous != accounts {
                events.push(WalletEvent::AccountsChanged(accounts.clone()));
            }
        }
        if let Some(previous) = self.last_chain_id {
            if previous != chain_id {
                events.push(WalletEvent::ChainChanged(chain_id));
            }
        }

        self.last_accounts = Some(accounts);
        self.last_chain_id = Some(chain_id);
        Ok(events)
    }

    /// Poll every `interval` and emit changes on `hub` until `shutdown` resolves.
    ///
    /// Source errors are logged and polling continues.
    pub async fn run<F>(&mut self, hub: &EventHub, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(interval_ms = interval.as_millis() as u64, "chain watcher started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => match self.poll_once().await {
                    Ok(events) => {
                        for event in &events {
                            hub.emit(event);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "chain poll failed"),
                },
            }
        }
        tracing::info!("chain watcher stopped");
    }
}

async fn read_wallet<S: ChainSource + ?Sized>(source: &S) -> Result<(Vec<Address>, u64)> {
    let accounts = source.accounts().await?;
    let chain_id = source.chain_id().await?;
    Ok((accounts, chain_id))
}

/// Ask `source` for its accounts and chain id and feed the answer to `session`.
///
/// A failed read while connecting leaves the session disconnected; a failed
/// read while connected leaves it as it was.
pub async fn sync_session<'a, S: ChainSource + ?Sized>(
    session: &'a mut Session,
    source: &S,
) -> &'a SessionState {
    session.apply(SessionEvent::ConnectRequested);
    match read_wallet(source).await {
        Ok((accounts, chain_id)) => {
            session.apply(SessionEvent::Connected { accounts, chain_id });
        }
        Err(e) => {
            tracing::warn!(error = %e, "wallet connection failed");
            session.apply(SessionEvent::ConnectFailed);
        }
    }
    session.state()
}

/// Apply a provider event, reconnecting if the session is not connected.
///
/// Events are ignored while disconnected, so a wallet that exposes accounts
/// again is picked up by re-reading `source`. Returns the new state if it changed.
pub async fn apply_event<'a, S: ChainSource + ?Sized>(
    session: &'a mut Session,
    event: WalletEvent,
    source: &S,
) -> Option<&'a SessionState> {
    let before = session.state().clone();
    session.apply(event);
    if !session.state().is_connected() {
        sync_session(session, source).await;
    }
    if *session.state() == before {
        None
    } else {
        Some(session.state())
    }
}
