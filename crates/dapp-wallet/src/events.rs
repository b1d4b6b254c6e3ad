//! Wallet provider notifications as a scoped subscription interface.
//!
//! A handler is registered for one [`EventKind`] and stays registered for as
//! long as the returned [`Subscription`] lives. Dropping the subscription
//! unregisters the handler.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use alloy::primitives::Address;
use dashmap::DashMap;

/// A notification from the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The set of exposed accounts changed. Empty means the wallet disconnected.
    AccountsChanged(Vec<Address>),
    /// The wallet moved to another chain.
    ChainChanged(u64),
}

impl WalletEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AccountsChanged(_) => EventKind::AccountsChanged,
            Self::ChainChanged(_) => EventKind::ChainChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AccountsChanged,
    ChainChanged,
}

type Handler = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

struct Registration {
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: DashMap<u64, Registration>,
}

/// Fan-out point for [`WalletEvent`]s. Cheap to clone; clones share handlers.
#[derive(Clone, Default)]
pub struct EventHub {
    registry: Arc<Registry>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("handlers", &self.registry.handlers.len())
            .finish()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    ///
    /// The handler is removed when the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription immediately unregisters the handler"]
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.handlers.insert(
            id,
            Registration {
                kind,
                handler: Arc::new(handler),
            },
        );
        tracing::debug!(id, ?kind, "wallet event handler registered");

        Subscription {
            id,
            kind,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every handler registered for its kind, in registration order.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &WalletEvent) -> usize {
        let kind = event.kind();
        // Snapshot first: handlers may subscribe or unsubscribe while running.
        let mut handlers: Vec<(u64, Handler)> = self
            .registry
            .handlers
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| (*entry.key(), Arc::clone(&entry.handler)))
            .collect();
        handlers.sort_by_key(|(id, _)| *id);

        for (_, handler) in &handlers {
            handler(event);
        }

        tracing::debug!(?kind, delivered = handlers.len(), "wallet event emitted");
        handlers.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry
            .handlers
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }
}

/// Registration handle returned by [`EventHub::subscribe`].
pub struct Subscription {
    id: u64,
    kind: EventKind,
    registry: Weak<Registry>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Unregister now rather than at end of scope.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.handlers.remove(&self.id).is_some() {
                tracing::debug!(id = self.id, kind = ?self.kind, "wallet event handler removed");
            }
        }
    }
}
