//! Pending `get_token` consumers.
//!
//! Each waiter is registered under its own id and resolved exactly once, by
//! the controller, when the session commits a status that settles waiters.
//! Waiters are never coalesced.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::AuthError;

/// What a waiter resolves to: a token, no session (`None`), or an error.
pub type TokenOutcome = Result<Option<String>, AuthError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaiterId(u64);

impl core::fmt::Display for WaiterId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "waiter-{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct WaiterRegistry {
    next_id: u64,
    pending: BTreeMap<WaiterId, oneshot::Sender<TokenOutcome>>,
}

pub(crate) type SharedRegistry = Arc<Mutex<WaiterRegistry>>;

impl WaiterRegistry {
    pub(crate) fn register(&mut self) -> (WaiterId, oneshot::Receiver<TokenOutcome>) {
        self.next_id += 1;
        let id = WaiterId(self.next_id);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        (id, rx)
    }

    /// Drop a waiter; its future then resolves to `WaitCancelled`.
    pub(crate) fn cancel(&mut self, id: WaiterId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Resolve every pending waiter, oldest first. Returns how many were
    /// still listening.
    pub(crate) fn resolve_all(&mut self, outcome: &TokenOutcome) -> usize {
        std::mem::take(&mut self.pending)
            .into_values()
            .filter_map(|tx| tx.send(outcome.clone()).ok())
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

fn lock(registry: &Mutex<WaiterRegistry>) -> std::sync::MutexGuard<'_, WaiterRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancellation handle for one pending waiter. Cloneable; cancelling twice
/// is a no-op.
#[derive(Debug, Clone)]
pub struct WaiterCancel {
    id: WaiterId,
    registry: Weak<Mutex<WaiterRegistry>>,
}

impl WaiterCancel {
    pub fn id(&self) -> WaiterId {
        self.id
    }

    /// Returns `true` if the waiter was still pending.
    pub fn cancel(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => lock(&registry).cancel(self.id),
            None => false,
        }
    }
}

#[derive(Debug)]
enum WaiterState {
    Ready(TokenOutcome),
    Pending {
        rx: oneshot::Receiver<TokenOutcome>,
        cancel: WaiterCancel,
    },
    Done,
}

/// Future returned by `get_token`.
///
/// Dropping it before it completes deregisters the waiter.
#[derive(Debug)]
#[must_use = "a token waiter does nothing unless awaited"]
pub struct TokenWaiter {
    state: WaiterState,
}

impl TokenWaiter {
    pub(crate) fn ready(outcome: TokenOutcome) -> Self {
        Self {
            state: WaiterState::Ready(outcome),
        }
    }

    pub(crate) fn register(registry: &SharedRegistry) -> Self {
        let (id, rx) = lock(registry).register();
        Self {
            state: WaiterState::Pending {
                rx,
                cancel: WaiterCancel {
                    id,
                    registry: Arc::downgrade(registry),
                },
            },
        }
    }

    /// `true` when the outcome was known at call time.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, WaiterState::Ready(_))
    }

    /// Cancellation handle, `None` when the waiter never had to register.
    pub fn cancel_handle(&self) -> Option<WaiterCancel> {
        match &self.state {
            WaiterState::Pending { cancel, .. } => Some(cancel.clone()),
            _ => None,
        }
    }

    /// Stop waiting.
    pub fn cancel(mut self) {
        if let WaiterState::Pending { cancel, .. } = std::mem::replace(&mut self.state, WaiterState::Done) {
            cancel.cancel();
        }
    }
}

impl Future for TokenWaiter {
    type Output = TokenOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match &mut this.state {
            WaiterState::Ready(_) => match std::mem::replace(&mut this.state, WaiterState::Done) {
                WaiterState::Ready(outcome) => Poll::Ready(outcome),
                _ => Poll::Ready(Err(AuthError::WaitCancelled)),
            },
            WaiterState::Pending { rx, .. } => match Pin::new(rx).poll(cx) {
                Poll::Ready(received) => {
                    this.state = WaiterState::Done;
                    Poll::Ready(received.unwrap_or(Err(AuthError::WaitCancelled)))
                }
                Poll::Pending => Poll::Pending,
            },
            WaiterState::Done => Poll::Ready(Err(AuthError::WaitCancelled)),
        }
    }
}

impl Drop for TokenWaiter {
    fn drop(&mut self) {
        if let WaiterState::Pending { cancel, .. } = &self.state {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SharedRegistry {
        Arc::new(Mutex::new(WaiterRegistry::default()))
    }

    #[tokio::test]
    async fn every_waiter_gets_the_outcome() {
        let registry = registry();
        let first = TokenWaiter::register(&registry);
        let second = TokenWaiter::register(&registry);
        assert_eq!(lock(&registry).len(), 2);

        let delivered = lock(&registry).resolve_all(&Ok(Some("at".to_string())));

        assert_eq!(delivered, 2);
        assert_eq!(first.await, Ok(Some("at".to_string())));
        assert_eq!(second.await, Ok(Some("at".to_string())));
        assert_eq!(lock(&registry).len(), 0);
    }

    #[tokio::test]
    async fn resolve_all_counts_only_listening_waiters() {
        let registry = registry();
        let listening = TokenWaiter::register(&registry);
        let (_, gone) = lock(&registry).register();
        drop(gone);

        let delivered = lock(&registry).resolve_all(&Ok(None));

        assert_eq!(delivered, 1);
        assert_eq!(lock(&registry).len(), 0);
        assert_eq!(listening.await, Ok(None));
    }

    #[tokio::test]
    async fn waiter_is_resolved_only_once() {
        let registry = registry();
        let waiter = TokenWaiter::register(&registry);

        lock(&registry).resolve_all(&Ok(None));
        let again = lock(&registry).resolve_all(&Err(AuthError::Disposed));

        assert_eq!(again, 0);
        assert_eq!(waiter.await, Ok(None));
    }

    #[tokio::test]
    async fn cancelled_waiter_resolves_to_wait_cancelled() {
        let registry = registry();
        let waiter = TokenWaiter::register(&registry);
        let handle = waiter.cancel_handle().unwrap();

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert_eq!(lock(&registry).len(), 0);
        assert_eq!(waiter.await, Err(AuthError::WaitCancelled));
    }

    #[test]
    fn dropping_a_waiter_deregisters_it() {
        let registry = registry();
        let waiter = TokenWaiter::register(&registry);
        let other = TokenWaiter::register(&registry);

        drop(waiter);
        assert_eq!(lock(&registry).len(), 1);

        other.cancel();
        assert_eq!(lock(&registry).len(), 0);
    }

    #[tokio::test]
    async fn ready_waiter_needs_no_registration() {
        let waiter = TokenWaiter::ready(Ok(Some("at".to_string())));
        assert!(waiter.is_ready());
        assert!(waiter.cancel_handle().is_none());
        assert_eq!(waiter.await, Ok(Some("at".to_string())));
    }
}
