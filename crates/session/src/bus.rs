//! Status-transition fan-out for UI observers.
//!
//! Every committed status change is published while the session lock is
//! still held, so subscribers see transitions strictly in commit order.
//! Consumers render login/loading/authenticated/error views by branching
//! on [`Transition::to`].

use std::sync::mpsc::{self, Receiver};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::state::AuthStatus;

/// One committed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// 1-based position in the commit sequence.
    pub seq: u64,
    pub from: AuthStatus,
    pub to: AuthStatus,
}

/// A subscription to the transition stream.
///
/// Each subscription receives every transition published after it was
/// created. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<Transition>,
}

impl Subscription {
    fn new(receiver: Receiver<Transition>) -> Self {
        Self { receiver }
    }

    /// Block until the next transition is available.
    pub fn recv(&self) -> Result<Transition, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a transition without blocking.
    pub fn try_recv(&self) -> Result<Transition, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a transition.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Transition, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything already published, without blocking.
    pub fn drain(&self) -> Vec<Transition> {
        self.receiver.try_iter().collect()
    }
}

/// In-process pub/sub for transitions.
#[derive(Debug, Default)]
pub struct TransitionBus {
    subscribers: Mutex<Vec<mpsc::Sender<Transition>>>,
}

impl TransitionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, transition: Transition) {
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(transition).is_ok());
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Subscription::new(rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
