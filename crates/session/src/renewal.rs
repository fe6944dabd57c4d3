//! One-shot token renewal timer.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

#[derive(Debug)]
struct Armed {
    generation: u64,
    fires_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Holds at most one armed renewal.
///
/// Arming a new renewal aborts the previous one. Each arming gets a
/// generation number so a firing task can release its own slot without
/// touching a newer one.
#[derive(Debug, Default)]
pub(crate) struct RenewalTimer {
    generation: u64,
    armed: Option<Armed>,
}

impl RenewalTimer {
    /// Generation the next [`arm`](Self::arm) call will use.
    pub(crate) fn next_generation(&self) -> u64 {
        self.generation + 1
    }

    /// Spawn `task` after `delay` on the current tokio runtime.
    ///
    /// Returns `false` (and arms nothing) outside a runtime.
    pub(crate) fn arm<F>(&mut self, fires_at: DateTime<Utc>, delay: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime; token renewal not scheduled");
            return false;
        };

        self.generation += 1;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        self.armed = Some(Armed {
            generation: self.generation,
            fires_at,
            handle,
        });
        true
    }

    /// Abort the armed renewal, if any.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Release the slot held by `generation` once its task has fired.
    pub(crate) fn fired(&mut self, generation: u64) -> bool {
        if self.armed.as_ref().is_some_and(|a| a.generation == generation) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn fires_at(&self) -> Option<DateTime<Utc>> {
        self.armed.as_ref().map(|a| a.fires_at)
    }
}
