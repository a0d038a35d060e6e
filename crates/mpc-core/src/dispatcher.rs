//! Single-consumer execution context for observable state.
//!
//! Every cell of a flight plan model is mutated from one logical thread of
//! control: the [`UiLoop`]. Producers hold a [`UiContext`] and post closures
//! into its FIFO channel. Posts from one producer keep their order; posts
//! from different producers interleave arbitrarily.

use crate::error::DispatchError;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send>;

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_LOOP: Cell<u64> = const { Cell::new(0) };
}

/// Create a connected context/loop pair.
pub fn ui_context() -> (UiContext, UiLoop) {
    let id = NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::unbounded_channel();
    (UiContext { id, tx }, UiLoop { id, rx })
}

/// Producer side of the UI channel.
#[derive(Clone)]
pub struct UiContext {
    id: u64,
    tx: mpsc::UnboundedSender<Job>,
}

impl UiContext {
    /// Whether the caller is currently running inside this context's loop.
    pub fn is_current(&self) -> bool {
        CURRENT_LOOP.with(|current| current.get() == self.id)
    }

    /// Enqueue `job`, even when already on the UI loop.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            tracing::debug!("UI loop closed, dropping posted job");
        }
    }

    /// Run `job` inline when on the UI loop, otherwise enqueue it.
    pub fn run(&self, job: impl FnOnce() + Send + 'static) {
        if self.is_current() {
            job();
        } else {
            self.post(job);
        }
    }

    /// Run `job` on the UI loop and wait for its result.
    pub async fn invoke<F, R>(&self, job: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Box::new(move || {
                let _ = tx.send(job());
            }))
            .map_err(|_| DispatchError::Closed)?;
        rx.await.map_err(|_| DispatchError::Dropped)
    }
}

impl std::fmt::Debug for UiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiContext").field("id", &self.id).finish()
    }
}

/// Consumer side of the UI channel.
pub struct UiLoop {
    id: u64,
    rx: mpsc::UnboundedReceiver<Job>,
}

impl UiLoop {
    /// Execute every job queued so far, returning how many ran.
    pub fn run_until_idle(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(job) = self.rx.try_recv() {
            self.enter(job);
            executed += 1;
        }
        executed
    }

    /// Drain jobs until every [`UiContext`] is gone.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            self.enter(job);
        }
        tracing::debug!(loop_id = self.id, "UI loop finished");
    }

    /// Run `f` as if it had been posted to this loop.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = LoopGuard::enter(self.id);
        f()
    }
}

struct LoopGuard {
    previous: u64,
}

impl LoopGuard {
    fn enter(id: u64) -> Self {
        let previous = CURRENT_LOOP.with(|current| current.replace(id));
        Self { previous }
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        CURRENT_LOOP.with(|current| current.set(self.previous));
    }
}
