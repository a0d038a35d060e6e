//! Serial task queue.
//!
//! Jobs submitted to a [`Strand`] run one at a time in submission order, no
//! matter which task or thread submitted them. A job that awaits (a dialog,
//! the UI loop) keeps the strand busy until it completes.

use crate::error::{Result, SessionError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = BoxFuture<'static, ()>;

#[derive(Clone)]
pub struct Strand {
    tx: mpsc::UnboundedSender<Job>,
    depth: Arc<AtomicUsize>,
}

impl Strand {
    /// Start the worker. Must be called within a tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        tokio::spawn(drain(rx, depth.clone()));
        Self { tx, depth }
    }

    /// Queue `job` behind everything submitted before it.
    pub fn run_later<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        self.depth.fetch_add(1, Ordering::SeqCst);

        let job = async move {
            let _ = done.send(job.await);
        }
        .boxed();

        if self.tx.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            debug!("Strand worker gone, task dropped");
        }
        TaskHandle { rx }
    }

    /// Jobs queued or running.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Job>, depth: Arc<AtomicUsize>) {
    while let Some(job) = rx.recv().await {
        // run each job as its own task so a panic only takes that job down
        if let Err(e) = tokio::spawn(job).await {
            error!(error = %e, "Session task aborted");
        }
        depth.fetch_sub(1, Ordering::SeqCst);
    }
    debug!("Strand finished");
}

/// Completion of a queued job.
#[must_use = "a task handle does nothing unless awaited"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(SessionError::TaskAborted(
                "task ended without a result".to_string(),
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_jobs_do_not_overlap() {
        let strand = Strand::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = log.clone();
            strand.run_later(async move {
                log.lock().push("first start");
                tokio::time::sleep(Duration::from_millis(30)).await;
                log.lock().push("first end");
                Ok(1)
            })
        };
        let second = {
            let log = log.clone();
            strand.run_later(async move {
                log.lock().push("second start");
                log.lock().push("second end");
                Ok(2)
            })
        };

        assert_eq!(second.await.unwrap(), 2);
        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(
            *log.lock(),
            vec!["first start", "first end", "second start", "second end"]
        );
    }

    #[tokio::test]
    async fn test_panicking_job_is_isolated() {
        let strand = Strand::new();

        let broken = strand.run_later(async {
            if true {
                panic!("boom");
            }
            Ok(())
        });
        let healthy = strand.run_later(async { Ok("still running") });

        assert!(matches!(broken.await, Err(SessionError::TaskAborted(_))));
        assert_eq!(healthy.await.unwrap(), "still running");
    }

    #[tokio::test]
    async fn test_errors_reach_the_caller() {
        let strand = Strand::new();
        let result: Result<()> = strand
            .run_later(async { Err(SessionError::InvalidName("..".to_string())) })
            .await;
        assert!(matches!(result, Err(SessionError::InvalidName(_))));
    }
}
