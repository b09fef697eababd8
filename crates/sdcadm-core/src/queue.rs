//! Bounded work queue
//!
//! Runs a fixed pool of workers over a growable FIFO of items:
//! - items may be pushed before or after the workers start
//! - at most `concurrency` worker invocations run at once
//! - [`WorkQueue::drained`] resolves once the queue is closed and every
//!   pushed item has been processed
//!
//! Workers never report failure to the queue. They record into a
//! shared [`FailureCollector`] and keep pulling items.

use crate::error::UpgradeError;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Fixed-size worker pool over an unbounded FIFO
#[derive(Debug)]
pub struct WorkQueue<T> {
    sender: Option<mpsc::UnboundedSender<T>>,
    workers: Vec<JoinHandle<()>>,
    panics: Arc<AtomicUsize>,
    concurrency: usize,
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Start `concurrency` workers running `worker` for each item.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `UpgradeError::Usage` if `concurrency` is zero
    pub fn new<F, Fut>(concurrency: usize, worker: F) -> Result<Self, UpgradeError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if concurrency == 0 {
            return Err(UpgradeError::usage("work queue concurrency must be at least 1"));
        }

        let (sender, receiver) = mpsc::unbounded_channel::<T>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let worker = Arc::new(worker);
        let panics = Arc::new(AtomicUsize::new(0));

        let workers = (0..concurrency)
            .map(|slot| {
                let receiver = Arc::clone(&receiver);
                let worker = Arc::clone(&worker);
                let panics = Arc::clone(&panics);
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(item) = next else { break };
                        tracing::trace!(slot, "worker picked up item");
                        // a panicking item must not take the rest of the queue with it
                        if AssertUnwindSafe(async { worker(item).await })
                            .catch_unwind()
                            .await
                            .is_err()
                        {
                            tracing::error!(slot, "work queue item panicked");
                            panics.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    tracing::trace!(slot, "worker exiting");
                })
            })
            .collect();

        Ok(Self {
            sender: Some(sender),
            workers,
            panics,
            concurrency,
        })
    }

    /// Queue one item
    ///
    /// # Errors
    /// - `UpgradeError::Internal` if the queue was already closed
    pub fn push(&self, item: T) -> Result<(), UpgradeError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| UpgradeError::internal("push on a closed work queue"))?;
        sender
            .send(item)
            .map_err(|_| UpgradeError::internal("work queue workers are gone"))
    }

    /// Queue several items in order
    ///
    /// # Errors
    /// - `UpgradeError::Internal` if the queue was already closed
    pub fn push_all(&self, items: impl IntoIterator<Item = T>) -> Result<(), UpgradeError> {
        items.into_iter().try_for_each(|item| self.push(item))
    }

    /// No more items will be pushed
    pub fn close(&mut self) {
        self.sender.take();
    }

    /// Whether [`close`](Self::close) has been called
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    /// Worker pool size
    #[inline]
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Close the queue if still open and wait for every item to finish.
    ///
    /// Items that panic are counted and the queue moves on to the next
    /// item, so every pushed item still runs.
    ///
    /// # Errors
    /// - `UpgradeError::Internal` if any item panicked or a worker task
    ///   died; reported after every worker has exited
    pub async fn drained(mut self) -> Result<(), UpgradeError> {
        self.close();

        let mut first_join_error = None;
        for err in join_all(self.workers.drain(..))
            .await
            .into_iter()
            .filter_map(Result::err)
        {
            tracing::error!(error = %err, "work queue worker died");
            first_join_error.get_or_insert(err);
        }

        tracing::debug!(concurrency = self.concurrency, "work queue drained");
        if let Some(err) = first_join_error {
            return Err(
                UpgradeError::internal(format!("work queue worker failed: {err}")).with_cause(err)
            );
        }
        match self.panics.load(Ordering::SeqCst) {
            0 => Ok(()),
            n => Err(UpgradeError::internal(format!("{n} work queue item(s) panicked"))),
        }
    }
}

/// Ordered failure list shared by queue workers
#[derive(Debug, Clone, Default)]
pub struct FailureCollector {
    inner: Arc<Mutex<Vec<UpgradeError>>>,
}

impl FailureCollector {
    /// Create empty collector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn record(&self, err: UpgradeError) {
        self.inner.lock().push(err);
    }

    /// Failures recorded so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Take the failures; `Err(MultiError)` if any were recorded
    ///
    /// # Errors
    /// - `UpgradeError::Multi` wrapping every recorded failure in order
    pub fn into_result(self) -> Result<(), UpgradeError> {
        let errors = std::mem::take(&mut *self.inner.lock());
        match UpgradeError::multi(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
