//! Action queue
//!
//! Serializes every command issued against one player. Jobs are handed to
//! a dedicated worker task at enqueue time, so their order is fixed when
//! the caller invokes the operation, not when the returned handle is first
//! polled. The worker runs one job at a time and only starts the next once
//! the previous one has settled, bounded by the safety timeout.

use crate::types::ActionId;
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Pending entry, as seen by observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedAction {
    pub id: ActionId,
    pub name: &'static str,
}

struct Job {
    id: ActionId,
    name: &'static str,
    run: Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>,
}

/// Per-player FIFO sequencer
pub struct ActionQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    pending: Arc<Mutex<VecDeque<QueuedAction>>>,
    worker: JoinHandle<()>,
    safety_timeout: Duration,
}

impl ActionQueue {
    /// Spawn the worker. Must be called from within a Tokio runtime.
    pub fn new(safety_timeout: Duration) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let pending: Arc<Mutex<VecDeque<QueuedAction>>> = Arc::default();
        let worker_pending = pending.clone();

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                debug!(action = %job.id, name = job.name, "Action started");
                (job.run)().await;
                lock(&worker_pending).pop_front();
                debug!(action = %job.id, name = job.name, "Action settled");
            }
            debug!("Action queue closed");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            pending,
            worker,
            safety_timeout,
        }
    }

    /// Append an action to the queue.
    ///
    /// `action` receives the entry's id and is invoked only after every
    /// earlier entry has settled. The returned handle resolves with its
    /// result, or with [`Error::PromiseTimeout`] once the safety timeout
    /// elapses.
    pub fn enqueue<T, F, Fut>(&self, name: &'static str, action: F) -> ActionHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(ActionId) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let id = ActionId::new();
        let (result_tx, result_rx) = oneshot::channel();
        let timeout = self.safety_timeout;

        let run = Box::new(move || {
            async move {
                let guarded = AssertUnwindSafe(action(id)).catch_unwind();
                let result = match tokio::time::timeout(timeout, guarded).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => {
                        error!(action = %id, name, "Action panicked");
                        Err(Error::Internal(format!("action {} panicked", name)))
                    }
                    Err(_) => {
                        warn!(action = %id, name, timeout_ms = timeout.as_millis() as u64, "Action timed out");
                        Err(Error::PromiseTimeout {
                            action: name.to_string(),
                            id,
                            timeout_ms: timeout.as_millis() as u64,
                        })
                    }
                };
                if let Err(ref e) = result {
                    debug!(action = %id, name, error = %e, "Action rejected");
                }
                let _ = result_tx.send(result);
            }
            .boxed()
        });

        let sender = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        match sender.as_ref() {
            Some(sender) => {
                let mut pending = lock(&self.pending);
                pending.push_back(QueuedAction { id, name });
                if sender.send(Job { id, name, run }).is_err() {
                    pending.pop_back();
                } else {
                    debug!(action = %id, name, queued = pending.len(), "Action enqueued");
                }
            }
            None => debug!(action = %id, name, "Action enqueued on a closed queue"),
        }

        ActionHandle {
            id,
            name,
            receiver: result_rx,
        }
    }

    /// Number of entries queued or running
    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the queued and running entries, head first
    pub fn pending(&self) -> Vec<QueuedAction> {
        lock(&self.pending).iter().cloned().collect()
    }

    pub fn safety_timeout(&self) -> Duration {
        self.safety_timeout
    }

    /// Stop the worker. Every handle that has not settled yet resolves
    /// with [`Error::Destroyed`].
    pub fn close(&self) {
        self.sender.lock().unwrap_or_else(|p| p.into_inner()).take();
        self.worker.abort();
        lock(&self.pending).clear();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().unwrap_or_else(|p| p.into_inner()).is_none()
    }
}

impl Drop for ActionQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

fn lock(pending: &Mutex<VecDeque<QueuedAction>>) -> MutexGuard<'_, VecDeque<QueuedAction>> {
    pending.lock().unwrap_or_else(|p| p.into_inner())
}

/// Future settling with a queued action's result
pub struct ActionHandle<T> {
    id: ActionId,
    name: &'static str,
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> ActionHandle<T> {
    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Future for ActionHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Destroyed)))
    }
}
