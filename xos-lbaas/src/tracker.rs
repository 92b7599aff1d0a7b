//! Completion tracking for operations XOS finishes asynchronously.
//!
//! [`poll_until`] is the state machine: it probes the backend at a fixed
//! interval until the probe reports readiness, the deadline passes, or the
//! poll is cancelled. [`CompletionTracker`] runs such polls as background
//! tasks keyed by entity id so a later delete can cancel them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{debug, info, warn};

use crate::error::{Result, XosError};

/// Terminal state of a poll.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// The probe reported readiness.
    Completed(T),
    /// The deadline passed without readiness.
    TimedOut,
    /// The tracked entity was deleted while polling.
    Cancelled,
    /// A status request failed.
    Failed(XosError),
}

/// Probe every `interval` until it returns `Some`, or until `timeout` has
/// elapsed since the first probe.
///
/// The deadline and the cancel channel bound each probe as well as the
/// sleeps between them, so a request that never answers still ends the poll.
/// A probe error ends polling immediately.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    timeout: Duration,
    cancel: oneshot::Receiver<()>,
    mut probe: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    let mut cancel = Some(cancel);
    let mut polls: u32 = 0;

    while Instant::now() < deadline {
        polls += 1;
        let answer = tokio::select! {
            res = timeout_at(deadline, probe()) => res,
            _ = cancelled(&mut cancel) => return PollOutcome::Cancelled,
        };
        match answer {
            Err(_) => break,
            Ok(Ok(Some(ready))) => {
                debug!(polls, "Poll completed");
                return PollOutcome::Completed(ready);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => return PollOutcome::Failed(e),
        }

        let wake = (Instant::now() + interval).min(deadline);
        tokio::select! {
            _ = sleep_until(wake) => {}
            _ = cancelled(&mut cancel) => return PollOutcome::Cancelled,
        }
    }

    debug!(polls, "Poll timed out");
    PollOutcome::TimedOut
}

/// Resolves once a cancel arrives. Never resolves after the sender is gone.
async fn cancelled(cancel: &mut Option<oneshot::Receiver<()>>) {
    if let Some(rx) = cancel.as_mut() {
        if rx.await.is_ok() {
            return;
        }
        *cancel = None;
    }
    std::future::pending::<()>().await
}

tokio::task_local! {
    // Entity id of the completion task currently running.
    static TRACKED_ENTITY: String;
}

struct RunningPoll {
    generation: u64,
    cancel_tx: Option<oneshot::Sender<()>>,
    // Resolves once the task's job has returned.
    done_rx: oneshot::Receiver<()>,
}

/// Registry of background completion tasks, keyed by local entity id.
#[derive(Clone, Default)]
pub struct CompletionTracker {
    running: Arc<RwLock<HashMap<String, RunningPoll>>>,
    generation: Arc<AtomicU64>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `job` as the completion task for `entity_id`.
    ///
    /// The job gets the receiving end of its cancel channel. A task already
    /// tracked for the same entity is cancelled and replaced.
    pub async fn track<F, Fut>(&self, entity_id: &str, job: F) -> JoinHandle<()>
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        {
            let mut running = self.running.write().await;
            let previous = running.insert(
                entity_id.to_string(),
                RunningPoll {
                    generation,
                    cancel_tx: Some(cancel_tx),
                    done_rx,
                },
            );
            if let Some(mut previous) = previous {
                warn!(entity_id = %entity_id, "Replacing in-flight completion task");
                if let Some(tx) = previous.cancel_tx.take() {
                    let _ = tx.send(());
                }
            }
        }

        let fut = job(cancel_rx);
        let running = Arc::clone(&self.running);
        let entity_id = entity_id.to_string();

        tokio::spawn(async move {
            TRACKED_ENTITY.scope(entity_id.clone(), fut).await;
            drop(done_tx);

            let mut running = running.write().await;
            if running
                .get(&entity_id)
                .is_some_and(|poll| poll.generation == generation)
            {
                running.remove(&entity_id);
            }
        })
    }

    /// Cancel the in-flight task for `entity_id` and wait for its job to
    /// return, so any completion it reports lands before the caller moves on.
    /// Returns false if no task was running.
    ///
    /// Called from inside that task's own job (a completion callback that
    /// deletes the same entity), it only deregisters the task: the job cannot
    /// finish while it waits on itself.
    pub async fn cancel(&self, entity_id: &str) -> bool {
        let poll = self.running.write().await.remove(entity_id);
        let Some(mut poll) = poll else {
            return false;
        };

        if let Some(tx) = poll.cancel_tx.take() {
            let _ = tx.send(());
        }
        let own_task = TRACKED_ENTITY
            .try_with(|id| id == entity_id)
            .unwrap_or(false);
        if own_task {
            debug!(entity_id = %entity_id, "Completion task deregistered from within");
            return true;
        }
        let _ = poll.done_rx.await;
        info!(entity_id = %entity_id, "Completion task cancelled");
        true
    }

    pub async fn is_tracking(&self, entity_id: &str) -> bool {
        self.running.read().await.contains_key(entity_id)
    }

    pub async fn in_flight(&self) -> usize {
        self.running.read().await.len()
    }
}
