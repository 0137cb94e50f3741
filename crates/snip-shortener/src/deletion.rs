//! Owner-filtered bulk deletion.
//!
//! A generator task feeds the requested ids into a bounded queue shared by
//! [`WORKER_COUNT`] workers. Each worker looks its id up and forwards it only
//! when the record belongs to the requesting principal. All workers write
//! into one channel; once every worker is done the collected ids go to a
//! single [`Repository::delete_batch`] call running in its own task.
//!
//! Nothing that happens per id is reported to the caller. Ids that are
//! malformed, unknown, owned by someone else or that fail to load are logged
//! and left out of the batch.

use snip_core::{Repository, ShortId, StorageError};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Number of workers resolving ids concurrently.
pub const WORKER_COUNT: usize = 10;

/// Creates a linked cancellation handle and signal.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

/// Raises the cancellation signal. Dropping the handle raises it as well.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the signal is raised or its handle is gone.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// How a deletion request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The batch delete succeeded for these ids.
    Deleted(Vec<ShortId>),
    /// None of the requested ids belonged to the principal.
    Nothing,
    /// Cancelled before a batch was submitted.
    Cancelled,
    /// The batch delete was submitted and failed.
    Failed { ids: Vec<ShortId>, error: StorageError },
}

/// Handle on a submitted deletion.
///
/// Dropping the ticket leaves the batch delete running in the background.
#[derive(Debug)]
#[must_use = "call `wait` to observe the batch delete or `detach` to let it run"]
pub struct DeletionTicket {
    inner: TicketInner,
}

#[derive(Debug)]
enum TicketInner {
    Done(DeletionOutcome),
    Pending {
        ids: Vec<ShortId>,
        handle: JoinHandle<DeletionOutcome>,
    },
}

impl DeletionTicket {
    fn done(outcome: DeletionOutcome) -> Self {
        Self {
            inner: TicketInner::Done(outcome),
        }
    }

    /// Whether a batch delete was handed to the storage.
    pub fn is_submitted(&self) -> bool {
        matches!(self.inner, TicketInner::Pending { .. })
    }

    /// Waits for the batch delete, if any, and returns its outcome.
    pub async fn wait(self) -> DeletionOutcome {
        match self.inner {
            TicketInner::Done(outcome) => outcome,
            TicketInner::Pending { ids, handle } => match handle.await {
                Ok(outcome) => outcome,
                Err(err) => DeletionOutcome::Failed {
                    ids,
                    error: StorageError::Operation(format!("batch delete task failed: {err}")),
                },
            },
        }
    }

    /// Lets the batch delete finish on its own.
    pub fn detach(self) {}
}

/// Deletes the subset of a batch of short ids owned by a principal.
pub struct DeletionPipeline<R> {
    repository: Arc<R>,
    base_url: Arc<str>,
}

impl<R> Clone for DeletionPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            base_url: Arc::clone(&self.base_url),
        }
    }
}

impl<R> std::fmt::Debug for DeletionPipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionPipeline")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl<R: Repository> DeletionPipeline<R> {
    /// `base_url` is the prefix short URLs were built with, so callers may
    /// pass either bare ids or full short URLs.
    pub fn new(repository: Arc<R>, base_url: impl Into<String>) -> Self {
        Self {
            repository,
            base_url: Arc::from(base_url.into()),
        }
    }

    /// Runs the pipeline for `owner`.
    ///
    /// Returns once the owned ids are known; the batch delete itself runs in
    /// the background behind the returned ticket. An internal cancellation
    /// signal is raised when this call returns.
    pub async fn delete(&self, owner: &str, ids: Vec<String>) -> DeletionTicket {
        let (_guard, cancel) = cancellation();
        self.delete_with(owner, ids, cancel).await
    }

    /// Like [`DeletionPipeline::delete`], stopping early when `cancel` fires.
    pub async fn delete_with(
        &self,
        owner: &str,
        ids: Vec<String>,
        cancel: Cancellation,
    ) -> DeletionTicket {
        let requested = ids.len();
        let mut owned = self.collect_owned(owner, ids, cancel.clone()).await;

        if cancel.is_cancelled() {
            info!(owner = %owner, requested, "deletion cancelled before submit");
            return DeletionTicket::done(DeletionOutcome::Cancelled);
        }

        owned.sort();
        owned.dedup();

        if owned.is_empty() {
            debug!(owner = %owner, requested, "no owned short ids to delete");
            return DeletionTicket::done(DeletionOutcome::Nothing);
        }

        info!(
            owner = %owner,
            requested,
            owned = owned.len(),
            "submitting batch delete"
        );

        let repository = Arc::clone(&self.repository);
        let batch = owned.clone();
        let handle = tokio::spawn(async move {
            match repository.delete_batch(&batch).await {
                Ok(()) => DeletionOutcome::Deleted(batch),
                Err(error) => {
                    error!(error = %error, count = batch.len(), "batch delete failed");
                    DeletionOutcome::Failed { ids: batch, error }
                }
            }
        });

        DeletionTicket {
            inner: TicketInner::Pending { ids: owned, handle },
        }
    }

    async fn collect_owned(
        &self,
        owner: &str,
        ids: Vec<String>,
        cancel: Cancellation,
    ) -> Vec<ShortId> {
        let mut tasks = JoinSet::new();

        let (queue_tx, queue_rx) = mpsc::channel(1);
        tasks.spawn(feed(ids, queue_tx, cancel.clone()));

        let queue = Arc::new(Mutex::new(queue_rx));
        let owner: Arc<str> = Arc::from(owner);
        let (found_tx, mut found_rx) = mpsc::channel(WORKER_COUNT);

        for worker in 0..WORKER_COUNT {
            tasks.spawn(resolve_worker(
                worker,
                Arc::clone(&self.repository),
                Arc::clone(&self.base_url),
                Arc::clone(&owner),
                Arc::clone(&queue),
                found_tx.clone(),
                cancel.clone(),
            ));
        }
        // the merged stream ends when the last worker drops its sender
        drop(found_tx);
        drop(queue);

        let mut owned = Vec::new();
        while let Some(id) = found_rx.recv().await {
            owned.push(id);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "deletion task failed");
            }
        }

        owned
    }
}

async fn feed(ids: Vec<String>, queue: mpsc::Sender<String>, mut cancel: Cancellation) {
    for id in ids {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = queue.send(id) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn resolve_worker<R: Repository>(
    worker: usize,
    repository: Arc<R>,
    base_url: Arc<str>,
    owner: Arc<str>,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
    found: mpsc::Sender<ShortId>,
    mut cancel: Cancellation,
) {
    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                raw = queue.recv() => raw,
            }
        };
        let Some(raw) = next else {
            break;
        };

        let Some(id) = resolve_owned(repository.as_ref(), &base_url, &owner, &raw).await else {
            continue;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = found.send(id) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    debug!(worker, "deletion worker finished");
}

async fn resolve_owned<R: Repository>(
    repository: &R,
    base_url: &str,
    owner: &str,
    raw: &str,
) -> Option<ShortId> {
    let id = match ShortId::from_url(base_url, raw) {
        Ok(id) => id,
        Err(err) => {
            debug!(input = %raw, error = %err, "skipping malformed short id");
            return None;
        }
    };

    match repository.get(&id).await {
        Ok(record) if record.is_owned_by(owner) => Some(record.short_id),
        Ok(record) => {
            debug!(
                id = %id,
                owner = %owner,
                record_owner = %record.owner,
                "skipping short id owned by another user"
            );
            None
        }
        Err(err) if err.is_not_found() => {
            debug!(id = %id, "skipping unknown short id");
            None
        }
        Err(err) => {
            warn!(id = %id, error = %err, "failed to load short id, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_handle_cancels() {
        let (handle, cancel) = cancellation();
        assert!(!cancel.is_cancelled());

        drop(handle);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let (handle, cancel) = cancellation();
        let mut waiter = cancel.clone();

        let task = tokio::spawn(async move { waiter.cancelled().await });
        handle.cancel();

        task.await.unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn finished_ticket_returns_outcome() {
        let ticket = DeletionTicket::done(DeletionOutcome::Nothing);
        assert!(!ticket.is_submitted());
        assert_eq!(ticket.wait().await, DeletionOutcome::Nothing);
    }
}
