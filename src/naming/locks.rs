//! Per-path reader/writer lock state behind a fair admission gate.
//!
//! Each node of the directory tree owns a fair reader/writer lock. The
//! lock's owned guards are parked here between the `lock` call that takes
//! them and the `unlock` call that releases them, which may arrive on
//! different connections. A single-permit FIFO semaphore admits callers
//! into the lock protocol in arrival order.
//!
//! Admission is held while the ancestors are read-locked and until the
//! caller has joined its leaf's wait queue, never across the remaining
//! wait: a writer queued behind active readers therefore keeps later
//! arrivals out only until it is enqueued, which both prevents reader
//! streams from starving it and lets a caller blocked at its leaf release
//! the gate for others.

use std::collections::HashMap;
use std::future::{poll_fn, Future};
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Poll;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, Semaphore, SemaphorePermit};

use crate::error::DfsError;
use crate::path::Path;

pub(crate) struct LockManager {
    admission: Semaphore,
    nodes: Mutex<HashMap<Path, Arc<NodeLock>>>,
}

struct NodeLock {
    rw: Arc<RwLock<()>>,
    held: Mutex<Held>,
}

#[derive(Default)]
struct Held {
    readers: Vec<OwnedRwLockReadGuard<()>>,
    writer: Option<OwnedRwLockWriteGuard<()>>,
}

impl LockManager {
    pub(crate) fn new() -> LockManager {
        LockManager { admission: Semaphore::new(1), nodes: Mutex::new(HashMap::new()) }
    }

    /// Waits for admission into the lock protocol, in arrival order.
    pub(crate) async fn admit(&self) -> Result<SemaphorePermit<'_>, DfsError> {
        self.admission
            .acquire()
            .await
            .map_err(|_| DfsError::IllegalState("admission gate closed".to_owned()))
    }

    /// Takes a shared lock on `path`, waiting as long as it takes. Used
    /// for ancestors, while admission is held.
    pub(crate) async fn read_lock(&self, path: &Path) {
        let node = self.node(path);
        let guard = node.rw.clone().read_owned().await;
        node.park().readers.push(guard);
    }

    /// Takes a shared lock on `path`, releasing `admission` as soon as the
    /// caller is enqueued at the node.
    pub(crate) async fn read_lock_queued(&self, path: &Path, admission: SemaphorePermit<'_>) {
        let node = self.node(path);
        let guard = finish_queued(node.rw.clone().read_owned(), admission).await;
        node.park().readers.push(guard);
    }

    /// Takes the exclusive lock on `path`, releasing `admission` as soon
    /// as the caller is enqueued at the node.
    pub(crate) async fn write_lock_queued(&self, path: &Path, admission: SemaphorePermit<'_>) {
        let node = self.node(path);
        let guard = finish_queued(node.rw.clone().write_owned(), admission).await;
        let mut held = node.park();
        debug_assert!(held.writer.is_none());
        held.writer = Some(guard);
    }

    /// Releases one shared hold on `path`.
    pub(crate) fn read_unlock(&self, path: &Path) -> Result<(), DfsError> {
        let node = self.lookup(path).ok_or_else(|| not_locked(path))?;
        let mut held = node.park();
        match held.readers.pop() {
            Some(_) => Ok(()),
            None => Err(not_locked(path)),
        }
    }

    /// Detaches the exclusive hold on `path`; dropping the guard releases
    /// it. The caller keeps exclusion while it finishes write-side work.
    pub(crate) fn take_write(&self, path: &Path) -> Result<OwnedRwLockWriteGuard<()>, DfsError> {
        let node = self.lookup(path).ok_or_else(|| not_locked(path))?;
        let mut held = node.park();
        held.writer.take().ok_or_else(|| not_locked(path))
    }

    /// Drops the lock records of `path` and everything under it. Callers
    /// still queued at a dropped record complete against it in isolation;
    /// their eventual unlock reports `IllegalArgument`.
    pub(crate) fn forget_subtree(&self, path: &Path) {
        let mut nodes = self.nodes.lock().expect("lock table poisoned");
        nodes.retain(|at, _| !at.starts_with(path));
    }

    fn node(&self, path: &Path) -> Arc<NodeLock> {
        let mut nodes = self.nodes.lock().expect("lock table poisoned");
        nodes
            .entry(path.clone())
            .or_insert_with(|| Arc::new(NodeLock { rw: Arc::new(RwLock::new(())), held: Mutex::new(Held::default()) }))
            .clone()
    }

    fn lookup(&self, path: &Path) -> Option<Arc<NodeLock>> {
        self.nodes.lock().expect("lock table poisoned").get(path).cloned()
    }
}

impl NodeLock {
    fn park(&self) -> MutexGuard<'_, Held> {
        self.held.lock().expect("held-guard table poisoned")
    }
}

fn not_locked(path: &Path) -> DfsError {
    DfsError::IllegalArgument(format!("{path} holds no matching lock"))
}

/// Completes a queued acquisition: polls `acquire` once so the caller
/// joins the lock's FIFO queue, releases the admission permit, then waits
/// out the rest of the acquisition.
async fn finish_queued<F: Future>(acquire: F, admission: SemaphorePermit<'_>) -> F::Output {
    let mut acquire = pin!(acquire);
    let early = poll_fn(|cx| {
        Poll::Ready(match acquire.as_mut().poll(cx) {
            Poll::Ready(output) => Some(output),
            Poll::Pending => None,
        })
    })
    .await;
    drop(admission);
    match early {
        Some(output) => output,
        None => acquire.await,
    }
}
