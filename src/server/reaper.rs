//! Worker tracking and reclamation.
//!
//! Every spawned worker gets a slot in the reaper's table. When a worker
//! ends, normally or by panicking, a guard it owns announces its id on the
//! completion channel. The reaper task drains that channel, removes the
//! slot, joins the finished task and records how it ended. The dispatcher
//! only ever sends on unbounded channels, so reclamation never blocks it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Identity of one worker for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a worker's exchange ended, as reported by the worker itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed,
    Aborted,
}

/// Opaque reference to an in-flight worker. Only the reaper looks inside.
pub struct WorkerHandle {
    id: WorkerId,
    join: JoinHandle<WorkerOutcome>,
}

/// Counters describing worker lifecycle so far.
#[derive(Debug, Default)]
pub struct ReaperStats {
    spawned: AtomicU64,
    reclaimed: AtomicU64,
    aborted: AtomicU64,
    panicked: AtomicU64,
}

impl ReaperStats {
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Acquire)
    }

    pub fn reclaimed(&self) -> u64 {
        self.reclaimed.load(Ordering::Acquire)
    }

    /// Workers that returned an error from their exchange.
    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Acquire)
    }

    /// Spawned but not yet reclaimed.
    pub fn live(&self) -> u64 {
        self.spawned().saturating_sub(self.reclaimed())
    }
}

impl fmt::Display for ReaperStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "spawned={} reclaimed={} aborted={} panicked={} live={}",
            self.spawned(),
            self.reclaimed(),
            self.aborted(),
            self.panicked(),
            self.live()
        )
    }
}

/// Dropped when a worker task finishes or unwinds. Announces completion and
/// gives the worker slot back.
struct CompletionGuard {
    id: WorkerId,
    completed: UnboundedSender<WorkerId>,
    _slot: OwnedSemaphorePermit,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // The reaper outlives every guard unless the runtime is shutting down.
        let _ = self.completed.send(self.id);
    }
}

/// Spawns tracked workers. Cheap to clone.
#[derive(Clone)]
pub struct WorkerTracker {
    next_id: Arc<AtomicU64>,
    registered: UnboundedSender<WorkerHandle>,
    completed: UnboundedSender<WorkerId>,
    stats: Arc<ReaperStats>,
}

impl WorkerTracker {
    /// Runs `worker` on its own task while holding `slot`.
    pub fn spawn<F>(&self, slot: OwnedSemaphorePermit, worker: F) -> WorkerId
    where
        F: Future<Output = WorkerOutcome> + Send + 'static,
    {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let guard = CompletionGuard {
            id,
            completed: self.completed.clone(),
            _slot: slot,
        };

        self.stats.spawned.fetch_add(1, Ordering::AcqRel);
        let join = tokio::spawn(async move {
            let _guard = guard;
            worker.await
        });

        if self.registered.send(WorkerHandle { id, join }).is_err() {
            warn!(worker = %id, "reaper is gone; worker runs untracked");
        }

        id
    }

    pub fn stats(&self) -> Arc<ReaperStats> {
        Arc::clone(&self.stats)
    }
}

/// Owns the slot table and reclaims finished workers.
pub struct Reaper {
    registered: UnboundedReceiver<WorkerHandle>,
    completed: UnboundedReceiver<WorkerId>,
    slots: HashMap<WorkerId, JoinHandle<WorkerOutcome>>,
    finished_early: HashSet<WorkerId>,
    stats: Arc<ReaperStats>,
}

impl Reaper {
    /// Starts the reaper task and returns the handle used to spawn workers.
    /// Must be called from within a tokio runtime.
    pub fn start() -> WorkerTracker {
        let (registered_tx, registered_rx) = mpsc::unbounded_channel();
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(ReaperStats::default());

        let reaper = Reaper {
            registered: registered_rx,
            completed: completed_rx,
            slots: HashMap::new(),
            finished_early: HashSet::new(),
            stats: Arc::clone(&stats),
        };
        tokio::spawn(reaper.run());

        WorkerTracker {
            next_id: Arc::new(AtomicU64::new(1)),
            registered: registered_tx,
            completed: completed_tx,
            stats,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                Some(handle) = self.registered.recv() => self.register(handle).await,
                Some(id) = self.completed.recv() => self.reclaim(id).await,
                else => break,
            }
        }

        debug!(pending = self.slots.len(), "reaper stopped");
    }

    async fn register(&mut self, handle: WorkerHandle) {
        // A short-lived worker may announce itself before its handle arrives.
        if self.finished_early.remove(&handle.id) {
            self.join(handle.id, handle.join).await;
        } else {
            self.slots.insert(handle.id, handle.join);
        }
    }

    async fn reclaim(&mut self, id: WorkerId) {
        match self.slots.remove(&id) {
            Some(join) => self.join(id, join).await,
            None => {
                self.finished_early.insert(id);
            }
        }
    }

    async fn join(&self, id: WorkerId, join: JoinHandle<WorkerOutcome>) {
        match join.await {
            Ok(WorkerOutcome::Completed) => {}
            Ok(WorkerOutcome::Aborted) => {
                self.stats.aborted.fetch_add(1, Ordering::AcqRel);
            }
            Err(e) if e.is_panic() => {
                self.stats.panicked.fetch_add(1, Ordering::AcqRel);
                error!(worker = %id, "worker panicked; connection dropped");
            }
            Err(e) => {
                warn!(worker = %id, error = %e, "worker cancelled");
            }
        }

        self.stats.reclaimed.fetch_add(1, Ordering::AcqRel);
        debug!(worker = %id, live = self.stats.live(), "worker reclaimed");
    }
}
