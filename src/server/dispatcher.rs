use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::server::reaper::{Reaper, ReaperStats, WorkerTracker};
use crate::server::worker::ConnectionWorker;
use crate::servable::ServableFile;
use crate::transfer::TransferSettings;

/// Default upper bound on concurrently running workers.
pub const DEFAULT_MAX_WORKERS: usize = 1024;

/// Owns the listening socket and runs the accept loop.
///
/// Each accepted connection is handed to its own worker task and the loop
/// goes straight back to `accept`. Finished workers are reclaimed by the
/// reaper, never by the dispatcher.
pub struct Dispatcher {
    listener: TcpListener,
    file: Arc<ServableFile>,
    settings: TransferSettings,
    slots: Arc<Semaphore>,
    tracker: WorkerTracker,
}

impl Dispatcher {
    /// Must be called from within a tokio runtime; starts the reaper.
    pub fn new(
        listener: TcpListener,
        file: ServableFile,
        settings: TransferSettings,
        max_workers: usize,
    ) -> Self {
        Self {
            listener,
            file: Arc::new(file),
            settings,
            slots: Arc::new(Semaphore::new(max_workers.max(1))),
            tracker: Reaper::start(),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Arc<ReaperStats> {
        self.tracker.stats()
    }

    /// Accepts until accept fails. Returns only with an error.
    pub async fn run(self) -> Result<()> {
        info!(
            file = %self.file.path.display(),
            bytes = self.file.size,
            "serving"
        );

        loop {
            // Wait for a free slot first so excess clients queue in the backlog.
            let slot = Arc::clone(&self.slots)
                .acquire_owned()
                .await
                .map_err(|_| Error::SlotsClosed)?;

            let (conn, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    return Err(Error::Accept(e));
                }
            };

            let worker = ConnectionWorker::new(conn, peer, Arc::clone(&self.file), self.settings);
            let id = self.tracker.spawn(slot, worker.serve());
            debug!(%peer, worker = %id, "accepted connection");
        }
    }
}
